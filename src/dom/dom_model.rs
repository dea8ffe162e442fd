use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowMode {
    Open,
    Closed,
}

/// Bounding box in page pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.left + self.width / 2.0, self.top + self.height / 2.0)
    }
}

/// A synthetic event that reached an element (kept for inspection by tests and drivers).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchedEvent {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub bubbles: bool,
}

#[derive(Debug, Clone)]
pub struct Element {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub value: String,
    pub rect: Option<Rect>,
    /// Opaque driver handle used to address the element in a live browser.
    pub handle: Option<String>,
    pub events: Vec<DispatchedEvent>,
    shadow: Option<(NodeId, ShadowMode)>,
    content_document: Option<NodeId>,
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            value: String::new(),
            rect: None,
            handle: None,
            events: Vec::new(),
            shadow: None,
            content_document: None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn classes(&self) -> Vec<&str> {
        self.attr("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn is_frame(&self) -> bool {
        matches!(self.tag.as_str(), "iframe" | "frame")
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Document {
        origin: String,
        owner_frame: Option<NodeId>,
    },
    Element(Element),
    Text(String),
    ShadowRoot {
        host: NodeId,
        mode: ShadowMode,
    },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub kind: NodeKind,
}

/// Arena-backed document tree spanning the top document, its frame documents
/// and every attached shadow root.
///
/// Roots (documents and shadow roots) have no parent. A frame document links
/// back to its owning `<iframe>` and a shadow root links back to its host, so
/// every node can be walked outward to the top document.
#[derive(Debug, Clone)]
pub struct Dom {
    nodes: Vec<Node>,
    root: NodeId,
    shadow_hook_installed: bool,
    intercepted_roots: HashMap<NodeId, NodeId>,
}

impl Dom {
    pub fn new(origin: &str) -> Self {
        let root = Node {
            parent: None,
            children: Vec::new(),
            kind: NodeKind::Document {
                origin: origin.to_string(),
                owner_frame: None,
            },
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            shadow_hook_installed: false,
            intercepted_roots: HashMap::new(),
        }
    }

    /// The top-level document node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes.get(id.0)?.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(id.0)?.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.tag.as_str())
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|el| el.attr(name))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.element(*c).is_some())
            .collect()
    }

    pub fn is_root_node(&self, id: NodeId) -> bool {
        matches!(
            self.nodes.get(id.0).map(|n| &n.kind),
            Some(NodeKind::Document { .. }) | Some(NodeKind::ShadowRoot { .. })
        )
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    fn push(&mut self, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            kind,
        });
        if let Some(p) = parent {
            self.nodes[p.0].children.push(id);
        }
        id
    }

    pub fn append_element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let mut el = Element::new(tag);
        for (k, v) in attrs {
            el.attributes.insert(k.to_ascii_lowercase(), v.to_string());
        }
        if let Some(v) = el.attributes.get("value") {
            el.value = v.clone();
        }
        self.push(Some(parent), NodeKind::Element(el))
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push(Some(parent), NodeKind::Text(text.to_string()))
    }

    pub fn set_rect(&mut self, id: NodeId, rect: Rect) {
        if let Some(el) = self.element_mut(id) {
            el.rect = Some(rect);
        }
    }

    pub fn set_handle(&mut self, id: NodeId, handle: &str) {
        if let Some(el) = self.element_mut(id) {
            el.handle = Some(handle.to_string());
        }
    }

    /// Detach a node from its parent. The node stays in the arena but is no
    /// longer connected to any document.
    pub fn remove(&mut self, id: NodeId) {
        if let Some(parent) = self.parent(id) {
            self.nodes[parent.0].children.retain(|c| *c != id);
            self.nodes[id.0].parent = None;
        }
    }

    // ------------------------------------------------------------------
    // Shadow roots
    // ------------------------------------------------------------------

    /// Install the privileged shadow-root interception hook. Only roots
    /// attached after this call are exposed through [`Dom::intercepted_shadow_root`].
    pub fn install_shadow_hook(&mut self) {
        self.shadow_hook_installed = true;
    }

    pub fn shadow_hook_installed(&self) -> bool {
        self.shadow_hook_installed
    }

    /// Attach a shadow root to `host`. Returns `None` if `host` is not an
    /// element or already hosts a root.
    pub fn attach_shadow(&mut self, host: NodeId, mode: ShadowMode) -> Option<NodeId> {
        match self.element(host) {
            Some(el) if el.shadow.is_none() => {}
            _ => return None,
        }
        let root = self.push(None, NodeKind::ShadowRoot { host, mode });
        if let Some(el) = self.element_mut(host) {
            el.shadow = Some((root, mode));
        }
        if self.shadow_hook_installed {
            self.intercepted_roots.insert(host, root);
        }
        Some(root)
    }

    /// The host's shadow root, if it is open. Closed roots are not enumerable.
    pub fn open_shadow_root(&self, host: NodeId) -> Option<NodeId> {
        match self.element(host)?.shadow {
            Some((root, ShadowMode::Open)) => Some(root),
            _ => None,
        }
    }

    /// The root captured by the interception hook for `host`, open or closed.
    pub fn intercepted_shadow_root(&self, host: NodeId) -> Option<NodeId> {
        self.intercepted_roots.get(&host).copied()
    }

    // ------------------------------------------------------------------
    // Frames
    // ------------------------------------------------------------------

    /// Create the content document of a frame element.
    pub fn attach_frame_document(&mut self, frame: NodeId, origin: &str) -> Option<NodeId> {
        if !self.element(frame)?.is_frame() {
            return None;
        }
        let doc = self.push(
            None,
            NodeKind::Document {
                origin: origin.to_string(),
                owner_frame: Some(frame),
            },
        );
        if let Some(el) = self.element_mut(frame) {
            el.content_document = Some(doc);
        }
        Some(doc)
    }

    pub fn content_document(&self, frame: NodeId) -> Option<NodeId> {
        self.element(frame)?.content_document
    }

    pub fn origin(&self, document: NodeId) -> Option<&str> {
        match &self.nodes.get(document.0)?.kind {
            NodeKind::Document { origin, .. } => Some(origin.as_str()),
            _ => None,
        }
    }

    pub fn owner_frame(&self, document: NodeId) -> Option<NodeId> {
        match &self.nodes.get(document.0)?.kind {
            NodeKind::Document { owner_frame, .. } => *owner_frame,
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------

    /// Walk parents until a node without a parent is reached.
    pub fn root_of(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(p) = self.parent(current) {
            current = p;
        }
        current
    }

    /// The document that owns `id`, walking out through shadow hosts.
    pub fn owner_document(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            let root = self.root_of(current);
            match &self.nodes.get(root.0)?.kind {
                NodeKind::Document { .. } => return Some(root),
                NodeKind::ShadowRoot { host, .. } => current = *host,
                _ => return None,
            }
        }
    }

    /// Whether `id` is reachable from the top document.
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            let root = self.root_of(current);
            if root == self.root {
                return true;
            }
            match self.nodes.get(root.0).map(|n| &n.kind) {
                Some(NodeKind::ShadowRoot { host, .. }) => current = *host,
                Some(NodeKind::Document {
                    owner_frame: Some(frame),
                    ..
                }) => current = *frame,
                _ => return false,
            }
        }
    }

    /// Element descendants of `scope` in document order. Does not enter
    /// shadow roots or frame documents.
    pub fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(scope).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if self.element(id).is_some() {
                out.push(id);
            }
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Ancestor elements of `id`, nearest first, within the same root.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(p) = current {
            if self.element(p).is_some() {
                out.push(p);
            }
            current = self.parent(p);
        }
        out
    }

    /// Concatenated light-DOM text of `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        if let Some(node) = self.nodes.get(id.0) {
            if let NodeKind::Text(t) = &node.kind {
                out.push_str(t);
            }
            for c in &node.children {
                self.collect_text(*c, out);
            }
        }
    }

    /// Whitespace-collapsed, trimmed text content.
    pub fn visible_text(&self, id: NodeId) -> String {
        self.text_content(id)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn find_by_handle(&self, handle: &str) -> Option<NodeId> {
        (0..self.nodes.len()).map(NodeId).find(|id| {
            self.element(*id)
                .and_then(|el| el.handle.as_deref())
                .map_or(false, |h| h == handle)
        })
    }

    /// First element in `scope` whose `id` attribute equals `value`.
    pub fn element_by_id(&self, scope: NodeId, value: &str) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|id| self.attr(*id, "id") == Some(value))
    }

    // ------------------------------------------------------------------
    // Mutation from actions
    // ------------------------------------------------------------------

    pub fn set_value(&mut self, id: NodeId, value: &str) -> bool {
        match self.element_mut(id) {
            Some(el) => {
                el.value = value.to_string();
                true
            }
            None => false,
        }
    }

    pub fn record_event(&mut self, id: NodeId, event: DispatchedEvent) -> bool {
        match self.element_mut(id) {
            Some(el) => {
                el.events.push(event);
                true
            }
            None => false,
        }
    }
}
