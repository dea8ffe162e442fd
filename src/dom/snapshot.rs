use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dom::dom_model::{Dom, NodeId, Rect, ShadowMode};
use crate::error::SessionError;

/// Serialized page tree produced by the page driver's `snapshot` command.
///
/// ```json
/// {
///   "origin": "https://app.example.com",
///   "shadow_hook": true,
///   "children": [
///     { "tag": "html", "children": [
///       { "tag": "body", "children": [
///         { "tag": "input", "attrs": { "id": "email" }, "handle": "n17",
///           "rect": { "left": 10, "top": 20, "width": 200, "height": 24 } },
///         { "text": "Sign in" }
///       ]}
///     ]}
///   ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomSnapshot {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    pub origin: String,

    /// Whether the closed-shadow interception hook ran before page scripts.
    #[serde(default)]
    pub shadow_hook: bool,

    #[serde(default)]
    pub children: Vec<SnapshotNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnapshotNode {
    Element(SnapshotElement),
    Text { text: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotElement {
    pub tag: String,

    #[serde(default)]
    pub attrs: BTreeMap<String, String>,

    /// Live `value` property, which may differ from the `value` attribute.
    #[serde(default)]
    pub value: Option<String>,

    #[serde(default)]
    pub rect: Option<Rect>,

    #[serde(default)]
    pub handle: Option<String>,

    #[serde(default)]
    pub children: Vec<SnapshotNode>,

    #[serde(default)]
    pub shadow: Option<SnapshotShadow>,

    #[serde(default)]
    pub frame: Option<SnapshotFrame>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotShadow {
    pub mode: ShadowMode,
    #[serde(default)]
    pub children: Vec<SnapshotNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFrame {
    pub origin: String,
    #[serde(default)]
    pub children: Vec<SnapshotNode>,
}

impl DomSnapshot {
    pub fn from_json(value: serde_json::Value) -> Result<Self, SessionError> {
        serde_json::from_value(value).map_err(|e| SessionError::Snapshot(e.to_string()))
    }

    /// Build the arena document.
    pub fn into_dom(self) -> Dom {
        let mut dom = Dom::new(&self.origin);
        if self.shadow_hook {
            dom.install_shadow_hook();
        }
        let root = dom.root();
        for child in &self.children {
            build_node(&mut dom, root, child);
        }
        dom
    }
}

fn build_node(dom: &mut Dom, parent: NodeId, node: &SnapshotNode) {
    match node {
        SnapshotNode::Text { text } => {
            dom.append_text(parent, text);
        }
        SnapshotNode::Element(el) => {
            let attrs: Vec<(&str, &str)> = el
                .attrs
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            let id = dom.append_element(parent, &el.tag, &attrs);

            if let Some(value) = &el.value {
                dom.set_value(id, value);
            }
            if let Some(rect) = el.rect {
                dom.set_rect(id, rect);
            }
            if let Some(handle) = &el.handle {
                dom.set_handle(id, handle);
            }

            for child in &el.children {
                build_node(dom, id, child);
            }

            if let Some(shadow) = &el.shadow {
                if let Some(root) = dom.attach_shadow(id, shadow.mode) {
                    for child in &shadow.children {
                        build_node(dom, root, child);
                    }
                }
            }

            if let Some(frame) = &el.frame {
                if let Some(doc) = dom.attach_frame_document(id, &frame.origin) {
                    for child in &frame.children {
                        build_node(dom, doc, child);
                    }
                }
            }
        }
    }
}
