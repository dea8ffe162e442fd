use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bundle::bundle_model::ContextChain;
use crate::dom::dom_model::{Dom, NodeId, NodeKind, ShadowMode};
use crate::dom::path::{evaluate_path, structural_path};
use crate::error::{CaptureFailure, ResolutionFailure};

// ============================================================================
// Frame descriptors
// ============================================================================

/// How a frame is identified within its owning document, in preference order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum FrameDescriptor {
    Id(String),
    Name(String),
    /// Zero-based position among the document's `iframe`/`frame` elements.
    Index(usize),
}

impl fmt::Display for FrameDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameDescriptor::Id(id) => write!(f, "#{}", id),
            FrameDescriptor::Name(name) => write!(f, "[name={}]", name),
            FrameDescriptor::Index(i) => write!(f, "frames[{}]", i),
        }
    }
}

/// Frame elements of `document` in document order (light tree only).
fn frames_of(dom: &Dom, document: NodeId) -> Vec<NodeId> {
    dom.descendants(document)
        .into_iter()
        .filter(|id| dom.element(*id).map_or(false, |el| el.is_frame()))
        .collect()
}

/// `None` when the frame element lives in a shadow tree, where the frame
/// chain cannot address it.
fn describe_frame(dom: &Dom, frame: NodeId) -> Option<FrameDescriptor> {
    let document = dom.root_of(frame);
    if !matches!(dom.node(document).map(|n| &n.kind), Some(NodeKind::Document { .. })) {
        return None;
    }
    let index = frames_of(dom, document).iter().position(|f| *f == frame)?;

    let non_empty = |name: &str| {
        dom.attr(frame, name)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    Some(if let Some(id) = non_empty("id") {
        FrameDescriptor::Id(id)
    } else if let Some(name) = non_empty("name") {
        FrameDescriptor::Name(name)
    } else {
        FrameDescriptor::Index(index)
    })
}

fn find_frame(dom: &Dom, document: NodeId, descriptor: &FrameDescriptor) -> Option<NodeId> {
    let frames = frames_of(dom, document);
    match descriptor {
        FrameDescriptor::Id(id) => frames.into_iter().find(|f| dom.attr(*f, "id") == Some(id.as_str())),
        FrameDescriptor::Name(name) => frames
            .into_iter()
            .find(|f| dom.attr(*f, "name") == Some(name.as_str())),
        FrameDescriptor::Index(i) => frames.get(*i).copied(),
    }
}

// ============================================================================
// Capture
// ============================================================================

/// Record the frame and shadow-root chain in front of `node`.
///
/// Shadow hosts are collected first while walking out of nested shadow roots,
/// then frames while walking the owning documents' frame chain. Both lists
/// come out outermost first. A frame hosted inside a shadow root cannot be
/// expressed in this chain and fails the capture.
pub fn capture_context(dom: &Dom, node: NodeId) -> Result<ContextChain, CaptureFailure> {
    let mut chain = ContextChain::default();
    let mut current = node;

    while let Some(NodeKind::ShadowRoot { host, mode }) =
        dom.node(dom.root_of(current)).map(|n| &n.kind)
    {
        if *mode == ShadowMode::Closed {
            chain.closed_shadow = true;
        }
        match structural_path(dom, *host) {
            Some(path) => chain.shadow_hosts.insert(0, path),
            None => break,
        }
        current = *host;
    }

    while let Some(frame) = dom
        .owner_document(current)
        .and_then(|doc| dom.owner_frame(doc))
    {
        let descriptor = describe_frame(dom, frame).ok_or(CaptureFailure::UnaddressableFrame)?;
        chain.frames.insert(0, descriptor);
        current = frame;
    }

    Ok(chain)
}

// ============================================================================
// Resolution
// ============================================================================

/// Capability for reaching closed shadow roots. Absent unless a privileged
/// hook was installed before page scripts ran.
pub trait ClosedShadowAccess {
    fn closed_root(&self, dom: &Dom, host: NodeId) -> Option<NodeId>;
}

/// Reads roots captured by the document's interception hook.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterceptedRoots;

impl ClosedShadowAccess for InterceptedRoots {
    fn closed_root(&self, dom: &Dom, host: NodeId) -> Option<NodeId> {
        dom.intercepted_shadow_root(host)
    }
}

/// No closed-root access at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClosedAccess;

impl ClosedShadowAccess for NoClosedAccess {
    fn closed_root(&self, _dom: &Dom, _host: NodeId) -> Option<NodeId> {
        None
    }
}

/// Where element search runs for one bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Document that owns the search scope.
    pub document: NodeId,
    /// Search scope: the document itself or the innermost shadow root.
    pub root: NodeId,
}

impl ExecutionContext {
    pub fn top(dom: &Dom) -> Self {
        Self {
            document: dom.root(),
            root: dom.root(),
        }
    }
}

/// Descend frames, then shadow hosts, outside-in.
///
/// Fails on the first boundary that cannot be crossed. It never falls back
/// to an outer context, which would move the search into the wrong region.
pub fn resolve_context(
    dom: &Dom,
    chain: &ContextChain,
    access: &dyn ClosedShadowAccess,
) -> Result<ExecutionContext, ResolutionFailure> {
    let top_origin = dom.origin(dom.root()).unwrap_or_default().to_string();
    let mut document = dom.root();

    for (depth, descriptor) in chain.frames.iter().enumerate() {
        let not_found = || ResolutionFailure::FrameNotFound {
            depth,
            descriptor: descriptor.clone(),
        };
        let frame = find_frame(dom, document, descriptor).ok_or_else(not_found)?;
        let content = dom.content_document(frame).ok_or_else(not_found)?;

        let origin = dom.origin(content).unwrap_or_default();
        if origin != top_origin {
            return Err(ResolutionFailure::CrossOriginFrame {
                depth,
                descriptor: descriptor.clone(),
                origin: origin.to_string(),
            });
        }
        document = content;
    }

    let mut root = document;
    for (depth, path) in chain.shadow_hosts.iter().enumerate() {
        let hosts = evaluate_path(dom, root, path);
        let [host] = hosts.as_slice() else {
            return Err(ResolutionFailure::ShadowHostNotFound {
                depth,
                path: path.clone(),
            });
        };

        root = match dom
            .open_shadow_root(*host)
            .or_else(|| access.closed_root(dom, *host))
        {
            Some(shadow) => shadow,
            None if chain.closed_shadow => {
                return Err(ResolutionFailure::ClosedShadowUnavailable {
                    depth,
                    path: path.clone(),
                });
            }
            None => {
                return Err(ResolutionFailure::NoShadowRoot {
                    depth,
                    path: path.clone(),
                });
            }
        };
    }

    Ok(ExecutionContext { document, root })
}
