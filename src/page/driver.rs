use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dom::dom_model::{Dom, NodeId};
use crate::error::SessionError;

/// A synthetic DOM event the driver dispatches on an element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub bubbles: bool,
}

impl SyntheticEvent {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            key: None,
            bubbles: true,
        }
    }

    pub fn key(kind: &str, key: &str) -> Self {
        Self {
            kind: kind.to_string(),
            key: Some(key.to_string()),
            bubbles: true,
        }
    }

    /// Non-bubbling event such as `focus`.
    pub fn local(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            key: None,
            bubbles: false,
        }
    }
}

/// How the page reported readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadSignal {
    Loaded,
    /// The driver cannot report load completion; callers fall back to a fixed delay.
    Unsupported,
}

/// Addresses an element located in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRef {
    /// Node in the snapshot the locate ran against.
    pub node: NodeId,
    /// Driver handle of that node, when the snapshot carried one.
    pub handle: Option<String>,
    /// Correlation id for request/response matching.
    pub step_id: String,
}

impl TargetRef {
    pub fn new(dom: &Dom, node: NodeId, step_id: &str) -> Self {
        Self {
            node,
            handle: dom.element(node).and_then(|el| el.handle.clone()),
            step_id: step_id.to_string(),
        }
    }
}

/// One live browsing context, exclusively owned by whoever opened it.
pub trait PageDriver {
    /// Wait for the page to report load completion.
    fn wait_for_load(&mut self, timeout: Duration) -> Result<LoadSignal, SessionError>;

    /// Serialize the current page, frames and reachable shadow roots included.
    fn snapshot(&mut self) -> Result<Dom, SessionError>;

    /// Dispatch events on the target, in order.
    fn dispatch(&mut self, target: &TargetRef, events: &[SyntheticEvent]) -> Result<(), SessionError>;

    /// Assign `value` through the native property setter, bypassing any
    /// framework value tracking. Does not fire events.
    fn set_native_value(&mut self, target: &TargetRef, value: &str) -> Result<(), SessionError>;

    /// Release the context. Must be called before the next one is opened.
    fn close(&mut self) -> Result<(), SessionError>;
}

/// Opens fresh browsing contexts at a URL, with the closed-shadow hook
/// installed before any page script runs.
pub trait PageFactory {
    fn open_page(&mut self, url: &str) -> Result<Box<dyn PageDriver + '_>, SessionError>;
}
