use std::sync::mpsc::Sender;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capture::generator::capture_target;
use crate::dom::dom_model::{Dom, NodeId};
use crate::error::{CaptureFailure, RecordError};
use crate::record::step_model::{Step, StepAction};

// ============================================================================
// Events and surface
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomEventKind {
    PointerDown { x: f64, y: f64 },
    Input,
    Change,
    KeyDown { key: String },
}

/// A raw interaction signal observed on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct DomEvent {
    pub target: NodeId,
    pub kind: DomEventKind,
}

impl DomEvent {
    pub fn pointer_down(target: NodeId, x: f64, y: f64) -> Self {
        Self {
            target,
            kind: DomEventKind::PointerDown { x, y },
        }
    }

    pub fn input(target: NodeId) -> Self {
        Self {
            target,
            kind: DomEventKind::Input,
        }
    }

    pub fn change(target: NodeId) -> Self {
        Self {
            target,
            kind: DomEventKind::Change,
        }
    }

    pub fn key_down(target: NodeId, key: &str) -> Self {
        Self {
            target,
            kind: DomEventKind::KeyDown {
                key: key.to_string(),
            },
        }
    }
}

/// Receives steps live, in emission order. No acknowledgement.
pub trait RecordingSurface {
    fn emit(&mut self, step: &Step);
}

/// Forwards steps over a channel, e.g. to a UI thread.
pub struct ChannelSurface {
    tx: Sender<Step>,
}

impl ChannelSurface {
    pub fn new(tx: Sender<Step>) -> Self {
        Self { tx }
    }
}

impl RecordingSurface for ChannelSurface {
    fn emit(&mut self, step: &Step) {
        if self.tx.send(step.clone()).is_err() {
            warn!(step_id = %step.id, "recording surface disconnected; step dropped");
        }
    }
}

/// Keeps every emitted step in memory.
#[derive(Debug, Default)]
pub struct CollectingSurface {
    pub steps: Vec<Step>,
}

impl RecordingSurface for CollectingSurface {
    fn emit(&mut self, step: &Step) {
        self.steps.push(step.clone());
    }
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecorderState {
    Idle,
    Recording,
}

/// State owned by one active recording. Created by `start`, consumed by `stop`.
#[derive(Debug, Clone)]
pub struct RecordingSession {
    pub id: Uuid,
    pub project_id: String,
    pub started_at: DateTime<Utc>,
    pub steps_emitted: usize,
    pub events_rejected: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordingSummary {
    pub session_id: Uuid,
    pub project_id: String,
    pub steps_emitted: usize,
    pub events_rejected: usize,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NotRecording,
    NotInteractive,
    NotTextEntry,
    UnqualifiedKey,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Emitted(Step),
    Ignored(IgnoreReason),
    /// No bundle could be built; the event is dropped.
    Rejected(CaptureFailure),
}

// ============================================================================
// Recorder
// ============================================================================

/// `Idle -> Recording -> Idle` state machine turning DOM events into steps.
///
/// Events are only observed while a session is active. Every qualifying
/// event yields its own step; nothing is merged or debounced.
pub struct Recorder {
    session: Option<RecordingSession>,
    surface: Box<dyn RecordingSurface>,
}

impl Recorder {
    pub fn new(surface: Box<dyn RecordingSurface>) -> Self {
        Self {
            session: None,
            surface,
        }
    }

    pub fn state(&self) -> RecorderState {
        if self.session.is_some() {
            RecorderState::Recording
        } else {
            RecorderState::Idle
        }
    }

    pub fn session(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }

    pub fn start(&mut self, project_id: &str) -> Result<&RecordingSession, RecordError> {
        if let Some(active) = &self.session {
            return Err(RecordError::AlreadyRecording(active.project_id.clone()));
        }
        let session = RecordingSession {
            id: Uuid::new_v4(),
            project_id: project_id.to_string(),
            started_at: Utc::now(),
            steps_emitted: 0,
            events_rejected: 0,
        };
        info!(session_id = %session.id, project_id, "recording started");
        Ok(self.session.insert(session))
    }

    pub fn stop(&mut self) -> Result<RecordingSummary, RecordError> {
        let session = self.session.take().ok_or(RecordError::NotRecording)?;
        let summary = RecordingSummary {
            session_id: session.id,
            project_id: session.project_id,
            steps_emitted: session.steps_emitted,
            events_rejected: session.events_rejected,
            duration_ms: (Utc::now() - session.started_at).num_milliseconds(),
        };
        info!(
            session_id = %summary.session_id,
            steps = summary.steps_emitted,
            rejected = summary.events_rejected,
            "recording stopped"
        );
        Ok(summary)
    }

    /// Turn one DOM event into at most one step.
    pub fn handle_event(&mut self, dom: &Dom, event: &DomEvent) -> RecordOutcome {
        let Some(session) = self.session.as_mut() else {
            return RecordOutcome::Ignored(IgnoreReason::NotRecording);
        };

        let (target, action, pointer) = match &event.kind {
            DomEventKind::PointerDown { x, y } => match interactive_target(dom, event.target) {
                Some(t) => (t, StepAction::Click, Some((*x, *y))),
                None => return RecordOutcome::Ignored(IgnoreReason::NotInteractive),
            },
            DomEventKind::Input | DomEventKind::Change => {
                if !is_text_entry(dom, event.target) {
                    return RecordOutcome::Ignored(IgnoreReason::NotTextEntry);
                }
                (event.target, StepAction::Input, None)
            }
            DomEventKind::KeyDown { key } => {
                if key != "Enter" {
                    return RecordOutcome::Ignored(IgnoreReason::UnqualifiedKey);
                }
                if !is_text_entry(dom, event.target) {
                    return RecordOutcome::Ignored(IgnoreReason::NotTextEntry);
                }
                (event.target, StepAction::Enter, None)
            }
        };

        let captured = match capture_target(dom, target) {
            Ok(c) => c,
            Err(failure) => {
                session.events_rejected += 1;
                debug!(?failure, "event rejected: no usable bundle");
                return RecordOutcome::Rejected(failure);
            }
        };

        let mut step = match action {
            StepAction::Click => Step::click(captured.bundle),
            StepAction::Input => Step::input(captured.bundle, &current_value(dom, target)),
            StepAction::Enter => Step::enter(captured.bundle),
        };
        step.label = captured.label;
        if let Some((x, y)) = pointer {
            step = step.with_pointer(x, y);
        }

        session.steps_emitted += 1;
        debug!(step_id = %step.id, action = ?step.action, label = ?step.label, "step recorded");
        self.surface.emit(&step);
        RecordOutcome::Emitted(step)
    }
}

// ============================================================================
// Element classification
// ============================================================================

const CLICKABLE_ROLES: [&str; 8] = [
    "button", "link", "checkbox", "radio", "tab", "menuitem", "option", "switch",
];

fn is_interactive(dom: &Dom, node: NodeId) -> bool {
    let Some(el) = dom.element(node) else {
        return false;
    };
    matches!(
        el.tag.as_str(),
        "a" | "button" | "input" | "select" | "textarea" | "label" | "option" | "summary"
    ) || el.attr("role").map_or(false, |r| CLICKABLE_ROLES.contains(&r))
        || el.attr("onclick").is_some()
}

/// Nearest interactive ancestor-or-self of `node`.
fn interactive_target(dom: &Dom, node: NodeId) -> Option<NodeId> {
    std::iter::once(node)
        .chain(dom.ancestors(node))
        .find(|n| is_interactive(dom, *n))
}

const NON_TEXT_INPUT_TYPES: [&str; 9] = [
    "button", "submit", "reset", "image", "checkbox", "radio", "file", "hidden", "range",
];

pub fn is_text_entry(dom: &Dom, node: NodeId) -> bool {
    let Some(el) = dom.element(node) else {
        return false;
    };
    match el.tag.as_str() {
        "textarea" | "select" => true,
        "input" => !el
            .attr("type")
            .map_or(false, |t| NON_TEXT_INPUT_TYPES.contains(&t.to_ascii_lowercase().as_str())),
        _ => el
            .attr("contenteditable")
            .map_or(false, |v| v.is_empty() || v == "true"),
    }
}

fn current_value(dom: &Dom, node: NodeId) -> String {
    match dom.element(node) {
        Some(el) if el.attr("contenteditable").is_some() && el.tag != "input" => {
            dom.visible_text(node)
        }
        Some(el) => el.value.clone(),
        None => String::new(),
    }
}
