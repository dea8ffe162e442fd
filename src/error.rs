use thiserror::Error;

use crate::capture::context::FrameDescriptor;
use crate::locate::strategy::{StrategyAttempt, describe_attempts};

/// No usable bundle could be built for an event target. The event is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureFailure {
    #[error("capture target is not an element")]
    NotAnElement,

    #[error("capture target no longer exists in the document")]
    UnknownNode,

    #[error("no locator could be derived for <{tag}>")]
    EmptyBundle { tag: String },

    #[error("target frame cannot be addressed from its owning document")]
    UnaddressableFrame,
}

/// Context traversal could not reach the frame or shadow root that owns the target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionFailure {
    #[error("frame {descriptor} not found at depth {depth}")]
    FrameNotFound {
        depth: usize,
        descriptor: FrameDescriptor,
    },

    #[error("frame {descriptor} at depth {depth} is cross-origin ({origin})")]
    CrossOriginFrame {
        depth: usize,
        descriptor: FrameDescriptor,
        origin: String,
    },

    #[error("shadow host '{path}' not found at depth {depth}")]
    ShadowHostNotFound { depth: usize, path: String },

    #[error("shadow host '{path}' uses a closed shadow root and no interception hook exposed it")]
    ClosedShadowUnavailable { depth: usize, path: String },

    #[error("element '{path}' has no reachable shadow root")]
    NoShadowRoot { depth: usize, path: String },
}

/// Every strategy was exhausted without a confident match.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("element not found after {} strategies: {}", attempts.len(), describe_attempts(attempts))]
pub struct LocatorNotFound {
    pub attempts: Vec<StrategyAttempt>,
}

/// The element was found but acting on it failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionFailure {
    #[error("target element became stale before the action completed")]
    Stale,

    #[error("action threw: {0}")]
    Threw(String),

    #[error("no reply for step {step_id} within {waited_ms}ms")]
    Timeout { step_id: String, waited_ms: u64 },

    #[error("text entry step {step_id} has no value to type")]
    MissingValue { step_id: String },
}

/// Failure of one step, tagged with the stage that produced it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StepFailure {
    #[error("page error: {0}")]
    Page(#[from] SessionError),

    #[error("context resolution failed: {0}")]
    Resolution(#[from] ResolutionFailure),

    #[error("{0}")]
    NotFound(#[from] LocatorNotFound),

    #[error("action failed: {0}")]
    Action(#[from] ActionFailure),
}

impl StepFailure {
    /// Short name of the stage that failed, used in traces and reports.
    pub fn stage(&self) -> &'static str {
        match self {
            StepFailure::Page(_) => "page",
            StepFailure::Resolution(_) => "resolve",
            StepFailure::NotFound(_) => "locate",
            StepFailure::Action(_) => "execute",
        }
    }
}

/// A step failure aborts the rest of its row, and only its row.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowFailure {
    #[error("row {row_index}: could not open page: {source}")]
    PageOpen {
        row_index: usize,
        #[source]
        source: SessionError,
    },

    #[error("row {row_index}: page did not finish loading: {source}")]
    PageLoad {
        row_index: usize,
        #[source]
        source: SessionError,
    },

    #[error("row {row_index}: step {step_id} failed: {source}")]
    Step {
        row_index: usize,
        step_id: String,
        #[source]
        source: StepFailure,
    },
}

/// Errors raised by a page driver or its transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("failed to spawn {script} (is Node.js installed?): {message}")]
    Spawn { script: String, message: String },

    #[error("session I/O: {0}")]
    Io(String),

    #[error("protocol error on '{command}': {error}")]
    Protocol { command: String, error: String },

    #[error("no response to '{command}' (request {request_id}) within {waited_ms}ms")]
    Timeout {
        command: String,
        request_id: String,
        waited_ms: u64,
    },

    #[error("element handle is stale: {0}")]
    StaleElement(String),

    #[error("page script error: {0}")]
    Script(String),

    #[error("page is closed")]
    Closed,

    #[error("invalid DOM snapshot: {0}")]
    Snapshot(String),
}

impl From<SessionError> for ActionFailure {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::StaleElement(_) | SessionError::Closed => ActionFailure::Stale,
            SessionError::Timeout {
                request_id,
                waited_ms,
                ..
            } => ActionFailure::Timeout {
                step_id: request_id,
                waited_ms,
            },
            other => ActionFailure::Threw(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("a recording session is already active for project '{0}'")]
    AlreadyRecording(String),

    #[error("no recording session is active")]
    NotRecording,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    #[error("duplicate step id '{0}'")]
    DuplicateStepId(String),

    #[error("text entry step '{0}' has no payload")]
    MissingPayload(String),

    #[error("step '{step_id}' has an invalid bundle: {source}")]
    InvalidBundle {
        step_id: String,
        #[source]
        source: CaptureFailure,
    },

    #[error("step index {index} out of range (sequence has {len} steps)")]
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt record at {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}
