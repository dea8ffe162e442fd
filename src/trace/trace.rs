use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bundle::bundle_model::ElementBundle;
use crate::locate::strategy::{StrategyAttempt, StrategyKind};

/// Where in the per-step pipeline an event was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStage {
    Page,
    Resolve,
    Locate,
    Execute,
    Skip,
    Cancel,
}

/// One line of the per-run JSONL trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTraceEvent {
    pub timestamp: DateTime<Utc>,
    pub run_id: Uuid,
    pub row_index: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,

    pub stage: TraceStage,
    pub ok: bool,

    /// Strategy that won, when the stage reached locate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyKind>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<StrategyAttempt>,

    /// SHA-1 of the step's bundle; identifies the target without its contents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl RunTraceEvent {
    pub fn now(run_id: Uuid, row_index: usize, stage: TraceStage) -> Self {
        Self {
            timestamp: Utc::now(),
            run_id,
            row_index,
            step_id: None,
            stage,
            ok: true,
            strategy: None,
            attempts: vec![],
            fingerprint: None,
            detail: None,
        }
    }

    pub fn with_step(mut self, step_id: &str, bundle: &ElementBundle) -> Self {
        self.step_id = Some(step_id.to_string());
        self.fingerprint = Some(bundle.fingerprint());
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_attempts(mut self, attempts: &[StrategyAttempt]) -> Self {
        self.attempts = attempts.to_vec();
        self
    }

    pub fn failed(mut self, detail: impl ToString) -> Self {
        self.ok = false;
        self.detail = Some(detail.to_string());
        self
    }

    pub fn with_detail(mut self, detail: impl ToString) -> Self {
        self.detail = Some(detail.to_string());
        self
    }
}
