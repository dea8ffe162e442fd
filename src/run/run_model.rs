use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RowFailure, StepFailure};
use crate::locate::strategy::StrategyKind;
use crate::record::step_model::{Sequence, Step};

// ============================================================================
// Outcomes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Skipped,
    /// Never started because its row failed earlier or the run was cancelled.
    NotRun,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step_id: String,
    pub status: StepStatus,

    /// Strategy that located the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyKind>,

    /// Stage that failed: `page`, `resolve`, `locate` or `execute`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,

    /// Failure or skip reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default)]
    pub duration_ms: u64,
}

impl StepOutcome {
    fn pending(step_id: &str) -> Self {
        Self {
            step_id: step_id.to_string(),
            status: StepStatus::Pending,
            strategy: None,
            stage: None,
            message: None,
            duration_ms: 0,
        }
    }
}

/// Result of one data iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowResult {
    pub row_index: usize,
    pub steps: Vec<StepOutcome>,

    /// Rendered `RowFailure`, when the row failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default)]
    pub duration_ms: u64,
}

impl RowResult {
    pub fn passed(&self) -> bool {
        self.error.is_none() && self.steps.iter().all(|s| {
            matches!(s.status, StepStatus::Passed | StepStatus::Skipped)
        })
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }
}

// ============================================================================
// Run result
// ============================================================================

/// Finalized outcome of a batch. Only `RunRecorder::finalize` builds one and
/// it offers no way to change it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    run_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sequence_name: Option<String>,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    duration_ms: u64,
    rows: Vec<RowResult>,
    passed: usize,
    failed: usize,
    skipped: usize,
    not_run: usize,
    cancelled: bool,
}

impl RunResult {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn sequence_name(&self) -> Option<&str> {
        self.sequence_name.as_deref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn rows(&self) -> &[RowResult] {
        &self.rows
    }

    /// Step counts across all rows.
    pub fn passed(&self) -> usize {
        self.passed
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn not_run(&self) -> usize {
        self.not_run
    }

    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn rows_passed(&self) -> usize {
        self.rows.iter().filter(|r| r.passed()).count()
    }

    pub fn rows_failed(&self) -> usize {
        self.rows.len() - self.rows_passed()
    }

    pub fn all_passed(&self) -> bool {
        !self.cancelled && self.rows.iter().all(RowResult::passed)
    }
}

// ============================================================================
// Recorder
// ============================================================================

/// Mutable accumulator owned by the orchestrator while a batch runs.
/// Observers only ever read it.
pub struct RunRecorder {
    run_id: Uuid,
    sequence_name: Option<String>,
    started_at: DateTime<Utc>,
    clock: Instant,
    rows: Vec<RowResult>,
    row_clock: Option<Instant>,
    cancelled: bool,
}

impl RunRecorder {
    pub fn new(sequence: &Sequence) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            sequence_name: sequence.name.clone(),
            started_at: Utc::now(),
            clock: Instant::now(),
            rows: Vec::new(),
            row_clock: None,
            cancelled: false,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Rows recorded so far, the current one included.
    pub fn rows(&self) -> &[RowResult] {
        &self.rows
    }

    /// Open a row with every step `Pending`.
    pub fn start_row(&mut self, row_index: usize, steps: &[Step]) {
        self.rows.push(RowResult {
            row_index,
            steps: steps.iter().map(|s| StepOutcome::pending(&s.id)).collect(),
            error: None,
            duration_ms: 0,
        });
        self.row_clock = Some(Instant::now());
    }

    fn outcome_mut(&mut self, step_index: usize) -> Option<&mut StepOutcome> {
        self.rows.last_mut()?.steps.get_mut(step_index)
    }

    pub fn step_running(&mut self, step_index: usize) {
        if let Some(o) = self.outcome_mut(step_index) {
            o.status = StepStatus::Running;
        }
    }

    pub fn step_passed(&mut self, step_index: usize, strategy: StrategyKind, elapsed: Duration) {
        if let Some(o) = self.outcome_mut(step_index) {
            o.status = StepStatus::Passed;
            o.strategy = Some(strategy);
            o.duration_ms = elapsed.as_millis() as u64;
        }
    }

    pub fn step_skipped(&mut self, step_index: usize, reason: &str) {
        if let Some(o) = self.outcome_mut(step_index) {
            o.status = StepStatus::Skipped;
            o.message = Some(reason.to_string());
        }
    }

    pub fn step_failed(&mut self, step_index: usize, failure: &StepFailure, elapsed: Duration) {
        if let Some(o) = self.outcome_mut(step_index) {
            o.status = StepStatus::Failed;
            o.stage = Some(failure.stage().to_string());
            o.message = Some(failure.to_string());
            o.duration_ms = elapsed.as_millis() as u64;
        }
    }

    /// Mark the current row failed. Its unfinished steps become `NotRun`.
    pub fn fail_row(&mut self, failure: &RowFailure) {
        if let Some(row) = self.rows.last_mut() {
            row.error = Some(failure.to_string());
        }
        self.finish_row();
    }

    /// Close the current row; any step not yet finished becomes `NotRun`.
    pub fn finish_row(&mut self) {
        let elapsed = self.row_clock.take().map(|c| c.elapsed());
        if let Some(row) = self.rows.last_mut() {
            for step in &mut row.steps {
                if matches!(step.status, StepStatus::Pending | StepStatus::Running) {
                    step.status = StepStatus::NotRun;
                }
            }
            if let Some(e) = elapsed {
                row.duration_ms = e.as_millis() as u64;
            }
        }
    }

    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    pub fn finalize(mut self) -> RunResult {
        if self.row_clock.is_some() {
            self.finish_row();
        }
        let count = |status: StepStatus| -> usize {
            self.rows.iter().map(|r| r.count(status)).sum()
        };
        RunResult {
            run_id: self.run_id,
            sequence_name: self.sequence_name.clone(),
            started_at: self.started_at,
            finished_at: Utc::now(),
            duration_ms: self.clock.elapsed().as_millis() as u64,
            passed: count(StepStatus::Passed),
            failed: count(StepStatus::Failed),
            skipped: count(StepStatus::Skipped),
            not_run: count(StepStatus::NotRun),
            cancelled: self.cancelled,
            rows: self.rows,
        }
    }
}
