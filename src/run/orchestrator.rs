use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capture::context::{ClosedShadowAccess, InterceptedRoots, resolve_context};
use crate::error::{RowFailure, StepFailure};
use crate::execute::executor::StepExecutor;
use crate::locate::strategy::{Located, LocatorConfig, locate};
use crate::page::driver::{LoadSignal, PageDriver, PageFactory};
use crate::persist::store::ProjectStore;
use crate::record::step_model::{Sequence, Step};
use crate::run::pacing::{CancellationToken, Pacer, PacingConfig, ThreadPacer};
use crate::run::run_model::{RunRecorder, RunResult};
use crate::run::values::{ResolvedValue, Row, TabularData, resolve_step_value};
use crate::trace::logger::TraceLogger;
use crate::trace::trace::{RunTraceEvent, TraceStage};

// ============================================================================
// Configuration
// ============================================================================

fn default_load_timeout_ms() -> u64 {
    30_000
}

fn default_settle_delay_ms() -> u64 {
    1_500
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Page each row starts from. Overrides the sequence's own start URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,

    /// Fixed wait used only when the driver cannot signal load completion.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    #[serde(default)]
    pub locator: LocatorConfig,

    #[serde(default)]
    pub pacing: PacingConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            url: None,
            load_timeout_ms: default_load_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            locator: LocatorConfig::default(),
            pacing: PacingConfig::default(),
        }
    }
}

impl BatchConfig {
    fn start_url<'s>(&'s self, sequence: &'s Sequence) -> &'s str {
        self.url
            .as_deref()
            .or(sequence.start_url.as_deref())
            .unwrap_or("about:blank")
    }
}

// ============================================================================
// Batch runner
// ============================================================================

/// Replays a sequence once per data row.
///
/// Rows run one after another, each on a freshly opened page that is always
/// closed before the next row starts. A failing step ends its row only.
pub struct BatchRunner<'a> {
    factory: &'a mut dyn PageFactory,
    pacer: Box<dyn Pacer + 'a>,
    cancel: CancellationToken,
    trace: TraceLogger,
    closed_access: Box<dyn ClosedShadowAccess + 'a>,
    store: Option<(&'a mut dyn ProjectStore, String)>,
    rng: StdRng,
}

/// Borrowed pieces a row needs while the page holds the factory.
struct RowEnv<'r> {
    run_id: Uuid,
    pacer: &'r mut dyn Pacer,
    cancel: &'r CancellationToken,
    trace: &'r TraceLogger,
    closed_access: &'r dyn ClosedShadowAccess,
    rng: &'r mut StdRng,
}

enum RowEnd {
    Completed,
    Cancelled,
}

impl<'a> BatchRunner<'a> {
    pub fn new(factory: &'a mut dyn PageFactory) -> Self {
        Self {
            factory,
            pacer: Box::new(ThreadPacer),
            cancel: CancellationToken::new(),
            trace: TraceLogger::disabled(),
            closed_access: Box::new(InterceptedRoots),
            store: None,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_pacer(mut self, pacer: impl Pacer + 'a) -> Self {
        self.pacer = Box::new(pacer);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_trace(mut self, trace: TraceLogger) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_closed_shadow_access(mut self, access: impl ClosedShadowAccess + 'a) -> Self {
        self.closed_access = Box::new(access);
        self
    }

    /// Hand the finalized result to `store` under `project_id`.
    pub fn with_store(mut self, store: &'a mut dyn ProjectStore, project_id: &str) -> Self {
        self.store = Some((store, project_id.to_string()));
        self
    }

    /// Deterministic random delays.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run `sequence` once per row of `data`, or once with recorded values
    /// when there is no data.
    pub fn run(&mut self, sequence: &Sequence, data: Option<&TabularData>, config: &BatchConfig) -> RunResult {
        let rows: Vec<Option<&Row>> = match data {
            Some(d) if !d.rows.is_empty() => d.rows.iter().map(Some).collect(),
            _ => vec![None],
        };
        let headers: &[String] = data.map(|d| d.headers.as_slice()).unwrap_or(&[]);
        let url = config.start_url(sequence);

        let mut recorder = RunRecorder::new(sequence);
        let run_id = recorder.run_id();
        info!(%run_id, rows = rows.len(), steps = sequence.steps.len(), url, "batch started");

        for (row_index, row) in rows.into_iter().enumerate() {
            recorder.start_row(row_index, &sequence.steps);
            if self.cancel.is_cancelled() {
                recorder.mark_cancelled();
                recorder.finish_row();
                continue;
            }

            let mut page = match self.factory.open_page(url) {
                Ok(p) => p,
                Err(source) => {
                    let failure = RowFailure::PageOpen { row_index, source };
                    warn!(%run_id, %failure, "row failed");
                    self.trace.log(
                        &RunTraceEvent::now(run_id, row_index, TraceStage::Page).failed(&failure),
                    );
                    recorder.fail_row(&failure);
                    continue;
                }
            };

            let mut env = RowEnv {
                run_id,
                pacer: &mut *self.pacer,
                cancel: &self.cancel,
                trace: &self.trace,
                closed_access: &*self.closed_access,
                rng: &mut self.rng,
            };
            let outcome = run_row(
                &mut env,
                page.as_mut(),
                sequence,
                row_index,
                row,
                headers,
                config,
                &mut recorder,
            );

            if let Err(e) = page.close() {
                warn!(%run_id, row_index, error = %e, "failed to close page");
            }
            drop(page);

            match outcome {
                Ok(RowEnd::Completed) => recorder.finish_row(),
                Ok(RowEnd::Cancelled) => {
                    recorder.mark_cancelled();
                    recorder.finish_row();
                }
                Err(failure) => {
                    warn!(%run_id, %failure, "row failed");
                    recorder.fail_row(&failure);
                }
            }
        }

        let result = recorder.finalize();
        info!(
            %run_id,
            passed = result.passed(),
            failed = result.failed(),
            skipped = result.skipped(),
            not_run = result.not_run(),
            cancelled = result.cancelled(),
            duration_ms = result.duration_ms(),
            "batch finished"
        );

        if let Some((store, project_id)) = self.store.as_mut() {
            if let Err(e) = store.put_run_result(project_id, &result) {
                warn!(%run_id, error = %e, "failed to persist run result");
            }
        }
        result
    }
}

#[allow(clippy::too_many_arguments)]
fn run_row(
    env: &mut RowEnv<'_>,
    page: &mut dyn PageDriver,
    sequence: &Sequence,
    row_index: usize,
    row: Option<&Row>,
    headers: &[String],
    config: &BatchConfig,
    recorder: &mut RunRecorder,
) -> Result<RowEnd, RowFailure> {
    let signal = match page.wait_for_load(Duration::from_millis(config.load_timeout_ms)) {
        Ok(signal) => signal,
        Err(source) => {
            let failure = RowFailure::PageLoad { row_index, source };
            env.trace.log(&RunTraceEvent::now(env.run_id, row_index, TraceStage::Page).failed(&failure));
            return Err(failure);
        }
    };
    match signal {
        LoadSignal::Loaded => {}
        LoadSignal::Unsupported => {
            debug!(row_index, "load signal unsupported; using settle delay");
            env.pacer.pause(Duration::from_millis(config.settle_delay_ms));
        }
    }

    for (i, step) in sequence.steps.iter().enumerate() {
        if env.cancel.is_cancelled() {
            return Ok(cancelled(env, row_index, step));
        }

        let resolved = resolve_step_value(step, row, &sequence.mappings, headers);
        if let ResolvedValue::Skip { reason } = &resolved {
            debug!(row_index, step_id = %step.id, %reason, "step skipped");
            recorder.step_skipped(i, reason);
            env.trace.log(
                &RunTraceEvent::now(env.run_id, row_index, TraceStage::Skip)
                    .with_step(&step.id, &step.bundle)
                    .with_detail(reason),
            );
            continue;
        }

        let delay = config.pacing.step_delay(step, sequence, env.rng);
        env.pacer.pause(delay);
        if env.cancel.is_cancelled() {
            return Ok(cancelled(env, row_index, step));
        }

        recorder.step_running(i);
        let started = Instant::now();
        match run_step(page, step, resolved.text(), config, env.closed_access) {
            Ok(located) => {
                recorder.step_passed(i, located.strategy, started.elapsed());
                env.trace.log(
                    &RunTraceEvent::now(env.run_id, row_index, TraceStage::Execute)
                        .with_step(&step.id, &step.bundle)
                        .with_strategy(located.strategy)
                        .with_attempts(&located.attempts),
                );
            }
            Err(failure) => {
                recorder.step_failed(i, &failure, started.elapsed());
                let mut event = RunTraceEvent::now(env.run_id, row_index, stage_of(&failure))
                    .with_step(&step.id, &step.bundle);
                if let StepFailure::NotFound(nf) = &failure {
                    event = event.with_attempts(&nf.attempts);
                }
                env.trace.log(&event.failed(&failure));
                return Err(RowFailure::Step {
                    row_index,
                    step_id: step.id.clone(),
                    source: failure,
                });
            }
        }
    }
    Ok(RowEnd::Completed)
}

fn cancelled(env: &RowEnv<'_>, row_index: usize, next: &Step) -> RowEnd {
    info!(run_id = %env.run_id, row_index, next_step = %next.id, "run cancelled");
    env.trace.log(
        &RunTraceEvent::now(env.run_id, row_index, TraceStage::Cancel).with_step(&next.id, &next.bundle),
    );
    RowEnd::Cancelled
}

/// Snapshot, resolve context, locate, act.
fn run_step(
    page: &mut dyn PageDriver,
    step: &Step,
    value: Option<&str>,
    config: &BatchConfig,
    closed_access: &dyn ClosedShadowAccess,
) -> Result<Located, StepFailure> {
    let dom = page.snapshot()?;
    let ctx = resolve_context(&dom, &step.bundle.context, closed_access)?;
    let located = locate(&step.bundle, &dom, &ctx, &config.locator)?;
    StepExecutor::execute(step, value, &dom, located.node, page)?;
    Ok(located)
}

fn stage_of(failure: &StepFailure) -> TraceStage {
    match failure {
        StepFailure::Page(_) => TraceStage::Page,
        StepFailure::Resolution(_) => TraceStage::Resolve,
        StepFailure::NotFound(_) => TraceStage::Locate,
        StepFailure::Action(_) => TraceStage::Execute,
    }
}
