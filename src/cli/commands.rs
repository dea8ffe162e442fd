use std::collections::BTreeMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::info;

use crate::bundle::bundle_model::ElementBundle;
use crate::capture::context::{InterceptedRoots, resolve_context};
use crate::cli::config::{AppConfig, build_batch_config};
use crate::dom::snapshot::DomSnapshot;
use crate::locate::strategy::{StrategyOutcome, locate};
use crate::page::session::BrowserSession;
use crate::persist::store::JsonFileStore;
use crate::record::step_model::Sequence;
use crate::report::console::format_console_report;
use crate::report::junit::generate_junit_xml;
use crate::run::orchestrator::BatchRunner;
use crate::run::values::{Row, TabularData};
use crate::trace::logger::TraceLogger;

const DEFAULT_STORE_DIR: &str = ".replay-engine";

// ============================================================================
// run subcommand
// ============================================================================

pub struct RunArgs<'a> {
    pub sequence: &'a str,
    pub data: Option<&'a str>,
    pub url: Option<&'a str>,
    pub format: Option<&'a str>,
    pub output: Option<&'a str>,
    pub trace: Option<&'a str>,
    pub project: Option<&'a str>,
}

/// Replay a sequence and return whether every row passed.
pub fn cmd_run(args: &RunArgs<'_>, config: &AppConfig) -> Result<bool, Box<dyn std::error::Error>> {
    let sequence = load_sequence(args.sequence)?;
    sequence.validate()?;

    let data = match args.data {
        Some(path) => Some(load_data(path)?),
        None => sequence.data.clone(),
    };

    let batch = build_batch_config(config, args.url);
    let trace = match args.trace.or(config.run.trace.as_deref()) {
        Some(path) => TraceLogger::new(path),
        None => TraceLogger::disabled(),
    };

    info!(
        sequence = args.sequence,
        steps = sequence.steps.len(),
        rows = data.as_ref().map_or(0, |d| d.rows.len()),
        "starting replay"
    );

    let mut session = BrowserSession::launch(&config.session)?;
    let mut store = JsonFileStore::new(
        config
            .run
            .store_dir
            .clone()
            .unwrap_or_else(|| DEFAULT_STORE_DIR.to_string()),
    );

    let result = {
        let mut runner = BatchRunner::new(&mut session).with_trace(trace);
        if let Some(project) = args.project {
            runner = runner.with_store(&mut store, project);
        }
        runner.run(&sequence, data.as_ref(), &batch)
    };
    session.quit();

    let format = args.format.unwrap_or(config.run.format.as_str());
    let output_content = match format {
        "junit" => generate_junit_xml(&result),
        _ => format_console_report(&result),
    };

    match args.output.or(config.run.output.as_deref()) {
        Some(path) => std::fs::write(path, &output_content)?,
        None => print!("{}", output_content),
    }

    Ok(result.all_passed())
}

// ============================================================================
// locate subcommand
// ============================================================================

/// Locate a bundle in a saved snapshot. Returns whether it was found.
pub fn cmd_locate(snapshot_path: &str, bundle_path: &str) -> Result<bool, Box<dyn std::error::Error>> {
    let snapshot: DomSnapshot = serde_json::from_str(&std::fs::read_to_string(snapshot_path)?)?;
    let bundle: ElementBundle = load_file(bundle_path)?;
    bundle.validate()?;

    let dom = snapshot.into_dom();
    let ctx = match resolve_context(&dom, &bundle.context, &InterceptedRoots) {
        Ok(ctx) => ctx,
        Err(e) => {
            println!("context resolution failed: {}", e);
            return Ok(false);
        }
    };

    let (attempts, found) = match locate(&bundle, &dom, &ctx, &Default::default()) {
        Ok(located) => {
            let tag = dom.tag(located.node).unwrap_or("?").to_string();
            (located.attempts, Some((located.strategy, tag)))
        }
        Err(nf) => (nf.attempts, None),
    };

    for attempt in &attempts {
        let outcome = match attempt.outcome {
            StrategyOutcome::Found { node } => format!("found node {}", node.0),
            StrategyOutcome::Ambiguous { candidates } => format!("ambiguous ({} candidates)", candidates),
            StrategyOutcome::NoMatch => "no match".to_string(),
            StrategyOutcome::Skipped => "skipped".to_string(),
        };
        println!("  {:<15} {}", attempt.strategy.as_str(), outcome);
    }

    match found {
        Some((strategy, tag)) => {
            println!("{} located <{}> via {}", bundle.describe(), tag, strategy);
            Ok(true)
        }
        None => {
            println!("{} not found", bundle.describe());
            Ok(false)
        }
    }
}

// ============================================================================
// validate subcommand
// ============================================================================

/// Validate a sequence and print ordering advisories. Returns whether it is valid.
pub fn cmd_validate(sequence_path: &str) -> Result<bool, Box<dyn std::error::Error>> {
    let sequence = load_sequence(sequence_path)?;

    if let Err(e) = sequence.validate() {
        println!("invalid: {}", e);
        return Ok(false);
    }

    let warnings = sequence.ordering_warnings();
    println!(
        "{} steps, {} mappings: ok",
        sequence.steps.len(),
        sequence.mappings.len()
    );
    for w in &warnings {
        println!("  warning: {:?}", w);
    }
    Ok(true)
}

// ============================================================================
// Loading
// ============================================================================

/// Parse a JSON or YAML file, chosen by extension.
fn load_file<T: DeserializeOwned>(path: &str) -> Result<T, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let is_json = Path::new(path)
        .extension()
        .map_or(false, |e| e.eq_ignore_ascii_case("json"));
    if is_json {
        Ok(serde_json::from_str(&content)?)
    } else {
        Ok(serde_yaml::from_str(&content)?)
    }
}

pub fn load_sequence(path: &str) -> Result<Sequence, Box<dyn std::error::Error>> {
    load_file(path)
}

/// Load tabular data: either `{headers, rows}` or a plain list of rows.
/// Scalar cells are converted to strings.
pub fn load_data(path: &str) -> Result<TabularData, Box<dyn std::error::Error>> {
    let is_csv = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        return load_csv(path);
    }

    let value: serde_json::Value = load_file(path)?;

    if value.get("rows").is_some() {
        return Ok(serde_json::from_value(value)?);
    }

    let records = value
        .as_array()
        .ok_or("data file must be a list of rows or an object with 'rows'")?;
    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        let object = record.as_object().ok_or("each data row must be a mapping")?;
        let row: Row = object
            .iter()
            .map(|(k, v)| (k.clone(), cell_to_string(v)))
            .collect::<BTreeMap<_, _>>();
        rows.push(row);
    }
    Ok(TabularData::from_rows(rows))
}

/// Header row first; short records are padded with empty cells.
fn load_csv(path: &str) -> Result<TabularData, Box<dyn std::error::Error>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(|e| format!("failed to read {}: {}", path, e))?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: Row = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), record.get(i).unwrap_or_default().to_string()))
            .collect();
        rows.push(row);
    }
    Ok(TabularData::new(headers, rows))
}

fn cell_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
