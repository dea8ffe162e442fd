use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StoreError;
use crate::record::step_model::Sequence;
use crate::run::run_model::RunResult;

/// Key-value persistence of sequences and run results, keyed by project id.
/// Last write wins.
pub trait ProjectStore {
    fn get_sequence(&self, project_id: &str) -> Result<Option<Sequence>, StoreError>;

    fn put_sequence(&mut self, project_id: &str, sequence: &Sequence) -> Result<(), StoreError>;

    fn put_run_result(&mut self, project_id: &str, result: &RunResult) -> Result<(), StoreError>;

    /// Stored results of a project, oldest first.
    fn list_run_results(&self, project_id: &str) -> Result<Vec<RunResult>, StoreError>;
}

// ============================================================================
// JSON files
// ============================================================================

/// One directory per project under `root`:
///
/// ```text
/// <root>/<project>/sequence.json
/// <root>/<project>/runs/<run_id>.json
/// ```
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn project_dir(&self, project_id: &str) -> PathBuf {
        self.root.join(sanitize_filename(project_id))
    }

    fn runs_dir(&self, project_id: &str) -> PathBuf {
        self.project_dir(project_id).join("runs")
    }
}

impl ProjectStore for JsonFileStore {
    fn get_sequence(&self, project_id: &str) -> Result<Option<Sequence>, StoreError> {
        let path = self.project_dir(project_id).join("sequence.json");
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    fn put_sequence(&mut self, project_id: &str, sequence: &Sequence) -> Result<(), StoreError> {
        let path = self.project_dir(project_id).join("sequence.json");
        write_json(&path, sequence)
    }

    fn put_run_result(&mut self, project_id: &str, result: &RunResult) -> Result<(), StoreError> {
        let path = self
            .runs_dir(project_id)
            .join(format!("{}.json", result.run_id()));
        write_json(&path, result)
    }

    fn list_run_results(&self, project_id: &str) -> Result<Vec<RunResult>, StoreError> {
        let dir = self.runs_dir(project_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir).map_err(|source| io_error(&dir, source))?;

        let mut results = Vec::new();
        for entry in entries {
            let path = entry.map_err(|source| io_error(&dir, source))?.path();
            if path.extension().map_or(false, |e| e == "json") {
                results.push(read_json::<RunResult>(&path)?);
            }
        }
        results.sort_by_key(|r| r.started_at());
        Ok(results)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let content = fs::read_to_string(path).map_err(|source| io_error(path, source))?;
    serde_json::from_str(&content).map_err(|source| StoreError::Json {
        path: path.display().to_string(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Json {
        path: path.display().to_string(),
        source,
    })?;
    fs::write(path, json).map_err(|source| io_error(path, source))
}

/// Make a project id safe to use as a directory name.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .to_lowercase()
}

// ============================================================================
// In memory
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryStore {
    sequences: HashMap<String, Sequence>,
    runs: HashMap<String, Vec<RunResult>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProjectStore for MemoryStore {
    fn get_sequence(&self, project_id: &str) -> Result<Option<Sequence>, StoreError> {
        Ok(self.sequences.get(project_id).cloned())
    }

    fn put_sequence(&mut self, project_id: &str, sequence: &Sequence) -> Result<(), StoreError> {
        self.sequences
            .insert(project_id.to_string(), sequence.clone());
        Ok(())
    }

    fn put_run_result(&mut self, project_id: &str, result: &RunResult) -> Result<(), StoreError> {
        let runs = self.runs.entry(project_id.to_string()).or_default();
        runs.retain(|r| r.run_id() != result.run_id());
        runs.push(result.clone());
        Ok(())
    }

    fn list_run_results(&self, project_id: &str) -> Result<Vec<RunResult>, StoreError> {
        let mut results = self.runs.get(project_id).cloned().unwrap_or_default();
        results.sort_by_key(|r| r.started_at());
        Ok(results)
    }
}
