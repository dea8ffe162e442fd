use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::record::step_model::{FieldMapping, Step, StepAction};

/// One record of tabular input: column header to string value.
pub type Row = BTreeMap<String, String>;

/// Tabular input: headers in source order plus string-valued rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabularData {
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl TabularData {
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Self {
        Self { headers, rows }
    }

    /// Build from a header line plus positional records. Short records are
    /// padded with empty strings; extra fields are dropped.
    pub fn from_records(headers: &[&str], records: &[Vec<&str>]) -> Self {
        let headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        let rows = records
            .iter()
            .map(|rec| {
                headers
                    .iter()
                    .enumerate()
                    .map(|(i, h)| (h.clone(), rec.get(i).copied().unwrap_or_default().to_string()))
                    .collect()
            })
            .collect();
        Self { headers, rows }
    }

    /// Build from keyed rows; headers are the union of keys in first-seen order.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut headers: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        }
        Self { headers, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Lowercase, with whitespace and underscores removed.
pub fn normalize_label(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// What a step should use as its payload for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedValue {
    /// Value taken from the named data column.
    FromColumn { column: String, value: String },
    /// The payload captured at record time.
    Recorded(Option<String>),
    /// Nothing to type on a data-driven row; the step is skipped.
    Skip { reason: String },
}

impl ResolvedValue {
    pub fn text(&self) -> Option<&str> {
        match self {
            ResolvedValue::FromColumn { value, .. } => Some(value),
            ResolvedValue::Recorded(v) => v.as_deref(),
            ResolvedValue::Skip { .. } => None,
        }
    }
}

/// Column bound to `label`: an explicit mapping first, then a header whose
/// normalized name equals the normalized label.
pub fn column_for_label<'a>(
    label: &str,
    mappings: &'a [FieldMapping],
    headers: &'a [String],
) -> Option<&'a str> {
    let wanted = normalize_label(label);
    if wanted.is_empty() {
        return None;
    }
    mappings
        .iter()
        .find(|m| normalize_label(&m.label) == wanted)
        .map(|m| m.column.as_str())
        .or_else(|| {
            headers
                .iter()
                .find(|h| normalize_label(h) == wanted)
                .map(String::as_str)
        })
}

/// Decide the payload of `step` for `row`.
///
/// `row` is `None` for the synthesized row of a run without data, in which
/// case every step keeps its recorded payload. On data-driven rows a text
/// entry step whose label maps to no column, or to an empty cell, is skipped.
pub fn resolve_step_value(
    step: &Step,
    row: Option<&Row>,
    mappings: &[FieldMapping],
    headers: &[String],
) -> ResolvedValue {
    let Some(row) = row else {
        return ResolvedValue::Recorded(step.value.clone());
    };

    let mapped = step
        .label
        .as_deref()
        .and_then(|label| column_for_label(label, mappings, headers))
        .and_then(|column| {
            let cell = row.get(column).or_else(|| {
                let wanted = normalize_label(column);
                row.iter()
                    .find(|(k, _)| normalize_label(k) == wanted)
                    .map(|(_, v)| v)
            })?;
            Some((column.to_string(), cell.clone()))
        });

    match (step.action, mapped) {
        (_, Some((column, value))) if !value.is_empty() => ResolvedValue::FromColumn { column, value },
        (StepAction::Input, Some((column, _))) => ResolvedValue::Skip {
            reason: format!("column '{}' is empty for this row", column),
        },
        (StepAction::Input, None) => ResolvedValue::Skip {
            reason: match &step.label {
                Some(label) => format!("no column mapped for label '{}'", label),
                None => "step has no label to map".into(),
            },
        },
        (_, _) => ResolvedValue::Recorded(step.value.clone()),
    }
}
