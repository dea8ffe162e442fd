use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bundle::bundle_model::ElementBundle;
use crate::error::SequenceError;
use crate::run::values::TabularData;

/// What a step does to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    Click,
    /// Text entry; carries a payload.
    Input,
    /// Enter-key submit on a focused field.
    Enter,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// One recorded user action against one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,

    pub action: StepAction,

    /// Captured text for `Input` steps. Unused by click and submit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Best-effort field name, matched against data columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    pub bundle: ElementBundle,

    /// Pointer position when a click was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointer: Option<Point>,

    /// Per-step delay override in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl Step {
    fn with_action(action: StepAction, bundle: ElementBundle, value: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            action,
            value,
            label: None,
            bundle,
            pointer: None,
            delay_ms: None,
            recorded_at: Some(Utc::now()),
        }
    }

    pub fn click(bundle: ElementBundle) -> Self {
        Self::with_action(StepAction::Click, bundle, None)
    }

    pub fn input(bundle: ElementBundle, value: &str) -> Self {
        Self::with_action(StepAction::Input, bundle, Some(value.to_string()))
    }

    pub fn enter(bundle: ElementBundle) -> Self {
        Self::with_action(StepAction::Enter, bundle, None)
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_pointer(mut self, x: f64, y: f64) -> Self {
        self.pointer = Some(Point { x, y });
        self
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }

    pub fn validate(&self) -> Result<(), SequenceError> {
        if self.action == StepAction::Input && self.value.is_none() {
            return Err(SequenceError::MissingPayload(self.id.clone()));
        }
        self.bundle
            .validate()
            .map_err(|source| SequenceError::InvalidBundle {
                step_id: self.id.clone(),
                source,
            })
    }
}

/// Binds a step label to a data column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub label: String,
    pub column: String,
}

/// Ordered steps of one project plus optional data bindings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Page each data row starts from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_url: Option<String>,

    pub steps: Vec<Step>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mappings: Vec<FieldMapping>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<TabularData>,

    /// Delay applied before steps without their own override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_delay_ms: Option<u64>,
}

/// Advisory produced when step order looks wrong. Reordering is never refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderingWarning {
    /// A submit step with no text entry anywhere before it.
    SubmitWithoutInput { submit_index: usize },

    /// Text typed into a field after that same field was submitted.
    InputAfterSubmit {
        submit_index: usize,
        input_index: usize,
    },
}

impl Sequence {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    pub fn with_mapping(mut self, label: &str, column: &str) -> Self {
        self.mappings.push(FieldMapping {
            label: label.to_string(),
            column: column.to_string(),
        });
        self
    }

    /// Check step-level invariants and id uniqueness.
    pub fn validate(&self) -> Result<(), SequenceError> {
        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.id.as_str()) {
                return Err(SequenceError::DuplicateStepId(step.id.clone()));
            }
            step.validate()?;
        }
        Ok(())
    }

    pub fn step_index(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == step_id)
    }

    /// Move the step at `from` to position `to`, returning ordering advisories
    /// for the new order.
    pub fn move_step(&mut self, from: usize, to: usize) -> Result<Vec<OrderingWarning>, SequenceError> {
        let len = self.steps.len();
        for index in [from, to] {
            if index >= len {
                return Err(SequenceError::IndexOutOfRange { index, len });
            }
        }
        let step = self.steps.remove(from);
        self.steps.insert(to, step);
        Ok(self.ordering_warnings())
    }

    pub fn ordering_warnings(&self) -> Vec<OrderingWarning> {
        let mut warnings = Vec::new();

        for (i, step) in self.steps.iter().enumerate() {
            if step.action != StepAction::Enter {
                continue;
            }

            let typed_before = self.steps[..i]
                .iter()
                .any(|s| s.action == StepAction::Input);
            if !typed_before {
                warnings.push(OrderingWarning::SubmitWithoutInput { submit_index: i });
            }

            for (j, later) in self.steps.iter().enumerate().skip(i + 1) {
                if later.action == StepAction::Input && same_target(&step.bundle, &later.bundle) {
                    warnings.push(OrderingWarning::InputAfterSubmit {
                        submit_index: i,
                        input_index: j,
                    });
                }
            }
        }

        warnings
    }
}

fn same_target(a: &ElementBundle, b: &ElementBundle) -> bool {
    if a.context != b.context {
        return false;
    }
    match (&a.locators.id, &b.locators.id) {
        (Some(x), Some(y)) => x == y,
        _ => a.locators.xpath.is_some() && a.locators.xpath == b.locators.xpath,
    }
}
