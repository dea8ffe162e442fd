use tracing::debug;

use crate::dom::dom_model::{Dom, NodeId};
use crate::error::ActionFailure;
use crate::page::driver::{PageDriver, SyntheticEvent, TargetRef};
use crate::record::step_model::{Step, StepAction};

/// Performs one step's action on an already-located element.
pub struct StepExecutor;

impl StepExecutor {
    /// Run `step` against `node` of the snapshot `dom`.
    ///
    /// `value` is the text to type for `Input` steps; it is ignored by the
    /// other actions.
    pub fn execute(
        step: &Step,
        value: Option<&str>,
        dom: &Dom,
        node: NodeId,
        page: &mut dyn PageDriver,
    ) -> Result<(), ActionFailure> {
        let target = TargetRef::new(dom, node, &step.id);
        debug!(step_id = %step.id, action = ?step.action, node = node.0, "executing step");

        match step.action {
            StepAction::Click => {
                page.dispatch(&target, &click_gesture())?;
            }

            StepAction::Input => {
                let text = value.ok_or_else(|| ActionFailure::MissingValue {
                    step_id: step.id.clone(),
                })?;
                page.set_native_value(&target, text)?;
                page.dispatch(&target, &[SyntheticEvent::new("input"), SyntheticEvent::new("change")])?;
            }

            StepAction::Enter => {
                page.dispatch(&target, &enter_gesture())?;
                if let Some(form) = owning_form(dom, node) {
                    let form_target = TargetRef::new(dom, form, &step.id);
                    page.dispatch(&form_target, &[SyntheticEvent::new("submit")])?;
                }
            }
        }
        Ok(())
    }
}

/// Full pointer sequence so frameworks listening on any of them react.
pub fn click_gesture() -> Vec<SyntheticEvent> {
    vec![
        SyntheticEvent::new("pointerover"),
        SyntheticEvent::new("mouseover"),
        SyntheticEvent::new("pointerdown"),
        SyntheticEvent::new("mousedown"),
        SyntheticEvent::local("focus"),
        SyntheticEvent::new("pointerup"),
        SyntheticEvent::new("mouseup"),
        SyntheticEvent::new("click"),
    ]
}

pub fn enter_gesture() -> Vec<SyntheticEvent> {
    vec![
        SyntheticEvent::local("focus"),
        SyntheticEvent::key("keydown", "Enter"),
        SyntheticEvent::key("keypress", "Enter"),
        SyntheticEvent::key("keyup", "Enter"),
    ]
}

/// The form a control submits: its `form` attribute target, else its nearest
/// enclosing `<form>`.
fn owning_form(dom: &Dom, node: NodeId) -> Option<NodeId> {
    if let Some(form_id) = dom.attr(node, "form") {
        let scope = dom.root_of(node);
        if let Some(form) = dom.element_by_id(scope, form_id) {
            if dom.tag(form) == Some("form") {
                return Some(form);
            }
        }
    }
    dom.ancestors(node)
        .into_iter()
        .find(|a| dom.tag(*a) == Some("form"))
}
