use std::sync::mpsc;

use replay_engine::dom::dom_model::Dom;
use replay_engine::error::{CaptureFailure, RecordError, SequenceError};
use replay_engine::record::recorder::{
    ChannelSurface, CollectingSurface, DomEvent, IgnoreReason, RecordOutcome, Recorder,
    RecorderState,
};
use replay_engine::record::step_model::{OrderingWarning, Sequence, Step, StepAction};

use crate::common::fixtures::{
    ORIGIN, by_id, by_name, click_step, enter_step, input_step, signup_page, submit_button,
};

mod common;

fn channel_recorder() -> (Recorder, mpsc::Receiver<Step>) {
    let (tx, rx) = mpsc::channel();
    (Recorder::new(Box::new(ChannelSurface::new(tx))), rx)
}

fn emitted(outcome: RecordOutcome) -> Step {
    match outcome {
        RecordOutcome::Emitted(step) => step,
        other => panic!("expected a step, got {:?}", other),
    }
}

// ============================================================================
// Session lifecycle
// ============================================================================

#[test]
fn start_and_stop_toggle_state() {
    let mut recorder = Recorder::new(Box::new(CollectingSurface::default()));
    assert_eq!(recorder.state(), RecorderState::Idle);

    let session_id = recorder.start("signup").unwrap().id;
    assert_eq!(recorder.state(), RecorderState::Recording);

    let summary = recorder.stop().unwrap();
    assert_eq!(summary.session_id, session_id);
    assert_eq!(summary.project_id, "signup");
    assert_eq!(summary.steps_emitted, 0);
    assert_eq!(recorder.state(), RecorderState::Idle);
}

#[test]
fn second_start_is_refused_while_recording() {
    let mut recorder = Recorder::new(Box::new(CollectingSurface::default()));
    recorder.start("a").unwrap();
    assert_eq!(
        recorder.start("b").unwrap_err(),
        RecordError::AlreadyRecording("a".into())
    );
    // The active session is untouched.
    assert_eq!(recorder.session().map(|s| s.project_id.as_str()), Some("a"));
}

#[test]
fn stop_without_session_is_an_error() {
    let mut recorder = Recorder::new(Box::new(CollectingSurface::default()));
    assert_eq!(recorder.stop().unwrap_err(), RecordError::NotRecording);
}

#[test]
fn events_are_ignored_while_idle() {
    let dom = signup_page();
    let (mut recorder, rx) = channel_recorder();
    let outcome = recorder.handle_event(&dom, &DomEvent::pointer_down(by_id(&dom, "start"), 1.0, 1.0));
    assert_eq!(outcome, RecordOutcome::Ignored(IgnoreReason::NotRecording));
    assert!(rx.try_recv().is_err());
}

// ============================================================================
// Event classification
// ============================================================================

#[test]
fn pointer_down_on_inner_node_records_the_interactive_ancestor() {
    let mut dom = signup_page();
    let submit = submit_button(&dom);
    let icon = dom.append_element(submit, "span", &[("class", "icon")]);

    let (mut recorder, rx) = channel_recorder();
    recorder.start("signup").unwrap();
    let step = emitted(recorder.handle_event(&dom, &DomEvent::pointer_down(icon, 42.0, 130.0)));

    assert_eq!(step.action, StepAction::Click);
    assert_eq!(step.bundle.locators.data_attrs.get("testid").map(String::as_str), Some("signup-submit"));
    assert_eq!(step.label.as_deref(), Some("Sign up"));
    assert_eq!(step.pointer.map(|p| (p.x, p.y)), Some((42.0, 130.0)));
    assert_eq!(rx.try_recv().unwrap(), step);
}

#[test]
fn pointer_down_on_static_content_is_ignored() {
    let dom = signup_page();
    let h1 = dom
        .descendants(dom.root())
        .into_iter()
        .find(|n| dom.tag(*n) == Some("h1"))
        .unwrap();

    let (mut recorder, _rx) = channel_recorder();
    recorder.start("p").unwrap();
    assert_eq!(
        recorder.handle_event(&dom, &DomEvent::pointer_down(h1, 0.0, 0.0)),
        RecordOutcome::Ignored(IgnoreReason::NotInteractive)
    );
}

#[test]
fn input_and_change_each_emit_a_step_with_current_value() {
    let mut dom = signup_page();
    let email = by_id(&dom, "email");
    dom.set_value(email, "a@b.com");

    let (mut recorder, rx) = channel_recorder();
    recorder.start("p").unwrap();
    let first = emitted(recorder.handle_event(&dom, &DomEvent::input(email)));
    let second = emitted(recorder.handle_event(&dom, &DomEvent::change(email)));

    assert_eq!(first.action, StepAction::Input);
    assert_eq!(first.value.as_deref(), Some("a@b.com"));
    assert_eq!(first.label.as_deref(), Some("Email"));
    assert_ne!(first.id, second.id);
    assert_eq!(rx.try_iter().count(), 2);
    assert_eq!(recorder.stop().unwrap().steps_emitted, 2);
}

#[test]
fn contenteditable_records_its_text() {
    let mut dom = Dom::new(ORIGIN);
    let root = dom.root();
    let editor = dom.append_element(root, "div", &[("contenteditable", "true"), ("id", "notes")]);
    dom.append_text(editor, "Hello there");

    let (mut recorder, _rx) = channel_recorder();
    recorder.start("p").unwrap();
    let step = emitted(recorder.handle_event(&dom, &DomEvent::input(editor)));
    assert_eq!(step.value.as_deref(), Some("Hello there"));
}

#[test]
fn input_on_non_text_element_is_ignored() {
    let dom = signup_page();
    let (mut recorder, _rx) = channel_recorder();
    recorder.start("p").unwrap();
    assert_eq!(
        recorder.handle_event(&dom, &DomEvent::input(submit_button(&dom))),
        RecordOutcome::Ignored(IgnoreReason::NotTextEntry)
    );
}

#[test]
fn only_enter_key_in_text_field_records_submit() {
    let dom = signup_page();
    let password = by_name(&dom, "password");

    let (mut recorder, rx) = channel_recorder();
    recorder.start("p").unwrap();
    assert_eq!(
        recorder.handle_event(&dom, &DomEvent::key_down(password, "Tab")),
        RecordOutcome::Ignored(IgnoreReason::UnqualifiedKey)
    );
    assert_eq!(
        recorder.handle_event(&dom, &DomEvent::key_down(by_id(&dom, "start"), "Enter")),
        RecordOutcome::Ignored(IgnoreReason::NotTextEntry)
    );

    let step = emitted(recorder.handle_event(&dom, &DomEvent::key_down(password, "Enter")));
    assert_eq!(step.action, StepAction::Enter);
    assert_eq!(step.value, None);
    assert_eq!(step.label.as_deref(), Some("Password"));
    assert_eq!(rx.try_iter().count(), 1);
}

#[test]
fn unusable_target_is_rejected_and_counted() {
    let mut dom = Dom::new(ORIGIN);
    let root = dom.root();
    let bare = dom.append_element(root, "button", &[]);
    dom.remove(bare);

    let (mut recorder, rx) = channel_recorder();
    recorder.start("p").unwrap();
    assert_eq!(
        recorder.handle_event(&dom, &DomEvent::pointer_down(bare, 0.0, 0.0)),
        RecordOutcome::Rejected(CaptureFailure::EmptyBundle { tag: "button".into() })
    );
    assert!(rx.try_recv().is_err());

    let summary = recorder.stop().unwrap();
    assert_eq!(summary.events_rejected, 1);
    assert_eq!(summary.steps_emitted, 0);
}

#[test]
fn disconnected_surface_does_not_stop_recording() {
    let dom = signup_page();
    let (mut recorder, rx) = channel_recorder();
    drop(rx);
    recorder.start("p").unwrap();
    emitted(recorder.handle_event(&dom, &DomEvent::pointer_down(by_id(&dom, "start"), 1.0, 1.0)));
    assert_eq!(recorder.state(), RecorderState::Recording);
}

// ============================================================================
// Sequences
// ============================================================================

fn signup_sequence() -> Sequence {
    let dom = signup_page();
    Sequence::new(vec![
        click_step(&dom, by_id(&dom, "start"), "s1"),
        input_step(&dom, by_id(&dom, "email"), "s2", "a@b.com"),
        enter_step(&dom, by_id(&dom, "email"), "s3"),
    ])
}

#[test]
fn sequence_rejects_duplicate_ids_and_missing_payload() {
    let mut sequence = signup_sequence();
    assert!(sequence.validate().is_ok());

    sequence.steps[2].id = "s1".into();
    assert_eq!(
        sequence.validate().unwrap_err(),
        SequenceError::DuplicateStepId("s1".into())
    );

    let mut sequence = signup_sequence();
    sequence.steps[1].value = None;
    assert_eq!(
        sequence.validate().unwrap_err(),
        SequenceError::MissingPayload("s2".into())
    );
}

#[test]
fn reordering_is_allowed_but_warns() {
    let mut sequence = signup_sequence();

    // Submit moved to the front: nothing typed before it, and the field is
    // typed into after being submitted.
    let warnings = sequence.move_step(2, 0).unwrap();
    assert_eq!(
        sequence.steps.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
        vec!["s3", "s1", "s2"]
    );
    assert_eq!(
        warnings,
        vec![
            OrderingWarning::SubmitWithoutInput { submit_index: 0 },
            OrderingWarning::InputAfterSubmit {
                submit_index: 0,
                input_index: 2
            },
        ]
    );

    assert!(sequence.move_step(0, 2).unwrap().is_empty());
    assert_eq!(sequence.step_index("s3"), Some(2));
}

#[test]
fn move_out_of_range_is_an_error() {
    let mut sequence = signup_sequence();
    assert_eq!(
        sequence.move_step(0, 3).unwrap_err(),
        SequenceError::IndexOutOfRange { index: 3, len: 3 }
    );
}

#[test]
fn sequence_json_round_trips() {
    let sequence = signup_sequence().with_mapping("Email", "email_address");
    let json = serde_json::to_string(&sequence).unwrap();
    let back: Sequence = serde_json::from_str(&json).unwrap();
    assert_eq!(back, sequence);
}
