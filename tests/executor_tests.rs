use replay_engine::dom::dom_model::Dom;
use replay_engine::error::ActionFailure;
use replay_engine::execute::executor::{StepExecutor, click_gesture, enter_gesture};
use replay_engine::page::driver::{PageFactory, SyntheticEvent};
use replay_engine::page::mock::{MockAction, MockPageFactory};

use crate::common::fixtures::{by_id, click_step, enter_step, input_step, signup_page};

mod common;

fn kinds(events: &[SyntheticEvent]) -> Vec<&str> {
    events.iter().map(|e| e.kind.as_str()).collect()
}

/// Event types recorded on `id` in the last closed page.
fn events_on(closed: &Dom, id: &str) -> Vec<String> {
    let node = by_id(closed, id);
    closed.element(node).unwrap().events.iter().map(|e| e.kind.clone()).collect()
}

#[test]
fn gestures_have_the_expected_shape() {
    assert_eq!(
        kinds(&click_gesture()),
        vec!["pointerover", "mouseover", "pointerdown", "mousedown", "focus", "pointerup", "mouseup", "click"]
    );
    assert!(click_gesture().iter().all(|e| e.bubbles || e.kind == "focus"));

    let enter = enter_gesture();
    assert_eq!(kinds(&enter), vec!["focus", "keydown", "keypress", "keyup"]);
    assert!(enter[1..].iter().all(|e| e.key.as_deref() == Some("Enter")));
}

#[test]
fn click_dispatches_full_pointer_sequence() {
    let template = signup_page();
    let start = by_id(&template, "start");
    let step = click_step(&template, start, "s1");

    let mut factory = MockPageFactory::new(template);
    let log = factory.log();
    {
        let mut page = factory.open_page("https://app.example.com").unwrap();
        let dom = page.snapshot().unwrap();
        StepExecutor::execute(&step, None, &dom, start, page.as_mut()).unwrap();
        page.close().unwrap();
    }

    let log = log.borrow();
    assert_eq!(
        log.actions,
        vec![MockAction::Dispatched {
            node: start,
            events: kinds(&click_gesture()).into_iter().map(String::from).collect(),
        }]
    );
    assert_eq!(events_on(&log.closed_pages[0], "start").last().map(String::as_str), Some("click"));
}

#[test]
fn input_sets_native_value_then_fires_input_and_change() {
    let template = signup_page();
    let email = by_id(&template, "email");
    let step = input_step(&template, email, "s1", "recorded@x.io");

    let mut factory = MockPageFactory::new(template);
    let log = factory.log();
    {
        let mut page = factory.open_page("about:blank").unwrap();
        let dom = page.snapshot().unwrap();
        StepExecutor::execute(&step, Some("a@b.com"), &dom, email, page.as_mut()).unwrap();
        page.close().unwrap();
    }

    let log = log.borrow();
    assert_eq!(log.values_set(), vec!["a@b.com".to_string()]);
    assert!(matches!(log.actions[0], MockAction::ValueSet { .. }));
    assert_eq!(
        log.actions[1],
        MockAction::Dispatched {
            node: email,
            events: vec!["input".into(), "change".into()],
        }
    );

    let closed = &log.closed_pages[0];
    assert_eq!(closed.element(by_id(closed, "email")).unwrap().value, "a@b.com");
}

#[test]
fn input_without_value_is_rejected_before_touching_the_page() {
    let template = signup_page();
    let email = by_id(&template, "email");
    let step = input_step(&template, email, "s9", "x");

    let mut factory = MockPageFactory::new(template);
    let log = factory.log();
    let mut page = factory.open_page("about:blank").unwrap();
    let dom = page.snapshot().unwrap();

    assert_eq!(
        StepExecutor::execute(&step, None, &dom, email, page.as_mut()).unwrap_err(),
        ActionFailure::MissingValue { step_id: "s9".into() }
    );
    assert!(log.borrow().actions.is_empty());
}

#[test]
fn enter_submits_the_owning_form() {
    let template = signup_page();
    let email = by_id(&template, "email");
    let step = enter_step(&template, email, "s1");

    let mut factory = MockPageFactory::new(template);
    let log = factory.log();
    {
        let mut page = factory.open_page("about:blank").unwrap();
        let dom = page.snapshot().unwrap();
        StepExecutor::execute(&step, None, &dom, email, page.as_mut()).unwrap();
        page.close().unwrap();
    }

    let log = log.borrow();
    let closed = &log.closed_pages[0];
    assert_eq!(events_on(closed, "email"), vec!["focus", "keydown", "keypress", "keyup"]);
    assert_eq!(events_on(closed, "signup"), vec!["submit"]);
}

#[test]
fn enter_outside_a_form_sends_keys_only() {
    let mut template = Dom::new("https://app.example.com");
    let root = template.root();
    let search = template.append_element(root, "input", &[("id", "search")]);
    let step = enter_step(&template, search, "s1");

    let mut factory = MockPageFactory::new(template);
    let log = factory.log();
    let mut page = factory.open_page("about:blank").unwrap();
    let dom = page.snapshot().unwrap();
    StepExecutor::execute(&step, None, &dom, search, page.as_mut()).unwrap();

    assert_eq!(log.borrow().actions.len(), 1);
}

#[test]
fn detached_target_fails_as_stale() {
    let template = signup_page();
    let start = by_id(&template, "start");
    let step = click_step(&template, start, "s1");

    let mut factory = MockPageFactory::new(template).stale_after_snapshot("start");
    let mut page = factory.open_page("about:blank").unwrap();
    let dom = page.snapshot().unwrap();

    assert_eq!(
        StepExecutor::execute(&step, None, &dom, start, page.as_mut()).unwrap_err(),
        ActionFailure::Stale
    );
}

#[test]
fn throwing_handler_is_reported_with_its_message() {
    let template = signup_page();
    let start = by_id(&template, "start");
    let step = click_step(&template, start, "s1");

    let mut factory = MockPageFactory::new(template).throwing_on("start");
    let mut page = factory.open_page("about:blank").unwrap();
    let dom = page.snapshot().unwrap();

    match StepExecutor::execute(&step, None, &dom, start, page.as_mut()).unwrap_err() {
        ActionFailure::Threw(message) => assert!(message.contains("#start"), "{}", message),
        other => panic!("expected Threw, got {:?}", other),
    }
}

#[test]
fn closed_page_rejects_actions() {
    let template = signup_page();
    let start = by_id(&template, "start");
    let step = click_step(&template, start, "s1");

    let mut factory = MockPageFactory::new(template);
    let log = factory.log();
    let mut page = factory.open_page("about:blank").unwrap();
    let dom = page.snapshot().unwrap();
    page.close().unwrap();
    page.close().unwrap();

    assert_eq!(
        StepExecutor::execute(&step, None, &dom, start, page.as_mut()).unwrap_err(),
        ActionFailure::Stale
    );
    assert_eq!(log.borrow().closed, 1);
    assert_eq!(log.borrow().open_pages(), 0);
}
