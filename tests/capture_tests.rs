use replay_engine::bundle::bundle_model::ElementBundle;
use replay_engine::capture::context::{FrameDescriptor, capture_context};
use replay_engine::capture::generator::{capture_target, generate};
use replay_engine::capture::label::{derive_label, derive_label_with};
use replay_engine::dom::dom_model::{Dom, Rect, ShadowMode};
use replay_engine::error::CaptureFailure;

use crate::common::fixtures::{ORIGIN, by_id, by_name, first_tag, nested_page, signup_page, submit_button};

mod common;

// ============================================================================
// Locator generation
// ============================================================================

#[test]
fn generator_captures_every_available_locator() {
    let dom = signup_page();
    let partial = generate(&dom, by_id(&dom, "email")).unwrap();
    let loc = &partial.locators;

    assert_eq!(loc.xpath.as_deref(), Some("/html/body/form/input"));
    assert_eq!(loc.id.as_deref(), Some("email"));
    assert_eq!(loc.name.as_deref(), Some("email"));
    assert_eq!(loc.placeholder.as_deref(), Some("you@example.com"));
    assert_eq!(loc.class_list.as_deref(), Some("field wide"));
    assert_eq!(loc.tag.as_deref(), Some("input"));
    assert_eq!(loc.bounding, Some(Rect::new(10.0, 40.0, 200.0, 24.0)));
    assert_eq!(loc.text, None);
    assert_eq!(partial.label.as_deref(), Some("Email"));
}

#[test]
fn generator_strips_data_prefix_and_drops_framework_noise() {
    let mut dom = Dom::new(ORIGIN);
    let root = dom.root();
    let b = dom.append_element(
        root,
        "button",
        &[("data-testid", "save"), ("data-v-3f2a", "x"), ("data-reactid", ".0.1"), ("data-empty", " ")],
    );
    dom.append_text(b, "Save");

    let loc = generate(&dom, b).unwrap().locators;
    assert_eq!(loc.data_attrs.len(), 1);
    assert_eq!(loc.data_attrs.get("testid").map(String::as_str), Some("save"));
    assert_eq!(loc.text.as_deref(), Some("Save"));
}

#[test]
fn generator_keeps_long_text_whole() {
    let mut dom = Dom::new(ORIGIN);
    let root = dom.root();
    let p = dom.append_element(root, "p", &[]);
    dom.append_text(p, &"word ".repeat(100));
    let text = generate(&dom, p).unwrap().locators.text.unwrap();
    assert_eq!(text.chars().count(), 499);
    assert!(text.ends_with("word word"));
}

#[test]
fn detached_element_degrades_instead_of_failing() {
    let mut dom = signup_page();
    let email = by_id(&dom, "email");
    dom.remove(email);

    let partial = generate(&dom, email).unwrap();
    assert_eq!(partial.locators.xpath, None);
    assert_eq!(partial.locators.id.as_deref(), Some("email"));
}

#[test]
fn element_without_any_locator_is_a_capture_failure() {
    let mut dom = Dom::new(ORIGIN);
    let root = dom.root();
    let orphan = dom.append_element(root, "span", &[]);
    dom.remove(orphan);

    assert_eq!(
        generate(&dom, orphan).unwrap_err(),
        CaptureFailure::EmptyBundle { tag: "span".into() }
    );
}

#[test]
fn text_and_document_nodes_are_not_capturable() {
    let mut dom = Dom::new(ORIGIN);
    let root = dom.root();
    let text = dom.append_text(root, "hello");
    assert_eq!(generate(&dom, text).unwrap_err(), CaptureFailure::NotAnElement);
    assert_eq!(generate(&dom, root).unwrap_err(), CaptureFailure::NotAnElement);
}

#[test]
fn bundle_json_is_flat_and_round_trips() {
    let dom = signup_page();
    let bundle = capture_target(&dom, submit_button(&dom)).unwrap().bundle;

    let json = serde_json::to_value(&bundle).unwrap();
    assert_eq!(json["tag"], "button");
    assert_eq!(json["data_attrs"]["testid"], "signup-submit");

    let back: ElementBundle = serde_json::from_value(json).unwrap();
    assert_eq!(back, bundle);
    assert_eq!(back.fingerprint(), bundle.fingerprint());
}

// ============================================================================
// Labels
// ============================================================================

#[test]
fn label_cascade_picks_most_reliable_source() {
    let dom = signup_page();
    assert_eq!(
        derive_label_with(&dom, by_id(&dom, "email")),
        Some(("label_for", "Email".to_string()))
    );
    assert_eq!(
        derive_label_with(&dom, by_name(&dom, "password")),
        Some(("wrapping_label", "Password".to_string()))
    );
    assert_eq!(derive_label(&dom, by_name(&dom, "country")).as_deref(), Some("Country"));
    assert_eq!(derive_label(&dom, submit_button(&dom)).as_deref(), Some("Sign up"));
}

#[test]
fn label_from_aria_labelledby_and_sibling() {
    let mut dom = Dom::new(ORIGIN);
    let root = dom.root();
    let div = dom.append_element(root, "div", &[]);
    let caption = dom.append_element(div, "span", &[("id", "cap")]);
    dom.append_text(caption, "Zip code:");
    let by_ref = dom.append_element(div, "input", &[("aria-labelledby", "cap")]);

    let row = dom.append_element(root, "div", &[]);
    let hint = dom.append_element(row, "span", &[]);
    dom.append_text(hint, "City *");
    let by_sibling = dom.append_element(row, "input", &[]);

    assert_eq!(
        derive_label_with(&dom, by_ref),
        Some(("aria_labelledby", "Zip code".to_string()))
    );
    assert_eq!(
        derive_label_with(&dom, by_sibling),
        Some(("preceding_sibling", "City".to_string()))
    );
}

#[test]
fn label_from_table_column_header() {
    let mut dom = Dom::new(ORIGIN);
    let root = dom.root();
    let table = dom.append_element(root, "table", &[]);
    let head = dom.append_element(table, "tr", &[]);
    for h in ["Name", "Qty"] {
        let th = dom.append_element(head, "th", &[]);
        dom.append_text(th, h);
    }
    let row = dom.append_element(table, "tr", &[]);
    dom.append_element(row, "td", &[]);
    let cell = dom.append_element(row, "td", &[]);
    let qty = dom.append_element(cell, "input", &[]);

    assert_eq!(
        derive_label_with(&dom, qty),
        Some(("column_header", "Qty".to_string()))
    );
}

#[test]
fn label_from_custom_dropdown_widget() {
    let mut dom = Dom::new(ORIGIN);
    let root = dom.root();
    let widget = dom.append_element(root, "div", &[("class", "react-select__control")]);
    let input = dom.append_element(widget, "input", &[]);
    let placeholder = dom.append_element(widget, "div", &[("class", "react-select__placeholder")]);
    dom.append_text(placeholder, "Pick a fruit");

    assert_eq!(
        derive_label_with(&dom, input),
        Some(("dropdown_widget", "Pick a fruit".to_string()))
    );
}

#[test]
fn unlabeled_element_has_no_label() {
    let mut dom = Dom::new(ORIGIN);
    let root = dom.root();
    let input = dom.append_element(root, "input", &[]);
    assert_eq!(derive_label(&dom, input), None);
}

// ============================================================================
// Context capture
// ============================================================================

#[test]
fn top_level_element_has_empty_context() {
    let dom = signup_page();
    assert!(capture_context(&dom, by_id(&dom, "email")).unwrap().is_top_level());
}

#[test]
fn context_records_frames_then_shadow_hosts() {
    let dom = nested_page(false);
    let doc = dom.content_document(by_id(&dom, "outer")).unwrap();
    let host = dom.element_by_id(doc, "host").unwrap();
    let inner = dom.children(dom.open_shadow_root(host).unwrap())[0];

    let chain = capture_context(&dom, inner).unwrap();
    assert_eq!(chain.frames, vec![FrameDescriptor::Id("outer".into())]);
    assert_eq!(chain.shadow_hosts, vec!["/html/body/div".to_string()]);
    assert!(!chain.closed_shadow);
}

#[test]
fn frame_without_id_is_described_by_name_then_index() {
    let dom = nested_page(false);
    let ads = dom
        .descendants(dom.root())
        .into_iter()
        .find(|n| dom.attr(*n, "name") == Some("ads"))
        .unwrap();
    let buy = first_tag(&dom, dom.content_document(ads).unwrap(), "button");
    assert_eq!(
        capture_context(&dom, buy).unwrap().frames,
        vec![FrameDescriptor::Name("ads".into())]
    );

    let mut dom = Dom::new(ORIGIN);
    let root = dom.root();
    dom.append_element(root, "iframe", &[]);
    let second = dom.append_element(root, "iframe", &[]);
    let doc = dom.attach_frame_document(second, ORIGIN).unwrap();
    let field = dom.append_element(doc, "input", &[("id", "f")]);
    assert_eq!(capture_context(&dom, field).unwrap().frames, vec![FrameDescriptor::Index(1)]);
}

#[test]
fn frame_hosted_in_shadow_root_fails_capture() {
    let mut dom = Dom::new(ORIGIN);
    let root = dom.root();
    dom.append_element(root, "iframe", &[]);
    let host = dom.append_element(root, "div", &[("id", "widget")]);
    let shadow = dom.attach_shadow(host, ShadowMode::Open).unwrap();
    let frame = dom.append_element(shadow, "iframe", &[]);
    let doc = dom.attach_frame_document(frame, ORIGIN).unwrap();
    let field = dom.append_element(doc, "input", &[("id", "f")]);

    assert_eq!(capture_context(&dom, field).unwrap_err(), CaptureFailure::UnaddressableFrame);
    assert_eq!(capture_target(&dom, field).unwrap_err(), CaptureFailure::UnaddressableFrame);
}

#[test]
fn closed_shadow_is_flagged_in_context() {
    let dom = nested_page(true);
    let vault = by_id(&dom, "vault");
    let secret = dom.children(dom.intercepted_shadow_root(vault).unwrap())[0];

    let chain = capture_context(&dom, secret).unwrap();
    assert_eq!(chain.shadow_hosts, vec!["/html/body/div[1]".to_string()]);
    assert!(chain.closed_shadow);
}
