use replay_engine::dom::dom_model::{Dom, ShadowMode};
use replay_engine::dom::path::{evaluate_path, structural_path};
use replay_engine::dom::snapshot::DomSnapshot;
use serde_json::json;

use crate::common::fixtures::{ORIGIN, by_id, nested_page, signup_page, submit_button};

mod common;

// ============================================================================
// Structural paths
// ============================================================================

#[test]
fn structural_path_omits_index_for_only_child_of_tag() {
    let dom = signup_page();
    assert_eq!(
        structural_path(&dom, by_id(&dom, "email")).as_deref(),
        Some("/html/body/form/input")
    );
    assert_eq!(
        structural_path(&dom, by_id(&dom, "start")).as_deref(),
        Some("/html/body/button")
    );
}

#[test]
fn structural_path_indexes_repeated_tags() {
    let dom = signup_page();
    assert_eq!(
        structural_path(&dom, submit_button(&dom)).as_deref(),
        Some("/html/body/form/div[2]/button")
    );
}

#[test]
fn structural_path_is_relative_to_shadow_root() {
    let dom = nested_page(true);
    let vault = by_id(&dom, "vault");
    let root = dom.intercepted_shadow_root(vault).unwrap();
    let secret = dom.children(root)[0];
    assert_eq!(structural_path(&dom, secret).as_deref(), Some("/button"));
}

#[test]
fn detached_node_has_no_path() {
    let mut dom = signup_page();
    let email = by_id(&dom, "email");
    dom.remove(email);
    assert_eq!(structural_path(&dom, email), None);
    assert!(!dom.is_connected(email));
}

#[test]
fn evaluate_path_uses_node_set_semantics() {
    let dom = signup_page();
    // Both <div> children of the form match an unindexed segment.
    assert_eq!(evaluate_path(&dom, dom.root(), "/html/body/form/div").len(), 2);
    assert_eq!(
        evaluate_path(&dom, dom.root(), "/html/body/form/div[2]/button"),
        vec![submit_button(&dom)]
    );
    assert!(evaluate_path(&dom, dom.root(), "/html/body/form/div[7]").is_empty());
    assert!(evaluate_path(&dom, dom.root(), "not a [path").is_empty());
}

// ============================================================================
// Shadow roots and frames
// ============================================================================

#[test]
fn closed_root_is_hidden_from_host_but_seen_by_hook() {
    let dom = nested_page(true);
    let vault = by_id(&dom, "vault");
    assert_eq!(dom.open_shadow_root(vault), None);
    assert!(dom.intercepted_shadow_root(vault).is_some());
}

#[test]
fn roots_attached_before_hook_are_not_intercepted() {
    let mut dom = Dom::new(ORIGIN);
    let root = dom.root();
    let host = dom.append_element(root, "div", &[]);
    dom.attach_shadow(host, ShadowMode::Closed).unwrap();
    dom.install_shadow_hook();
    assert_eq!(dom.intercepted_shadow_root(host), None);
}

#[test]
fn frame_document_links_back_to_owner() {
    let dom = nested_page(false);
    let outer = by_id(&dom, "outer");
    let doc = dom.content_document(outer).unwrap();
    assert_eq!(dom.owner_frame(doc), Some(outer));
    assert_eq!(dom.origin(doc), Some(ORIGIN));
    // Frame documents are not part of the parent's light tree.
    assert!(dom.descendants(dom.root()).iter().all(|n| dom.owner_document(*n) == Some(dom.root())));
}

#[test]
fn text_content_is_collapsed_for_visible_text() {
    let mut dom = Dom::new(ORIGIN);
    let root = dom.root();
    let p = dom.append_element(root, "p", &[]);
    dom.append_text(p, "  Hello \n ");
    let b = dom.append_element(p, "b", &[]);
    dom.append_text(b, "world ");
    assert_eq!(dom.visible_text(p), "Hello world");
}

// ============================================================================
// Snapshot import
// ============================================================================

#[test]
fn snapshot_builds_frames_shadow_roots_and_handles() {
    let snapshot = DomSnapshot::from_json(json!({
        "origin": ORIGIN,
        "shadow_hook": true,
        "children": [
            { "tag": "HTML", "children": [
                { "tag": "body", "children": [
                    { "tag": "input", "attrs": { "id": "q", "value": "x" }, "value": "typed",
                      "handle": "n1", "rect": { "left": 1.0, "top": 2.0, "width": 3.0, "height": 4.0 } },
                    { "tag": "div", "attrs": { "id": "host" },
                      "shadow": { "mode": "closed", "children": [ { "tag": "span", "children": [ { "text": "inside" } ] } ] } },
                    { "tag": "iframe", "attrs": { "id": "f" },
                      "frame": { "origin": "https://other.example", "children": [ { "tag": "html" } ] } }
                ]}
            ]}
        ]
    }))
    .unwrap();
    let dom = snapshot.into_dom();

    let q = by_id(&dom, "q");
    assert_eq!(dom.tag(dom.parent(dom.parent(q).unwrap()).unwrap()), Some("html"));
    assert_eq!(dom.element(q).unwrap().value, "typed");
    assert_eq!(dom.find_by_handle("n1"), Some(q));

    let host = by_id(&dom, "host");
    let shadow = dom.intercepted_shadow_root(host).expect("hooked closed root");
    assert_eq!(dom.visible_text(shadow), "inside");

    let frame_doc = dom.content_document(by_id(&dom, "f")).unwrap();
    assert_eq!(dom.origin(frame_doc), Some("https://other.example"));
}

#[test]
fn malformed_snapshot_is_a_session_error() {
    let err = DomSnapshot::from_json(json!({ "children": "nope" })).unwrap_err();
    assert!(err.to_string().contains("invalid DOM snapshot"));
}
