use replay_engine::bundle::bundle_model::ElementBundle;
use replay_engine::capture::generator::capture_target;
use replay_engine::dom::dom_model::{Dom, NodeId, Rect, ShadowMode};
use replay_engine::record::step_model::Step;

pub const ORIGIN: &str = "https://app.example.com";
pub const FOREIGN_ORIGIN: &str = "https://ads.example.net";

/// ```text
/// html > body
///   h1 "Create account"
///   button#start "Start"
///   form#signup
///     label[for=email] "Email"
///     input#email (name=email, placeholder, class="field wide")
///     label "Password" > input[name=password]
///     div.row > select[name=country][aria-label=Country] > option*2
///     div.actions > button[type=submit][data-testid=signup-submit] "Sign up"
/// ```
pub fn signup_page() -> Dom {
    let mut dom = Dom::new(ORIGIN);
    let root = dom.root();
    let html = dom.append_element(root, "html", &[]);
    let body = dom.append_element(html, "body", &[]);

    let h1 = dom.append_element(body, "h1", &[]);
    dom.append_text(h1, "Create account");

    let start = dom.append_element(body, "button", &[("id", "start"), ("type", "button")]);
    dom.append_text(start, "Start");
    dom.set_rect(start, Rect::new(10.0, 10.0, 60.0, 24.0));
    dom.set_handle(start, "h-start");

    let form = dom.append_element(body, "form", &[("id", "signup")]);

    let label = dom.append_element(form, "label", &[("for", "email")]);
    dom.append_text(label, "Email");
    let email = dom.append_element(
        form,
        "input",
        &[
            ("id", "email"),
            ("name", "email"),
            ("type", "email"),
            ("placeholder", "you@example.com"),
            ("class", "field wide"),
        ],
    );
    dom.set_rect(email, Rect::new(10.0, 40.0, 200.0, 24.0));
    dom.set_handle(email, "h-email");

    let wrap = dom.append_element(form, "label", &[]);
    dom.append_text(wrap, "Password");
    let password = dom.append_element(
        wrap,
        "input",
        &[("type", "password"), ("name", "password"), ("class", "field")],
    );
    dom.set_rect(password, Rect::new(10.0, 80.0, 200.0, 24.0));
    dom.set_handle(password, "h-password");

    let row = dom.append_element(form, "div", &[("class", "row")]);
    let country = dom.append_element(row, "select", &[("name", "country"), ("aria-label", "Country")]);
    let se = dom.append_element(country, "option", &[("value", "se")]);
    dom.append_text(se, "Sweden");
    let no = dom.append_element(country, "option", &[("value", "no")]);
    dom.append_text(no, "Norway");

    let actions = dom.append_element(form, "div", &[("class", "actions")]);
    let submit = dom.append_element(
        actions,
        "button",
        &[
            ("type", "submit"),
            ("data-testid", "signup-submit"),
            ("class", "btn primary"),
        ],
    );
    dom.append_text(submit, "Sign up");
    dom.set_rect(submit, Rect::new(10.0, 120.0, 80.0, 30.0));
    dom.set_handle(submit, "h-submit");

    dom
}

/// ```text
/// html > body
///   iframe#outer (same origin) > html > body > div#host ::open-shadow > input#inner
///   iframe[name=ads] (foreign origin) > html > body > button "Buy"
///   div#vault ::closed-shadow > button "Secret"
///   div#plain
/// ```
///
/// With `hook` the closed-shadow interception hook is installed before the
/// closed root is attached.
pub fn nested_page(hook: bool) -> Dom {
    let mut dom = Dom::new(ORIGIN);
    if hook {
        dom.install_shadow_hook();
    }
    let root = dom.root();
    let html = dom.append_element(root, "html", &[]);
    let body = dom.append_element(html, "body", &[]);

    let outer = dom.append_element(body, "iframe", &[("id", "outer")]);
    let outer_doc = dom.attach_frame_document(outer, ORIGIN).unwrap();
    let f_html = dom.append_element(outer_doc, "html", &[]);
    let f_body = dom.append_element(f_html, "body", &[]);
    let host = dom.append_element(f_body, "div", &[("id", "host")]);
    let shadow = dom.attach_shadow(host, ShadowMode::Open).unwrap();
    let inner = dom.append_element(shadow, "input", &[("id", "inner"), ("name", "q")]);
    dom.set_handle(inner, "h-inner");

    let ads = dom.append_element(body, "iframe", &[("name", "ads")]);
    let ads_doc = dom.attach_frame_document(ads, FOREIGN_ORIGIN).unwrap();
    let a_html = dom.append_element(ads_doc, "html", &[]);
    let a_body = dom.append_element(a_html, "body", &[]);
    let buy = dom.append_element(a_body, "button", &[("id", "buy")]);
    dom.append_text(buy, "Buy");

    let vault = dom.append_element(body, "div", &[("id", "vault")]);
    let closed = dom.attach_shadow(vault, ShadowMode::Closed).unwrap();
    let secret = dom.append_element(closed, "button", &[("class", "reveal")]);
    dom.append_text(secret, "Secret");

    dom.append_element(body, "div", &[("id", "plain")]);

    dom
}

pub fn by_id(dom: &Dom, id: &str) -> NodeId {
    dom.element_by_id(dom.root(), id)
        .unwrap_or_else(|| panic!("no element #{} in fixture", id))
}

/// First element with `tag` in `scope`, document order.
pub fn first_tag(dom: &Dom, scope: NodeId, tag: &str) -> NodeId {
    dom.descendants(scope)
        .into_iter()
        .find(|n| dom.tag(*n) == Some(tag))
        .unwrap_or_else(|| panic!("no <{}> in fixture", tag))
}

pub fn by_name(dom: &Dom, name: &str) -> NodeId {
    dom.descendants(dom.root())
        .into_iter()
        .find(|n| dom.attr(*n, "name") == Some(name))
        .unwrap_or_else(|| panic!("no element named {} in fixture", name))
}

pub fn submit_button(dom: &Dom) -> NodeId {
    dom.descendants(dom.root())
        .into_iter()
        .find(|n| dom.attr(*n, "data-testid") == Some("signup-submit"))
        .expect("submit button")
}

pub fn bundle_of(dom: &Dom, node: NodeId) -> ElementBundle {
    capture_target(dom, node).expect("capture").bundle
}

/// Click step captured from `node`, with a fixed id and the derived label.
pub fn click_step(dom: &Dom, node: NodeId, id: &str) -> Step {
    let captured = capture_target(dom, node).expect("capture");
    let mut step = Step::click(captured.bundle).with_id(id);
    step.label = captured.label;
    step
}

pub fn input_step(dom: &Dom, node: NodeId, id: &str, value: &str) -> Step {
    let captured = capture_target(dom, node).expect("capture");
    let mut step = Step::input(captured.bundle, value).with_id(id);
    step.label = captured.label;
    step
}

pub fn enter_step(dom: &Dom, node: NodeId, id: &str) -> Step {
    let captured = capture_target(dom, node).expect("capture");
    let mut step = Step::enter(captured.bundle).with_id(id);
    step.label = captured.label;
    step
}
