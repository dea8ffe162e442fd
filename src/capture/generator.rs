use std::collections::BTreeMap;

use tracing::debug;

use crate::bundle::bundle_model::{ElementBundle, LocatorSet};
use crate::capture::context::capture_context;
use crate::capture::label::derive_label;
use crate::dom::dom_model::{Dom, NodeId};
use crate::dom::path::structural_path;
use crate::error::CaptureFailure;

/// Data attributes that frameworks stamp on every node; useless as identity.
const NOISY_DATA_PREFIXES: [&str; 5] = ["v-", "reactid", "react-", "ng-", "styled"];

/// Locators plus the derived label, before the context chain is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialBundle {
    pub locators: LocatorSet,
    pub label: Option<String>,
}

/// Complete capture output for one event target.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedTarget {
    pub bundle: ElementBundle,
    pub label: Option<String>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Derive every locator available for `node`. Read-only over the document.
///
/// Individual fields are simply omitted when they cannot be derived; only a
/// result with no usable locator at all is a failure.
pub fn generate(dom: &Dom, node: NodeId) -> Result<PartialBundle, CaptureFailure> {
    if dom.node(node).is_none() {
        return Err(CaptureFailure::UnknownNode);
    }
    let el = dom.element(node).ok_or(CaptureFailure::NotAnElement)?;

    let class_list = el.classes().join(" ");

    let data_attrs: BTreeMap<String, String> = el
        .attributes
        .iter()
        .filter_map(|(k, v)| {
            let key = k.strip_prefix("data-")?;
            if key.is_empty()
                || v.trim().is_empty()
                || NOISY_DATA_PREFIXES.iter().any(|p| key.starts_with(p))
            {
                return None;
            }
            Some((key.to_string(), v.clone()))
        })
        .collect();

    // Kept whole: the fuzzy strategy scores it against the full live text.
    let text = Some(dom.visible_text(node)).filter(|t| !t.is_empty());

    let locators = LocatorSet {
        xpath: structural_path(dom, node),
        id: non_empty(el.attr("id")),
        name: non_empty(el.attr("name")),
        aria_label: non_empty(el.attr("aria-label")),
        placeholder: non_empty(el.attr("placeholder")),
        class_list: non_empty(Some(class_list.as_str())),
        data_attrs,
        tag: Some(el.tag.clone()),
        text,
        bounding: el.rect,
    };

    if locators.is_empty() {
        return Err(CaptureFailure::EmptyBundle {
            tag: el.tag.clone(),
        });
    }

    Ok(PartialBundle {
        locators,
        label: derive_label(dom, node),
    })
}

/// Run the generator and the context tracker and assemble a bundle.
pub fn capture_target(dom: &Dom, node: NodeId) -> Result<CapturedTarget, CaptureFailure> {
    let partial = generate(dom, node)?;
    let context = capture_context(dom, node)?;
    let bundle = ElementBundle::new(partial.locators, context)?;

    debug!(
        target = %bundle.describe(),
        frames = bundle.context.frames.len(),
        shadow_hosts = bundle.context.shadow_hosts.len(),
        "captured bundle"
    );

    Ok(CapturedTarget {
        bundle,
        label: partial.label,
    })
}
