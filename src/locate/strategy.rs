use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bundle::bundle_model::ElementBundle;
use crate::capture::context::ExecutionContext;
use crate::dom::dom_model::{Dom, NodeId};
use crate::dom::path::evaluate_path;
use crate::error::LocatorNotFound;
use crate::locate::similarity::{dice_similarity, normalize_text};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocatorConfig {
    /// Minimum Dice similarity for the fuzzy text strategy.
    #[serde(default = "default_text_threshold")]
    pub text_similarity_threshold: f64,

    /// Maximum offset, per axis, for the bounding-box strategy.
    #[serde(default = "default_bbox_tolerance")]
    pub bbox_tolerance_px: f64,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            text_similarity_threshold: default_text_threshold(),
            bbox_tolerance_px: default_bbox_tolerance(),
        }
    }
}

fn default_text_threshold() -> f64 { 0.8 }
fn default_bbox_tolerance() -> f64 { 20.0 }

// ============================================================================
// Strategy model
// ============================================================================

/// The nine locate strategies, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Xpath,
    Id,
    Name,
    DataAttribute,
    AriaLabel,
    Placeholder,
    ClassList,
    FuzzyText,
    BoundingBox,
}

impl StrategyKind {
    pub const ORDER: [StrategyKind; 9] = [
        StrategyKind::Xpath,
        StrategyKind::Id,
        StrategyKind::Name,
        StrategyKind::DataAttribute,
        StrategyKind::AriaLabel,
        StrategyKind::Placeholder,
        StrategyKind::ClassList,
        StrategyKind::FuzzyText,
        StrategyKind::BoundingBox,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Xpath => "xpath",
            StrategyKind::Id => "id",
            StrategyKind::Name => "name",
            StrategyKind::DataAttribute => "data_attribute",
            StrategyKind::AriaLabel => "aria_label",
            StrategyKind::Placeholder => "placeholder",
            StrategyKind::ClassList => "class_list",
            StrategyKind::FuzzyText => "fuzzy_text",
            StrategyKind::BoundingBox => "bounding_box",
        }
    }

    /// Run this strategy alone. Strategies never look at each other's results.
    pub fn try_locate(
        &self,
        bundle: &ElementBundle,
        dom: &Dom,
        ctx: &ExecutionContext,
        config: &LocatorConfig,
    ) -> StrategyOutcome {
        let loc = &bundle.locators;
        match self {
            StrategyKind::Xpath => match &loc.xpath {
                Some(path) => unique(evaluate_path(dom, ctx.root, path)),
                None => StrategyOutcome::Skipped,
            },
            StrategyKind::Id => by_attribute(dom, ctx, "id", loc.id.as_deref()),
            StrategyKind::Name => by_attribute(dom, ctx, "name", loc.name.as_deref()),
            StrategyKind::DataAttribute => by_data_attributes(dom, ctx, bundle),
            StrategyKind::AriaLabel => by_attribute(dom, ctx, "aria-label", loc.aria_label.as_deref()),
            StrategyKind::Placeholder => {
                by_attribute(dom, ctx, "placeholder", loc.placeholder.as_deref())
            }
            StrategyKind::ClassList => by_class_list(dom, ctx, loc.class_list.as_deref()),
            StrategyKind::FuzzyText => by_fuzzy_text(dom, ctx, bundle, config),
            StrategyKind::BoundingBox => by_bounding_box(dom, ctx, bundle, config),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StrategyOutcome {
    Found { node: NodeId },
    /// More than one candidate; never guessed between.
    Ambiguous { candidates: usize },
    NoMatch,
    /// The bundle has no value for the field this strategy needs.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyAttempt {
    pub strategy: StrategyKind,
    pub outcome: StrategyOutcome,
}

/// A successful locate and the audit trail that led to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub node: NodeId,
    pub strategy: StrategyKind,
    pub attempts: Vec<StrategyAttempt>,
}

/// Render attempts as `xpath=no_match, id=skipped, ...` for error messages.
pub fn describe_attempts(attempts: &[StrategyAttempt]) -> String {
    attempts
        .iter()
        .map(|a| {
            let outcome = match a.outcome {
                StrategyOutcome::Found { .. } => "found".to_string(),
                StrategyOutcome::Ambiguous { candidates } => format!("ambiguous({})", candidates),
                StrategyOutcome::NoMatch => "no_match".to_string(),
                StrategyOutcome::Skipped => "skipped".to_string(),
            };
            format!("{}={}", a.strategy, outcome)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// Locate
// ============================================================================

/// Try every strategy in fixed priority order and stop at the first one that
/// yields exactly one element.
pub fn locate(
    bundle: &ElementBundle,
    dom: &Dom,
    ctx: &ExecutionContext,
    config: &LocatorConfig,
) -> Result<Located, LocatorNotFound> {
    let mut attempts = Vec::with_capacity(StrategyKind::ORDER.len());

    for strategy in StrategyKind::ORDER {
        let outcome = strategy.try_locate(bundle, dom, ctx, config);
        attempts.push(StrategyAttempt { strategy, outcome });

        if let StrategyOutcome::Found { node } = outcome {
            debug!(target = %bundle.describe(), %strategy, "located element");
            return Ok(Located {
                node,
                strategy,
                attempts,
            });
        }
    }

    debug!(target = %bundle.describe(), attempts = %describe_attempts(&attempts), "element not found");
    Err(LocatorNotFound { attempts })
}

// ============================================================================
// Strategy implementations
// ============================================================================

fn unique(candidates: Vec<NodeId>) -> StrategyOutcome {
    match candidates.as_slice() {
        [] => StrategyOutcome::NoMatch,
        [node] => StrategyOutcome::Found { node: *node },
        many => StrategyOutcome::Ambiguous {
            candidates: many.len(),
        },
    }
}

fn scope(dom: &Dom, ctx: &ExecutionContext) -> Vec<NodeId> {
    dom.descendants(ctx.root)
}

fn by_attribute(dom: &Dom, ctx: &ExecutionContext, attr: &str, value: Option<&str>) -> StrategyOutcome {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return StrategyOutcome::Skipped;
    };
    unique(
        scope(dom, ctx)
            .into_iter()
            .filter(|n| dom.attr(*n, attr) == Some(value))
            .collect(),
    )
}

/// Captured data attributes are tried one by one; the first pair that
/// identifies a single element wins.
fn by_data_attributes(dom: &Dom, ctx: &ExecutionContext, bundle: &ElementBundle) -> StrategyOutcome {
    if bundle.locators.data_attrs.is_empty() {
        return StrategyOutcome::Skipped;
    }

    let mut widest_ambiguity = 0;
    for (key, value) in &bundle.locators.data_attrs {
        let attr = format!("data-{}", key);
        match by_attribute(dom, ctx, &attr, Some(value)) {
            found @ StrategyOutcome::Found { .. } => return found,
            StrategyOutcome::Ambiguous { candidates } => {
                widest_ambiguity = widest_ambiguity.max(candidates)
            }
            _ => {}
        }
    }

    if widest_ambiguity > 0 {
        StrategyOutcome::Ambiguous {
            candidates: widest_ambiguity,
        }
    } else {
        StrategyOutcome::NoMatch
    }
}

/// Elements carrying every captured class. Accepted only when unique.
fn by_class_list(dom: &Dom, ctx: &ExecutionContext, class_list: Option<&str>) -> StrategyOutcome {
    let wanted: Vec<&str> = class_list
        .map(|c| c.split_whitespace().collect())
        .unwrap_or_default();
    if wanted.is_empty() {
        return StrategyOutcome::Skipped;
    }

    unique(
        scope(dom, ctx)
            .into_iter()
            .filter(|n| {
                dom.element(*n).map_or(false, |el| {
                    let have = el.classes();
                    wanted.iter().all(|w| have.contains(w))
                })
            })
            .collect(),
    )
}

fn same_tag(dom: &Dom, node: NodeId, tag: Option<&str>) -> bool {
    match tag {
        Some(t) => dom.tag(node) == Some(t),
        None => true,
    }
}

fn by_fuzzy_text(
    dom: &Dom,
    ctx: &ExecutionContext,
    bundle: &ElementBundle,
    config: &LocatorConfig,
) -> StrategyOutcome {
    let Some(wanted) = bundle.locators.text.as_deref().map(normalize_text).filter(|t| !t.is_empty())
    else {
        return StrategyOutcome::Skipped;
    };
    let tag = bundle.locators.tag.as_deref();

    let mut best: Vec<NodeId> = Vec::new();
    let mut best_score = config.text_similarity_threshold;

    for node in scope(dom, ctx) {
        if !same_tag(dom, node, tag) {
            continue;
        }
        let text = normalize_text(&dom.text_content(node));
        if text.is_empty() {
            continue;
        }
        let score = dice_similarity(&wanted, &text);
        if score < config.text_similarity_threshold {
            continue;
        }
        if best.is_empty() || score > best_score + f64::EPSILON {
            best_score = score;
            best = vec![node];
        } else if (score - best_score).abs() <= f64::EPSILON {
            best.push(node);
        }
    }

    unique(best)
}

fn by_bounding_box(
    dom: &Dom,
    ctx: &ExecutionContext,
    bundle: &ElementBundle,
    config: &LocatorConfig,
) -> StrategyOutcome {
    let Some(captured) = bundle.locators.bounding else {
        return StrategyOutcome::Skipped;
    };
    let tag = bundle.locators.tag.as_deref();
    let tolerance = config.bbox_tolerance_px;

    let mut best: Vec<NodeId> = Vec::new();
    let mut best_distance = f64::INFINITY;

    for node in scope(dom, ctx) {
        if !same_tag(dom, node, tag) {
            continue;
        }
        let Some(rect) = dom.element(node).and_then(|el| el.rect) else {
            continue;
        };
        let dx = rect.left - captured.left;
        let dy = rect.top - captured.top;
        if dx.abs() > tolerance || dy.abs() > tolerance {
            continue;
        }
        let distance = (dx * dx + dy * dy).sqrt();
        if distance + f64::EPSILON < best_distance {
            best_distance = distance;
            best = vec![node];
        } else if (distance - best_distance).abs() <= f64::EPSILON {
            best.push(node);
        }
    }

    unique(best)
}
