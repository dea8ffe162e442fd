use crate::dom::dom_model::{Dom, NodeId};

// ============================================================================
// Label heuristics, most reliable first
// ============================================================================

/// One way of deriving a human-readable field label for an element.
pub trait LabelHeuristic {
    fn name(&self) -> &'static str;
    fn try_extract(&self, dom: &Dom, node: NodeId) -> Option<String>;
}

/// `<label for="...">` pointing at the element's id.
pub struct ExplicitLabelFor;

/// A `<label>` ancestor wrapping the element.
pub struct WrappingLabel;

/// `aria-labelledby` id references.
pub struct LabelledBy;

/// Nearest preceding sibling carrying short text.
pub struct PrecedingSibling;

/// Header cell of the column the element sits in.
pub struct ColumnHeader;

/// Custom dropdown widgets (select2, react-select, ant, MUI, vue-select).
pub struct DropdownWidget;

/// aria-label, placeholder, name, title, id, then own text.
pub struct AttributeFallback;

const MAX_LABEL_LEN: usize = 80;

/// Derive a label by applying the heuristics in priority order.
pub fn derive_label(dom: &Dom, node: NodeId) -> Option<String> {
    derive_label_with(dom, node).map(|(_, label)| label)
}

/// Like [`derive_label`] but also reports which heuristic produced the label.
pub fn derive_label_with(dom: &Dom, node: NodeId) -> Option<(&'static str, String)> {
    let cascade: [&dyn LabelHeuristic; 7] = [
        &ExplicitLabelFor,
        &WrappingLabel,
        &LabelledBy,
        &PrecedingSibling,
        &ColumnHeader,
        &DropdownWidget,
        &AttributeFallback,
    ];

    cascade.iter().find_map(|h| {
        h.try_extract(dom, node)
            .and_then(|l| clean(&l))
            .map(|l| (h.name(), l))
    })
}

fn clean(raw: &str) -> Option<String> {
    let collapsed = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let trimmed = collapsed.trim_end_matches(['*', ':']).trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn short_text(dom: &Dom, node: NodeId) -> Option<String> {
    let text = dom.visible_text(node);
    if text.is_empty() || text.chars().count() > MAX_LABEL_LEN {
        None
    } else {
        Some(text)
    }
}

impl LabelHeuristic for ExplicitLabelFor {
    fn name(&self) -> &'static str {
        "label_for"
    }

    fn try_extract(&self, dom: &Dom, node: NodeId) -> Option<String> {
        let id = dom.attr(node, "id")?;
        let scope = dom.root_of(node);
        dom.descendants(scope)
            .into_iter()
            .find(|n| dom.tag(*n) == Some("label") && dom.attr(*n, "for") == Some(id))
            .and_then(|label| short_text(dom, label))
    }
}

impl LabelHeuristic for WrappingLabel {
    fn name(&self) -> &'static str {
        "wrapping_label"
    }

    fn try_extract(&self, dom: &Dom, node: NodeId) -> Option<String> {
        let label = dom
            .ancestors(node)
            .into_iter()
            .find(|a| dom.tag(*a) == Some("label"))?;
        short_text(dom, label)
    }
}

impl LabelHeuristic for LabelledBy {
    fn name(&self) -> &'static str {
        "aria_labelledby"
    }

    fn try_extract(&self, dom: &Dom, node: NodeId) -> Option<String> {
        let refs = dom.attr(node, "aria-labelledby")?;
        let scope = dom.root_of(node);
        let parts: Vec<String> = refs
            .split_whitespace()
            .filter_map(|id| dom.element_by_id(scope, id))
            .map(|n| dom.visible_text(n))
            .filter(|t| !t.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

impl LabelHeuristic for PrecedingSibling {
    fn name(&self) -> &'static str {
        "preceding_sibling"
    }

    fn try_extract(&self, dom: &Dom, node: NodeId) -> Option<String> {
        const TEXT_TAGS: [&str; 9] = ["label", "span", "div", "p", "strong", "b", "td", "th", "legend"];

        let parent = dom.parent(node)?;
        let siblings = dom.element_children(parent);
        let position = siblings.iter().position(|s| *s == node)?;

        siblings[..position]
            .iter()
            .rev()
            .filter(|s| dom.tag(**s).map_or(false, |t| TEXT_TAGS.contains(&t)))
            .find_map(|s| short_text(dom, *s))
    }
}

impl LabelHeuristic for ColumnHeader {
    fn name(&self) -> &'static str {
        "column_header"
    }

    fn try_extract(&self, dom: &Dom, node: NodeId) -> Option<String> {
        let ancestors = dom.ancestors(node);
        let cell = ancestors
            .iter()
            .copied()
            .find(|a| dom.tag(*a) == Some("td"))?;
        let row = dom.parent(cell)?;
        let column = dom.element_children(row).iter().position(|c| *c == cell)?;

        let table = ancestors
            .iter()
            .copied()
            .find(|a| dom.tag(*a) == Some("table"))?;
        let header_row = dom
            .descendants(table)
            .into_iter()
            .find(|r| {
                dom.tag(*r) == Some("tr")
                    && dom
                        .element_children(*r)
                        .iter()
                        .any(|c| dom.tag(*c) == Some("th"))
            })?;

        let header = *dom.element_children(header_row).get(column)?;
        short_text(dom, header)
    }
}

impl LabelHeuristic for DropdownWidget {
    fn name(&self) -> &'static str {
        "dropdown_widget"
    }

    fn try_extract(&self, dom: &Dom, node: NodeId) -> Option<String> {
        const MARKERS: [&str; 5] = ["select2", "react-select", "ant-select", "muiselect", "v-select"];

        let is_widget = |n: NodeId| {
            let role = dom.attr(n, "role").unwrap_or_default();
            let class = dom.attr(n, "class").unwrap_or_default().to_lowercase();
            role == "combobox" || role == "listbox" || MARKERS.iter().any(|m| class.contains(m))
        };

        let container = std::iter::once(node)
            .chain(dom.ancestors(node))
            .filter(|n| is_widget(*n))
            .last()?;

        if let Some(label) = dom.attr(container, "aria-label") {
            return Some(label.to_string());
        }

        // Label rendered next to the widget container
        if let Some(label) = PrecedingSibling.try_extract(dom, container) {
            return Some(label);
        }

        // Placeholder element rendered inside the widget
        dom.descendants(container)
            .into_iter()
            .find(|d| {
                dom.attr(*d, "class")
                    .map_or(false, |c| c.to_lowercase().contains("placeholder"))
            })
            .and_then(|p| short_text(dom, p))
    }
}

impl LabelHeuristic for AttributeFallback {
    fn name(&self) -> &'static str {
        "attribute_fallback"
    }

    fn try_extract(&self, dom: &Dom, node: NodeId) -> Option<String> {
        for attr in ["aria-label", "placeholder", "name", "title", "id"] {
            if let Some(v) = dom.attr(node, attr).filter(|v| !v.trim().is_empty()) {
                return Some(v.to_string());
            }
        }
        if let Some(text) = short_text(dom, node) {
            return Some(text);
        }
        // Submit/button inputs carry their caption in `value`
        match dom.attr(node, "type") {
            Some("submit") | Some("button") => dom.attr(node, "value").map(str::to_string),
            _ => None,
        }
    }
}
