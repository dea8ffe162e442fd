use crate::dom::dom_model::{Dom, NodeId};

/// Build the absolute structural path of `node` from its nearest root
/// (document or shadow root), e.g. `/html/body/div[2]/input`.
///
/// The sibling index is omitted when the element is the only child of its
/// tag. Returns `None` for detached nodes and non-elements.
pub fn structural_path(dom: &Dom, node: NodeId) -> Option<String> {
    let mut segments = Vec::new();
    let mut current = node;

    loop {
        let tag = dom.tag(current)?;
        let parent = dom.parent(current)?;

        let same_tag: Vec<NodeId> = dom
            .element_children(parent)
            .into_iter()
            .filter(|c| dom.tag(*c) == Some(tag))
            .collect();

        if same_tag.len() <= 1 {
            segments.push(tag.to_string());
        } else {
            let position = same_tag.iter().position(|c| *c == current)? + 1;
            segments.push(format!("{}[{}]", tag, position));
        }

        if dom.is_root_node(parent) {
            break;
        }
        current = parent;
    }

    segments.reverse();
    Some(format!("/{}", segments.join("/")))
}

/// Evaluate a structural path against `scope` with node-set semantics: a
/// segment without an index matches every child of that tag.
///
/// Malformed paths evaluate to an empty set.
pub fn evaluate_path(dom: &Dom, scope: NodeId, path: &str) -> Vec<NodeId> {
    let segments: Vec<&str> = path.trim().split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Vec::new();
    }

    let mut current = vec![scope];
    for raw in segments {
        let Some((tag, index)) = parse_segment(raw) else {
            return Vec::new();
        };

        let mut next = Vec::new();
        for n in &current {
            let same_tag: Vec<NodeId> = dom
                .element_children(*n)
                .into_iter()
                .filter(|c| tag == "*" || dom.tag(*c).map_or(false, |t| t.eq_ignore_ascii_case(tag)))
                .collect();
            match index {
                Some(i) => {
                    if let Some(c) = same_tag.get(i - 1) {
                        next.push(*c);
                    }
                }
                None => next.extend(same_tag),
            }
        }

        if next.is_empty() {
            return next;
        }
        current = next;
    }
    current
}

fn parse_segment(segment: &str) -> Option<(&str, Option<usize>)> {
    match segment.find('[') {
        None => Some((segment, None)),
        Some(open) => {
            let close = segment.strip_suffix(']')?;
            let index: usize = close[open + 1..].parse().ok()?;
            if index == 0 || open == 0 {
                return None;
            }
            Some((&segment[..open], Some(index)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_segment_variants() {
        assert_eq!(parse_segment("div"), Some(("div", None)));
        assert_eq!(parse_segment("div[3]"), Some(("div", Some(3))));
        assert_eq!(parse_segment("div[0]"), None);
        assert_eq!(parse_segment("div[x]"), None);
        assert_eq!(parse_segment("[2]"), None);
        assert_eq!(parse_segment("div[2"), None);
    }
}
