// src/extractors/pattern.rs
use regex::Regex;

use crate::config::{Pattern, PatternSet};
use crate::document::{AttrValue, DocumentTree, NodeId, NodeKind};

/// Tests one config pattern against one node. Only elements can match.
///
/// The tag must fully match one of the tag regexes (when any are given). Every
/// attribute named by the pattern must be present, and every regex listed for
/// it must be satisfied: by the whole value for single-valued attributes, or by
/// some token (or the whole token list) for multi-valued ones such as `class`.
pub fn matches(tree: &DocumentTree, node: NodeId, pattern: &Pattern) -> bool {
    let NodeKind::Element { tag, attrs } = tree.kind(node) else {
        return false;
    };

    if !pattern.tags.is_empty() && !pattern.tags.iter().any(|re| re.is_match(tag)) {
        return false;
    }

    pattern.attrs.iter().all(|attr_pattern| match attrs.get(&attr_pattern.name) {
        Some(value) => attr_pattern.values.iter().all(|re| value_matches(value, re)),
        None => false,
    })
}

/// OR across the set.
pub fn matches_any(tree: &DocumentTree, node: NodeId, set: &PatternSet) -> bool {
    set.patterns().iter().any(|pattern| matches(tree, node, pattern))
}

fn value_matches(value: &AttrValue, re: &Regex) -> bool {
    match value {
        AttrValue::Single(single) => re.is_match(single),
        AttrValue::Multi(tokens) => {
            tokens.iter().any(|token| re.is_match(token)) || re.is_match(&tokens.join(" "))
        }
    }
}
