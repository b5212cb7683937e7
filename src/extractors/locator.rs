// src/extractors/locator.rs
use std::collections::BTreeMap;

use crate::config::{PatternSet, Rule};
use crate::document::{DocumentTree, NodeId};
use crate::extractors::pattern::matches_any;

/// Lazy depth-first search for nodes matching a pattern set, in document order.
///
/// A matched node's subtree is not searched again, so nested matches of the
/// same set are never reported twice. Each call owns its own stack; nothing is
/// shared between searches.
#[derive(Debug, Clone)]
pub struct Find<'a> {
    tree: &'a DocumentTree,
    set: &'a PatternSet,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Find<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while let Some(id) = self.stack.pop() {
            if matches_any(self.tree, id, self.set) {
                return Some(id);
            }
            self.stack.extend(self.tree.element_children(id).collect::<Vec<_>>().into_iter().rev());
        }
        None
    }
}

/// Searches the descendants of `within` (not `within` itself).
pub fn find<'a>(tree: &'a DocumentTree, within: NodeId, set: &'a PatternSet) -> Find<'a> {
    let stack = tree.element_children(within).collect::<Vec<_>>().into_iter().rev().collect();
    Find { tree, set, stack }
}

/// A located region plus the text of each of its `data` sub-elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub node: NodeId,
    pub data: BTreeMap<String, Vec<String>>,
}

impl Region {
    pub fn joined(&self, key: &str, separator: &str) -> String {
        self.data
            .get(key)
            .map(|values| values.join(separator))
            .unwrap_or_default()
    }
}

/// Applies a rule inside `within`: `defined-by` locates the region roots
/// (regions without any text are skipped), then every `data` set is searched
/// inside each root.
pub fn locate(tree: &DocumentTree, within: NodeId, rule: &Rule) -> Vec<Region> {
    find(tree, within, &rule.defined_by)
        .filter(|node| tree.has_text(*node))
        .map(|node| {
            let data = rule
                .data
                .iter()
                .map(|(key, set)| (key.clone(), data_texts(tree, node, set)))
                .filter(|(_, values)| !values.is_empty())
                .collect();
            Region { node, data }
        })
        .collect()
}

/// Cleaned, non-empty, de-duplicated texts of the nodes matching `set` below `node`.
pub fn data_texts(tree: &DocumentTree, node: NodeId, set: &PatternSet) -> Vec<String> {
    let mut seen = Vec::new();
    for found in find(tree, node, set) {
        let text = tree.text(found);
        if !text.is_empty() && !seen.contains(&text) {
            seen.push(text);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Pattern;
    use crate::document::html::parse_html;

    fn set(patterns: Vec<Pattern>) -> PatternSet {
        PatternSet::new(patterns)
    }

    #[test]
    fn test_find_skips_nested_matches_of_same_set() {
        let tree = parse_html(
            r#"<body><div class="sec"><p>a</p><div class="sec"><p>b</p></div></div>
               <div class="sec"><p>c</p></div></body>"#,
        );
        let secs = set(vec![Pattern::new(&["div"], &[("class", &["sec"])]).unwrap()]);
        let found: Vec<String> = find(&tree, tree.root(), &secs).map(|id| tree.text(id)).collect();
        assert_eq!(found, vec!["ab", "c"]);

        // a fresh search inside the first match sees the nested one
        let outer = find(&tree, tree.root(), &secs).next().unwrap();
        let inner: Vec<String> = find(&tree, outer, &secs).map(|id| tree.text(id)).collect();
        assert_eq!(inner, vec!["b"]);
    }

    #[test]
    fn test_find_is_restartable_and_in_document_order() {
        let tree = parse_html("<body><p>1</p><div><p>2</p></div><p>3</p></body>");
        let paragraphs = set(vec![Pattern::tag("p").unwrap()]);
        let first: Vec<_> = find(&tree, tree.root(), &paragraphs).collect();
        let second: Vec<_> = find(&tree, tree.root(), &paragraphs).collect();
        assert_eq!(first, second);
        assert!(first.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_locate_collects_data_within_region_only() {
        let tree = parse_html(
            r#"<body><h2>Outside</h2>
               <div class="sec"><h2>Inside</h2><p>text</p></div>
               <div class="sec"></div></body>"#,
        );
        let mut data = BTreeMap::new();
        data.insert("headers".to_string(), set(vec![Pattern::tag("h[1-3]").unwrap()]));
        let rule = Rule {
            defined_by: set(vec![Pattern::new(&["div"], &[("class", &["sec"])]).unwrap()]),
            data,
        };
        let regions = locate(&tree, tree.root(), &rule);
        assert_eq!(regions.len(), 1, "empty region should be skipped");
        assert_eq!(regions[0].joined("headers", " "), "Inside");
        assert_eq!(regions[0].joined("missing", " "), "");
    }
}
