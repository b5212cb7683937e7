// src/document/html.rs
use scraper::{node::Node, ElementRef, Html};

use super::{DocumentTree, TreeBuilder};

/// Elements whose text never belongs to the article body.
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Parses an HTML document into the arena tree.
/// Hidden elements (`display:none`, `visibility:hidden`) are dropped here so no
/// extractor ever sees them.
pub fn parse_html(html_content: &str) -> DocumentTree {
    let document = Html::parse_document(html_content);
    let mut builder = TreeBuilder::new();
    append_element(&mut builder, document.root_element());
    let tree = builder.finish();
    tracing::trace!("Parsed HTML into {} arena nodes", tree.len());
    tree
}

fn is_hidden(element: ElementRef) -> bool {
    element.value().attr("style").map_or(false, |style| {
        let compact: String = style
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        compact.contains("display:none") || compact.contains("visibility:hidden")
    })
}

enum Step<'a> {
    Open(ElementRef<'a>),
    Text(&'a str),
    Close,
}

/// Preorder walk over an explicit work stack; depth is not bounded by the
/// thread stack.
fn append_element(builder: &mut TreeBuilder, root: ElementRef) {
    let mut stack = vec![Step::Open(root)];
    while let Some(step) = stack.pop() {
        match step {
            Step::Open(element) => {
                let name = element.value().name();
                if SKIPPED_TAGS.contains(&name) || is_hidden(element) {
                    continue;
                }
                builder.open_element(
                    name,
                    element
                        .value()
                        .attrs()
                        .map(|(key, value)| (key.to_string(), value.to_string())),
                );
                stack.push(Step::Close);
                for child in element.children().rev() {
                    if let Some(child_element) = ElementRef::wrap(child) {
                        stack.push(Step::Open(child_element));
                    } else if let Node::Text(text_node) = child.value() {
                        stack.push(Step::Text(&text_node.text));
                    }
                }
            }
            Step::Text(text) => builder.text(text),
            Step::Close => builder.close_element(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::AttrValue;

    #[test]
    fn test_hidden_and_script_elements_dropped() {
        let html = r#"<html><body>
            <div style="display: none">secret</div>
            <script>var x = 1;</script>
            <p class="lead  text">Visible</p>
        </body></html>"#;
        let tree = parse_html(html);
        let text = tree.text(tree.root());
        assert!(!text.contains("secret"));
        assert!(!text.contains("var x"));
        assert!(text.contains("Visible"));

        let p = tree
            .descendants(tree.root())
            .find(|id| tree.tag(*id) == Some("p"))
            .expect("p element");
        assert_eq!(
            tree.attr(p, "class"),
            Some(&AttrValue::Multi(vec!["lead".to_string(), "text".to_string()]))
        );
    }

    #[test]
    fn test_deeply_nested_markup_on_small_stack() {
        let depth = 50_000;
        // inline elements keep html5ever's scope checks linear in depth
        let html = format!("<div>{}x{}</div>", "<span>".repeat(depth), "</span>".repeat(depth));
        let handle = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(move || {
                let tree = parse_html(&html);
                (tree.len(), tree.text(tree.root()))
            })
            .expect("spawn parser thread");
        let (nodes, text) = handle.join().expect("parser thread finished");
        assert!(nodes > depth);
        assert_eq!(text, "x");
    }

    #[test]
    fn test_sibling_order_preserved() {
        let tree = parse_html("<body><p>a<b>b</b>c</p><p>d</p></body>");
        assert_eq!(tree.text(tree.root()), "abcd");
    }
}
