// src/document/xml.rs
use roxmltree::{Document, Node, ParsingOptions};

use super::{DocumentTree, TreeBuilder};
use crate::utils::error::DocumentError;

/// Parses publisher XML (JATS and similar) into the arena tree.
/// Unlike HTML, malformed XML cannot be recovered and fails the document.
pub fn parse_xml(content: &str, source_name: &str) -> Result<DocumentTree, DocumentError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let document = Document::parse_with_options(content, options)
        .map_err(|e| DocumentError::Parse(source_name.to_string(), e.to_string()))?;

    let mut builder = TreeBuilder::new();
    append_node(&mut builder, document.root_element());
    Ok(builder.finish())
}

enum Step<'a, 'input> {
    Open(Node<'a, 'input>),
    Close,
}

fn append_node(builder: &mut TreeBuilder, root: Node) {
    let mut stack = vec![Step::Open(root)];
    while let Some(step) = stack.pop() {
        let node = match step {
            Step::Open(node) => node,
            Step::Close => {
                builder.close_element();
                continue;
            }
        };
        if node.is_element() {
            builder.open_element(
                node.tag_name().name(),
                node.attributes()
                    .map(|attr| (attr.name().to_string(), attr.value().to_string())),
            );
            stack.push(Step::Close);
            stack.extend(node.children().rev().map(Step::Open));
        } else if node.is_text() {
            builder.text(node.text().unwrap_or_default());
        }
    }
}
