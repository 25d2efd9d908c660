//! XML plumbing shared by rendering, signing, validation and unwrapping.
//!
//! Documents are written with quick-xml and read back with roxmltree. The
//! parsed tree keeps the byte range of every node, which lets the signer
//! splice signatures into the original text instead of re-serializing it.

mod c14n;
mod writer;

pub use c14n::canonicalize;
pub use roxmltree::{Document, Node};
pub use writer::{XmlResult, XmlWriter, escape_text, format_amount};

use crate::core::NfseError;

/// Parse a document. DTDs are rejected.
pub fn parse(xml: &str) -> Result<Document<'_>, NfseError> {
    Document::parse(xml).map_err(|e| NfseError::Xml(e.to_string()))
}

/// Every element below `node` (itself included) with the given local name,
/// in document order.
pub fn find_all<'a, 'input>(
    node: Node<'a, 'input>,
    local_name: &str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.descendants()
        .filter(move |n| n.is_element() && n.tag_name().name() == local_name)
}

/// First element below `node` (itself included) with the given local name.
pub fn find<'a, 'input>(node: Node<'a, 'input>, local_name: &str) -> Option<Node<'a, 'input>> {
    find_all(node, local_name).next()
}

pub fn child_elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

/// Concatenated text of all descendants (DOM `textContent`).
pub fn text_content(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}
