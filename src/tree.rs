//! Read-only view over the tree-sitter YAML parse tree.
//!
//! The rest of the crate never touches the raw tree-sitter API directly;
//! it goes through `Document` for text access and the free functions here
//! for child walks. Nodes are cheap copyable handles borrowing from the
//! document's tree, so nothing outlives an `apply_patch` call.

use tree_sitter::{Node, Parser, Tree};

use crate::error::GraftError;

/// A parsed source document: the original text plus its concrete syntax
/// tree. All edit offsets refer to this text.
pub struct Document {
    pub text: String,
    tree: Tree,
}

impl Document {
    /// Parse YAML source. A tree containing error nodes is rejected;
    /// edits against a broken tree would land in the wrong place.
    pub fn parse(text: &str) -> Result<Self, GraftError> {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_yaml::LANGUAGE.into())?;
        let tree = parser.parse(text, None).ok_or(GraftError::Parse)?;
        if tree.root_node().has_error() {
            return Err(GraftError::Parse);
        }
        Ok(Document { text: text.to_string(), tree })
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Byte slice of a node. Node ranges are always valid UTF-8 boundaries.
    pub fn node_text(&self, node: Node) -> &str {
        &self.text[node.byte_range()]
    }
}

/// All children of a node, in document order.
pub fn children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

/// Children of a given node type.
pub fn children_of_kind<'t>(node: Node<'t>, kind: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).filter(|c| c.kind() == kind).collect()
}

/// Named children, skipping `comment` and `anchor` decorations. These are
/// the structurally meaningful children a wrapper node converges through.
pub fn meaningful_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| !matches!(c.kind(), "comment" | "anchor"))
        .collect()
}

/// Children attached to a grammar field, e.g. `key` / `value` on mapping
/// pairs.
pub fn field<'t>(node: Node<'t>, name: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(name, &mut cursor).collect()
}

/// Require exactly one node. Zero is a resolution miss, more than one is a
/// document anomaly; `context` names the step for the diagnostic.
pub fn single<'t>(nodes: Vec<Node<'t>>, context: &str) -> Result<Node<'t>, GraftError> {
    let mut iter = nodes.into_iter();
    match (iter.next(), iter.next()) {
        (Some(node), None) => Ok(node),
        (None, _) => Err(GraftError::PathNotFound { path: context.to_string() }),
        (Some(_), Some(_)) => Err(GraftError::AmbiguousPath { path: context.to_string() }),
    }
}

/// The nearest preceding sibling, climbing to ancestors when a node is the
/// first child at its level. Used to find a comment that textually precedes
/// a node even when the grammar attaches it one level up.
pub fn prev_sibling_transitive<'t>(node: Node<'t>) -> Option<Node<'t>> {
    let mut current = node;
    loop {
        if let Some(prev) = current.prev_sibling() {
            return Some(prev);
        }
        current = current.parent()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_broken_yaml() {
        assert!(matches!(Document::parse("a: [1,"), Err(GraftError::Parse)));
    }

    #[test]
    fn node_text_slices_original_bytes() {
        let doc = Document::parse("a: 1\n").unwrap();
        assert_eq!(doc.node_text(doc.root()), "a: 1\n");
    }

    #[test]
    fn single_rejects_none_and_many() {
        let doc = Document::parse("a: 1\nb: 2\n").unwrap();
        let root = doc.root();
        assert!(matches!(
            single(children_of_kind(root, "no_such_kind"), "x"),
            Err(GraftError::PathNotFound { .. })
        ));
        assert!(single(vec![root], "x").is_ok());
        assert!(matches!(
            single(vec![root, root], "x"),
            Err(GraftError::AmbiguousPath { .. })
        ));
    }

    fn find_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
        if node.kind() == kind {
            return Some(node);
        }
        children(node).into_iter().find_map(|c| find_kind(c, kind))
    }

    #[test]
    fn children_include_anonymous_tokens() {
        let doc = Document::parse("{a: 1}\n").unwrap();
        let mapping = find_kind(doc.root(), "flow_mapping").unwrap();
        let kinds: Vec<&str> = children(mapping).iter().map(|c| c.kind()).collect();
        assert!(kinds.contains(&"{"));
        assert!(kinds.contains(&"flow_pair"));
        assert_eq!(meaningful_children(mapping).len(), 1); // just the pair
    }

    #[test]
    fn meaningful_children_skip_comments() {
        let doc = Document::parse("# leading\na: 1\n").unwrap();
        let document = meaningful_children(doc.root());
        assert_eq!(document.len(), 1);
        for child in meaningful_children(document[0]) {
            assert_ne!(child.kind(), "comment");
        }
    }
}
