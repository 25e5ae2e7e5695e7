//! Tree navigation abstraction.
//!
//! Hydration only needs ordered children and parent/sibling links to move
//! server-rendered runs around, so it is written against this trait instead
//! of against [`Node`] directly.

use super::node::Node;

/// An ordered tree node with parent and sibling navigation.
pub trait TreeNode: Clone + PartialEq {
    fn parent(&self) -> Option<Self>;

    fn children(&self) -> Vec<Self>;

    fn next_sibling(&self) -> Option<Self>;

    /// Position among the parent's children.
    fn index_in_parent(&self) -> Option<usize>;

    /// Whether this is a comment node with exactly `data` as its text.
    fn is_comment_with(&self, data: &str) -> bool;

    /// Insert `child` before `reference` among this node's children.
    fn insert_before(&self, child: &Self, reference: &Self);

    fn remove(&self);
}

impl TreeNode for Node {
    fn parent(&self) -> Option<Self> {
        Node::parent(self)
    }

    fn children(&self) -> Vec<Self> {
        Node::children(self)
    }

    fn next_sibling(&self) -> Option<Self> {
        Node::next_sibling(self)
    }

    fn index_in_parent(&self) -> Option<usize> {
        Node::index_in_parent(self)
    }

    fn is_comment_with(&self, data: &str) -> bool {
        Node::is_comment_with(self, data)
    }

    fn insert_before(&self, child: &Self, reference: &Self) {
        Node::insert_before(self, child, Some(reference));
    }

    fn remove(&self) {
        Node::remove(self);
    }
}
