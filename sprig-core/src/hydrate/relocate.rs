//! Children relocation.
//!
//! A component that forwards its children may place them anywhere in its
//! output. On the server the children were rendered in place, bracketed by
//! the children markers; on the client the component received a single
//! placeholder comment instead. Hydration keeps the server-rendered children
//! (they may contain islands of their own) by moving that run of nodes to
//! wherever the placeholder ended up.
//!
//! The placeholder's position is described as a path of child indices from
//! its top-level ancestor. Server and client trees have the same shape up to
//! the placeholder, so the same path leads to the children opener in the
//! server tree.

use smallvec::SmallVec;

use crate::dom::TreeNode;

/// Child indices from a top-level node down to a descendant.
pub type TreePath = SmallVec<[usize; 8]>;

/// The top-level ancestor of `node` and the path from it to `node`.
pub fn path_from_root<N: TreeNode>(node: &N) -> (N, TreePath) {
    let mut path = TreePath::new();
    let mut current = node.clone();
    while let Some(parent) = current.parent() {
        // A node always appears among its parent's children.
        path.push(current.index_in_parent().unwrap_or_default());
        current = parent;
    }
    path.reverse();
    (current, path)
}

/// Follow `path` down from `root`.
pub fn resolve_path<N: TreeNode>(root: &N, path: &[usize]) -> Option<N> {
    let mut current = root.clone();
    for &index in path {
        current = current.children().get(index)?.clone();
    }
    Some(current)
}

/// The run from `opener` through its matching closer, both included.
///
/// Nested runs with the same markers are skipped over. Returns `None` when
/// `opener` is not an opener or the run is never closed.
pub fn sibling_run<N: TreeNode>(opener: &N, open: &str, close: &str) -> Option<Vec<N>> {
    if !opener.is_comment_with(open) {
        return None;
    }
    let mut run = vec![opener.clone()];
    let mut depth = 1usize;
    let mut next = opener.next_sibling();
    while let Some(node) = next {
        if node.is_comment_with(open) {
            depth += 1;
        } else if node.is_comment_with(close) {
            depth -= 1;
        }
        next = node.next_sibling();
        run.push(node);
        if depth == 0 {
            return Some(run);
        }
    }
    None
}

/// Top-level variant of [`sibling_run`]: the run inside a node list.
pub fn list_run<N: TreeNode>(nodes: &[N], start: usize, open: &str, close: &str) -> Option<Vec<N>> {
    if !nodes.get(start)?.is_comment_with(open) {
        return None;
    }
    let mut depth = 0usize;
    for (offset, node) in nodes[start..].iter().enumerate() {
        if node.is_comment_with(open) {
            depth += 1;
        } else if node.is_comment_with(close) {
            depth -= 1;
            if depth == 0 {
                return Some(nodes[start..=start + offset].to_vec());
            }
        }
    }
    None
}

/// Put `run` where `placeholder` is and take the placeholder out.
pub fn move_run<N: TreeNode>(run: &[N], placeholder: &N) {
    let Some(parent) = placeholder.parent() else {
        return;
    };
    for node in run {
        parent.insert_before(node, placeholder);
    }
    placeholder.remove();
}
