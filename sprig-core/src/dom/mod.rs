//! Document Model
//!
//! An in-process node tree standing in for the browser DOM: the client
//! renderer builds it, the parser reads server markup into it, and
//! hydration rewires it.
//!
//! # Modules
//!
//! - `node`: nodes with reference identity and parent/sibling links
//! - `parse`: HTML fragment parser for server output
//! - `serialize`: HTML serializer matching the server renderer's format
//! - `tree`: the [`TreeNode`] navigation trait used by hydration

mod node;
mod parse;
mod serialize;
mod tree;

pub use node::{Event, EventHandler, Node, NodeId, NodeKind};
pub use parse::{decode_entities, parse_fragment};
pub use serialize::{is_void, parse_style, style_text, VOID_ELEMENTS};
pub use tree::TreeNode;
