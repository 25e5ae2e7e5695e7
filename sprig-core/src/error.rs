//! Error types
//!
//! Every fallible public operation in the crate returns one of these enums.
//! Programmer errors that have no sensible recovery (calling
//! [`use_on_destroy`](crate::reactive::use_on_destroy) outside a render) panic
//! instead and document it.

use thiserror::Error;

/// Errors raised while walking a renderable tree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A destroy callback was registered while no render scope was active.
    #[error("on-destroy callback registered outside of a render scope")]
    NoCaptureContext,

    /// A context value was consumed while no render scope was active.
    #[error("context consumed outside of a render scope")]
    NoRenderContext,

    /// A single node was expected but the render produced a different count.
    #[error("expected exactly one rendered node, found {found}")]
    ExpectedSingleNode { found: usize },
}

/// Errors raised by the HTML fragment parser.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unterminated comment starting at byte {offset}")]
    UnterminatedComment { offset: usize },

    #[error("unterminated tag starting at byte {offset}")]
    UnterminatedTag { offset: usize },

    #[error("unterminated attribute value at byte {offset}")]
    UnterminatedAttribute { offset: usize },

    #[error("closing tag </{found}> does not match open element <{expected}>")]
    MismatchedClose { expected: String, found: String },

    #[error("closing tag </{found}> has no open element")]
    UnexpectedClose { found: String },

    #[error("element <{name}> was never closed")]
    UnclosedElement { name: String },
}

/// Errors raised while hydrating a server-rendered island.
#[derive(Debug, Error)]
pub enum HydrationError {
    /// No component is registered under the island's name.
    #[error("unknown component `{name}`")]
    UnknownComponent { name: String },

    /// The component loader failed.
    #[error("failed to load component `{name}`: {message}")]
    Load { name: String, message: String },

    /// The info comment following a start marker is not valid JSON.
    #[error("invalid island info comment: {0}")]
    InvalidInfo(#[from] serde_json::Error),

    /// Server and client renders disagree on the number of top-level nodes.
    #[error(
        "component `{name}` rendered {client} node(s) on the client but the server rendered {server}"
    )]
    NodeCountMismatch {
        name: String,
        server: usize,
        client: usize,
    },

    /// The client render placed the children placeholder where the server
    /// markup has no children run.
    #[error("component `{name}` has no server-rendered children at the placeholder position")]
    MissingChildren { name: String },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration value `{field}` must not be empty")]
    Empty { field: &'static str },
}
