use serde_json::Value;
use thiserror::Error;

/// Everything that can go wrong between reading a patch and writing the
/// rewritten document.
#[derive(Debug, Error)]
pub enum GraftError {
    /// A pointer is not `""` and does not start with `/`, or contains a
    /// `~` escape other than `~0` / `~1`.
    #[error("invalid JSON pointer {pointer:?}")]
    PointerSyntax { pointer: String },

    /// A pointer segment matched nothing at its resolution step.
    #[error("path not found: {path}")]
    PathNotFound { path: String },

    /// A resolution step that requires a unique node found more than one.
    /// Indicates a grammar or document anomaly.
    #[error("ambiguous path: {path}")]
    AmbiguousPath { path: String },

    /// The compiler or reader reached a node type it has no rule for.
    #[error("unsupported node type {kind:?}")]
    UnsupportedNode { kind: String },

    /// A scalar's text does not parse under its node type.
    #[error("invalid scalar {text:?}")]
    InvalidScalar { text: String },

    /// A `test` operation's path is absent or its value does not match.
    #[error("test failed at {path}: expected {expected}")]
    TestFailed { path: String, expected: Value },

    /// An operation object is missing a required member, has an unknown
    /// `op`, or is otherwise unusable.
    #[error("malformed patch: {0}")]
    MalformedPatch(String),

    /// The source text could not be parsed as YAML.
    #[error("could not parse source document")]
    Parse,

    #[error("tree-sitter grammar error: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}
