//! graft — format-preserving [JSON Patch (RFC 6902)] for YAML documents.
//!
//! A patch addresses the logical JSON data model, but the edit is realized
//! as a minimal byte-level rewrite of the source text: comments,
//! indentation style, quoting, blank lines, and the block/flow choice of
//! every untouched container survive.
//!
//! ```
//! use graft::{apply_patch, parse_patch};
//!
//! let ops = parse_patch(r#"[{ "op": "replace", "path": "/a/b", "value": 2 }]"#).unwrap();
//! let out = apply_patch("a:\n  b: 1 # note\n", &ops).unwrap();
//! assert_eq!(out, "a:\n  b: 2 # note\n");
//! ```
//!
//! The pipeline is parse → compile → apply: the source parses into a
//! tree-sitter concrete syntax tree, each operation compiles into
//! byte-range edits against the original buffer, and the edits are spliced
//! in reverse offset order.
//!
//! [JSON Patch (RFC 6902)]: https://tools.ietf.org/html/rfc6902

pub mod cli;
pub mod edit;
pub mod error;
pub mod patch;
pub mod tree;
pub mod yaml;

pub use error::GraftError;
pub use patch::{parse_patch, PatchOperation, Pointer};
pub use yaml::apply_patch;
