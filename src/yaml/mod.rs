//! Format-preserving JSON Patch over YAML source text.
//!
//! The pipeline: parse the source into a concrete syntax tree, compile
//! each patch operation into byte-range edits against the original text,
//! then splice the edits in reverse offset order. Comments, indentation,
//! quoting, and block/flow choices of untouched regions survive because
//! untouched bytes are never re-serialized.

pub mod compile;
pub mod read;
pub mod write;

use crate::edit::apply_edits;
use crate::error::GraftError;
use crate::patch::PatchOperation;
use crate::tree::Document;

/// Apply an RFC 6902 patch to YAML source, returning the rewritten text.
///
/// Operations are compiled against the original parse tree in order; the
/// first failure aborts the batch and nothing is applied.
pub fn apply_patch(source: &str, ops: &[PatchOperation]) -> Result<String, GraftError> {
    let doc = Document::parse(source)?;
    let edits = compile::compile(&doc, ops)?;
    Ok(apply_edits(&doc.text, edits))
}
