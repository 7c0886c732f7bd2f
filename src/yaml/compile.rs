//! Patch Compiler — resolves JSON Pointers to CST nodes and turns each
//! patch operation into byte-range edits against the original text.
//!
//! All offsets refer to the parse-time buffer: every operation is compiled
//! against the unmodified tree and the applicator's reverse-order pass
//! keeps the anchors valid. Indentation, punctuation, and comment handling
//! are computed from the surrounding text, never from the abstract value.

use serde_json::Value;
use tree_sitter::Node;

use crate::edit::Edit;
use crate::error::GraftError;
use crate::patch::{PatchOperation, Pointer};
use crate::tree::{self, Document};

use super::read::read_value;
use super::write::{
    indent, indent_block, render_key, stringify_block, stringify_block_mapping_pair,
    stringify_block_sequence_item, stringify_flow, INDENT,
};

type Selection = (usize, usize);

/// Compile a patch into edits. Operations are processed in order; the
/// first failure aborts the batch with nothing emitted.
pub fn compile(doc: &Document, ops: &[PatchOperation]) -> Result<Vec<Edit>, GraftError> {
    let mut edits = Vec::new();
    for op in ops {
        match op {
            PatchOperation::Add(op) => edits.extend(edit_add(doc, &op.path, &op.value)?),
            PatchOperation::Remove(op) => edits.extend(edit_remove(doc, &op.path)?),
            PatchOperation::Replace(op) => edits.extend(edit_replace(doc, &op.path, &op.value)?),
            PatchOperation::Move(op) => edits.extend(edit_move(doc, &op.from, &op.path)?),
            PatchOperation::Copy(op) => edits.extend(edit_copy(doc, &op.from, &op.path)?),
            PatchOperation::Test(op) => edit_test(doc, &op.path, &op.value)?,
        }
    }
    Ok(edits)
}

// ---------------------------------------------------------------------------
// Pointer resolution

/// Descend through transparent wrapper nodes until a structural node is
/// reached, skipping comments and anchors.
fn converge<'t>(node: Node<'t>, context: &str) -> Result<Node<'t>, GraftError> {
    match node.kind() {
        "stream" | "document" | "block_node" | "flow_node" | "plain_scalar" => {
            let child = tree::single(tree::meaningful_children(node), context)?;
            converge(child, context)
        }
        _ => Ok(node),
    }
}

/// Resolve a pointer from the document root. The empty pointer yields the
/// document's content node.
fn resolve<'t>(doc: &'t Document, pointer: &Pointer) -> Result<Node<'t>, GraftError> {
    resolve_segments(doc, pointer.segments(), pointer)
}

fn resolve_segments<'t>(
    doc: &'t Document,
    segments: &[String],
    pointer: &Pointer,
) -> Result<Node<'t>, GraftError> {
    let mut node = doc.root();
    if node.kind() == "stream" {
        if let Some(child) = tree::meaningful_children(node).into_iter().next() {
            node = child;
        }
    }
    for segment in segments {
        node = resolve_segment(doc, node, segment, pointer)?;
    }
    Ok(node)
}

/// One resolution step: mappings select the pair whose key reads as the
/// segment, sequences index their items, pairs and items fall through to
/// their value side.
fn resolve_segment<'t>(
    doc: &'t Document,
    node: Node<'t>,
    segment: &str,
    pointer: &Pointer,
) -> Result<Node<'t>, GraftError> {
    let context = pointer.to_string();
    let node = converge(node, &context)?;
    match node.kind() {
        "block_mapping" => find_pair(doc, node, "block_mapping_pair", segment, pointer),
        "flow_mapping" => find_pair(doc, node, "flow_pair", segment, pointer),
        "block_sequence" => {
            let items = tree::children_of_kind(node, "block_sequence_item");
            index_into(items, segment, pointer)
        }
        "flow_sequence" => index_into(flow_items(node), segment, pointer),
        "block_mapping_pair" | "flow_pair" => {
            let value = tree::single(tree::field(node, "value"), &context)?;
            resolve_segment(doc, value, segment, pointer)
        }
        "block_sequence_item" => {
            let child = tree::single(tree::meaningful_children(node), &context)?;
            resolve_segment(doc, child, segment, pointer)
        }
        _ => Err(GraftError::PathNotFound { path: context }),
    }
}

fn find_pair<'t>(
    doc: &'t Document,
    mapping: Node<'t>,
    pair_kind: &str,
    segment: &str,
    pointer: &Pointer,
) -> Result<Node<'t>, GraftError> {
    let matches: Vec<Node<'t>> = tree::children_of_kind(mapping, pair_kind)
        .into_iter()
        .filter(|pair| key_matches(doc, *pair, segment))
        .collect();
    tree::single(matches, &pointer.to_string())
}

/// A segment addresses a pair when the pair's key reads as exactly that
/// string. Quoted keys compare by their decoded text.
fn key_matches(doc: &Document, pair: Node, segment: &str) -> bool {
    let Some(key) = tree::field(pair, "key").into_iter().next() else {
        return false;
    };
    matches!(read_value(doc, key), Ok(Value::String(s)) if s == segment)
}

fn index_into<'t>(
    items: Vec<Node<'t>>,
    segment: &str,
    pointer: &Pointer,
) -> Result<Node<'t>, GraftError> {
    let not_found = || GraftError::PathNotFound { path: pointer.to_string() };
    // RFC 6901 forbids leading zeroes in sequence indices
    if segment.len() > 1 && segment.starts_with('0') {
        return Err(not_found());
    }
    let index: usize = segment.parse().map_err(|_| not_found())?;
    items.get(index).copied().ok_or_else(not_found)
}

/// Elements of a flow sequence: the flow nodes between the commas (a bare
/// `key: value` element parses as a flow pair).
fn flow_items<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    tree::meaningful_children(node)
        .into_iter()
        .filter(|c| matches!(c.kind(), "flow_node" | "flow_pair"))
        .collect()
}

// ---------------------------------------------------------------------------
// Text context

/// Whitespace prefix of the line `node` starts on.
fn indentation_of(doc: &Document, node: Node) -> String {
    line_prefix(doc, node).0
}

/// Like `indentation_of`, but a node sitting directly after a sequence
/// bullet gets one extra step: its entries align past the dash.
fn block_indentation_of(doc: &Document, node: Node) -> String {
    let (ws, rest) = line_prefix(doc, node);
    if rest.starts_with('-') {
        format!("{ws}{INDENT}")
    } else {
        ws
    }
}

/// (leading whitespace, remaining text) of the final line before `node`,
/// taken from the nearest ancestor that contains a line break before it.
fn line_prefix(doc: &Document, node: Node) -> (String, String) {
    let start = node.start_byte();
    let mut anc = node;
    while !doc.text[anc.start_byte()..start].contains('\n') {
        match anc.parent() {
            Some(parent) => anc = parent,
            None => break,
        }
    }
    let prefix = &doc.text[anc.start_byte()..start];
    let line_start = memchr::memrchr(b'\n', prefix.as_bytes()).map_or(0, |i| i + 1);
    let line = &prefix[line_start..];
    let ws_len = line.bytes().take_while(|&b| b == b' ' || b == b'\t').count();
    (line[..ws_len].to_string(), line[ws_len..].to_string())
}

/// Text between the start of the smallest ancestor beginning strictly
/// before `node` and the node itself.
fn text_before<'a>(doc: &'a Document, node: Node) -> &'a str {
    let mut anc = node;
    while anc.start_byte() == node.start_byte() {
        match anc.parent() {
            Some(parent) => anc = parent,
            None => break,
        }
    }
    &doc.text[anc.start_byte()..node.start_byte()]
}

/// Text between `node` and the end of the smallest ancestor ending
/// strictly after it.
fn text_after<'a>(doc: &'a Document, node: Node) -> &'a str {
    let mut anc = node;
    while anc.end_byte() == node.end_byte() {
        match anc.parent() {
            Some(parent) => anc = parent,
            None => break,
        }
    }
    &doc.text[node.end_byte()..anc.end_byte()]
}

/// Grow a selection leftward over horizontal whitespace and at most one
/// line break. With `require_newline`, the selection is returned untouched
/// unless a break is actually found.
fn expand_prefix_ws(doc: &Document, node: Node, sel: Selection, require_newline: bool) -> Selection {
    let before = text_before(doc, node).as_bytes();
    let mut i = before.len();
    while i > 0 && matches!(before[i - 1], b' ' | b'\t') {
        i -= 1;
    }
    if i > 0 && before[i - 1] == b'\n' {
        i -= 1;
        while i > 0 && matches!(before[i - 1], b' ' | b'\t') {
            i -= 1;
        }
    } else if require_newline {
        return sel;
    }
    (sel.0 - (before.len() - i), sel.1)
}

/// Grow a selection rightward over horizontal whitespace.
fn expand_suffix_ws(doc: &Document, node: Node, sel: Selection) -> Selection {
    let after = text_after(doc, node);
    let n = after.bytes().take_while(|&b| b == b' ' || b == b'\t').count();
    (sel.0, sel.1 + n)
}

fn line_tail_is_blank_or_comment(s: &str) -> bool {
    let t = s.trim_start_matches([' ', '\t']);
    t.is_empty() || t.starts_with('#')
}

// ---------------------------------------------------------------------------
// replace

fn edit_replace(doc: &Document, path: &Pointer, value: &Value) -> Result<Vec<Edit>, GraftError> {
    let node = resolve(doc, path)?;
    match node.kind() {
        "block_mapping_pair" => {
            let mut selection = (node.start_byte(), node.end_byte());
            let key_node = tree::single(tree::field(node, "key"), &path.to_string())?;
            let key = doc.node_text(key_node);
            let mut text = indent_block(
                &stringify_block_mapping_pair(key, value),
                &block_indentation_of(doc, node),
            );

            // comment captured inside a block scalar value (`key: | # c`)
            let mut comment = block_scalar_comment(doc, node);

            // comment trailing the pair on its first line
            if let Some(sibling) = trailing_comment(node) {
                comment = Some(doc.node_text(sibling).to_string());
                selection.1 = sibling.end_byte();
            }

            if let Some(comment) = comment {
                text = attach_comment(text, &comment);
            }
            if doc.node_text(node).ends_with('\n') {
                text.push('\n');
            }
            Ok(vec![Edit::Replace { start: selection.0, end: selection.1, text }])
        }
        "flow_pair" => {
            let key_node = tree::single(tree::field(node, "key"), &path.to_string())?;
            let text = format!("{}: {}", doc.node_text(key_node), stringify_flow(value));
            Ok(vec![Edit::Replace { start: node.start_byte(), end: node.end_byte(), text }])
        }
        // element of a flow sequence
        "flow_node" => Ok(vec![Edit::Replace {
            start: node.start_byte(),
            end: node.end_byte(),
            text: stringify_flow(value),
        }]),
        "block_sequence_item" => {
            let mut text = indent_block(
                &stringify_block_sequence_item(value),
                &block_indentation_of(doc, node),
            );
            let mut selection = (node.start_byte(), node.end_byte());
            if doc.node_text(node).ends_with('\n') {
                text.push('\n');
            } else {
                // absorb trailing blanks on the item's own line
                selection = expand_suffix_ws(doc, node, selection);
            }
            Ok(vec![Edit::Replace { start: selection.0, end: selection.1, text }])
        }
        // whole-document replacement (empty pointer); "stream" covers the
        // empty source document
        "document" | "stream" => {
            let mut end = node.end_byte();
            if !doc.node_text(node).ends_with('\n') && doc.text[end..].starts_with('\n') {
                end += 1;
            }
            let text = format!("{}\n", stringify_block(value));
            Ok(vec![Edit::Replace { start: node.start_byte(), end, text }])
        }
        kind => Err(GraftError::UnsupportedNode { kind: kind.to_string() }),
    }
}

/// A comment node trailing `node` on the line it starts on, wherever the
/// grammar attached it.
fn trailing_comment(node: Node) -> Option<Node> {
    let mut current = node;
    loop {
        if let Some(next) = current.next_sibling() {
            let same_row = next.start_position().row == node.start_position().row;
            return (next.kind() == "comment" && same_row).then_some(next);
        }
        current = current.parent()?;
    }
}

/// A comment swallowed by a block scalar header (`key: | # c`).
fn block_scalar_comment(doc: &Document, pair: Node) -> Option<String> {
    let value = tree::field(pair, "value").into_iter().next()?;
    let scalar = if value.kind() == "block_scalar" {
        value
    } else {
        tree::children_of_kind(value, "block_scalar").into_iter().next()?
    };
    let comment = tree::children_of_kind(scalar, "comment").into_iter().next()?;
    Some(doc.node_text(comment).to_string())
}

/// Re-attach a comment to the first line of freshly serialized text.
fn attach_comment(mut text: String, comment: &str) -> String {
    match text.find('\n') {
        Some(i) => text.insert_str(i, &format!(" {comment}")),
        None => {
            text.push(' ');
            text.push_str(comment);
        }
    }
    text
}

// ---------------------------------------------------------------------------
// add

fn edit_add(doc: &Document, path: &Pointer, value: &Value) -> Result<Vec<Edit>, GraftError> {
    let Some((parent_segments, key)) = path.split_last() else {
        // RFC 6902: `add` at the root replaces the document
        return edit_replace(doc, path, value);
    };
    let target = resolve_segments(doc, parent_segments, path)?;
    let container = add_container(target, path)?;
    match container.kind() {
        "block_mapping" => {
            let fragment = indent(
                &stringify_block_mapping_pair(key, value),
                &block_indentation_of(doc, container),
            );
            Ok(vec![append_entry(doc, container, fragment)])
        }
        "block_sequence" => {
            let items = tree::children_of_kind(container, "block_sequence_item");
            let index = parse_add_index(key, items.len(), path)?;
            let fragment = stringify_block_sequence_item(value);
            if index == items.len() {
                let fragment = indent(&fragment, &block_indentation_of(doc, container));
                Ok(vec![append_entry(doc, container, fragment)])
            } else {
                // insert before the item currently at the index, re-creating
                // its indentation so the shifted items stay aligned
                let sibling = items[index];
                let indentation = indentation_of(doc, sibling);
                Ok(vec![Edit::Insert {
                    at: sibling.start_byte(),
                    text: format!("{}\n{indentation}", indent_block(&fragment, &indentation)),
                }])
            }
        }
        "flow_mapping" => {
            let entry = format!("{}: {}", render_key(key), stringify_flow(value));
            let pairs = tree::children_of_kind(container, "flow_pair");
            match pairs.last() {
                Some(last) => Ok(vec![Edit::Insert {
                    at: last.end_byte(),
                    text: format!(", {entry}"),
                }]),
                // empty mapping: between the braces, no separator
                None => Ok(vec![Edit::Insert { at: container.start_byte() + 1, text: entry }]),
            }
        }
        "flow_sequence" => {
            let items = flow_items(container);
            let index = parse_add_index(key, items.len(), path)?;
            let rendered = stringify_flow(value);
            let edit = if items.is_empty() {
                Edit::Insert { at: container.start_byte() + 1, text: rendered }
            } else if index == 0 {
                Edit::Insert { at: items[0].start_byte(), text: format!("{rendered}, ") }
            } else {
                Edit::Insert { at: items[index - 1].end_byte(), text: format!(", {rendered}") }
            };
            Ok(vec![edit])
        }
        kind => Err(GraftError::UnsupportedNode { kind: kind.to_string() }),
    }
}

/// Descend from a resolved parent node to the container a new entry goes
/// into.
fn add_container<'t>(node: Node<'t>, pointer: &Pointer) -> Result<Node<'t>, GraftError> {
    let context = pointer.to_string();
    let inner = match node.kind() {
        "block_mapping_pair" | "flow_pair" => tree::single(tree::field(node, "value"), &context)?,
        "block_sequence_item" => tree::single(tree::meaningful_children(node), &context)?,
        _ => node,
    };
    let container = converge(inner, &context)?;
    match container.kind() {
        "block_mapping" | "block_sequence" | "flow_mapping" | "flow_sequence" => Ok(container),
        kind => Err(GraftError::UnsupportedNode { kind: kind.to_string() }),
    }
}

/// The last path segment for an `add` into a sequence: `-` appends, an
/// index up to the current length inserts there.
fn parse_add_index(segment: &str, len: usize, pointer: &Pointer) -> Result<usize, GraftError> {
    if segment == "-" {
        return Ok(len);
    }
    let not_found = || GraftError::PathNotFound { path: pointer.to_string() };
    if segment.len() > 1 && segment.starts_with('0') {
        return Err(not_found());
    }
    let index: usize = segment.parse().map_err(|_| not_found())?;
    if index > len {
        return Err(not_found());
    }
    Ok(index)
}

/// Insert a new entry line at a block container's end. Line breaks come
/// from the surrounding text, so a node span that stops short of its line
/// break (or of a trailing inline comment) still yields a well-formed
/// line.
fn append_entry(doc: &Document, container: Node, fragment: String) -> Edit {
    let end = container.end_byte();
    if doc.node_text(container).ends_with('\n') {
        return Edit::Insert { at: end, text: format!("{fragment}\n") };
    }
    let rest = &doc.text[end..];
    match memchr::memchr(b'\n', rest.as_bytes()) {
        Some(n) if line_tail_is_blank_or_comment(&rest[..n]) => {
            Edit::Insert { at: end + n + 1, text: format!("{fragment}\n") }
        }
        None if line_tail_is_blank_or_comment(rest) => {
            Edit::Insert { at: doc.text.len(), text: format!("\n{fragment}") }
        }
        _ => Edit::Insert { at: end, text: format!("\n{fragment}") },
    }
}

// ---------------------------------------------------------------------------
// remove

fn edit_remove(doc: &Document, path: &Pointer) -> Result<Vec<Edit>, GraftError> {
    let node = resolve(doc, path)?;
    match node.kind() {
        "block_mapping_pair" => {
            if let Some(mapping) = node.parent().filter(|p| p.kind() == "block_mapping") {
                if tree::children_of_kind(mapping, "block_mapping_pair").len() == 1 {
                    return Ok(vec![collapse_container(doc, node, mapping, "{}", false)]);
                }
            }
            Ok(vec![remove_entry(doc, node)])
        }
        "block_sequence_item" => {
            if let Some(sequence) = node.parent().filter(|p| p.kind() == "block_sequence") {
                if tree::children_of_kind(sequence, "block_sequence_item").len() == 1 {
                    return Ok(vec![collapse_container(doc, node, sequence, "[]", true)]);
                }
            }
            Ok(vec![remove_entry(doc, node)])
        }
        "flow_pair" | "flow_node" => Ok(vec![remove_flow_entry(doc, node)]),
        kind => Err(GraftError::UnsupportedNode { kind: kind.to_string() }),
    }
}

/// Removing the sole entry of a block container rewrites the container as
/// its empty flow form, keeping an attached comment and the spacing a
/// surrounding `:` or `-` demands.
fn collapse_container(
    doc: &Document,
    entry: Node,
    container: Node,
    empty_form: &str,
    require_newline: bool,
) -> Edit {
    let mut selection = (container.start_byte(), container.end_byte());
    selection = expand_prefix_ws(doc, entry, selection, require_newline);
    if !doc.node_text(container).ends_with('\n') {
        selection = expand_suffix_ws(doc, entry, selection);
    }

    let mut fragment = empty_form.to_string();

    // keep a comment that textually precedes the entry
    if let Some(prev) = tree::prev_sibling_transitive(entry) {
        if prev.kind() == "comment" {
            fragment = format!("{fragment} {}", doc.node_text(prev));
            selection.0 = selection.0.min(prev.start_byte());
        }
    }

    // a space after the `:` or `-` the container hangs from
    if in_value_position(container) {
        fragment.insert(0, ' ');
    }
    if doc.node_text(container).ends_with('\n') {
        fragment.push('\n');
    }
    Edit::Replace { start: selection.0, end: selection.1, text: fragment }
}

fn in_value_position(container: Node) -> bool {
    container.parent().is_some_and(|wrapper| {
        wrapper.kind() == "block_node"
            && wrapper.parent().is_some_and(|p| {
                matches!(p.kind(), "block_mapping_pair" | "block_sequence_item")
            })
    })
}

/// Remove a block entry together with exactly one line break: the span's
/// own when it carries one, otherwise the preceding break and indentation,
/// falling back to the following break for an entry first on its line.
/// An inline comment on the removed line goes with it.
fn remove_entry(doc: &Document, node: Node) -> Edit {
    let mut selection = (node.start_byte(), node.end_byte());
    if doc.node_text(node).ends_with('\n') {
        // the span owns its break; the line's leading indentation goes too
        let before = text_before(doc, node).as_bytes();
        let ws = before.iter().rev().take_while(|&&b| b == b' ' || b == b'\t').count();
        selection.0 -= ws;
    } else {
        let after = text_after(doc, node);
        let line_end = memchr::memchr(b'\n', after.as_bytes()).unwrap_or(after.len());
        if line_tail_is_blank_or_comment(&after[..line_end]) {
            selection.1 += line_end;
        }
        let expanded = expand_prefix_ws(doc, node, selection, true);
        if expanded.0 < selection.0 {
            selection = expanded;
        } else if after.as_bytes().get(line_end).copied() == Some(b'\n') {
            selection.1 += 1;
        }
    }
    Edit::Remove { start: selection.0, end: selection.1 }
}

/// Remove a flow pair or element plus one neighboring comma: the
/// preceding one, or the following one for the first entry. The sole
/// entry's removal leaves the empty container.
fn remove_flow_entry(doc: &Document, node: Node) -> Edit {
    let mut selection = (node.start_byte(), node.end_byte());
    let before = text_before(doc, node).as_bytes();
    let mut i = before.len();
    while i > 0 && matches!(before[i - 1], b' ' | b'\t') {
        i -= 1;
    }
    if i > 0 && before[i - 1] == b',' {
        i -= 1;
        while i > 0 && matches!(before[i - 1], b' ' | b'\t') {
            i -= 1;
        }
        selection.0 -= before.len() - i;
    } else {
        let after = text_after(doc, node).as_bytes();
        let mut j = 0;
        while j < after.len() && matches!(after[j], b' ' | b'\t') {
            j += 1;
        }
        if after.get(j).copied() == Some(b',') {
            j += 1;
            while j < after.len() && matches!(after[j], b' ' | b'\t') {
                j += 1;
            }
            selection.1 += j;
        }
    }
    Edit::Remove { start: selection.0, end: selection.1 }
}

// ---------------------------------------------------------------------------
// move / copy / test

fn edit_move(doc: &Document, from: &Pointer, path: &Pointer) -> Result<Vec<Edit>, GraftError> {
    if from.contains(path) {
        return Err(GraftError::MalformedPatch(format!(
            "cannot move {from} into its own child {path}"
        )));
    }
    let value = source_value(doc, from)?;
    let mut edits = edit_remove(doc, from)?;
    edits.extend(edit_add(doc, path, &value)?);
    Ok(edits)
}

fn edit_copy(doc: &Document, from: &Pointer, path: &Pointer) -> Result<Vec<Edit>, GraftError> {
    let value = source_value(doc, from)?;
    edit_add(doc, path, &value)
}

/// Materialize the JSON value a `move`/`copy` reads from its `from`
/// pointer.
fn source_value(doc: &Document, from: &Pointer) -> Result<Value, GraftError> {
    let node = resolve(doc, from)?;
    match node.kind() {
        "block_mapping_pair" | "flow_pair" => match tree::field(node, "value").into_iter().next() {
            Some(value_node) => read_value(doc, value_node),
            None => Ok(Value::Null),
        },
        _ => read_value(doc, node),
    }
}

fn edit_test(doc: &Document, path: &Pointer, expected: &Value) -> Result<(), GraftError> {
    let failure = || GraftError::TestFailed {
        path: path.to_string(),
        expected: expected.clone(),
    };
    let Ok(node) = resolve(doc, path) else {
        return Err(failure());
    };
    let actual = match node.kind() {
        "block_mapping_pair" | "flow_pair" => match tree::field(node, "value").into_iter().next() {
            Some(value_node) => read_value(doc, value_node)?,
            None => Value::Null,
        },
        _ => read_value(doc, node)?,
    };
    if actual == *expected {
        Ok(())
    } else {
        Err(failure())
    }
}
