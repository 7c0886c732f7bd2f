//! Value Reader — converts a CST subtree into its logical JSON value.
//!
//! Used to resolve `move`/`copy` sources and `test` comparisons. Reading
//! is lossy by design: formatting, comments, and anchors disappear; only
//! the data model survives.

use serde_json::{Map, Number, Value};
use tree_sitter::Node;

use crate::error::GraftError;
use crate::tree::{self, Document};

/// Read a node as a JSON value by dispatching on its grammar type.
pub fn read_value(doc: &Document, node: Node) -> Result<Value, GraftError> {
    match node.kind() {
        // Wrapper nodes recurse into their single meaningful child. A
        // wrapper with no content (empty stream, `- ` item) reads as null.
        "stream" | "document" | "block_node" | "flow_node" | "flow_scalar" | "plain_scalar"
        | "block_sequence_item" => {
            let children = tree::meaningful_children(node);
            if children.is_empty() {
                return Ok(Value::Null);
            }
            let child = tree::single(children, node.kind())?;
            read_value(doc, child)
        }
        "block_mapping" => {
            let mut map = Map::new();
            for pair in tree::children_of_kind(node, "block_mapping_pair") {
                let (key, value) = read_pair(doc, pair)?;
                map.insert(key, value);
            }
            Ok(Value::Object(map))
        }
        "flow_mapping" => {
            let mut map = Map::new();
            for pair in tree::children_of_kind(node, "flow_pair") {
                let (key, value) = read_pair(doc, pair)?;
                map.insert(key, value);
            }
            Ok(Value::Object(map))
        }
        "block_sequence" => {
            let items = tree::children_of_kind(node, "block_sequence_item");
            items.into_iter().map(|item| read_value(doc, item)).collect()
        }
        "flow_sequence" => {
            let mut out = Vec::new();
            for child in tree::meaningful_children(node) {
                if child.kind() == "flow_pair" {
                    // `[a: b]`: a single-pair mapping as a sequence element
                    let (key, value) = read_pair(doc, child)?;
                    let mut map = Map::new();
                    map.insert(key, value);
                    out.push(Value::Object(map));
                } else {
                    out.push(read_value(doc, child)?);
                }
            }
            Ok(Value::Array(out))
        }
        "null_scalar" => Ok(Value::Null),
        "boolean_scalar" => match doc.node_text(node) {
            "true" | "True" | "TRUE" => Ok(Value::Bool(true)),
            "false" | "False" | "FALSE" => Ok(Value::Bool(false)),
            text => Err(GraftError::InvalidScalar { text: text.to_string() }),
        },
        "integer_scalar" => {
            let text = doc.node_text(node);
            if let Ok(n) = text.parse::<i64>() {
                Ok(Value::Number(n.into()))
            } else if let Ok(n) = text.parse::<u64>() {
                Ok(Value::Number(n.into()))
            } else {
                Err(GraftError::InvalidScalar { text: text.to_string() })
            }
        }
        "float_scalar" => {
            let text = doc.node_text(node);
            let parsed = text
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .ok_or_else(|| GraftError::InvalidScalar { text: text.to_string() })?;
            Ok(Value::Number(parsed))
        }
        "string_scalar" => Ok(Value::String(doc.node_text(node).to_string())),
        "single_quote_scalar" => {
            let inner = strip_quotes(doc.node_text(node));
            Ok(Value::String(inner.replace("''", "'")))
        }
        "double_quote_scalar" => {
            let inner = strip_quotes(doc.node_text(node));
            Ok(Value::String(unescape_double_quoted(inner)?))
        }
        "block_scalar" => decode_block_scalar(doc.node_text(node)),
        kind => Err(GraftError::UnsupportedNode { kind: kind.to_string() }),
    }
}

/// Read a mapping pair's key and value. A pair without a `value` field
/// reads as null.
fn read_pair(doc: &Document, pair: Node) -> Result<(String, Value), GraftError> {
    let key_node = tree::single(tree::field(pair, "key"), pair.kind())?;
    let key = match read_value(doc, key_node)? {
        Value::String(s) => s,
        // non-string scalar keys keep their source spelling
        _ => doc.node_text(key_node).trim().to_string(),
    };
    let value = match tree::field(pair, "value").into_iter().next() {
        Some(value_node) => read_value(doc, value_node)?,
        None => Value::Null,
    };
    Ok((key, value))
}

fn strip_quotes(text: &str) -> &str {
    if text.len() >= 2 {
        &text[1..text.len() - 1]
    } else {
        text
    }
}

fn unescape_double_quoted(text: &str) -> Result<String, GraftError> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('b') => out.push('\u{0008}'),
            Some('f') => out.push('\u{000C}'),
            Some('v') => out.push('\u{000B}'),
            Some('0') => out.push('\0'),
            Some('x') => out.push(hex_escape(&mut chars, 2, text)?),
            Some('u') | Some('U') => out.push(hex_escape(&mut chars, 4, text)?),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    Ok(out)
}

fn hex_escape(
    chars: &mut std::str::Chars<'_>,
    digits: usize,
    original: &str,
) -> Result<char, GraftError> {
    let hex: String = chars.take(digits).collect();
    if hex.len() != digits {
        return Err(GraftError::InvalidScalar { text: original.to_string() });
    }
    u32::from_str_radix(&hex, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| GraftError::InvalidScalar { text: original.to_string() })
}

/// Decode `|`, `|-`, `>`, `>-` block scalars: strip the header line and
/// the indentation established by the first content line, then join.
fn decode_block_scalar(text: &str) -> Result<Value, GraftError> {
    let (header, body) = match text.split_once('\n') {
        Some(split) => split,
        None => (text, ""),
    };
    let header = header.as_bytes();
    let fold = match header.first() {
        Some(b'|') => false,
        Some(b'>') => true,
        _ => return Err(GraftError::InvalidScalar { text: text.to_string() }),
    };
    let strip_final_newline = header.get(1) == Some(&b'-');

    let indent_len = body.bytes().take_while(|&b| b == b' ' || b == b'\t').count();
    let indentation = &body[..indent_len];
    let lines: Vec<&str> = body
        .lines()
        .map(|line| line.strip_prefix(indentation).unwrap_or(line))
        .collect();

    let mut joined = lines.join(if fold { " " } else { "\n" });
    if !strip_final_newline {
        joined.push('\n');
    }
    Ok(Value::String(joined))
}
