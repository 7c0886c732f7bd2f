//! Serializer for patch values — produces block-style YAML for insertions
//! into block context and JSON-compatible flow text for flow context.

use serde_json::Value;

/// One logical indent step.
pub const INDENT: &str = "  ";

/// Block-style rendering: sequences as `- ` lines, mappings as `key:`
/// lines, scalars as their flow lexeme. Empty containers stay inline.
pub fn stringify_block(value: &Value) -> String {
    match value {
        Value::Array(items) if !items.is_empty() => {
            let lines: Vec<String> = items.iter().map(stringify_block_sequence_item).collect();
            lines.join("\n")
        }
        Value::Object(map) if !map.is_empty() => {
            let lines: Vec<String> = map
                .iter()
                .map(|(k, v)| stringify_block_mapping_pair(k, v))
                .collect();
            lines.join("\n")
        }
        _ => stringify_flow(value),
    }
}

/// Flow rendering is exactly the compact JSON encoding, which is valid
/// YAML flow syntax.
pub fn stringify_flow(value: &Value) -> String {
    value.to_string()
}

/// A `- ` sequence entry. Containers continue on the dash line and hang
/// under it; multiline strings get a literal block scalar.
pub fn stringify_block_sequence_item(value: &Value) -> String {
    match value {
        Value::Array(_) | Value::Object(_) => {
            format!("- {}", indent_block(&stringify_block(value), INDENT))
        }
        Value::String(s) if s.ends_with('\n') => format!("- |\n{}", indent(s, INDENT)),
        Value::String(s) if s.contains('\n') => format!("- |-\n{}", indent(s, INDENT)),
        Value::String(s) if !plain_safe(s) => format!("- {}", stringify_flow(value)),
        Value::String(s) => format!("- {s}"),
        Value::Null => "- ".to_string(),
        _ => format!("- {}", stringify_block(value)),
    }
}

/// A `key: value` mapping entry. Non-empty mappings nest one step under
/// the key; sequences sit at the key's own indent (both are valid, this
/// matches the common hand-written shape).
pub fn stringify_block_mapping_pair(key: &str, value: &Value) -> String {
    let key = render_key(key);
    match value {
        Value::Array(items) if !items.is_empty() => {
            format!("{key}:\n{}", stringify_block(value))
        }
        Value::Object(map) if !map.is_empty() => {
            format!("{key}:\n{}", indent(&stringify_block(value), INDENT))
        }
        Value::Array(_) | Value::Object(_) => format!("{key}: {}", stringify_flow(value)),
        Value::String(s) if s.ends_with('\n') => format!("{key}: |\n{}", indent(s, INDENT)),
        Value::String(s) if s.contains('\n') => format!("{key}: |-\n{}", indent(s, INDENT)),
        Value::String(s) if !plain_safe(s) => format!("{key}: {}", stringify_flow(value)),
        Value::String(s) => format!("{key}: {s}"),
        Value::Null => format!("{key}:"),
        _ => format!("{key}: {}", stringify_block(value)),
    }
}

/// Prefix every line with `indentation`. Trailing newlines are dropped,
/// matching line-splitting semantics.
pub fn indent(text: &str, indentation: &str) -> String {
    let lines: Vec<String> = text.lines().map(|line| format!("{indentation}{line}")).collect();
    lines.join("\n")
}

/// Prefix every line except the first, for text continuing after a `- `
/// bullet or a `key: ` prefix that already establishes the column.
pub fn indent_block(text: &str, indentation: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines.join(&format!("\n{indentation}"))
}

/// Keys pass through when they are safe plain scalars or carry their own
/// quotes from the source; anything else is flow-quoted.
pub fn render_key(key: &str) -> String {
    let bytes = key.as_bytes();
    let self_quoted = key.len() >= 2
        && (bytes[0] == b'\'' || bytes[0] == b'"')
        && bytes[bytes.len() - 1] == bytes[0];
    if self_quoted || plain_safe(key) {
        key.to_string()
    } else {
        stringify_flow(&Value::String(key.to_string()))
    }
}

/// Whether a string can be written as a plain scalar and still read back
/// as the same string. Deliberately conservative: quoting a safe string
/// is harmless, the reverse is not.
fn plain_safe(s: &str) -> bool {
    let Some(&first) = s.as_bytes().first() else {
        return false;
    };
    if matches!(
        first,
        b'-' | b'?' | b':' | b',' | b'[' | b']' | b'{' | b'}' | b'#' | b'&' | b'*' | b'!'
            | b'|' | b'>' | b'\'' | b'"' | b'%' | b'@' | b'`' | b' ' | b'\t'
    ) {
        return false;
    }
    if s.ends_with(' ') || s.ends_with('\t') || s.ends_with(':') {
        return false;
    }
    if s.contains(": ") || s.contains(" #") || s.contains('\n') || s.contains('\t') {
        return false;
    }
    // strings that would re-parse as a different scalar type
    if matches!(
        s,
        "null" | "Null" | "NULL" | "~" | "true" | "True" | "TRUE" | "false" | "False" | "FALSE"
    ) {
        return false;
    }
    s.parse::<f64>().is_err()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn scalars_render_as_flow_lexemes() {
        assert_eq!(stringify_block(&json!(null)), "null");
        assert_eq!(stringify_block(&json!(true)), "true");
        assert_eq!(stringify_block(&json!(42)), "42");
        assert_eq!(stringify_block(&json!("plain")), "plain");
    }

    #[test]
    fn sequences_render_as_bullet_lines() {
        assert_eq!(stringify_block(&json!([1, "a"])), "- 1\n- a");
    }

    #[test]
    fn mappings_render_as_key_lines() {
        assert_eq!(stringify_block(&json!({"a": 1, "b": "x"})), "a: 1\nb: x");
    }

    #[test]
    fn nested_containers_hang_under_their_entry() {
        assert_eq!(
            stringify_block(&json!({"a": {"b": 1}})),
            "a:\n  b: 1"
        );
        assert_eq!(
            stringify_block(&json!({"a": [1, 2]})),
            "a:\n- 1\n- 2"
        );
        assert_eq!(
            stringify_block(&json!([[1], {"k": 2}])),
            "- - 1\n- k: 2"
        );
    }

    #[test]
    fn empty_containers_stay_inline() {
        assert_eq!(stringify_block(&json!([])), "[]");
        assert_eq!(stringify_block(&json!({})), "{}");
        assert_eq!(stringify_block(&json!({"a": []})), "a: []");
        assert_eq!(stringify_block_sequence_item(&json!({})), "- {}");
    }

    #[test]
    fn multiline_strings_get_literal_style() {
        assert_eq!(
            stringify_block_mapping_pair("a", &json!("one\ntwo\n")),
            "a: |\n  one\n  two"
        );
        assert_eq!(
            stringify_block_mapping_pair("a", &json!("one\ntwo")),
            "a: |-\n  one\n  two"
        );
        assert_eq!(
            stringify_block_sequence_item(&json!("one\ntwo\n")),
            "- |\n  one\n  two"
        );
    }

    #[test]
    fn null_entries_have_no_value_text() {
        assert_eq!(stringify_block_mapping_pair("a", &json!(null)), "a:");
        assert_eq!(stringify_block_sequence_item(&json!(null)), "- ");
    }

    #[test]
    fn risky_strings_are_flow_quoted() {
        assert_eq!(stringify_block(&json!("true")), "\"true\"");
        assert_eq!(stringify_block(&json!("123")), "\"123\"");
        assert_eq!(stringify_block(&json!("- not a list")), "\"- not a list\"");
        assert_eq!(stringify_block(&json!("a: b")), "\"a: b\"");
        assert_eq!(stringify_block(&json!("say \"hi\"")), "\"say \\\"hi\\\"\"");
        assert_eq!(stringify_block(&json!("")), "\"\"");
    }

    #[test]
    fn risky_keys_are_flow_quoted() {
        assert_eq!(
            stringify_block_mapping_pair("a b:c", &json!(1)),
            "a b:c: 1"
        );
        assert_eq!(
            stringify_block_mapping_pair("a: b", &json!(1)),
            "\"a: b\": 1"
        );
        assert_eq!(stringify_block_mapping_pair("'q'", &json!(1)), "'q': 1");
    }

    #[test]
    fn indent_helpers() {
        assert_eq!(indent("a\nb", "  "), "  a\n  b");
        assert_eq!(indent_block("a\nb", "  "), "a\n  b");
        assert_eq!(indent("a\nb\n", "  "), "  a\n  b");
    }
}
