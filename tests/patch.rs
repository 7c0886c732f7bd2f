//! End-to-end patching scenarios, checked both textually and semantically.
//!
//! Semantic assertions decode the rewritten document with `serde_yaml` and
//! compare against the value the patch should produce: the output must
//! stay a faithful YAML encoding of the patched data model no matter how
//! the text was spliced.

use graft::{apply_patch, parse_patch, GraftError};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn apply(source: &str, patch: &str) -> String {
    apply_patch(source, &parse_patch(patch).unwrap()).unwrap()
}

fn decode(text: &str) -> Value {
    serde_yaml::from_str(text).unwrap()
}

#[test]
fn scalar_replace_preserves_indentation() {
    let out = apply("a:\n  b: 1\n", r#"[{"op":"replace","path":"/a/b","value":2}]"#);
    assert_eq!(out, "a:\n  b: 2\n");
}

#[test]
fn inline_comment_preserved_on_replace() {
    let out = apply("a: 1 # keep\n", r#"[{"op":"replace","path":"/a","value":2}]"#);
    let line = out.lines().next().unwrap();
    assert!(line.contains("a: 2"), "missing new value in {out:?}");
    assert!(line.contains("# keep"), "comment lost in {out:?}");
}

#[test]
fn add_to_block_mapping_appends_at_end() {
    let out = apply("a: 1\n", r#"[{"op":"add","path":"/b","value":2}]"#);
    assert_eq!(out, "a: 1\nb: 2\n");
}

#[test]
fn remove_sole_item_collapses_to_empty_sequence() {
    let out = apply("a:\n  - 1\n", r#"[{"op":"remove","path":"/a/0"}]"#);
    assert_eq!(decode(&out), json!({"a": []}));
}

#[test]
fn remove_sole_pair_collapses_to_empty_mapping() {
    let out = apply("a:\n  b: 1\n", r#"[{"op":"remove","path":"/a/b"}]"#);
    assert_eq!(decode(&out), json!({"a": {}}));
}

#[test]
fn failed_test_reports_the_path() {
    let ops = parse_patch(r#"[{"op":"test","path":"/a","value":2}]"#).unwrap();
    match apply_patch("a: 1\n", &ops) {
        Err(GraftError::TestFailed { path, expected }) => {
            assert_eq!(path, "/a");
            assert_eq!(expected, json!(2));
        }
        other => panic!("expected TestFailed, got {other:?}"),
    }
}

#[test]
fn multiline_string_gets_literal_style() {
    let out = apply("a: x\n", r#"[{"op":"replace","path":"/a","value":"one\ntwo\n"}]"#);
    assert!(out.contains("a: |"), "no literal header in {out:?}");
    assert_eq!(decode(&out), json!({"a": "one\ntwo\n"}));
}

#[test]
fn patched_documents_stay_semantically_correct() {
    // (source, patch, expected decoded value)
    let cases: &[(&str, &str, Value)] = &[
        (
            "a:\n  b: 1\nc:\n  - x\n  - y\n",
            r#"[{"op":"add","path":"/c/1","value":"mid"}]"#,
            json!({"a": {"b": 1}, "c": ["x", "mid", "y"]}),
        ),
        (
            "a:\n  b: 1\nc: 2\n",
            r#"[{"op":"remove","path":"/c"}]"#,
            json!({"a": {"b": 1}}),
        ),
        (
            "servers:\n  - host: alpha\n  - host: beta\n",
            r#"[{"op":"replace","path":"/servers/1/host","value":"gamma"}]"#,
            json!({"servers": [{"host": "alpha"}, {"host": "gamma"}]}),
        ),
        (
            "a: {x: 1}\nb: [1, 2]\n",
            r#"[{"op":"add","path":"/a/y","value":2}]"#,
            json!({"a": {"x": 1, "y": 2}, "b": [1, 2]}),
        ),
        (
            "a: 1\n",
            r#"[{"op":"add","path":"/b","value":{"deep":{"list":[1,2]}}}]"#,
            json!({"a": 1, "b": {"deep": {"list": [1, 2]}}}),
        ),
        (
            "a: 1\nb: 2\n",
            r#"[{"op":"move","from":"/a","path":"/c"}]"#,
            json!({"b": 2, "c": 1}),
        ),
        (
            "a:\n  - 1\n  - 2\n",
            r#"[{"op":"copy","from":"/a","path":"/b"}]"#,
            json!({"a": [1, 2], "b": [1, 2]}),
        ),
    ];
    for (source, patch, expected) in cases {
        let out = apply(source, patch);
        assert_eq!(&decode(&out), expected, "source {source:?} patch {patch}");
    }
}

#[test]
fn replace_with_same_value_is_value_preserving() {
    let sources = [
        "a: 1\n",
        "a:\n  b: hello\n",
        "a:\n  - 1\n  - two\n",
        "a: {x: 1}\n",
    ];
    let paths = ["/a"];
    for source in sources {
        for path in paths {
            let before = decode(source);
            let value = before.pointer(path).unwrap().clone();
            let patch = json!([{"op": "replace", "path": path, "value": value}]);
            let ops = parse_patch(&patch.to_string()).unwrap();
            let out = apply_patch(source, &ops).unwrap();
            assert_eq!(decode(&out), before, "source {source:?} path {path}");
        }
    }
}

#[test]
fn comment_only_lines_survive_unrelated_edits() {
    let source = "\
# pinned versions, reviewed quarterly
image: app:1.2.3
replicas: 2 # keep in sync with HPA
";
    let out = apply(source, r#"[{"op":"replace","path":"/image","value":"app:1.3.0"}]"#);
    assert!(out.contains("# pinned versions, reviewed quarterly"));
    assert!(out.contains("replicas: 2 # keep in sync with HPA"));
    assert_eq!(
        decode(&out),
        json!({"image": "app:1.3.0", "replicas": 2})
    );
}

#[test]
fn sequential_patches_compose() {
    let source = "\
name: demo
env:
  - FOO=1
settings:
  retries: 3
  timeout: 30
";
    let step1 = apply(source, r#"[{"op":"replace","path":"/settings/retries","value":5}]"#);
    let step2 = apply(&step1, r#"[{"op":"add","path":"/env/-","value":"BAR=2"}]"#);
    let step3 = apply(&step2, r#"[{"op":"remove","path":"/settings/timeout"}]"#);
    assert_eq!(
        decode(&step3),
        json!({
            "name": "demo",
            "env": ["FOO=1", "BAR=2"],
            "settings": {"retries": 5}
        })
    );
    // untouched lines are byte-identical
    assert!(step3.starts_with("name: demo\n"));
}

#[test]
fn test_op_gates_later_operations() {
    let patch = r#"[
        {"op": "test", "path": "/a", "value": 1},
        {"op": "replace", "path": "/a", "value": 2}
    ]"#;
    assert_eq!(apply("a: 1\n", patch), "a: 2\n");

    let ops = parse_patch(patch).unwrap();
    let err = apply_patch("a: 99\n", &ops).unwrap_err();
    assert!(matches!(err, GraftError::TestFailed { .. }));
}

#[test]
fn unresolvable_path_fails_without_output() {
    let ops = parse_patch(r#"[{"op":"replace","path":"/nope","value":1}]"#).unwrap();
    assert!(matches!(
        apply_patch("a: 1\n", &ops),
        Err(GraftError::PathNotFound { .. })
    ));
}

#[test]
fn malformed_source_is_a_parse_error() {
    let ops = parse_patch(r#"[{"op":"add","path":"/a","value":1}]"#).unwrap();
    assert!(matches!(
        apply_patch("a: [1,\n", &ops),
        Err(GraftError::Parse)
    ));
}

#[test]
fn reader_round_trips_serialized_values() {
    // stringify_block . parse . read == identity over the supported subset
    let values = [
        json!(null),
        json!(true),
        json!(42),
        json!("plain"),
        json!("multi\nline\n"),
        json!({"a": 1, "b": ["x", {"c": null}]}),
        json!([]),
        json!({}),
        json!([1, [2, 3], {"k": "v"}]),
    ];
    for value in values {
        let ops = parse_patch(
            &json!([{"op": "replace", "path": "", "value": value}]).to_string(),
        )
        .unwrap();
        let out = apply_patch("placeholder: 1\n", &ops).unwrap();
        assert_eq!(decode(&out), value, "round trip failed for {value}");
    }
}
