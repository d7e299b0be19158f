//! Purpose: Regression coverage for parse-failure category mapping.
//! Exports: Integration tests only.
//! Role: Verify stable category labels used in malformed-configuration log lines.
//! Invariants: Category mapping remains deterministic for representative errors.
//! Invariants: Tests avoid payload leakage; assertions target category/hint text only.
//! Notes: Uses source include to exercise internal helper logic without widening API surface.

#[path = "../src/json/parse.rs"]
mod parse;

use parse::ParseFailureCategory;
use serde_json::Value;

#[test]
fn category_mapping_handles_syntax_and_eof_errors() {
    let syntax_err = parse::from_slice::<Value>(br#"{"a":}"#).unwrap_err();
    assert_eq!(
        parse::categorize_error(&syntax_err),
        ParseFailureCategory::Syntax
    );

    let eof_err = parse::from_slice::<Value>(br#"{"name":"#).unwrap_err();
    assert_eq!(parse::categorize_error(&eof_err), ParseFailureCategory::Eof);
}

#[test]
fn category_mapping_handles_invalid_utf8_and_shape_errors() {
    let utf8_err = parse::from_slice::<Value>(&[b'"', 0xff, b'"']).unwrap_err();
    assert_eq!(
        parse::categorize_error(&utf8_err),
        ParseFailureCategory::Syntax
    );

    let shape_err = parse::from_slice::<Vec<String>>(br#"{"name":"x"}"#).unwrap_err();
    assert_eq!(parse::categorize_error(&shape_err), ParseFailureCategory::Data);
}

#[test]
fn hint_contains_category_context_and_position() {
    let err = parse::from_slice::<Value>(b"{\n  \"plugincfg\": [,]\n}").unwrap_err();
    let hint = parse::hint_for_error(&err, "plugin configuration");
    assert!(hint.contains("parse category: syntax"), "{hint}");
    assert!(hint.contains("context: plugin configuration"), "{hint}");
    assert!(hint.contains("line 2"), "{hint}");
}

#[test]
fn hint_never_echoes_document_content() {
    let err = parse::from_slice::<Value>(br#"{"secret-token": nope}"#).unwrap_err();
    let hint = parse::hint_for_error(&err, "test.context");
    assert!(!hint.contains("secret-token"));
    assert!(!hint.contains("nope"));
}
