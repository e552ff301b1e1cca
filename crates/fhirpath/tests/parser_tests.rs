//! End-to-end parser scenarios: strict-mode errors, recovery mode, and range
//! tracking, exercised through [`fhirpath::parser::parse`] directly rather
//! than through the engine (so a malformed expression can be inspected
//! without also running the evaluator).

use fhirpath::parser::{parse, ParserOptions};
use fhirpath::source::SourceMap;
use fhirpath::{ast::ExprKind, diagnostics::DiagnosticCode};

#[test]
fn strict_mode_throws_on_the_first_error() {
    let err = parse("Patient..name", &ParserOptions::default()).unwrap_err();
    assert_eq!(err.code, DiagnosticCode::InvalidOperator);
}

#[test]
fn recovery_mode_returns_a_partial_ast_with_one_diagnostic() {
    let options = ParserOptions { error_recovery: true, throw_on_error: false, ..ParserOptions::default() };
    let result = parse("Patient..name", &options).expect("recovery mode never throws");
    assert!(result.is_partial);
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, DiagnosticCode::InvalidOperator);
    match result.ast.kind {
        ExprKind::Binary { op: fhirpath::ast::BinaryOp::Path, .. } => {}
        other => panic!("expected a Path node to survive recovery, got {other:?}"),
    }
}

#[test]
fn diagnostic_mode_without_recovery_still_reports_but_does_not_throw() {
    let options = ParserOptions { error_recovery: false, throw_on_error: false, ..ParserOptions::default() };
    let result = parse("Patient..name", &options).expect("diagnostic mode never throws");
    assert!(!result.diagnostics.is_empty());
}

#[test]
fn track_ranges_lets_every_node_round_trip_through_its_source_text() {
    let options = ParserOptions { track_ranges: true, ..ParserOptions::default() };
    let src = "name.given.first()";
    let result = parse(src, &options).unwrap();
    let map = SourceMap::new(src);
    let text = map.range_text(src, result.ast.range.expect("ranges were requested"));
    let reparsed = parse(text, &ParserOptions::default()).unwrap();
    assert_eq!(format!("{:?}", reparsed.ast.kind), format!("{:?}", result.ast.kind));
}

#[test]
fn unclosed_parenthesis_is_a_distinct_diagnostic_code() {
    let options = ParserOptions { error_recovery: true, throw_on_error: false, ..ParserOptions::default() };
    let result = parse("(1 + 2", &options).unwrap();
    assert!(result.diagnostics.iter().any(|d| d.code == DiagnosticCode::UnclosedParenthesis));
}

#[test]
fn keywords_are_reclassified_as_identifiers_immediately_after_a_dot() {
    let result = parse("Patient.contains", &ParserOptions::default()).unwrap();
    assert!(result.diagnostics.is_empty());
}
