#![allow(dead_code)]

use pointer_spacing::{Descriptor, Diagnostic, analyze_str, fix_str};
use pretty_assertions::assert_eq;

/// Wrap a member in the class used throughout the tests.
pub fn class(member: &str) -> String {
    format!("public class TestClass\n{{\n    {member}\n}}\n")
}

/// Wrap statements in a method body.
pub fn method(body: &str) -> String {
    format!("unsafe class C\n{{\n    void M()\n    {{\n        {body}\n    }}\n}}\n")
}

pub fn run_diagnostics(source: &str) -> Vec<Diagnostic> {
    analyze_str(source).unwrap_or_else(|e| panic!("analysis failed: {e}\n--- source ---\n{source}"))
}

pub fn descriptors(source: &str) -> Vec<Descriptor> {
    run_diagnostics(source).iter().map(|d| d.descriptor).collect()
}

pub fn assert_clean(source: &str) {
    let found = run_diagnostics(source);
    assert!(
        found.is_empty(),
        "expected no diagnostics, got:\n{}\n--- source ---\n{source}",
        found
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    );
}

/// Fix `source` and check that the result is clean.
pub fn run_fix(source: &str) -> String {
    let fixed = fix_str(source).unwrap_or_else(|e| panic!("fix failed: {e}"));
    assert_clean(&fixed);
    fixed
}

/// Assert the reported descriptors, the fixed text, and that the fixed
/// text is clean.
pub fn verify(source: &str, expected: &[Descriptor], fixed: &str) {
    assert_eq!(descriptors(source), expected, "--- source ---\n{source}");
    assert_eq!(run_fix(source), fixed);
}
