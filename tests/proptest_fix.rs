//! Property-based tests with proptest.
//!
//! Generate C# snippets with random whitespace around `*` and `&`,
//! then check that fixing converges, only touches whitespace, and that
//! analysis is deterministic.

use pointer_spacing::token::Keyword;
use pointer_spacing::{
    Analyzer, CancellationToken, Document, TextEdit, analyze_str, fix_str, tokenize,
};
use proptest::prelude::*;

// -- Leaf strategies --

/// Whitespace between two tokens, including none and line breaks.
fn ws() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["", " ", "  ", "\t", "\n", " \n    "])
}

/// Whitespace that keeps two tokens apart.
fn sep() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![" ", "  ", "\t", "\n    "])
}

fn name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,5}".prop_filter("keyword", |s| Keyword::from_text(s).is_none())
}

/// A class member with arbitrary spacing around pointer symbols.
fn member() -> impl Strategy<Value = String> {
    prop_oneof![
        (ws(), ws(), name()).prop_map(|(a, b, n)| format!("int{a}*{b}{n};")),
        (ws(), ws(), ws(), ws(), name())
            .prop_map(|(a, b, c, d, n)| format!("delegate{a}*{b}<int{c}*{d}> {n};")),
        (ws(), ws(), ws(), name())
            .prop_map(|(a, b, c, n)| format!("delegate{a}*{b}managed<byte{c}*> {n};")),
        (ws(), ws(), name()).prop_map(|(a, b, n)| format!("int {n} = sizeof(int{a}*{b});")),
        (ws(), ws(), ws(), ws(), ws(), ws()).prop_map(|(a, b, c, d, e, f)| {
            format!(
                "void M()\n    {{\n        x = ({a}*{b}p);\n        y = &{c}v;\n        \
                 z = a{d}*{e}b & m;\n        w = q[{f}*i];\n    }}"
            )
        }),
    ]
}

/// A class member whose pointer symbols already have canonical
/// spacing; only spacing that no rule cares about varies.
fn canonical_member() -> impl Strategy<Value = String> {
    prop_oneof![
        (ws(), name()).prop_map(|(a, n)| format!("int*{a}{n};")),
        name().prop_map(|n| format!("delegate* unmanaged[Cdecl]<int*, void> {n};")),
        (ws(), ws(), ws(), ws()).prop_map(|(a, b, c, d)| {
            format!(
                "void M()\n    {{\n        z = a{a}*{b}b;\n        m = a{c}&{d}b;\n        \
                 x = (*p);\n        y = &v;\n    }}"
            )
        }),
        (sep(), sep()).prop_map(|(a, b)| format!("void M()\n    {{\n        x ={a}*p *{b}2;\n    }}")),
    ]
}

fn program(members: Vec<String>) -> String {
    let body: Vec<String> = members.iter().map(|m| format!("    {m}")).collect();
    format!("unsafe class C\n{{\n{}\n}}\n", body.join("\n"))
}

fn strip(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

// -- Property tests --

proptest! {
    /// Fixing leaves nothing to report.
    #[test]
    fn fix_converges(members in prop::collection::vec(member(), 1..=5)) {
        let source = program(members);
        let fixed = fix_str(&source).map_err(|e| {
            TestCaseError::fail(std::format!("fix error: {e}\n--- source ---\n{source}"))
        })?;
        let remaining = analyze_str(&fixed).map_err(|e| {
            TestCaseError::fail(std::format!("analysis error: {e}\n--- output ---\n{fixed}"))
        })?;
        prop_assert!(
            remaining.is_empty(),
            "still reported:\n{:?}\n--- output ---\n{}",
            remaining,
            fixed
        );
    }

    /// Fixing an already fixed source changes nothing.
    #[test]
    fn fix_idempotent(members in prop::collection::vec(member(), 1..=5)) {
        let once = fix_str(&program(members)).unwrap();
        let twice = fix_str(&once).unwrap();
        prop_assert_eq!(once, twice);
    }

    /// Fixes only add or remove whitespace.
    #[test]
    fn fix_only_touches_whitespace(members in prop::collection::vec(member(), 1..=5)) {
        let source = program(members);
        let fixed = fix_str(&source).unwrap();
        prop_assert_eq!(strip(&source), strip(&fixed));
        tokenize(&fixed).map_err(|e| {
            TestCaseError::fail(std::format!("lex error: {e}\n--- output ---\n{fixed}"))
        })?;
    }

    /// Per-diagnostic edits never overlap one another.
    #[test]
    fn edits_are_disjoint(members in prop::collection::vec(member(), 1..=5)) {
        let document = Document::parse(program(members)).unwrap();
        let analyzer = Analyzer::default();
        let diagnostics = analyzer
            .analyze(&document, &CancellationToken::new())
            .unwrap();
        let mut edits: Vec<TextEdit> = diagnostics
            .iter()
            .filter_map(|d| analyzer.fix(&document, d))
            .collect();
        edits.sort();
        edits.dedup();
        for pair in edits.windows(2) {
            prop_assert!(
                pair[0].span.end <= pair[1].span.start && pair[0].span != pair[1].span,
                "overlapping edits {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    /// The same input always yields the same diagnostics.
    #[test]
    fn analysis_is_deterministic(members in prop::collection::vec(member(), 1..=5)) {
        let source = program(members);
        prop_assert_eq!(analyze_str(&source).unwrap(), analyze_str(&source).unwrap());
    }

    /// Diagnostics come out sorted by location.
    #[test]
    fn diagnostics_are_sorted(members in prop::collection::vec(member(), 1..=5)) {
        let found = analyze_str(&program(members)).unwrap();
        for pair in found.windows(2) {
            prop_assert!(
                (pair[0].location, pair[0].descriptor) < (pair[1].location, pair[1].descriptor)
            );
        }
    }

    /// Canonical spacing is never reported.
    #[test]
    fn canonical_is_silent(members in prop::collection::vec(canonical_member(), 1..=5)) {
        let source = program(members);
        let found = analyze_str(&source).unwrap();
        prop_assert!(found.is_empty(), "reported:\n{:?}\n--- source ---\n{}", found, source);
    }
}
