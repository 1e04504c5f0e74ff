//! Whitespace edits that correct violations.

use serde::Serialize;

use crate::detector::Violation;
use crate::policy::SpacingRequirement;
use crate::token::{Span, TriviaKind};

/// Replacement of a source range, computed against the original text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TextEdit {
    pub span: Span,
    pub replacement: String,
}

impl TextEdit {
    #[must_use]
    pub fn new(span: Span, replacement: impl Into<String>) -> Self {
        Self {
            span,
            replacement: replacement.into(),
        }
    }
}

/// Compute the edit for a violation, or `None` when whitespace cannot
/// be changed without touching a comment or directive.
#[must_use]
pub fn synthesize(source: &str, violation: &Violation) -> Option<TextEdit> {
    let gap = &violation.gap;
    let current = source.get(gap.span.start..gap.span.end)?;

    let replacement = match violation.requirement {
        SpacingRequirement::Irrelevant => return None,
        SpacingRequirement::Forbidden => {
            // joining the lines around a line comment or directive
            // would swallow the code that follows it
            if gap
                .pieces
                .iter()
                .any(|t| matches!(t.kind, TriviaKind::LineComment | TriviaKind::Directive))
            {
                return None;
            }
            gap.pieces
                .iter()
                .filter(|t| t.kind == TriviaKind::BlockComment)
                .map(|t| t.text(source))
                .collect::<String>()
        }
        SpacingRequirement::Required => {
            if gap.has_comments() {
                return None;
            }
            " ".to_string()
        }
    };

    if replacement == current {
        return None;
    }
    if replacement.is_empty() && would_fuse(&source[..gap.span.start], &source[gap.span.end..]) {
        return None;
    }
    Some(TextEdit::new(gap.span, replacement))
}

/// Pairs with a `*` or `&` on one side that lex differently once
/// adjacent (`& &x`, `* =`, `/ *`).
const FUSING_PAIRS: [&str; 4] = ["&&", "&=", "*=", "/*"];

fn would_fuse(left: &str, right: &str) -> bool {
    let (Some(a), Some(b)) = (left.chars().next_back(), right.chars().next()) else {
        return false;
    };
    FUSING_PAIRS.iter().any(|pair| {
        let mut chars = pair.chars();
        chars.next() == Some(a) && chars.next() == Some(b)
    })
}

/// Result of [`apply_edits`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub text: String,
    pub applied: usize,
    pub skipped: usize,
}

/// Apply edits computed against `source` in one sorted pass.
///
/// Identical edits are applied once. An edit that overlaps one already
/// taken, or replaces the same range differently, is skipped.
#[must_use]
pub fn apply_edits(source: &str, edits: &[TextEdit]) -> Rewrite {
    let mut sorted: Vec<&TextEdit> = edits.iter().collect();
    sorted.sort();
    sorted.dedup();

    let mut text = String::with_capacity(source.len());
    let mut cursor = 0;
    let mut previous: Option<Span> = None;
    let mut applied = 0;
    let mut skipped = 0;

    for edit in sorted {
        let span = edit.span;
        let conflicts = previous.is_some_and(|p| span.overlaps(&p) || span == p);
        if conflicts || span.end > source.len() || span.start < cursor {
            log::warn!(
                "skipping edit {}..{} that overlaps an earlier edit",
                span.start,
                span.end
            );
            skipped += 1;
            continue;
        }
        let (Some(kept), Some(_)) = (source.get(cursor..span.start), source.get(span.start..span.end))
        else {
            log::warn!("skipping edit {}..{} off a char boundary", span.start, span.end);
            skipped += 1;
            continue;
        };
        text.push_str(kept);
        text.push_str(&edit.replacement);
        cursor = span.end;
        previous = Some(span);
        applied += 1;
    }
    text.push_str(&source[cursor..]);

    Rewrite {
        text,
        applied,
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::SyntaxContext;
    use crate::detector::detect;
    use crate::lexer::tokenize;
    use crate::syntax::TokenId;
    use crate::token::TokenKind;

    fn edits(source: &str, context: SyntaxContext) -> Vec<Option<TextEdit>> {
        let tokens = tokenize(source).expect("tokenize failed");
        let star = tokens
            .iter()
            .position(|t| t.kind == TokenKind::Star)
            .expect("no star");
        detect(source, &tokens, TokenId(star), context)
            .iter()
            .map(|v| synthesize(source, v))
            .collect()
    }

    const DECLARATOR: SyntaxContext = SyntaxContext::PointerTypeDeclarator { closes_type: true };

    #[test]
    fn forbidden_whitespace_is_deleted() {
        assert_eq!(
            edits("int \t* >", DECLARATOR),
            vec![
                Some(TextEdit::new(Span::new(3, 5), "")),
                Some(TextEdit::new(Span::new(6, 7), "")),
            ]
        );
    }

    #[test]
    fn block_comments_survive() {
        assert_eq!(
            edits("int /* c */ *>", DECLARATOR),
            vec![Some(TextEdit::new(Span::new(3, 12), "/* c */"))]
        );
        // nothing left to narrow
        assert_eq!(edits("int/* c */*>", DECLARATOR), vec![None]);
    }

    #[test]
    fn line_comment_blocks_the_fix() {
        assert_eq!(edits("int // c\n*>", DECLARATOR), vec![None]);
    }

    #[test]
    fn directive_blocks_the_fix() {
        assert_eq!(edits("int\n#if X\n*>", DECLARATOR), vec![None]);
    }

    #[test]
    fn deletion_that_would_fuse_operators_is_withheld() {
        let source = "(& &x)";
        let tokens = tokenize(source).expect("tokenize failed");
        let violations = detect(
            source,
            &tokens,
            TokenId(1),
            SyntaxContext::AddressOfOperator {
                after_open_delimiter: true,
            },
        );
        assert_eq!(violations.len(), 1);
        assert_eq!(synthesize(source, &violations[0]), None);
    }

    #[test]
    fn fusing_pairs_touch_a_pointer_symbol() {
        assert!(would_fuse("(&", "&x)"));
        assert!(would_fuse("x &", "= m"));
        assert!(would_fuse("x *", "= 2"));
        assert!(would_fuse("a /", "*p"));
        assert!(!would_fuse("(", "*p"));
        assert!(!would_fuse("&", "*p"));
        assert!(!would_fuse("", "*p"));
    }

    #[test]
    fn required_space_is_normalised() {
        let marker = SyntaxContext::FunctionPointerMarker {
            calling_convention: true,
        };
        assert_eq!(
            edits("delegate*managed<void>", marker),
            vec![Some(TextEdit::new(Span::empty(9), " "))]
        );
        assert_eq!(
            edits("delegate*\t\tmanaged<void>", marker),
            vec![Some(TextEdit::new(Span::new(9, 11), " "))]
        );
        assert_eq!(edits("delegate*/**/managed<void>", marker), vec![None]);
    }

    #[test]
    fn apply_sorts_and_dedupes() {
        let source = "a  b  c";
        let edits = [
            TextEdit::new(Span::new(4, 6), ""),
            TextEdit::new(Span::new(1, 3), " "),
            TextEdit::new(Span::new(4, 6), ""),
        ];
        let rewrite = apply_edits(source, &edits);
        assert_eq!(rewrite.text, "a bc");
        assert_eq!(rewrite.applied, 2);
        assert_eq!(rewrite.skipped, 0);
    }

    #[test]
    fn apply_skips_overlaps() {
        let source = "abcdef";
        let edits = [
            TextEdit::new(Span::new(1, 4), "X"),
            TextEdit::new(Span::new(2, 5), "Y"),
            TextEdit::new(Span::empty(4), "Z"),
        ];
        let rewrite = apply_edits(source, &edits);
        assert_eq!(rewrite.text, "aXZef");
        assert_eq!(rewrite.applied, 2);
        assert_eq!(rewrite.skipped, 1);
    }

    #[test]
    fn conflicting_insertions_apply_once() {
        let rewrite = apply_edits(
            "ab",
            &[
                TextEdit::new(Span::empty(1), " "),
                TextEdit::new(Span::empty(1), "  "),
            ],
        );
        assert_eq!(rewrite.text, "a b");
        assert_eq!(rewrite.skipped, 1);
    }
}
