//! Comparison of actual trivia against the spacing policy.

use crate::classifier::SyntaxContext;
use crate::policy::{Side, SpacingRequirement, policy};
use crate::syntax::TokenId;
use crate::token::{Span, Token, Trivia, TriviaKind};

/// Trivia between a token and its neighbour on one side.
///
/// On the before side this is the previous token's trailing trivia
/// followed by the token's own leading trivia; on the after side the
/// token's trailing trivia followed by the next token's leading trivia.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gap {
    /// Covered source range; empty at the token boundary when there is
    /// no trivia.
    pub span: Span,
    pub pieces: Vec<Trivia>,
}

impl Gap {
    fn new(boundary: usize, pieces: Vec<Trivia>) -> Self {
        let span = match (pieces.first(), pieces.last()) {
            (Some(first), Some(last)) => first.span.cover(last.span),
            _ => Span::empty(boundary),
        };
        Self { span, pieces }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Whether any piece is a comment or a directive.
    #[must_use]
    pub fn has_comments(&self) -> bool {
        self.pieces.iter().any(|t| !t.kind.is_blank())
    }

    /// Exactly one plain space.
    #[must_use]
    pub fn is_single_space(&self, source: &str) -> bool {
        matches!(
            self.pieces.as_slice(),
            [t] if t.kind == TriviaKind::Whitespace && t.text(source) == " "
        )
    }
}

/// Trivia on `side` of the token at `index`.
#[must_use]
pub fn gap(tokens: &[Token], index: usize, side: Side) -> Gap {
    let token = &tokens[index];
    match side {
        Side::Before => {
            let mut pieces = index
                .checked_sub(1)
                .map(|i| tokens[i].trailing.clone())
                .unwrap_or_default();
            pieces.extend_from_slice(&token.leading);
            Gap::new(token.span.start, pieces)
        }
        Side::After => {
            let mut pieces = token.trailing.clone();
            if let Some(next) = tokens.get(index + 1) {
                pieces.extend_from_slice(&next.leading);
            }
            Gap::new(token.span.end, pieces)
        }
    }
}

/// A side of a token whose trivia does not meet its requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub token: TokenId,
    pub token_span: Span,
    pub context: SyntaxContext,
    pub side: Side,
    pub requirement: SpacingRequirement,
    pub gap: Gap,
}

/// Check both sides of a classified token. Yields at most one
/// violation per side, before side first.
#[must_use]
pub fn detect(
    source: &str,
    tokens: &[Token],
    token: TokenId,
    context: SyntaxContext,
) -> Vec<Violation> {
    let policy = policy(context);
    let mut violations = Vec::new();

    for side in [Side::Before, Side::After] {
        let requirement = policy.side(side);
        if requirement == SpacingRequirement::Irrelevant {
            continue;
        }
        let gap = gap(tokens, token.0, side);
        let violated = match requirement {
            SpacingRequirement::Forbidden => !gap.is_empty(),
            SpacingRequirement::Required => !gap.is_single_space(source),
            SpacingRequirement::Irrelevant => false,
        };
        if violated {
            log::trace!(
                "token {} ({context:?}): {requirement:?} {side} violated by {:?}",
                token.0,
                gap.span
            );
            violations.push(Violation {
                token,
                token_span: tokens[token.0].span,
                context,
                side,
                requirement,
                gap,
            });
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::token::TokenKind;

    fn star(tokens: &[Token], nth: usize) -> TokenId {
        let index = tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| t.kind == TokenKind::Star)
            .nth(nth)
            .map(|(i, _)| i)
            .expect("no such star");
        TokenId(index)
    }

    #[test]
    fn gap_joins_trailing_and_leading() {
        let source = "a /* c */\n  * b";
        let tokens = tokenize(source).expect("tokenize failed");
        let g = gap(&tokens, 1, Side::Before);
        assert_eq!(g.span, Span::new(1, 12));
        assert_eq!(g.pieces.len(), 4);
        assert!(g.has_comments());
    }

    #[test]
    fn empty_gap_sits_at_the_boundary() {
        let tokens = tokenize("a*b").expect("tokenize failed");
        assert_eq!(gap(&tokens, 1, Side::Before).span, Span::empty(1));
        assert_eq!(gap(&tokens, 1, Side::After).span, Span::empty(2));
    }

    #[test]
    fn forbidden_sides() {
        let source = "int * > x";
        let tokens = tokenize(source).expect("tokenize failed");
        let violations = detect(
            source,
            &tokens,
            star(&tokens, 0),
            SyntaxContext::PointerTypeDeclarator { closes_type: true },
        );
        let sides: Vec<Side> = violations.iter().map(|v| v.side).collect();
        assert_eq!(sides, vec![Side::Before, Side::After]);
    }

    #[test]
    fn required_accepts_exactly_one_space() {
        let marker = SyntaxContext::FunctionPointerMarker {
            calling_convention: true,
        };
        for (source, expected) in [
            ("delegate* managed<void>", 0),
            ("delegate*managed<void>", 1),
            ("delegate*  managed<void>", 1),
            ("delegate*\tmanaged<void>", 1),
            ("delegate*\nmanaged<void>", 1),
        ] {
            let tokens = tokenize(source).expect("tokenize failed");
            let found = detect(source, &tokens, star(&tokens, 0), marker);
            assert_eq!(found.len(), expected, "{source:?}");
        }
    }

    #[test]
    fn irrelevant_never_violates() {
        let source = "a  *  b";
        let tokens = tokenize(source).expect("tokenize failed");
        assert!(
            detect(
                source,
                &tokens,
                star(&tokens, 0),
                SyntaxContext::MultiplicationOperator
            )
            .is_empty()
        );
    }
}
