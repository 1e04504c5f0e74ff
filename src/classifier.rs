//! Syntactic role of `*` and `&` tokens.
//!
//! Roles come from the shape of the enclosing node and its neighbours,
//! never from whitespace or types. The few facts the spacing policy
//! needs about the surroundings (a calling convention after a function
//! pointer marker, the token that closes a pointer type) are captured
//! in the returned context so that the policy stays a pure function.

use crate::syntax::{Element, NodeKind, SyntaxTree, TokenId};
use crate::token::{Keyword, Token, TokenKind};

/// Grammar shape around a `*` or `&` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxContext {
    /// `*` suffix of a pointer type: `int*`, `delegate*<int*>`.
    PointerTypeDeclarator {
        /// The next token closes an enclosing construct (`>`, `)`,
        /// `]`) or continues the type (`*`, `[`, `(`).
        closes_type: bool,
    },
    /// Unary `*p`.
    DereferenceOperator {
        /// Directly after `(` or `[`.
        after_open_delimiter: bool,
    },
    /// Unary `&x`.
    AddressOfOperator { after_open_delimiter: bool },
    /// `*` right after `delegate` in a function pointer type.
    FunctionPointerMarker {
        /// `managed` / `unmanaged[...]` follows the marker.
        calling_convention: bool,
    },
    MultiplicationOperator,
    BitwiseAndOperator,
}

impl SyntaxContext {
    /// Human name of the symbol, as used in diagnostic messages.
    #[must_use]
    pub const fn symbol_name(self) -> &'static str {
        match self {
            Self::AddressOfOperator { .. } | Self::BitwiseAndOperator => "Access-of symbol",
            Self::PointerTypeDeclarator { .. }
            | Self::DereferenceOperator { .. }
            | Self::FunctionPointerMarker { .. }
            | Self::MultiplicationOperator => "Dereference symbol",
        }
    }
}

/// Determine the role of `token`, or `None` when it is not a tracked
/// operator or the surrounding shape is incomplete.
#[must_use]
pub fn classify(tree: &SyntaxTree, tokens: &[Token], token: TokenId) -> Option<SyntaxContext> {
    let kind = tokens.get(token.0)?.kind;
    if !matches!(kind, TokenKind::Star | TokenKind::Amp) {
        return None;
    }

    let parent = tree.token_parent(token);
    let kind_at = |id: Option<TokenId>| id.and_then(|t| tokens.get(t.0)).map(|t| t.kind);
    let prev = kind_at(tree.prev_token(token));
    let next = kind_at(tree.next_token(token));

    let context = match (kind, tree.kind(parent)) {
        (TokenKind::Star, NodeKind::PointerType) => SyntaxContext::PointerTypeDeclarator {
            closes_type: matches!(
                next,
                Some(
                    TokenKind::Gt
                        | TokenKind::CloseParen
                        | TokenKind::CloseBracket
                        | TokenKind::OpenParen
                        | TokenKind::OpenBracket
                        | TokenKind::Star
                )
            ),
        },
        (TokenKind::Star, NodeKind::FunctionPointerType) => {
            let after_delegate = matches!(
                tree.left_sibling(token),
                Some(Element::Token(t)) if tokens[t.0].kind.is_keyword(Keyword::Delegate)
            );
            if !after_delegate {
                return None;
            }
            SyntaxContext::FunctionPointerMarker {
                calling_convention: tree
                    .child_of_kind(parent, NodeKind::FunctionPointerCallingConvention)
                    .is_some(),
            }
        }
        (_, NodeKind::PointerIndirectionExpression | NodeKind::AddressOfExpression) => {
            // missing operand
            if !matches!(tree.right_sibling(token), Some(Element::Node(_))) {
                return None;
            }
            let after_open_delimiter =
                matches!(prev, Some(TokenKind::OpenParen | TokenKind::OpenBracket));
            if kind == TokenKind::Star {
                SyntaxContext::DereferenceOperator {
                    after_open_delimiter,
                }
            } else {
                SyntaxContext::AddressOfOperator {
                    after_open_delimiter,
                }
            }
        }
        (_, NodeKind::BinaryExpression) => {
            let operands = matches!(tree.left_sibling(token), Some(Element::Node(_)))
                && matches!(tree.right_sibling(token), Some(Element::Node(_)));
            if !operands {
                return None;
            }
            if kind == TokenKind::Star {
                SyntaxContext::MultiplicationOperator
            } else {
                SyntaxContext::BitwiseAndOperator
            }
        }
        _ => return None,
    };
    Some(context)
}
