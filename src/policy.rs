//! Spacing requirements per syntactic role.

use std::fmt;

use crate::classifier::SyntaxContext;

/// What is expected on one side of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpacingRequirement {
    /// No trivia at all.
    Forbidden,
    /// Exactly one space.
    Required,
    /// Anything goes.
    Irrelevant,
}

/// Side of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Before,
    After,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Before => write!(f, "before"),
            Self::After => write!(f, "after"),
        }
    }
}

/// Requirements for both sides of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpacingPolicy {
    pub before: SpacingRequirement,
    pub after: SpacingRequirement,
}

impl SpacingPolicy {
    #[must_use]
    pub const fn side(&self, side: Side) -> SpacingRequirement {
        match side {
            Side::Before => self.before,
            Side::After => self.after,
        }
    }
}

/// Spacing policy for a classified token.
#[must_use]
pub const fn policy(context: SyntaxContext) -> SpacingPolicy {
    use SpacingRequirement::{Forbidden, Irrelevant, Required};

    let (before, after) = match context {
        SyntaxContext::DereferenceOperator {
            after_open_delimiter,
        }
        | SyntaxContext::AddressOfOperator {
            after_open_delimiter,
        } => {
            // indentation and binary operators may precede a unary operator
            let before = if after_open_delimiter {
                Forbidden
            } else {
                Irrelevant
            };
            (before, Forbidden)
        }
        SyntaxContext::PointerTypeDeclarator { closes_type } => {
            // `int* p` keeps its space before the declarator name
            let after = if closes_type { Forbidden } else { Irrelevant };
            (Forbidden, after)
        }
        SyntaxContext::FunctionPointerMarker { calling_convention } => {
            let after = if calling_convention {
                Required
            } else {
                Forbidden
            };
            (Forbidden, after)
        }
        SyntaxContext::MultiplicationOperator | SyntaxContext::BitwiseAndOperator => {
            (Irrelevant, Irrelevant)
        }
    };
    SpacingPolicy { before, after }
}
