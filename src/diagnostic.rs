//! Rule identity, descriptors, and located diagnostics.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::detector::Violation;
use crate::policy::{Side, SpacingRequirement};
use crate::syntax::TokenId;
use crate::token::{LineIndex, Position, Span};

/// Stable rule code.
pub const RULE_ID: &str = "SA1023";

/// Rule title.
pub const RULE_TITLE: &str = "Dereference and access-of symbols should be spaced correctly";

/// Reporting level of a diagnostic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Reported to tooling only.
    Hidden,
    Info,
    #[default]
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hidden => write!(f, "hidden"),
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Unrecognised severity name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown severity '{0}', expected hidden, info, warning, or error")]
pub struct UnknownSeverity(pub String);

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hidden" | "none" => Ok(Self::Hidden),
            "info" | "note" | "suggestion" => Ok(Self::Info),
            "warning" | "warn" => Ok(Self::Warning),
            "error" | "err" => Ok(Self::Error),
            _ => Err(UnknownSeverity(s.to_string())),
        }
    }
}

/// The four diagnostic variants of the rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Descriptor {
    NotPreceded,
    NotFollowed,
    Preceded,
    Followed,
}

/// Static description of a [`Descriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorInfo {
    pub descriptor: Descriptor,
    pub id: &'static str,
    pub template: &'static str,
}

/// Message templates, keyed by descriptor.
pub static DESCRIPTORS: [DescriptorInfo; 4] = [
    DescriptorInfo {
        descriptor: Descriptor::NotPreceded,
        id: "DescriptorNotPreceded",
        template: "must not be preceded by whitespace",
    },
    DescriptorInfo {
        descriptor: Descriptor::NotFollowed,
        id: "DescriptorNotFollowed",
        template: "must not be followed by whitespace",
    },
    DescriptorInfo {
        descriptor: Descriptor::Preceded,
        id: "DescriptorPreceded",
        template: "must be preceded by whitespace",
    },
    DescriptorInfo {
        descriptor: Descriptor::Followed,
        id: "DescriptorFollowed",
        template: "must be followed by whitespace",
    },
];

impl Descriptor {
    /// Descriptor for a violated requirement; `None` for
    /// [`SpacingRequirement::Irrelevant`], which never violates.
    #[must_use]
    pub const fn for_violation(requirement: SpacingRequirement, side: Side) -> Option<Self> {
        match (requirement, side) {
            (SpacingRequirement::Forbidden, Side::Before) => Some(Self::NotPreceded),
            (SpacingRequirement::Forbidden, Side::After) => Some(Self::NotFollowed),
            (SpacingRequirement::Required, Side::Before) => Some(Self::Preceded),
            (SpacingRequirement::Required, Side::After) => Some(Self::Followed),
            (SpacingRequirement::Irrelevant, _) => None,
        }
    }

    #[must_use]
    pub fn info(self) -> &'static DescriptorInfo {
        &DESCRIPTORS[self as usize]
    }

    #[must_use]
    pub fn template(self) -> &'static str {
        self.info().template
    }
}

/// A located report of one violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub rule_id: &'static str,
    pub descriptor: Descriptor,
    pub severity: Severity,
    pub message: String,
    /// Offending trivia, or the empty boundary where a space is missing.
    pub location: Span,
    /// Start of `location`.
    pub position: Position,
    /// The `*` or `&` token.
    pub token_span: Span,
    pub side: Side,
    #[serde(skip)]
    pub token: TokenId,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {}: {}",
            self.position, self.severity, self.rule_id, self.message
        )
    }
}

/// Render the message for a violation, e.g.
/// `Dereference symbol '*' must not be preceded by whitespace`.
#[must_use]
pub fn message(violation: &Violation, descriptor: Descriptor, source: &str) -> String {
    let span = violation.token_span;
    let text = source.get(span.start..span.end).unwrap_or_default();
    format!(
        "{} '{}' {}",
        violation.context.symbol_name(),
        text,
        descriptor.template()
    )
}

/// Turn violations into diagnostics, dropping repeats of the same
/// location and descriptor.
#[must_use]
pub fn emit(
    source: &str,
    line_index: &LineIndex,
    violations: &[Violation],
    severity: Severity,
) -> Vec<Diagnostic> {
    let mut seen = HashSet::new();
    let mut diagnostics = Vec::with_capacity(violations.len());

    for violation in violations {
        let Some(descriptor) = Descriptor::for_violation(violation.requirement, violation.side)
        else {
            continue;
        };
        let location = violation.gap.span;
        if !seen.insert((location, descriptor)) {
            continue;
        }
        diagnostics.push(Diagnostic {
            rule_id: RULE_ID,
            descriptor,
            severity,
            message: message(violation, descriptor, source),
            location,
            position: line_index.position(source, location.start),
            token_span: violation.token_span,
            side: violation.side,
            token: violation.token,
        });
    }
    diagnostics
}
