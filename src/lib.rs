//! Spacing diagnostics and fixes for `*` and `&` in C# source.
//!
//! Tokens are classified by their syntactic role (pointer type,
//! dereference, address-of, function pointer marker, multiplication,
//! bitwise and) from the shape of a tolerant concrete syntax tree. Each
//! role has a spacing policy; trivia that breaks it is reported as a
//! diagnostic with rule code `SA1023` and can be corrected with
//! whitespace-only edits.
//!
//! # Quick start
//!
//! ## Report violations
//!
//! ```
//! use pointer_spacing::analyze_str;
//!
//! let diagnostics = analyze_str("unsafe delegate*<int *> FuncPtr;").unwrap();
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(
//!     diagnostics[0].message,
//!     "Dereference symbol '*' must not be preceded by whitespace"
//! );
//! ```
//!
//! ## Fix a source string
//!
//! ```
//! use pointer_spacing::fix_str;
//!
//! let fixed = fix_str("unsafe delegate*managed<int*> FuncPtr;").unwrap();
//! assert_eq!(fixed, "unsafe delegate* managed<int*> FuncPtr;");
//! ```
//!
//! ## Drive the engine directly
//!
//! ```
//! use pointer_spacing::{Analyzer, CancellationToken, Document, RuleConfig};
//!
//! let document = Document::parse("int *p = & x;").unwrap();
//! let analyzer = Analyzer::new(&RuleConfig::default());
//! let diagnostics = analyzer.analyze(&document, &CancellationToken::new()).unwrap();
//! let edits: Vec<_> = diagnostics
//!     .iter()
//!     .filter_map(|d| analyzer.fix(&document, d))
//!     .collect();
//! assert_eq!(edits.len(), diagnostics.len());
//! ```

// Allow noisy pedantic lints that don't add value for
// a library crate.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod classifier;
pub mod config;
pub mod detector;
pub mod diagnostic;
pub mod engine;
pub mod fix;
pub mod lexer;
pub mod parser;
pub mod policy;
pub mod syntax;
pub mod token;

pub use classifier::{SyntaxContext, classify};
pub use config::{Config, ConfigError, EngineConfig, RuleConfig};
pub use detector::{Gap, Violation, detect};
pub use diagnostic::{Descriptor, Diagnostic, RULE_ID, Severity, emit};
pub use engine::{Analyzer, CancellationToken, Document, FixOutcome};
pub use fix::{TextEdit, apply_edits, synthesize};
pub use lexer::{LexError, LexErrorKind, tokenize};
pub use parser::{ParseError, ParseErrorKind, parse};
pub use policy::{Side, SpacingPolicy, SpacingRequirement, policy};
pub use syntax::{NodeKind, SyntaxTree, TokenId};
pub use token::{Position, Span, Token, TokenKind, Trivia, TriviaKind};

/// Errors surfaced by the engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The source could not be tokenized.
    #[error("{0}")]
    Lex(#[from] LexError),
    /// Analysis was cancelled before it completed.
    #[error("analysis cancelled")]
    Cancelled,
}

/// Analyze a source string with the default rule settings.
pub fn analyze_str(source: &str) -> Result<Vec<Diagnostic>, Error> {
    let document = Document::parse(source)?;
    Analyzer::default().analyze(&document, &CancellationToken::new())
}

/// Fix a source string with the default settings and return the new
/// text.
pub fn fix_str(source: &str) -> Result<String, Error> {
    Ok(Analyzer::default().fix_source(source)?.text)
}
