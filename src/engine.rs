//! Document analysis and batch fixing.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::Error;
use crate::classifier::classify;
use crate::config::{Config, EngineConfig, RuleConfig};
use crate::detector::{Violation, detect};
use crate::diagnostic::{Diagnostic, emit};
use crate::fix::{TextEdit, apply_edits, synthesize};
use crate::lexer::tokenize;
use crate::parser::parse;
use crate::syntax::{Element, SyntaxTree, TokenId};
use crate::token::{LineIndex, Position, Token, TokenKind};

/// One immutable source snapshot with its tokens and tree.
#[derive(Debug, Clone)]
pub struct Document {
    source: String,
    tokens: Vec<Token>,
    tree: SyntaxTree,
    line_index: LineIndex,
}

impl Document {
    /// Tokenize and parse `source`. Syntax errors are tolerated and
    /// recorded on the tree; only lexical errors fail.
    pub fn parse(source: impl Into<String>) -> Result<Self, Error> {
        let source = source.into();
        let tokens = tokenize(&source)?;
        let tree = parse(&source, &tokens);
        if !tree.errors().is_empty() {
            log::debug!(
                "{} syntax error(s), first: {}",
                tree.errors().len(),
                tree.errors()[0]
            );
        }
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("syntax tree:\n{}", tree.debug_dump(&source, &tokens));
        }
        let line_index = LineIndex::new(&source);
        Ok(Self {
            source,
            tokens,
            tree,
            line_index,
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    #[must_use]
    pub const fn tree(&self) -> &SyntaxTree {
        &self.tree
    }

    #[must_use]
    pub fn position(&self, offset: usize) -> Position {
        self.line_index.position(&self.source, offset)
    }
}

/// Cooperative cancellation flag shared between a caller and an
/// analysis in progress.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Result of fixing one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixOutcome {
    pub text: String,
    /// Edits applied over all passes.
    pub applied: usize,
    /// Diagnostics left without a fix in the final text.
    pub unfixable: usize,
}

impl FixOutcome {
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.applied > 0
    }
}

/// Runs the spacing rule over documents.
#[derive(Debug, Clone)]
pub struct Analyzer {
    rule: RuleConfig,
    engine: EngineConfig,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(&RuleConfig::default())
    }
}

impl Analyzer {
    #[must_use]
    pub fn new(rule: &RuleConfig) -> Self {
        Self {
            rule: *rule,
            engine: EngineConfig::default(),
        }
    }

    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self {
            rule: config.rule,
            engine: config.engine,
        }
    }

    #[must_use]
    pub const fn rule(&self) -> &RuleConfig {
        &self.rule
    }

    /// All violations in the document, in token order. Cancellation is
    /// checked before each top-level node and each declaration.
    fn violations(
        &self,
        document: &Document,
        cancel: &CancellationToken,
    ) -> Result<Vec<Violation>, Error> {
        if !self.rule.enabled {
            return Ok(Vec::new());
        }
        let tree = &document.tree;
        let mut violations = Vec::new();

        walk_tokens(
            tree,
            || {
                if cancel.is_cancelled() {
                    log::debug!("analysis cancelled");
                    return Err(Error::Cancelled);
                }
                Ok(())
            },
            |token| {
                if !matches!(
                    document.tokens[token.0].kind,
                    TokenKind::Star | TokenKind::Amp
                ) {
                    return;
                }
                if let Some(context) = classify(tree, &document.tokens, token) {
                    violations.extend(detect(
                        &document.source,
                        &document.tokens,
                        token,
                        context,
                    ));
                }
            },
        )?;
        Ok(violations)
    }

    /// Report every spacing violation in `document`, sorted by
    /// location. Either the full list or [`Error::Cancelled`].
    pub fn analyze(
        &self,
        document: &Document,
        cancel: &CancellationToken,
    ) -> Result<Vec<Diagnostic>, Error> {
        let violations = self.violations(document, cancel)?;
        let mut diagnostics = emit(
            &document.source,
            &document.line_index,
            &violations,
            self.rule.severity,
        );
        diagnostics.sort_by_key(|d| (d.location, d.descriptor));
        log::debug!(
            "{} token(s), {} diagnostic(s)",
            document.tokens.len(),
            diagnostics.len()
        );
        Ok(diagnostics)
    }

    /// Edit correcting a single diagnostic previously reported for
    /// `document`.
    #[must_use]
    pub fn fix(&self, document: &Document, diagnostic: &Diagnostic) -> Option<TextEdit> {
        let token = diagnostic.token;
        if token.0 >= document.tokens.len() {
            return None;
        }
        let context = classify(&document.tree, &document.tokens, token)?;
        detect(&document.source, &document.tokens, token, context)
            .into_iter()
            .find(|v| v.side == diagnostic.side)
            .and_then(|v| synthesize(&document.source, &v))
    }

    /// Fix all fixable violations of `document` in one rewrite.
    pub fn fix_document(&self, document: &Document) -> Result<FixOutcome, Error> {
        let violations = self.violations(document, &CancellationToken::new())?;
        let mut edits = Vec::with_capacity(violations.len());
        let mut unfixable = 0;
        for violation in &violations {
            match synthesize(&document.source, violation) {
                Some(edit) => edits.push(edit),
                None => unfixable += 1,
            }
        }
        let rewrite = apply_edits(&document.source, &edits);
        Ok(FixOutcome {
            text: rewrite.text,
            applied: rewrite.applied,
            unfixable: unfixable + rewrite.skipped,
        })
    }

    /// Fix `source` repeatedly until nothing fixable remains or the
    /// configured number of passes is used up.
    pub fn fix_source(&self, source: &str) -> Result<FixOutcome, Error> {
        let mut text = source.to_string();
        let mut applied = 0;
        let mut unfixable = 0;
        let mut settled = false;

        for pass in 1..=self.engine.max_fix_passes.max(1) {
            let document = Document::parse(text)?;
            let outcome = self.fix_document(&document)?;
            log::debug!("fix pass {pass}: {} edit(s)", outcome.applied);
            text = outcome.text;
            unfixable = outcome.unfixable;
            if outcome.applied == 0 {
                settled = true;
                break;
            }
            applied += outcome.applied;
        }

        if !settled {
            // the last pass changed the text; count what is left in it
            let document = Document::parse(text)?;
            unfixable = self
                .violations(&document, &CancellationToken::new())?
                .len();
            log::debug!("fix passes used up, {unfixable} violation(s) left");
            text = document.source;
        }

        Ok(FixOutcome {
            text,
            applied,
            unfixable,
        })
    }

    /// Analyze many documents, in parallel unless disabled.
    #[must_use]
    pub fn analyze_batch(
        &self,
        documents: &[Document],
        cancel: &CancellationToken,
    ) -> Vec<Result<Vec<Diagnostic>, Error>> {
        if self.engine.parallel {
            documents
                .par_iter()
                .map(|d| self.analyze(d, cancel))
                .collect()
        } else {
            documents.iter().map(|d| self.analyze(d, cancel)).collect()
        }
    }

    /// Fix many sources, in parallel unless disabled. Each source is
    /// rewritten independently.
    #[must_use]
    pub fn fix_batch(&self, sources: &[String]) -> Vec<Result<FixOutcome, Error>> {
        if self.engine.parallel {
            sources.par_iter().map(|s| self.fix_source(s)).collect()
        } else {
            sources.iter().map(|s| self.fix_source(s)).collect()
        }
    }
}

/// Visit every token under the root in source order, calling
/// `checkpoint` before each top-level node and each declaration.
fn walk_tokens(
    tree: &SyntaxTree,
    mut checkpoint: impl FnMut() -> Result<(), Error>,
    mut visit: impl FnMut(TokenId),
) -> Result<(), Error> {
    let root = tree.root();
    let mut stack: Vec<Element> = tree.children(root).iter().rev().copied().collect();
    while let Some(element) = stack.pop() {
        match element {
            Element::Node(node) => {
                if tree.parent(node) == Some(root) || tree.kind(node).is_declaration() {
                    checkpoint()?;
                }
                stack.extend(tree.children(node).iter().rev().copied());
            }
            Element::Token(token) => visit(token),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{Descriptor, Severity};

    fn analyze(source: &str) -> Vec<Diagnostic> {
        let document = Document::parse(source).expect("parse failed");
        Analyzer::default()
            .analyze(&document, &CancellationToken::new())
            .expect("analysis failed")
    }

    #[test]
    fn diagnostics_are_sorted() {
        let found = analyze("int * p; int *q;");
        let locations: Vec<usize> = found.iter().map(|d| d.location.start).collect();
        assert_eq!(locations, vec![3, 12]);
    }

    #[test]
    fn disabled_rule_reports_nothing() {
        let document = Document::parse("int * p;").expect("parse failed");
        let analyzer = Analyzer::new(&RuleConfig {
            enabled: false,
            severity: Severity::Error,
        });
        let found = analyzer
            .analyze(&document, &CancellationToken::new())
            .expect("analysis failed");
        assert!(found.is_empty());
    }

    #[test]
    fn severity_comes_from_the_rule() {
        let document = Document::parse("int *p;").expect("parse failed");
        let analyzer = Analyzer::new(&RuleConfig {
            enabled: true,
            severity: Severity::Error,
        });
        let found = analyzer
            .analyze(&document, &CancellationToken::new())
            .expect("analysis failed");
        assert_eq!(found[0].severity, Severity::Error);
    }

    #[test]
    fn cancelled_analysis_yields_nothing() {
        let document = Document::parse("int *p;").expect("parse failed");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = Analyzer::default().analyze(&document, &cancel);
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn cancellation_is_checked_per_declaration() {
        let document = Document::parse(
            "namespace N\n{\n    class C\n    {\n        int *a;\n        int *b;\n        void M() { x = ( *c); }\n    }\n}\n",
        )
        .expect("parse failed");
        let mut checks = 0;
        let mut stars = 0;
        walk_tokens(
            document.tree(),
            || {
                checks += 1;
                Ok(())
            },
            |token| {
                if document.tokens()[token.0].kind == TokenKind::Star {
                    stars += 1;
                }
            },
        )
        .expect("walk failed");
        // namespace, class, two fields, method
        assert_eq!(checks, 5);
        assert_eq!(stars, 3);

        // stop at the second field: only the first star was visited
        let mut checks = 0;
        let mut stars = 0;
        let result = walk_tokens(
            document.tree(),
            || {
                checks += 1;
                if checks == 4 {
                    Err(Error::Cancelled)
                } else {
                    Ok(())
                }
            },
            |token| {
                if document.tokens()[token.0].kind == TokenKind::Star {
                    stars += 1;
                }
            },
        );
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(stars, 1);
    }

    #[test]
    fn walk_visits_tokens_in_order() {
        let document = Document::parse("class C { int* p; void M() { x = &y; } }")
            .expect("parse failed");
        let mut seen = Vec::new();
        walk_tokens(document.tree(), || Ok(()), |token| seen.push(token))
            .expect("walk failed");
        assert_eq!(seen.len(), document.tokens().len());
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn exhausted_passes_recount_what_is_left() {
        let analyzer = Analyzer::from_config(&Config {
            rule: RuleConfig::default(),
            engine: EngineConfig {
                max_fix_passes: 1,
                ..EngineConfig::default()
            },
        });
        let outcome = analyzer
            .fix_source("int * p; int // c\n* q;")
            .expect("fix failed");
        assert_eq!(outcome.text, "int* p; int // c\n* q;");
        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.unfixable, analyze(&outcome.text).len());
        assert_eq!(outcome.unfixable, 1);
    }

    #[test]
    fn single_fix_matches_diagnostic() {
        let document = Document::parse("unsafe delegate *<int*> F;").expect("parse failed");
        let analyzer = Analyzer::default();
        let found = analyzer
            .analyze(&document, &CancellationToken::new())
            .expect("analysis failed");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].descriptor, Descriptor::NotPreceded);
        let edit = analyzer.fix(&document, &found[0]).expect("no fix");
        assert_eq!(edit.span, found[0].location);
        assert_eq!(edit.replacement, "");
    }

    #[test]
    fn fix_source_counts_edits() {
        let outcome = Analyzer::default()
            .fix_source("int * p; x = ( * q);")
            .expect("fix failed");
        assert_eq!(outcome.text, "int* p; x = (*q);");
        assert_eq!(outcome.applied, 3);
        assert_eq!(outcome.unfixable, 0);
        assert!(outcome.changed());
    }

    #[test]
    fn unfixable_is_reported() {
        let outcome = Analyzer::default()
            .fix_source("int // why\n* p;")
            .expect("fix failed");
        assert_eq!(outcome.text, "int // why\n* p;");
        assert_eq!(outcome.unfixable, 1);
        assert!(!outcome.changed());
    }

    #[test]
    fn batch_keeps_input_order() {
        let analyzer = Analyzer::default();
        let sources = vec!["int *a;".to_string(), "int* b;".to_string()];
        let fixed: Vec<String> = analyzer
            .fix_batch(&sources)
            .into_iter()
            .map(|r| r.expect("fix failed").text)
            .collect();
        assert_eq!(fixed, vec!["int*a;", "int* b;"]);
    }
}
