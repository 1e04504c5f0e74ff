use std::fmt;

use crate::syntax::{Element, Node, NodeId, NodeKind, SyntaxTree, TokenId};
use crate::token::{Keyword, LineIndex, Position, Token, TokenKind};

/// Nesting limit for statements, expressions, and types.
const MAX_DEPTH: usize = 256;

/// Classifies a parser error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Expected a specific token, found something else or EOF.
    ExpectedToken {
        expected: &'static str,
        found: Option<String>,
    },
    /// Expected the start of an expression.
    ExpectedExpression { found: Option<String> },
    /// Expected a type.
    ExpectedType { found: Option<String> },
    /// Token that does not fit anywhere in the grammar.
    UnexpectedToken { found: String },
    /// Function pointer calling convention other than `managed` or
    /// `unmanaged`.
    InvalidCallingConvention { name: String },
    /// Nesting limit reached.
    TooDeep,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExpectedToken {
                expected,
                found: None,
            } => write!(f, "expected '{expected}'"),
            Self::ExpectedToken {
                expected,
                found: Some(t),
            } => write!(f, "expected '{expected}', got '{t}'"),
            Self::ExpectedExpression { found: None } => write!(f, "expected expression"),
            Self::ExpectedExpression { found: Some(t) } => {
                write!(f, "expected expression, got '{t}'")
            }
            Self::ExpectedType { found: None } => write!(f, "expected type"),
            Self::ExpectedType { found: Some(t) } => write!(f, "expected type, got '{t}'"),
            Self::UnexpectedToken { found } => write!(f, "unexpected token '{found}'"),
            Self::InvalidCallingConvention { name } => {
                write!(
                    f,
                    "invalid calling convention '{name}', \
                     expected 'managed' or 'unmanaged'"
                )
            }
            Self::TooDeep => write!(f, "nesting too deep"),
        }
    }
}

/// Syntax error recovered from during parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at line {}, column {}", position.line, position.column)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub position: Position,
}

/// Parse a token stream into a syntax tree.
///
/// Parsing never fails: regions that do not fit the grammar end up in
/// `Error` nodes and the problems are listed in
/// [`SyntaxTree::errors`].
#[must_use]
pub fn parse(source: &str, tokens: &[Token]) -> SyntaxTree {
    let mut parser = Parser::new(source, tokens);
    parser.parse_compilation_unit();
    parser.finish()
}

#[derive(Debug, Clone, Copy)]
enum Event {
    Open(NodeKind),
    Close,
    Token,
}

#[derive(Clone, Copy)]
struct Checkpoint {
    pos: usize,
    events: usize,
    errors: usize,
}

struct Parser<'a> {
    source: &'a str,
    tokens: &'a [Token],
    pos: usize,
    events: Vec<Event>,
    errors: Vec<ParseError>,
    depth: usize,
    line_index: LineIndex,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, tokens: &'a [Token]) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            events: Vec::new(),
            errors: Vec::new(),
            depth: 0,
            line_index: LineIndex::new(source),
        }
    }

    fn finish(self) -> SyntaxTree {
        let mut nodes: Vec<Node> = Vec::new();
        let mut token_parents = Vec::with_capacity(self.tokens.len());
        let mut stack: Vec<NodeId> = Vec::new();

        for event in self.events {
            match event {
                Event::Open(kind) => {
                    let id = NodeId(nodes.len());
                    let parent = stack.last().copied();
                    nodes.push(Node {
                        kind,
                        parent,
                        children: Vec::new(),
                    });
                    if let Some(p) = parent {
                        nodes[p.0].children.push(Element::Node(id));
                    }
                    stack.push(id);
                }
                Event::Close => {
                    stack.pop();
                }
                Event::Token => {
                    let parent = stack.last().copied().unwrap_or(NodeId(0));
                    let id = TokenId(token_parents.len());
                    token_parents.push(parent);
                    nodes[parent.0].children.push(Element::Token(id));
                }
            }
        }

        SyntaxTree::from_parts(nodes, token_parents, NodeId(0), self.errors)
    }

    // -----------------------------------------------------------
    // Token access.
    // -----------------------------------------------------------

    fn nth(&self, n: usize) -> TokenKind {
        self.tokens
            .get(self.pos + n)
            .map_or(TokenKind::EndOfFile, |t| t.kind)
    }

    fn current(&self) -> TokenKind {
        self.nth(0)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current() == kind
    }

    fn at_keyword(&self, keyword: Keyword) -> bool {
        self.current() == TokenKind::Keyword(keyword)
    }

    fn nth_text(&self, n: usize) -> &'a str {
        self.tokens
            .get(self.pos + n)
            .map_or("", |t| t.text(self.source))
    }

    fn nth_is_contextual(&self, n: usize, text: &str) -> bool {
        self.nth(n) == TokenKind::Identifier && self.nth_text(n) == text
    }

    fn at_contextual(&self, text: &str) -> bool {
        self.nth_is_contextual(0, text)
    }

    fn at_eof(&self) -> bool {
        self.at(TokenKind::EndOfFile)
    }

    /// No trivia between the current token and the next one.
    fn joined_with_next(&self) -> bool {
        match (self.tokens.get(self.pos), self.tokens.get(self.pos + 1)) {
            (Some(a), Some(b)) => a.trailing.is_empty() && b.leading.is_empty(),
            _ => false,
        }
    }

    /// `>>` written as two adjacent `>` tokens.
    fn at_shift_right(&self) -> bool {
        self.at(TokenKind::Gt) && self.nth(1) == TokenKind::Gt && self.joined_with_next()
    }

    /// `>>=` written as `>` followed by an adjacent `>=`.
    fn at_shift_right_assign(&self) -> bool {
        self.at(TokenKind::Gt) && self.nth(1) == TokenKind::GtEq && self.joined_with_next()
    }

    fn bump(&mut self) {
        if !self.at_eof() {
            self.events.push(Event::Token);
            self.pos += 1;
        }
    }

    fn bump_n(&mut self, n: usize) {
        for _ in 0..n {
            self.bump();
        }
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        self.eat(TokenKind::Keyword(keyword))
    }

    fn found(&self) -> Option<String> {
        (!self.at_eof()).then(|| self.nth_text(0).to_string())
    }

    fn error(&mut self, kind: ParseErrorKind) {
        let offset = self
            .tokens
            .get(self.pos)
            .map_or(self.source.len(), |t| t.span.start);
        let position = self.line_index.position(self.source, offset);
        self.errors.push(ParseError { kind, position });
    }

    fn expect(&mut self, kind: TokenKind, expected: &'static str) -> bool {
        if self.eat(kind) {
            return true;
        }
        let found = self.found();
        self.error(ParseErrorKind::ExpectedToken { expected, found });
        false
    }

    // -----------------------------------------------------------
    // Event helpers.
    // -----------------------------------------------------------

    fn open(&mut self, kind: NodeKind) -> usize {
        self.events.push(Event::Open(kind));
        self.events.len() - 1
    }

    fn close(&mut self) {
        self.events.push(Event::Close);
    }

    fn mark(&self) -> usize {
        self.events.len()
    }

    /// Wrap everything emitted since `mark` in a new node.
    fn precede(&mut self, mark: usize, kind: NodeKind) {
        self.events.insert(mark, Event::Open(kind));
    }

    fn retag(&mut self, index: usize, kind: NodeKind) {
        self.events[index] = Event::Open(kind);
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            events: self.events.len(),
            errors: self.errors.len(),
        }
    }

    fn rewind(&mut self, cp: Checkpoint) {
        self.pos = cp.pos;
        self.events.truncate(cp.events);
        self.errors.truncate(cp.errors);
    }

    /// Wrap the current token in an `Error` node.
    fn error_token(&mut self) {
        let found = self.nth_text(0).to_string();
        self.error(ParseErrorKind::UnexpectedToken { found });
        self.open(NodeKind::Error);
        self.bump();
        self.close();
    }

    fn enter(&mut self) -> bool {
        if self.depth >= MAX_DEPTH {
            self.error(ParseErrorKind::TooDeep);
            if !self.at_eof() {
                self.error_token();
            }
            return false;
        }
        self.depth += 1;
        true
    }

    const fn leave(&mut self) {
        self.depth -= 1;
    }

    // -----------------------------------------------------------
    // Declarations.
    // -----------------------------------------------------------

    fn parse_compilation_unit(&mut self) {
        self.open(NodeKind::CompilationUnit);
        self.parse_member_list(true);
        // EndOfFile is the last child of the root
        if self.pos < self.tokens.len() {
            self.events.push(Event::Token);
            self.pos += 1;
        }
        self.close();
    }

    fn parse_member_list(&mut self, top_level: bool) {
        while !self.at_eof() && (top_level || !self.at(TokenKind::CloseBrace)) {
            let start = self.pos;
            if !self.parse_member(top_level) && top_level {
                self.parse_statement();
            }
            if self.pos == start {
                self.error_token();
            }
        }
    }

    fn at_modifier(&self) -> bool {
        match self.current() {
            TokenKind::Keyword(k) if k.is_modifier() => true,
            TokenKind::Identifier => {
                matches!(
                    self.nth_text(0),
                    "async" | "partial" | "required" | "file" | "global"
                ) && matches!(
                    self.nth(1),
                    TokenKind::Identifier | TokenKind::Keyword(_)
                )
            }
            _ => false,
        }
    }

    /// Parse one namespace or type member. Returns `false` (with
    /// nothing consumed) when the tokens do not start a member.
    fn parse_member(&mut self, top_level: bool) -> bool {
        if (self.at_keyword(Keyword::Unsafe)
            || self.at_keyword(Keyword::Checked)
            || self.at_keyword(Keyword::Unchecked))
            && self.nth(1) == TokenKind::OpenBrace
        {
            return false;
        }
        if !self.enter() {
            return true;
        }
        let cp = self.checkpoint();
        let member = self.open(NodeKind::Error);

        while self.at(TokenKind::OpenBracket) {
            self.parse_attribute_list();
        }
        while self.at_modifier() {
            self.bump();
        }

        let parsed = match self.current() {
            TokenKind::Keyword(Keyword::Using) if self.at_using_directive() => {
                self.parse_using_directive(member);
                true
            }
            TokenKind::Keyword(Keyword::Namespace) => {
                self.parse_namespace(member);
                true
            }
            TokenKind::Keyword(Keyword::Class | Keyword::Struct | Keyword::Interface) => {
                self.parse_type_declaration(member);
                true
            }
            TokenKind::Identifier
                if self.at_contextual("record")
                    && matches!(
                        self.nth(1),
                        TokenKind::Identifier
                            | TokenKind::Keyword(Keyword::Class | Keyword::Struct)
                    ) =>
            {
                self.parse_type_declaration(member);
                true
            }
            TokenKind::Keyword(Keyword::Enum) => {
                self.parse_enum(member);
                true
            }
            TokenKind::Keyword(Keyword::Delegate) if self.nth(1) != TokenKind::Star => {
                self.parse_delegate_declaration(member);
                true
            }
            TokenKind::Keyword(Keyword::Event) => {
                self.parse_event(member);
                true
            }
            TokenKind::Tilde if self.nth(1) == TokenKind::Identifier => {
                self.retag(member, NodeKind::DestructorDeclaration);
                self.bump_n(2);
                self.parse_parameter_list();
                self.parse_body();
                true
            }
            TokenKind::Keyword(Keyword::Implicit | Keyword::Explicit) => {
                self.retag(member, NodeKind::ConversionOperatorDeclaration);
                self.bump();
                self.expect(TokenKind::Keyword(Keyword::Operator), "operator");
                self.parse_type_or_error();
                self.parse_parameter_list();
                self.parse_body();
                true
            }
            // at the top level `F(x);` is an invocation statement
            TokenKind::Identifier if !top_level && self.nth(1) == TokenKind::OpenParen => {
                self.parse_constructor(member)
            }
            _ => self.parse_typed_member(member),
        };

        if parsed {
            self.close();
        } else {
            self.rewind(cp);
        }
        self.leave();
        parsed
    }

    /// `using X;`, `using static X;`, `using A = X;` as opposed to the
    /// `using (...)` and `using var x = ...;` statements.
    fn at_using_directive(&self) -> bool {
        match self.nth(1) {
            TokenKind::Keyword(Keyword::Static) => true,
            TokenKind::Identifier => matches!(
                self.nth(2),
                TokenKind::Eq | TokenKind::Dot | TokenKind::Semicolon | TokenKind::ColonColon
            ),
            _ => false,
        }
    }

    fn parse_using_directive(&mut self, member: usize) {
        self.retag(member, NodeKind::UsingDirective);
        self.bump();
        self.eat_keyword(Keyword::Static);
        if self.at(TokenKind::Identifier) && self.nth(1) == TokenKind::Eq {
            self.bump_n(2);
        }
        self.parse_type_or_error();
        self.expect(TokenKind::Semicolon, ";");
    }

    fn parse_namespace(&mut self, member: usize) {
        self.retag(member, NodeKind::NamespaceDeclaration);
        self.bump();
        self.parse_type_or_error();
        if self.eat(TokenKind::Semicolon) {
            return;
        }
        if self.expect(TokenKind::OpenBrace, "{") {
            self.parse_member_list(false);
            self.expect(TokenKind::CloseBrace, "}");
        }
    }

    fn parse_type_declaration(&mut self, member: usize) {
        self.retag(member, NodeKind::TypeDeclaration);
        if self.at_contextual("record") {
            self.bump();
            if self.at_keyword(Keyword::Class) || self.at_keyword(Keyword::Struct) {
                self.bump();
            }
        } else {
            self.bump();
        }
        self.expect(TokenKind::Identifier, "identifier");
        if self.at(TokenKind::Lt) {
            self.parse_type_parameter_list();
        }
        if self.at(TokenKind::OpenParen) {
            self.parse_parameter_list();
        }
        if self.at(TokenKind::Colon) {
            self.parse_base_list();
        }
        self.parse_constraint_clauses();
        if self.eat(TokenKind::Semicolon) {
            return;
        }
        if self.expect(TokenKind::OpenBrace, "{") {
            self.parse_member_list(false);
            self.expect(TokenKind::CloseBrace, "}");
        }
        self.eat(TokenKind::Semicolon);
    }

    fn parse_base_list(&mut self) {
        self.open(NodeKind::BaseList);
        self.bump(); // :
        loop {
            self.parse_type_or_error();
            if self.at(TokenKind::OpenParen) {
                self.parse_argument_list();
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.close();
    }

    fn parse_constraint_clauses(&mut self) {
        while self.at_contextual("where") {
            self.open(NodeKind::ConstraintClause);
            self.bump();
            self.expect(TokenKind::Identifier, "identifier");
            self.expect(TokenKind::Colon, ":");
            loop {
                if self.at_keyword(Keyword::New) {
                    self.bump();
                    self.expect(TokenKind::OpenParen, "(");
                    self.expect(TokenKind::CloseParen, ")");
                } else if self.at_keyword(Keyword::Class) || self.at_keyword(Keyword::Struct) {
                    self.bump();
                    self.eat(TokenKind::Question);
                } else if self.at_keyword(Keyword::Default) {
                    self.bump();
                } else {
                    self.parse_type_or_error();
                }
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.close();
        }
    }

    fn parse_enum(&mut self, member: usize) {
        self.retag(member, NodeKind::EnumDeclaration);
        self.bump();
        self.expect(TokenKind::Identifier, "identifier");
        if self.at(TokenKind::Colon) {
            self.parse_base_list();
        }
        if self.expect(TokenKind::OpenBrace, "{") {
            while !self.at(TokenKind::CloseBrace) && !self.at_eof() {
                let start = self.pos;
                self.open(NodeKind::EnumMember);
                while self.at(TokenKind::OpenBracket) {
                    self.parse_attribute_list();
                }
                self.expect(TokenKind::Identifier, "identifier");
                if self.eat(TokenKind::Eq) {
                    self.parse_expression();
                }
                self.close();
                if !self.eat(TokenKind::Comma) {
                    break;
                }
                if self.pos == start {
                    self.error_token();
                }
            }
            self.expect(TokenKind::CloseBrace, "}");
        }
        self.eat(TokenKind::Semicolon);
    }

    fn parse_delegate_declaration(&mut self, member: usize) {
        self.retag(member, NodeKind::DelegateDeclaration);
        self.bump();
        self.parse_type_or_error();
        self.expect(TokenKind::Identifier, "identifier");
        if self.at(TokenKind::Lt) {
            self.parse_type_parameter_list();
        }
        self.parse_parameter_list();
        self.parse_constraint_clauses();
        self.expect(TokenKind::Semicolon, ";");
    }

    fn parse_event(&mut self, member: usize) {
        self.retag(member, NodeKind::EventDeclaration);
        self.bump();
        self.parse_type_or_error();
        self.parse_member_name();
        if self.at(TokenKind::OpenBrace) {
            self.parse_accessor_list();
            return;
        }
        self.parse_variable_declarator_tail();
        while self.eat(TokenKind::Comma) {
            self.parse_variable_declarator();
        }
        self.expect(TokenKind::Semicolon, ";");
    }

    fn parse_constructor(&mut self, member: usize) -> bool {
        self.retag(member, NodeKind::ConstructorDeclaration);
        self.bump();
        self.parse_parameter_list();
        if self.at(TokenKind::Colon) {
            self.open(NodeKind::ConstructorInitializer);
            self.bump();
            if self.at_keyword(Keyword::Base) || self.at_keyword(Keyword::This) {
                self.bump();
            } else {
                let found = self.found();
                self.error(ParseErrorKind::ExpectedToken {
                    expected: "base",
                    found,
                });
            }
            self.parse_argument_list();
            self.close();
        }
        self.parse_body();
        true
    }

    /// Fields, methods, properties, indexers, and operators: all start
    /// with a type.
    fn parse_typed_member(&mut self, member: usize) -> bool {
        let type_mark = self.mark();
        if !self.parse_type() {
            return false;
        }

        match self.current() {
            TokenKind::Keyword(Keyword::Operator) => {
                self.retag(member, NodeKind::OperatorDeclaration);
                self.bump();
                // `>>` and `>>>` arrive as separate `>` tokens
                if self.at(TokenKind::Gt) {
                    while self.at(TokenKind::Gt) && self.joined_with_next() {
                        self.bump();
                    }
                    self.bump();
                } else {
                    self.bump();
                }
                self.parse_parameter_list();
                self.parse_body();
                true
            }
            TokenKind::Keyword(Keyword::This) => {
                self.retag(member, NodeKind::IndexerDeclaration);
                self.bump();
                self.parse_bracketed_parameter_list();
                self.parse_property_body();
                true
            }
            TokenKind::Identifier => {
                let after_name = self.scan_member_name();
                match after_name {
                    TokenKind::OpenParen | TokenKind::Lt => {
                        self.retag(member, NodeKind::MethodDeclaration);
                        self.parse_member_name();
                        if self.at(TokenKind::Lt) {
                            self.parse_type_parameter_list();
                        }
                        self.parse_parameter_list();
                        self.parse_constraint_clauses();
                        self.parse_body();
                    }
                    TokenKind::OpenBrace | TokenKind::FatArrow => {
                        self.retag(member, NodeKind::PropertyDeclaration);
                        self.parse_member_name();
                        self.parse_property_body();
                    }
                    _ => {
                        self.retag(member, NodeKind::FieldDeclaration);
                        self.precede(type_mark, NodeKind::VariableDeclaration);
                        self.parse_variable_declarator();
                        while self.eat(TokenKind::Comma) {
                            self.parse_variable_declarator();
                        }
                        self.close();
                        self.expect(TokenKind::Semicolon, ";");
                    }
                }
                true
            }
            _ => false,
        }
    }

    /// Kind of the token following `Name` or `I.Name` (explicit
    /// interface implementation), without consuming anything.
    fn scan_member_name(&self) -> TokenKind {
        let mut n = 1;
        while self.nth(n) == TokenKind::Dot
            && matches!(
                self.nth(n + 1),
                TokenKind::Identifier | TokenKind::Keyword(Keyword::This)
            )
        {
            n += 2;
        }
        self.nth(n)
    }

    fn parse_member_name(&mut self) {
        self.expect(TokenKind::Identifier, "identifier");
        while self.at(TokenKind::Dot)
            && matches!(
                self.nth(1),
                TokenKind::Identifier | TokenKind::Keyword(Keyword::This)
            )
        {
            self.bump_n(2);
        }
    }

    fn parse_body(&mut self) {
        match self.current() {
            TokenKind::OpenBrace => self.parse_block(),
            TokenKind::FatArrow => {
                self.parse_arrow_clause();
                self.expect(TokenKind::Semicolon, ";");
            }
            _ => {
                self.expect(TokenKind::Semicolon, ";");
            }
        }
    }

    fn parse_arrow_clause(&mut self) {
        self.open(NodeKind::ArrowClause);
        self.bump();
        self.parse_expression();
        self.close();
    }

    fn parse_property_body(&mut self) {
        if self.at(TokenKind::FatArrow) {
            self.parse_arrow_clause();
            self.expect(TokenKind::Semicolon, ";");
            return;
        }
        self.parse_accessor_list();
        if self.eat(TokenKind::Eq) {
            self.parse_variable_initializer();
            self.expect(TokenKind::Semicolon, ";");
        }
    }

    fn parse_accessor_list(&mut self) {
        self.open(NodeKind::AccessorList);
        if self.expect(TokenKind::OpenBrace, "{") {
            while !self.at(TokenKind::CloseBrace) && !self.at_eof() {
                let start = self.pos;
                self.open(NodeKind::Accessor);
                while self.at(TokenKind::OpenBracket) {
                    self.parse_attribute_list();
                }
                while self.at_modifier() {
                    self.bump();
                }
                self.expect(TokenKind::Identifier, "accessor");
                self.parse_body();
                self.close();
                if self.pos == start {
                    self.error_token();
                }
            }
            self.expect(TokenKind::CloseBrace, "}");
        }
        self.close();
    }

    fn parse_attribute_list(&mut self) {
        self.open(NodeKind::AttributeList);
        self.bump(); // [
        if matches!(self.current(), TokenKind::Identifier | TokenKind::Keyword(_))
            && self.nth(1) == TokenKind::Colon
        {
            self.bump_n(2);
        }
        loop {
            self.open(NodeKind::Attribute);
            self.parse_type_or_error();
            if self.at(TokenKind::OpenParen) {
                self.parse_argument_list();
            }
            self.close();
            if !self.eat(TokenKind::Comma) || self.at(TokenKind::CloseBracket) {
                break;
            }
        }
        self.expect(TokenKind::CloseBracket, "]");
        self.close();
    }

    fn parse_type_parameter_list(&mut self) {
        self.open(NodeKind::TypeParameterList);
        self.bump(); // <
        loop {
            self.open(NodeKind::TypeParameter);
            while self.at(TokenKind::OpenBracket) {
                self.parse_attribute_list();
            }
            if self.at_keyword(Keyword::In) || self.at_keyword(Keyword::Out) {
                self.bump();
            }
            self.expect(TokenKind::Identifier, "identifier");
            self.close();
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::Gt, ">");
        self.close();
    }

    fn parse_parameter_list(&mut self) {
        self.open(NodeKind::ParameterList);
        if self.expect(TokenKind::OpenParen, "(") {
            self.parse_parameters(TokenKind::CloseParen);
            self.expect(TokenKind::CloseParen, ")");
        }
        self.close();
    }

    fn parse_bracketed_parameter_list(&mut self) {
        self.open(NodeKind::BracketedParameterList);
        if self.expect(TokenKind::OpenBracket, "[") {
            self.parse_parameters(TokenKind::CloseBracket);
            self.expect(TokenKind::CloseBracket, "]");
        }
        self.close();
    }

    fn parse_parameters(&mut self, close: TokenKind) {
        while !self.at(close) && !self.at_eof() {
            let start = self.pos;
            self.parse_parameter();
            if self.pos == start {
                self.error_token();
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
    }

    fn at_parameter_modifier(&self) -> bool {
        matches!(
            self.current(),
            TokenKind::Keyword(
                Keyword::Ref | Keyword::Out | Keyword::In | Keyword::Params | Keyword::This
            )
        ) || self.at_keyword(Keyword::Readonly)
            || (self.at_contextual("scoped")
                && matches!(self.nth(1), TokenKind::Identifier | TokenKind::Keyword(_)))
    }

    fn parse_parameter(&mut self) {
        self.open(NodeKind::Parameter);
        while self.at(TokenKind::OpenBracket) {
            self.parse_attribute_list();
        }
        while self.at_parameter_modifier() {
            self.bump();
        }
        // untyped lambda parameter
        if self.at(TokenKind::Identifier)
            && matches!(
                self.nth(1),
                TokenKind::Comma | TokenKind::CloseParen | TokenKind::EndOfFile
            )
        {
            self.bump();
        } else {
            self.parse_type_or_error();
            self.eat(TokenKind::Identifier);
            if self.eat(TokenKind::Eq) {
                self.parse_expression();
            }
        }
        self.close();
    }

    fn parse_variable_declarator(&mut self) {
        self.open(NodeKind::VariableDeclarator);
        self.expect(TokenKind::Identifier, "identifier");
        self.parse_variable_declarator_tail();
        self.close();
    }

    /// Fixed-size buffer length and initializer after a declarator name.
    fn parse_variable_declarator_tail(&mut self) {
        if self.at(TokenKind::OpenBracket) {
            self.parse_bracketed_argument_list();
        }
        if self.eat(TokenKind::Eq) {
            self.parse_variable_initializer();
        }
    }

    fn parse_variable_initializer(&mut self) {
        if self.at(TokenKind::OpenBrace) {
            self.parse_initializer();
        } else {
            self.parse_expression();
        }
    }

    // -----------------------------------------------------------
    // Types.
    // -----------------------------------------------------------

    fn parse_type_or_error(&mut self) {
        if !self.parse_type() {
            let found = self.found();
            self.error(ParseErrorKind::ExpectedType { found });
        }
    }

    /// Parse a type. Returns `false` without consuming anything when
    /// the tokens do not form one.
    fn parse_type(&mut self) -> bool {
        if !self.enter() {
            return false;
        }
        let mark = self.mark();
        let cp = self.checkpoint();
        let parsed = self.parse_non_array_type();
        if parsed {
            self.parse_type_suffixes(mark, true);
        } else {
            self.rewind(cp);
        }
        self.leave();
        parsed
    }

    fn parse_non_array_type(&mut self) -> bool {
        match self.current() {
            TokenKind::Keyword(k) if k.is_predefined_type() => {
                self.open(NodeKind::PredefinedType);
                self.bump();
                self.close();
                true
            }
            TokenKind::Keyword(Keyword::Delegate) if self.nth(1) == TokenKind::Star => {
                self.parse_function_pointer_type();
                true
            }
            TokenKind::Keyword(Keyword::Ref) => {
                self.open(NodeKind::RefType);
                self.bump();
                self.eat_keyword(Keyword::Readonly);
                let parsed = self.parse_type();
                self.close();
                parsed
            }
            TokenKind::OpenParen => self.parse_tuple_type(),
            TokenKind::Identifier => {
                self.parse_name(false);
                true
            }
            _ => false,
        }
    }

    /// `?`, `*`, and `[]` / `[,]` suffixes.
    fn parse_type_suffixes(&mut self, mark: usize, allow_rank: bool) {
        loop {
            match self.current() {
                TokenKind::Star => {
                    self.precede(mark, NodeKind::PointerType);
                    self.bump();
                    self.close();
                }
                TokenKind::Question if self.nullable_suffix_fits() => {
                    self.precede(mark, NodeKind::NullableType);
                    self.bump();
                    self.close();
                }
                TokenKind::OpenBracket
                    if allow_rank
                        && matches!(self.nth(1), TokenKind::CloseBracket | TokenKind::Comma) =>
                {
                    self.precede(mark, NodeKind::ArrayType);
                    self.parse_rank_specifier();
                    self.close();
                }
                _ => break,
            }
        }
    }

    fn nullable_suffix_fits(&self) -> bool {
        matches!(
            self.nth(1),
            TokenKind::Identifier
                | TokenKind::Gt
                | TokenKind::Comma
                | TokenKind::CloseParen
                | TokenKind::CloseBracket
                | TokenKind::OpenBracket
                | TokenKind::Star
                | TokenKind::Semicolon
                | TokenKind::Eq
                | TokenKind::OpenBrace
                | TokenKind::EndOfFile
        )
    }

    fn parse_rank_specifier(&mut self) {
        self.open(NodeKind::ArrayRankSpecifier);
        self.bump(); // [
        while self.eat(TokenKind::Comma) {}
        self.expect(TokenKind::CloseBracket, "]");
        self.close();
    }

    fn parse_tuple_type(&mut self) -> bool {
        let cp = self.checkpoint();
        self.open(NodeKind::TupleType);
        self.bump(); // (
        let mut elements = 0;
        loop {
            self.open(NodeKind::TupleElement);
            if !self.parse_type() {
                self.rewind(cp);
                return false;
            }
            self.eat(TokenKind::Identifier);
            self.close();
            elements += 1;
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        if elements < 2 || !self.eat(TokenKind::CloseParen) {
            self.rewind(cp);
            return false;
        }
        self.close();
        true
    }

    /// `delegate* [managed | unmanaged[Conv, ...]] <T1, ..., TResult>`.
    fn parse_function_pointer_type(&mut self) {
        self.open(NodeKind::FunctionPointerType);
        self.bump(); // delegate
        self.bump(); // *

        if self.at(TokenKind::Identifier) {
            self.open(NodeKind::FunctionPointerCallingConvention);
            let name = self.nth_text(0);
            if name != "managed" && name != "unmanaged" {
                self.error(ParseErrorKind::InvalidCallingConvention {
                    name: name.to_string(),
                });
            }
            self.bump();
            if self.at(TokenKind::OpenBracket) {
                self.open(NodeKind::FunctionPointerUnmanagedCallingConventionList);
                self.bump();
                loop {
                    self.expect(TokenKind::Identifier, "identifier");
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::CloseBracket, "]");
                self.close();
            }
            self.close();
        }

        self.open(NodeKind::FunctionPointerParameterList);
        if self.expect(TokenKind::Lt, "<") {
            loop {
                self.open(NodeKind::FunctionPointerParameter);
                while self.at_parameter_modifier() {
                    self.bump();
                }
                self.parse_type_or_error();
                self.close();
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::Gt, ">");
        }
        self.close();

        self.close();
    }

    /// Dotted and generic names. In expression position, a `<` only
    /// starts a type argument list when the token after the closing
    /// `>` could follow a name.
    fn parse_name(&mut self, in_expression: bool) {
        let mark = self.mark();
        self.parse_simple_name(in_expression);
        if self.at(TokenKind::ColonColon) && self.nth(1) == TokenKind::Identifier {
            self.precede(mark, NodeKind::AliasQualifiedName);
            self.bump();
            self.parse_simple_name(in_expression);
            self.close();
        }
        if in_expression {
            return;
        }
        while self.at(TokenKind::Dot) && self.nth(1) == TokenKind::Identifier {
            self.precede(mark, NodeKind::QualifiedName);
            self.bump();
            self.parse_simple_name(false);
            self.close();
        }
    }

    fn parse_simple_name(&mut self, in_expression: bool) {
        if self.nth(1) == TokenKind::Lt {
            let cp = self.checkpoint();
            self.open(NodeKind::GenericName);
            self.bump();
            if self.parse_type_argument_list()
                && (!in_expression || self.type_argument_follower())
            {
                self.close();
                return;
            }
            self.rewind(cp);
        }
        self.open(NodeKind::IdentifierName);
        self.bump();
        self.close();
    }

    fn type_argument_follower(&self) -> bool {
        matches!(
            self.current(),
            TokenKind::OpenParen
                | TokenKind::CloseParen
                | TokenKind::CloseBracket
                | TokenKind::CloseBrace
                | TokenKind::Colon
                | TokenKind::Semicolon
                | TokenKind::Comma
                | TokenKind::Dot
                | TokenKind::Question
                | TokenKind::QuestionDot
                | TokenKind::EqEq
                | TokenKind::BangEq
                | TokenKind::Pipe
                | TokenKind::Caret
                | TokenKind::AmpAmp
                | TokenKind::PipePipe
                | TokenKind::Amp
                | TokenKind::OpenBracket
                | TokenKind::EndOfFile
        )
    }

    fn parse_type_argument_list(&mut self) -> bool {
        self.open(NodeKind::TypeArgumentList);
        self.bump(); // <
        if self.at(TokenKind::Gt) || self.at(TokenKind::Comma) {
            // unbound generic: List<>, Dictionary<,>
            while self.eat(TokenKind::Comma) {}
        } else {
            loop {
                if !self.parse_type() {
                    return false;
                }
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        if !self.eat(TokenKind::Gt) {
            return false;
        }
        self.close();
        true
    }

    // -----------------------------------------------------------
    // Statements.
    // -----------------------------------------------------------

    fn parse_block(&mut self) {
        self.open(NodeKind::Block);
        self.bump(); // {
        while !self.at(TokenKind::CloseBrace) && !self.at_eof() {
            let start = self.pos;
            self.parse_statement();
            if self.pos == start {
                self.error_token();
            }
        }
        self.expect(TokenKind::CloseBrace, "}");
        self.close();
    }

    fn parse_embedded_statement(&mut self) {
        let start = self.pos;
        self.parse_statement();
        if self.pos == start && !self.at_eof() {
            self.error_token();
        }
    }

    fn parse_statement(&mut self) {
        if !self.enter() {
            return;
        }
        match self.current() {
            TokenKind::OpenBrace => self.parse_block(),
            TokenKind::Semicolon => {
                self.open(NodeKind::EmptyStatement);
                self.bump();
                self.close();
            }
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::While) => {
                self.open(NodeKind::WhileStatement);
                self.bump();
                self.parse_parenthesized_condition();
                self.parse_embedded_statement();
                self.close();
            }
            TokenKind::Keyword(Keyword::Do) => self.parse_do(),
            TokenKind::Keyword(Keyword::For) => self.parse_for(),
            TokenKind::Keyword(Keyword::Foreach) => self.parse_foreach(),
            TokenKind::Keyword(Keyword::Return) => {
                self.parse_keyword_expression_statement(NodeKind::ReturnStatement);
            }
            TokenKind::Keyword(Keyword::Throw) => {
                self.parse_keyword_expression_statement(NodeKind::ThrowStatement);
            }
            TokenKind::Keyword(Keyword::Break | Keyword::Continue) => {
                self.open(NodeKind::JumpStatement);
                self.bump();
                self.expect(TokenKind::Semicolon, ";");
                self.close();
            }
            TokenKind::Keyword(Keyword::Goto) => {
                self.open(NodeKind::JumpStatement);
                self.bump();
                if self.eat_keyword(Keyword::Case) {
                    self.parse_expression();
                } else if !self.eat_keyword(Keyword::Default) {
                    self.expect(TokenKind::Identifier, "identifier");
                }
                self.expect(TokenKind::Semicolon, ";");
                self.close();
            }
            TokenKind::Keyword(Keyword::Switch) => self.parse_switch_statement(),
            TokenKind::Keyword(Keyword::Try) => self.parse_try(),
            TokenKind::Keyword(Keyword::Lock) => {
                self.open(NodeKind::LockStatement);
                self.bump();
                self.parse_parenthesized_condition();
                self.parse_embedded_statement();
                self.close();
            }
            TokenKind::Keyword(Keyword::Using) => self.parse_using_statement(),
            TokenKind::Keyword(Keyword::Fixed) => self.parse_fixed(),
            TokenKind::Keyword(Keyword::Unsafe) if self.nth(1) == TokenKind::OpenBrace => {
                self.open(NodeKind::UnsafeStatement);
                self.bump();
                self.parse_block();
                self.close();
            }
            TokenKind::Keyword(Keyword::Checked | Keyword::Unchecked)
                if self.nth(1) == TokenKind::OpenBrace =>
            {
                self.open(NodeKind::CheckedStatement);
                self.bump();
                self.parse_block();
                self.close();
            }
            TokenKind::Identifier
                if self.at_contextual("yield")
                    && matches!(
                        self.nth(1),
                        TokenKind::Keyword(Keyword::Return | Keyword::Break)
                    ) =>
            {
                self.open(NodeKind::YieldStatement);
                self.bump();
                if self.eat_keyword(Keyword::Return) {
                    self.parse_expression();
                } else {
                    self.bump();
                }
                self.expect(TokenKind::Semicolon, ";");
                self.close();
            }
            TokenKind::Identifier
                if self.at_contextual("await")
                    && matches!(
                        self.nth(1),
                        TokenKind::Keyword(Keyword::Foreach | Keyword::Using)
                    ) =>
            {
                if self.nth(1) == TokenKind::Keyword(Keyword::Foreach) {
                    self.parse_foreach();
                } else {
                    self.parse_using_statement();
                }
            }
            TokenKind::Identifier if self.nth(1) == TokenKind::Colon => {
                self.open(NodeKind::LabeledStatement);
                self.bump_n(2);
                self.parse_embedded_statement();
                self.close();
            }
            TokenKind::CloseBrace | TokenKind::EndOfFile => {}
            _ => {
                if !self.try_parse_local_declaration() {
                    self.parse_expression_statement();
                }
            }
        }
        self.leave();
    }

    fn parse_keyword_expression_statement(&mut self, kind: NodeKind) {
        self.open(kind);
        self.bump();
        if !self.at(TokenKind::Semicolon) {
            self.parse_expression();
        }
        self.expect(TokenKind::Semicolon, ";");
        self.close();
    }

    fn parse_expression_statement(&mut self) {
        let start = self.pos;
        let events = self.events.len();
        self.open(NodeKind::ExpressionStatement);
        self.parse_expression();
        if self.pos == start {
            // keep the error, drop the empty node
            self.events.truncate(events);
            return;
        }
        self.expect(TokenKind::Semicolon, ";");
        self.close();
    }

    fn parse_parenthesized_condition(&mut self) {
        if self.expect(TokenKind::OpenParen, "(") {
            self.parse_expression();
            self.expect(TokenKind::CloseParen, ")");
        }
    }

    fn parse_if(&mut self) {
        self.open(NodeKind::IfStatement);
        self.bump();
        self.parse_parenthesized_condition();
        self.parse_embedded_statement();
        if self.at_keyword(Keyword::Else) {
            self.open(NodeKind::ElseClause);
            self.bump();
            self.parse_embedded_statement();
            self.close();
        }
        self.close();
    }

    fn parse_do(&mut self) {
        self.open(NodeKind::DoStatement);
        self.bump();
        self.parse_embedded_statement();
        self.expect(TokenKind::Keyword(Keyword::While), "while");
        self.parse_parenthesized_condition();
        self.expect(TokenKind::Semicolon, ";");
        self.close();
    }

    fn parse_for(&mut self) {
        self.open(NodeKind::ForStatement);
        self.bump();
        if self.expect(TokenKind::OpenParen, "(") {
            if !self.at(TokenKind::Semicolon) && !self.try_parse_variable_declaration() {
                self.parse_expression_list(TokenKind::Semicolon);
            }
            self.expect(TokenKind::Semicolon, ";");
            if !self.at(TokenKind::Semicolon) {
                self.parse_expression();
            }
            self.expect(TokenKind::Semicolon, ";");
            self.parse_expression_list(TokenKind::CloseParen);
            self.expect(TokenKind::CloseParen, ")");
        }
        self.parse_embedded_statement();
        self.close();
    }

    fn parse_expression_list(&mut self, close: TokenKind) {
        while !self.at(close) && !self.at_eof() {
            let start = self.pos;
            self.parse_expression();
            if self.pos == start || !self.eat(TokenKind::Comma) {
                break;
            }
        }
    }

    fn parse_foreach(&mut self) {
        self.open(NodeKind::ForEachStatement);
        if self.at_contextual("await") {
            self.bump();
        }
        self.bump(); // foreach
        if self.expect(TokenKind::OpenParen, "(") {
            let cp = self.checkpoint();
            let typed = self.parse_type() && self.eat(TokenKind::Identifier);
            if !typed {
                // deconstruction: var (a, b) or (var a, var b)
                self.rewind(cp);
                self.parse_expression();
            }
            self.expect(TokenKind::Keyword(Keyword::In), "in");
            self.parse_expression();
            self.expect(TokenKind::CloseParen, ")");
        }
        self.parse_embedded_statement();
        self.close();
    }

    fn parse_switch_statement(&mut self) {
        self.open(NodeKind::SwitchStatement);
        self.bump();
        self.parse_parenthesized_condition();
        if self.expect(TokenKind::OpenBrace, "{") {
            while !self.at(TokenKind::CloseBrace) && !self.at_eof() {
                let start = self.pos;
                self.parse_switch_section();
                if self.pos == start {
                    self.error_token();
                }
            }
            self.expect(TokenKind::CloseBrace, "}");
        }
        self.close();
    }

    fn at_switch_label(&self) -> bool {
        self.at_keyword(Keyword::Case)
            || (self.at_keyword(Keyword::Default) && self.nth(1) == TokenKind::Colon)
    }

    fn parse_switch_section(&mut self) {
        self.open(NodeKind::SwitchSection);
        while self.at_switch_label() {
            self.open(NodeKind::CaseLabel);
            if self.eat_keyword(Keyword::Case) {
                self.parse_pattern();
                if self.at_contextual("when") {
                    self.bump();
                    self.parse_expression();
                }
            } else {
                self.bump();
            }
            self.expect(TokenKind::Colon, ":");
            self.close();
        }
        while !self.at_switch_label() && !self.at(TokenKind::CloseBrace) && !self.at_eof() {
            let start = self.pos;
            self.parse_statement();
            if self.pos == start {
                self.error_token();
            }
        }
        self.close();
    }

    fn parse_try(&mut self) {
        self.open(NodeKind::TryStatement);
        self.bump();
        self.parse_block_or_error();
        while self.at_keyword(Keyword::Catch) {
            self.open(NodeKind::CatchClause);
            self.bump();
            if self.eat(TokenKind::OpenParen) {
                self.parse_type_or_error();
                self.eat(TokenKind::Identifier);
                self.expect(TokenKind::CloseParen, ")");
            }
            if self.at_contextual("when") {
                self.bump();
                self.parse_parenthesized_condition();
            }
            self.parse_block_or_error();
            self.close();
        }
        if self.at_keyword(Keyword::Finally) {
            self.open(NodeKind::FinallyClause);
            self.bump();
            self.parse_block_or_error();
            self.close();
        }
        self.close();
    }

    fn parse_block_or_error(&mut self) {
        if self.at(TokenKind::OpenBrace) {
            self.parse_block();
        } else {
            let found = self.found();
            self.error(ParseErrorKind::ExpectedToken {
                expected: "{",
                found,
            });
        }
    }

    fn parse_using_statement(&mut self) {
        let awaited = self.at_contextual("await");
        let paren = self.nth(usize::from(awaited) + 1) == TokenKind::OpenParen;
        if paren {
            self.open(NodeKind::UsingStatement);
            self.bump_n(usize::from(awaited) + 2);
            if !self.try_parse_variable_declaration() {
                self.parse_expression();
            }
            self.expect(TokenKind::CloseParen, ")");
            self.parse_embedded_statement();
        } else {
            self.open(NodeKind::LocalDeclarationStatement);
            self.bump_n(usize::from(awaited) + 1);
            self.open(NodeKind::VariableDeclaration);
            self.parse_type_or_error();
            self.parse_variable_declarator();
            while self.eat(TokenKind::Comma) {
                self.parse_variable_declarator();
            }
            self.close();
            self.expect(TokenKind::Semicolon, ";");
        }
        self.close();
    }

    fn parse_fixed(&mut self) {
        self.open(NodeKind::FixedStatement);
        self.bump();
        if self.expect(TokenKind::OpenParen, "(") {
            if !self.try_parse_variable_declaration() {
                let found = self.found();
                self.error(ParseErrorKind::ExpectedType { found });
            }
            self.expect(TokenKind::CloseParen, ")");
        }
        self.parse_embedded_statement();
        self.close();
    }

    /// `Type name [= init], ...` without a terminator, as used by `for`,
    /// `using`, and `fixed`.
    fn try_parse_variable_declaration(&mut self) -> bool {
        let cp = self.checkpoint();
        self.open(NodeKind::VariableDeclaration);
        if !self.parse_type()
            || !self.at(TokenKind::Identifier)
            || !matches!(
                self.nth(1),
                TokenKind::Eq | TokenKind::Comma | TokenKind::Semicolon | TokenKind::CloseParen
            )
        {
            self.rewind(cp);
            return false;
        }
        self.parse_variable_declarator();
        while self.eat(TokenKind::Comma) {
            self.parse_variable_declarator();
        }
        self.close();
        true
    }

    fn at_local_modifier(&self) -> bool {
        match self.current() {
            TokenKind::Keyword(
                Keyword::Const | Keyword::Static | Keyword::Unsafe | Keyword::Extern,
            ) => true,
            TokenKind::Identifier => {
                (self.at_contextual("async") || self.at_contextual("scoped"))
                    && matches!(
                        self.nth(1),
                        TokenKind::Identifier | TokenKind::Keyword(_)
                    )
            }
            _ => false,
        }
    }

    /// A statement of the shape `Type name ...` is a declaration, even
    /// when it could also read as an expression (`a * b;`).
    fn try_parse_local_declaration(&mut self) -> bool {
        if self.at_contextual("await") {
            return false;
        }
        let cp = self.checkpoint();
        let statement = self.open(NodeKind::LocalDeclarationStatement);
        while self.at_local_modifier() {
            self.bump();
        }
        let declaration = self.open(NodeKind::VariableDeclaration);
        if !self.parse_type() || !self.at(TokenKind::Identifier) {
            self.rewind(cp);
            return false;
        }

        match self.nth(1) {
            TokenKind::OpenParen | TokenKind::Lt => {
                self.retag(statement, NodeKind::LocalFunctionStatement);
                self.events.remove(declaration);
                self.bump();
                if self.at(TokenKind::Lt) {
                    self.parse_type_parameter_list();
                }
                self.parse_parameter_list();
                self.parse_constraint_clauses();
                self.parse_body();
            }
            TokenKind::Eq | TokenKind::Semicolon | TokenKind::Comma | TokenKind::OpenBracket => {
                self.parse_variable_declarator();
                while self.eat(TokenKind::Comma) {
                    self.parse_variable_declarator();
                }
                self.close();
                self.expect(TokenKind::Semicolon, ";");
            }
            _ => {
                self.rewind(cp);
                return false;
            }
        }
        self.close();
        true
    }

    // -----------------------------------------------------------
    // Expressions.
    // -----------------------------------------------------------

    fn parse_expression(&mut self) {
        if !self.enter() {
            return;
        }
        if self.at_lambda() {
            self.parse_lambda();
            self.leave();
            return;
        }

        let mark = self.mark();
        self.parse_conditional();
        if self.current().is_assignment() {
            self.precede(mark, NodeKind::AssignmentExpression);
            self.bump();
            self.parse_expression();
            self.close();
        } else if self.at_shift_right_assign() {
            self.precede(mark, NodeKind::AssignmentExpression);
            self.bump_n(2);
            self.parse_expression();
            self.close();
        }
        self.leave();
    }

    fn parse_conditional(&mut self) {
        let mark = self.mark();
        self.parse_binary(0);
        if self.at(TokenKind::Question) {
            self.precede(mark, NodeKind::ConditionalExpression);
            self.bump();
            self.parse_expression();
            self.expect(TokenKind::Colon, ":");
            self.parse_expression();
            self.close();
        }
    }

    /// Binary operator at the cursor: precedence and token count.
    fn binary_operator(&self) -> Option<(u8, usize)> {
        let op = match self.current() {
            TokenKind::QuestionQuestion => (1, 1),
            TokenKind::PipePipe => (2, 1),
            TokenKind::AmpAmp => (3, 1),
            TokenKind::Pipe => (4, 1),
            TokenKind::Caret => (5, 1),
            TokenKind::Amp => (6, 1),
            TokenKind::EqEq | TokenKind::BangEq => (7, 1),
            TokenKind::Gt if self.at_shift_right_assign() => return None,
            TokenKind::Gt if self.at_shift_right() => (9, 2),
            TokenKind::Lt
            | TokenKind::Gt
            | TokenKind::LtEq
            | TokenKind::GtEq
            | TokenKind::Keyword(Keyword::Is | Keyword::As) => (8, 1),
            TokenKind::LtLt => (9, 1),
            TokenKind::Plus | TokenKind::Minus => (10, 1),
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => (11, 1),
            _ => return None,
        };
        Some(op)
    }

    fn parse_binary(&mut self, min_precedence: u8) {
        let mark = self.mark();
        self.parse_range();

        while let Some((precedence, width)) = self.binary_operator() {
            if precedence < min_precedence {
                break;
            }
            if self.at_keyword(Keyword::Is) {
                self.precede(mark, NodeKind::IsPatternExpression);
                self.bump();
                self.parse_pattern();
                self.close();
                continue;
            }
            if self.at_keyword(Keyword::As) {
                self.precede(mark, NodeKind::AsExpression);
                self.bump();
                self.parse_type_or_error();
                self.close();
                continue;
            }
            self.precede(mark, NodeKind::BinaryExpression);
            self.bump_n(width);
            // `??` is right-associative
            let next = if precedence == 1 {
                precedence
            } else {
                precedence + 1
            };
            self.parse_binary(next);
            self.close();
        }
    }

    /// Unary operand followed by optional `switch { ... }` and `..`.
    fn parse_range(&mut self) {
        let mark = self.mark();
        if self.at(TokenKind::DotDot) {
            self.open(NodeKind::RangeExpression);
            self.bump();
            if self.can_start_expression() {
                self.parse_unary();
            }
            self.close();
            return;
        }
        self.parse_unary();
        while self.at_keyword(Keyword::Switch) {
            self.precede(mark, NodeKind::SwitchExpression);
            self.parse_switch_expression_arms();
            self.close();
        }
        if self.at(TokenKind::DotDot) {
            self.precede(mark, NodeKind::RangeExpression);
            self.bump();
            if self.can_start_expression() {
                self.parse_unary();
            }
            self.close();
        }
    }

    fn parse_switch_expression_arms(&mut self) {
        self.bump(); // switch
        if !self.expect(TokenKind::OpenBrace, "{") {
            return;
        }
        while !self.at(TokenKind::CloseBrace) && !self.at_eof() {
            let start = self.pos;
            self.open(NodeKind::SwitchExpressionArm);
            self.parse_pattern();
            if self.at_contextual("when") {
                self.bump();
                self.parse_expression();
            }
            self.expect(TokenKind::FatArrow, "=>");
            self.parse_expression();
            self.close();
            if self.pos == start {
                self.error_token();
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseBrace, "}");
    }

    fn can_start_expression(&self) -> bool {
        match self.current() {
            TokenKind::Identifier
            | TokenKind::Number
            | TokenKind::String
            | TokenKind::InterpolatedStringStart
            | TokenKind::Char
            | TokenKind::OpenParen
            | TokenKind::OpenBracket
            | TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Amp
            | TokenKind::Bang
            | TokenKind::Tilde
            | TokenKind::Caret
            | TokenKind::PlusPlus
            | TokenKind::MinusMinus
            | TokenKind::DotDot => true,
            TokenKind::Keyword(k) => k.is_predefined_type() || is_expression_keyword(k),
            _ => false,
        }
    }

    fn parse_unary(&mut self) {
        if !self.enter() {
            return;
        }
        match self.current() {
            TokenKind::Star => self.parse_prefix(NodeKind::PointerIndirectionExpression),
            TokenKind::Amp => self.parse_prefix(NodeKind::AddressOfExpression),
            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Bang
            | TokenKind::Tilde
            | TokenKind::Caret
            | TokenKind::PlusPlus
            | TokenKind::MinusMinus => self.parse_prefix(NodeKind::PrefixUnaryExpression),
            TokenKind::Keyword(Keyword::Ref) => {
                self.open(NodeKind::RefExpression);
                self.bump();
                self.eat_keyword(Keyword::Readonly);
                self.parse_unary();
                self.close();
            }
            TokenKind::Keyword(Keyword::Throw) => {
                self.open(NodeKind::ThrowExpression);
                self.bump();
                self.parse_expression();
                self.close();
            }
            TokenKind::Identifier if self.at_contextual("await") && self.await_operand_follows() => {
                self.parse_prefix(NodeKind::AwaitExpression);
            }
            TokenKind::OpenParen if self.try_parse_cast() => {}
            _ => self.parse_postfix(),
        }
        self.leave();
    }

    fn parse_prefix(&mut self, kind: NodeKind) {
        self.open(kind);
        self.bump();
        if self.can_start_expression() {
            self.parse_unary();
        } else {
            let found = self.found();
            self.error(ParseErrorKind::ExpectedExpression { found });
        }
        self.close();
    }

    fn await_operand_follows(&self) -> bool {
        !matches!(
            self.nth(1),
            TokenKind::Semicolon
                | TokenKind::CloseParen
                | TokenKind::Comma
                | TokenKind::Dot
                | TokenKind::Eq
                | TokenKind::EndOfFile
        )
    }

    /// `(Type)operand`. A parenthesized name followed by an operator
    /// that is also binary (`(a)*b`, `(a)-b`) is an expression unless
    /// the type can only be a type (`(int)*p`, `(byte*)&x`).
    fn try_parse_cast(&mut self) -> bool {
        let cp = self.checkpoint();
        let type_start = self.pos + 1;
        self.open(NodeKind::CastExpression);
        self.bump(); // (
        if !self.parse_type() || !self.at(TokenKind::CloseParen) {
            self.rewind(cp);
            return false;
        }
        let only_a_type = self.tokens[type_start..self.pos].iter().any(|t| {
            matches!(
                t.kind,
                TokenKind::Star
                    | TokenKind::OpenBracket
                    | TokenKind::Question
                    | TokenKind::Lt
                    | TokenKind::ColonColon
                    | TokenKind::Keyword(Keyword::Delegate)
            ) || matches!(t.kind, TokenKind::Keyword(k) if k.is_predefined_type())
        });
        self.bump(); // )

        let operand_follows = if only_a_type {
            self.can_start_expression()
        } else {
            match self.current() {
                TokenKind::Identifier
                | TokenKind::Number
                | TokenKind::String
                | TokenKind::InterpolatedStringStart
                | TokenKind::Char
                | TokenKind::OpenParen
                | TokenKind::Bang
                | TokenKind::Tilde => true,
                TokenKind::Keyword(k) => k.is_predefined_type() || is_expression_keyword(k),
                _ => false,
            }
        };
        if !operand_follows {
            self.rewind(cp);
            return false;
        }
        self.parse_unary();
        self.close();
        true
    }

    fn at_lambda(&self) -> bool {
        let mut n = 0;
        if self.nth_is_contextual(n, "async")
            && matches!(
                self.nth(n + 1),
                TokenKind::Identifier | TokenKind::OpenParen | TokenKind::Keyword(Keyword::Static)
            )
        {
            n += 1;
        }
        if self.nth(n) == TokenKind::Keyword(Keyword::Static) {
            n += 1;
        }
        match self.nth(n) {
            TokenKind::Identifier => self.nth(n + 1) == TokenKind::FatArrow,
            TokenKind::OpenParen => self
                .matching_close(self.pos + n)
                .is_some_and(|close| {
                    self.tokens.get(close + 1).map(|t| t.kind) == Some(TokenKind::FatArrow)
                }),
            _ => false,
        }
    }

    /// Index of the `)` matching the `(` at `open`.
    fn matching_close(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (i, token) in self.tokens.iter().enumerate().skip(open) {
            match token.kind {
                TokenKind::OpenParen => depth += 1,
                TokenKind::CloseParen => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                TokenKind::Semicolon
                | TokenKind::OpenBrace
                | TokenKind::CloseBrace
                | TokenKind::EndOfFile => return None,
                _ => {}
            }
        }
        None
    }

    fn parse_lambda(&mut self) {
        self.open(NodeKind::LambdaExpression);
        if self.at_contextual("async") {
            self.bump();
        }
        self.eat_keyword(Keyword::Static);
        if self.at(TokenKind::Identifier) {
            self.open(NodeKind::Parameter);
            self.bump();
            self.close();
        } else {
            self.parse_parameter_list();
        }
        self.expect(TokenKind::FatArrow, "=>");
        if self.at(TokenKind::OpenBrace) {
            self.parse_block();
        } else {
            self.parse_expression();
        }
        self.close();
    }

    fn parse_postfix(&mut self) {
        let mark = self.mark();
        if !self.parse_primary() {
            return;
        }
        loop {
            match self.current() {
                TokenKind::Dot | TokenKind::ColonColon => {
                    self.precede(mark, NodeKind::MemberAccessExpression);
                    self.bump();
                    self.parse_member_name_in_expression();
                    self.close();
                }
                TokenKind::Arrow => {
                    self.precede(mark, NodeKind::PointerMemberAccessExpression);
                    self.bump();
                    self.parse_member_name_in_expression();
                    self.close();
                }
                TokenKind::QuestionDot => {
                    self.precede(mark, NodeKind::ConditionalAccessExpression);
                    self.bump();
                    if self.at(TokenKind::OpenBracket) {
                        self.parse_bracketed_argument_list();
                    } else {
                        self.parse_member_name_in_expression();
                    }
                    self.close();
                }
                TokenKind::OpenParen => {
                    self.precede(mark, NodeKind::InvocationExpression);
                    self.parse_argument_list();
                    self.close();
                }
                TokenKind::OpenBracket => {
                    self.precede(mark, NodeKind::ElementAccessExpression);
                    self.parse_bracketed_argument_list();
                    self.close();
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    self.precede(mark, NodeKind::PostfixUnaryExpression);
                    self.bump();
                    self.close();
                }
                TokenKind::Bang if self.null_forgiving() => {
                    self.precede(mark, NodeKind::PostfixUnaryExpression);
                    self.bump();
                    self.close();
                }
                _ => break,
            }
        }
    }

    fn null_forgiving(&self) -> bool {
        matches!(
            self.nth(1),
            TokenKind::Dot
                | TokenKind::QuestionDot
                | TokenKind::Arrow
                | TokenKind::OpenBracket
                | TokenKind::CloseParen
                | TokenKind::CloseBracket
                | TokenKind::CloseBrace
                | TokenKind::Semicolon
                | TokenKind::Comma
                | TokenKind::Colon
                | TokenKind::EndOfFile
        )
    }

    fn parse_member_name_in_expression(&mut self) {
        if self.at(TokenKind::Identifier) {
            self.parse_simple_name(true);
        } else {
            let found = self.found();
            self.error(ParseErrorKind::ExpectedToken {
                expected: "identifier",
                found,
            });
        }
    }

    /// Returns `false` when no primary expression starts here; nothing
    /// is consumed in that case.
    fn parse_primary(&mut self) -> bool {
        match self.current() {
            TokenKind::Number
            | TokenKind::String
            | TokenKind::Char
            | TokenKind::Keyword(Keyword::True | Keyword::False | Keyword::Null) => {
                self.open(NodeKind::LiteralExpression);
                self.bump();
                self.close();
            }
            TokenKind::InterpolatedStringStart => self.parse_interpolated_string(),
            TokenKind::Keyword(Keyword::This | Keyword::Base) => {
                self.open(NodeKind::KeywordExpression);
                self.bump();
                self.close();
            }
            TokenKind::Identifier => self.parse_name(true),
            // `int.MaxValue`
            TokenKind::Keyword(k) if k.is_predefined_type() => {
                self.open(NodeKind::PredefinedType);
                self.bump();
                self.close();
            }
            TokenKind::Keyword(Keyword::Delegate) if self.nth(1) == TokenKind::Star => {
                self.parse_type_or_error();
            }
            TokenKind::Keyword(Keyword::Delegate) => self.parse_anonymous_method(),
            TokenKind::OpenParen => self.parse_parenthesized(),
            TokenKind::OpenBracket => self.parse_collection_expression(),
            TokenKind::Keyword(Keyword::New) => self.parse_new(),
            TokenKind::Keyword(Keyword::Stackalloc) => self.parse_stackalloc(),
            TokenKind::Keyword(Keyword::Typeof) => {
                self.parse_type_operator(NodeKind::TypeOfExpression);
            }
            TokenKind::Keyword(Keyword::Sizeof) => {
                self.parse_type_operator(NodeKind::SizeOfExpression);
            }
            TokenKind::Keyword(Keyword::Default) => {
                if self.nth(1) == TokenKind::OpenParen {
                    self.parse_type_operator(NodeKind::DefaultExpression);
                } else {
                    self.open(NodeKind::LiteralExpression);
                    self.bump();
                    self.close();
                }
            }
            TokenKind::Keyword(Keyword::Checked | Keyword::Unchecked)
                if self.nth(1) == TokenKind::OpenParen =>
            {
                self.open(NodeKind::CheckedExpression);
                self.bump();
                self.parse_parenthesized_condition();
                self.close();
            }
            _ => {
                let found = self.found();
                self.error(ParseErrorKind::ExpectedExpression { found });
                return false;
            }
        }
        true
    }

    fn parse_interpolated_string(&mut self) {
        self.open(NodeKind::InterpolatedStringExpression);
        self.bump(); // $"
        loop {
            match self.current() {
                TokenKind::InterpolatedStringText => self.bump(),
                TokenKind::InterpolationOpen => self.parse_interpolation(),
                _ => break,
            }
        }
        self.expect(TokenKind::InterpolatedStringEnd, "\"");
        self.close();
    }

    /// `{expr}`, `{expr,alignment}`, `{expr:format}`
    fn parse_interpolation(&mut self) {
        self.open(NodeKind::Interpolation);
        self.bump(); // {
        if self.can_start_expression() {
            self.parse_expression();
        } else {
            let found = self.found();
            self.error(ParseErrorKind::ExpectedExpression { found });
        }
        if self.eat(TokenKind::Comma) {
            self.parse_expression();
        }
        if self.eat(TokenKind::Colon) {
            self.eat(TokenKind::InterpolatedStringText);
        }
        while !matches!(
            self.current(),
            TokenKind::InterpolationClose
                | TokenKind::InterpolatedStringEnd
                | TokenKind::EndOfFile
        ) {
            self.error_token();
        }
        self.expect(TokenKind::InterpolationClose, "}");
        self.close();
    }

    fn parse_type_operator(&mut self, kind: NodeKind) {
        self.open(kind);
        self.bump();
        if self.expect(TokenKind::OpenParen, "(") {
            self.parse_type_or_error();
            self.expect(TokenKind::CloseParen, ")");
        }
        self.close();
    }

    fn parse_anonymous_method(&mut self) {
        self.open(NodeKind::AnonymousMethodExpression);
        self.bump();
        if self.at(TokenKind::OpenParen) {
            self.parse_parameter_list();
        }
        self.parse_block_or_error();
        self.close();
    }

    fn parse_parenthesized(&mut self) {
        let open = self.open(NodeKind::ParenthesizedExpression);
        self.bump(); // (
        self.parse_argument();
        if self.at(TokenKind::Comma) {
            self.retag(open, NodeKind::TupleExpression);
            while self.eat(TokenKind::Comma) {
                self.parse_argument();
            }
        }
        self.expect(TokenKind::CloseParen, ")");
        self.close();
    }

    fn parse_collection_expression(&mut self) {
        self.open(NodeKind::CollectionExpression);
        self.bump(); // [
        self.parse_expression_list(TokenKind::CloseBracket);
        self.expect(TokenKind::CloseBracket, "]");
        self.close();
    }

    fn parse_new(&mut self) {
        let node = self.open(NodeKind::ObjectCreationExpression);
        self.bump(); // new
        match self.current() {
            TokenKind::OpenBracket => {
                self.retag(node, NodeKind::ArrayCreationExpression);
                self.parse_rank_specifier();
                self.parse_initializer_or_error();
            }
            TokenKind::OpenBrace => self.parse_initializer(),
            TokenKind::OpenParen => {
                self.parse_argument_list();
                if self.at(TokenKind::OpenBrace) {
                    self.parse_initializer();
                }
            }
            _ => {
                let mark = self.mark();
                if !self.parse_non_array_type() {
                    let found = self.found();
                    self.error(ParseErrorKind::ExpectedType { found });
                    self.close();
                    return;
                }
                self.parse_type_suffixes(mark, false);
                if self.at(TokenKind::OpenBracket) {
                    self.retag(node, NodeKind::ArrayCreationExpression);
                    self.precede(mark, NodeKind::ArrayType);
                    if matches!(self.nth(1), TokenKind::CloseBracket | TokenKind::Comma) {
                        self.parse_rank_specifier();
                    } else {
                        self.parse_bracketed_argument_list();
                    }
                    while self.at(TokenKind::OpenBracket) {
                        self.parse_rank_specifier();
                    }
                    self.close();
                    if self.at(TokenKind::OpenBrace) {
                        self.parse_initializer();
                    }
                } else {
                    if self.at(TokenKind::OpenParen) {
                        self.parse_argument_list();
                    }
                    if self.at(TokenKind::OpenBrace) {
                        self.parse_initializer();
                    }
                }
            }
        }
        self.close();
    }

    fn parse_stackalloc(&mut self) {
        self.open(NodeKind::StackAllocExpression);
        self.bump();
        if self.at(TokenKind::OpenBracket) {
            self.parse_rank_specifier();
            self.parse_initializer_or_error();
        } else {
            let mark = self.mark();
            if self.parse_non_array_type() {
                self.parse_type_suffixes(mark, false);
                self.precede(mark, NodeKind::ArrayType);
                if self.at(TokenKind::OpenBracket) {
                    self.parse_bracketed_argument_list();
                }
                self.close();
                if self.at(TokenKind::OpenBrace) {
                    self.parse_initializer();
                }
            } else {
                let found = self.found();
                self.error(ParseErrorKind::ExpectedType { found });
            }
        }
        self.close();
    }

    fn parse_initializer_or_error(&mut self) {
        if self.at(TokenKind::OpenBrace) {
            self.parse_initializer();
        } else {
            let found = self.found();
            self.error(ParseErrorKind::ExpectedToken {
                expected: "{",
                found,
            });
        }
    }

    fn parse_initializer(&mut self) {
        self.open(NodeKind::InitializerExpression);
        self.bump(); // {
        while !self.at(TokenKind::CloseBrace) && !self.at_eof() {
            let start = self.pos;
            self.parse_variable_initializer();
            if self.pos == start {
                self.error_token();
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseBrace, "}");
        self.close();
    }

    fn parse_argument_list(&mut self) {
        self.open(NodeKind::ArgumentList);
        self.bump(); // (
        self.parse_arguments(TokenKind::CloseParen);
        self.expect(TokenKind::CloseParen, ")");
        self.close();
    }

    fn parse_bracketed_argument_list(&mut self) {
        self.open(NodeKind::BracketedArgumentList);
        self.bump(); // [
        self.parse_arguments(TokenKind::CloseBracket);
        self.expect(TokenKind::CloseBracket, "]");
        self.close();
    }

    fn parse_arguments(&mut self, close: TokenKind) {
        while !self.at(close) && !self.at_eof() {
            let start = self.pos;
            self.parse_argument();
            if self.pos == start {
                self.error_token();
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
    }

    fn parse_argument(&mut self) {
        self.open(NodeKind::Argument);
        if self.at(TokenKind::Identifier) && self.nth(1) == TokenKind::Colon {
            self.bump_n(2);
        }
        let out = self.at_keyword(Keyword::Out);
        if out || self.at_keyword(Keyword::In) || self.at_keyword(Keyword::Ref) {
            self.bump();
        }
        if out && self.try_parse_declaration_expression() {
            self.close();
            return;
        }
        self.parse_expression();
        self.close();
    }

    /// `out var x`, `out int* p`.
    fn try_parse_declaration_expression(&mut self) -> bool {
        let cp = self.checkpoint();
        self.open(NodeKind::DeclarationExpression);
        if self.parse_type()
            && self.at(TokenKind::Identifier)
            && matches!(self.nth(1), TokenKind::Comma | TokenKind::CloseParen)
        {
            self.bump();
            self.close();
            return true;
        }
        self.rewind(cp);
        false
    }

    // -----------------------------------------------------------
    // Patterns.
    // -----------------------------------------------------------

    fn parse_pattern(&mut self) {
        if !self.enter() {
            return;
        }
        self.parse_primary_pattern();
        while self.at_contextual("and") || self.at_contextual("or") {
            self.bump();
            self.parse_primary_pattern();
        }
        self.leave();
    }

    fn parse_primary_pattern(&mut self) {
        match self.current() {
            TokenKind::Identifier if self.at_contextual("not") => {
                self.bump();
                self.parse_primary_pattern();
            }
            TokenKind::Lt | TokenKind::Gt | TokenKind::LtEq | TokenKind::GtEq => {
                self.bump();
                self.parse_binary(9);
            }
            TokenKind::OpenBrace => self.parse_property_pattern(),
            TokenKind::OpenBracket => {
                self.open(NodeKind::RecursivePattern);
                self.bump();
                while !self.at(TokenKind::CloseBracket) && !self.at_eof() {
                    let start = self.pos;
                    self.parse_pattern();
                    if self.pos == start || !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::CloseBracket, "]");
                self.close();
            }
            _ => {
                let cp = self.checkpoint();
                self.open(NodeKind::DeclarationPattern);
                if self.parse_type() {
                    if self.at(TokenKind::OpenBrace) {
                        self.parse_property_pattern();
                    }
                    if self.at(TokenKind::Identifier)
                        && !self.at_contextual("and")
                        && !self.at_contextual("or")
                        && !self.at_contextual("when")
                    {
                        self.bump();
                        self.close();
                        return;
                    }
                }
                self.rewind(cp);
                // constant or type pattern, below relational operators
                self.parse_binary(9);
            }
        }
    }

    fn parse_property_pattern(&mut self) {
        self.open(NodeKind::RecursivePattern);
        self.bump(); // {
        while !self.at(TokenKind::CloseBrace) && !self.at_eof() {
            let start = self.pos;
            if self.at(TokenKind::Identifier) && self.nth(1) == TokenKind::Colon {
                self.bump_n(2);
            }
            self.parse_pattern();
            if self.pos == start || !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseBrace, "}");
        self.eat(TokenKind::Identifier);
        self.close();
    }
}

const fn is_expression_keyword(keyword: Keyword) -> bool {
    matches!(
        keyword,
        Keyword::This
            | Keyword::Base
            | Keyword::New
            | Keyword::Typeof
            | Keyword::Sizeof
            | Keyword::Default
            | Keyword::True
            | Keyword::False
            | Keyword::Null
            | Keyword::Checked
            | Keyword::Unchecked
            | Keyword::Delegate
            | Keyword::Stackalloc
            | Keyword::Ref
            | Keyword::Throw
    )
}
