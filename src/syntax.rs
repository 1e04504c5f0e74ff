//! Immutable concrete syntax tree.
//!
//! Nodes live in an arena and point at their parent; every token of
//! the document (including `EndOfFile`) belongs to exactly one node.
//! Trivia stays on the tokens, so navigation never has to skip it.

use crate::parser::ParseError;
use crate::token::Token;

/// Index of a node in a [`SyntaxTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

/// Index of a token in the document's token list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenId(pub usize);

/// A child of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Element {
    Node(NodeId),
    Token(TokenId),
}

/// Grammar shape of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    CompilationUnit,

    // declarations
    UsingDirective,
    NamespaceDeclaration,
    TypeDeclaration,
    EnumDeclaration,
    EnumMember,
    DelegateDeclaration,
    AttributeList,
    Attribute,
    FieldDeclaration,
    EventDeclaration,
    MethodDeclaration,
    ConstructorDeclaration,
    ConstructorInitializer,
    DestructorDeclaration,
    OperatorDeclaration,
    ConversionOperatorDeclaration,
    PropertyDeclaration,
    IndexerDeclaration,
    AccessorList,
    Accessor,
    ArrowClause,
    ParameterList,
    BracketedParameterList,
    Parameter,
    TypeParameterList,
    TypeParameter,
    BaseList,
    ConstraintClause,
    VariableDeclaration,
    VariableDeclarator,

    // statements
    Block,
    LocalDeclarationStatement,
    LocalFunctionStatement,
    ExpressionStatement,
    EmptyStatement,
    IfStatement,
    ElseClause,
    WhileStatement,
    DoStatement,
    ForStatement,
    ForEachStatement,
    ReturnStatement,
    JumpStatement,
    ThrowStatement,
    YieldStatement,
    SwitchStatement,
    SwitchSection,
    CaseLabel,
    TryStatement,
    CatchClause,
    FinallyClause,
    UsingStatement,
    LockStatement,
    FixedStatement,
    UnsafeStatement,
    CheckedStatement,
    LabeledStatement,

    // expressions
    LiteralExpression,
    InterpolatedStringExpression,
    Interpolation,
    IdentifierName,
    GenericName,
    TypeArgumentList,
    KeywordExpression,
    ParenthesizedExpression,
    TupleExpression,
    CastExpression,
    BinaryExpression,
    AssignmentExpression,
    ConditionalExpression,
    PrefixUnaryExpression,
    PointerIndirectionExpression,
    AddressOfExpression,
    PostfixUnaryExpression,
    MemberAccessExpression,
    PointerMemberAccessExpression,
    ConditionalAccessExpression,
    InvocationExpression,
    ElementAccessExpression,
    ArgumentList,
    BracketedArgumentList,
    Argument,
    ObjectCreationExpression,
    ArrayCreationExpression,
    InitializerExpression,
    StackAllocExpression,
    TypeOfExpression,
    SizeOfExpression,
    DefaultExpression,
    CheckedExpression,
    LambdaExpression,
    AnonymousMethodExpression,
    IsPatternExpression,
    AsExpression,
    DeclarationPattern,
    RecursivePattern,
    DeclarationExpression,
    RefExpression,
    ThrowExpression,
    AwaitExpression,
    SwitchExpression,
    SwitchExpressionArm,
    RangeExpression,
    CollectionExpression,

    // types
    PredefinedType,
    QualifiedName,
    AliasQualifiedName,
    PointerType,
    NullableType,
    ArrayType,
    ArrayRankSpecifier,
    TupleType,
    TupleElement,
    RefType,
    FunctionPointerType,
    FunctionPointerCallingConvention,
    FunctionPointerUnmanagedCallingConventionList,
    FunctionPointerParameterList,
    FunctionPointerParameter,

    /// Tokens the parser could not fit into the grammar.
    Error,
}

impl NodeKind {
    /// Namespace, type, and member declarations.
    #[must_use]
    pub const fn is_declaration(self) -> bool {
        matches!(
            self,
            Self::NamespaceDeclaration
                | Self::TypeDeclaration
                | Self::EnumDeclaration
                | Self::DelegateDeclaration
                | Self::FieldDeclaration
                | Self::EventDeclaration
                | Self::MethodDeclaration
                | Self::ConstructorDeclaration
                | Self::DestructorDeclaration
                | Self::OperatorDeclaration
                | Self::ConversionOperatorDeclaration
                | Self::PropertyDeclaration
                | Self::IndexerDeclaration
                | Self::LocalFunctionStatement
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<Element>,
}

/// Parsed document structure over a token list.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    nodes: Vec<Node>,
    token_parents: Vec<NodeId>,
    root: NodeId,
    errors: Vec<ParseError>,
}

impl SyntaxTree {
    pub(crate) const fn from_parts(
        nodes: Vec<Node>,
        token_parents: Vec<NodeId>,
        root: NodeId,
        errors: Vec<ParseError>,
    ) -> Self {
        Self {
            nodes,
            token_parents,
            root,
            errors,
        }
    }

    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    #[must_use]
    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id.0].kind
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> &[Element] {
        &self.nodes[id.0].children
    }

    /// Syntax errors recovered from while parsing.
    #[must_use]
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    #[must_use]
    pub fn token_count(&self) -> usize {
        self.token_parents.len()
    }

    #[must_use]
    pub fn token_parent(&self, token: TokenId) -> NodeId {
        self.token_parents[token.0]
    }

    #[must_use]
    pub const fn prev_token(&self, token: TokenId) -> Option<TokenId> {
        match token.0 {
            0 => None,
            i => Some(TokenId(i - 1)),
        }
    }

    #[must_use]
    pub fn next_token(&self, token: TokenId) -> Option<TokenId> {
        let next = token.0 + 1;
        (next < self.token_parents.len()).then_some(TokenId(next))
    }

    fn index_in_parent(&self, token: TokenId) -> (NodeId, usize) {
        let parent = self.token_parent(token);
        let index = self
            .children(parent)
            .iter()
            .position(|e| *e == Element::Token(token))
            .unwrap_or_default();
        (parent, index)
    }

    /// Element immediately before `token` under the same parent.
    #[must_use]
    pub fn left_sibling(&self, token: TokenId) -> Option<Element> {
        let (parent, index) = self.index_in_parent(token);
        index
            .checked_sub(1)
            .map(|i| self.children(parent)[i])
    }

    /// Element immediately after `token` under the same parent.
    #[must_use]
    pub fn right_sibling(&self, token: TokenId) -> Option<Element> {
        let (parent, index) = self.index_in_parent(token);
        self.children(parent).get(index + 1).copied()
    }

    /// First child node of the given kind.
    #[must_use]
    pub fn child_of_kind(&self, id: NodeId, kind: NodeKind) -> Option<NodeId> {
        self.children(id).iter().find_map(|e| match *e {
            Element::Node(child) if self.kind(child) == kind => Some(child),
            _ => None,
        })
    }

    /// All tokens under `id`, in source order.
    #[must_use]
    pub fn descendant_tokens(&self, id: NodeId) -> Vec<TokenId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            for element in self.children(node).iter().rev() {
                match *element {
                    Element::Node(child) => stack.push(child),
                    Element::Token(token) => out.push(token),
                }
            }
        }
        // the stack walk yields reversed pre-order; tokens are
        // numbered in source order so a sort restores it
        out.sort_unstable();
        out
    }

    /// Chain of ancestors from `id` (exclusive) to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), |&n| self.parent(n))
    }

    /// Render the tree as an indented outline, one element per line.
    #[must_use]
    pub fn debug_dump(&self, source: &str, tokens: &[Token]) -> String {
        let mut out = String::new();
        self.dump_node(self.root, 0, source, tokens, &mut out);
        out
    }

    fn dump_node(&self, id: NodeId, depth: usize, source: &str, tokens: &[Token], out: &mut String) {
        use std::fmt::Write as _;
        let _ = writeln!(out, "{}{:?}", "  ".repeat(depth), self.kind(id));
        for element in self.children(id) {
            match *element {
                Element::Node(child) => self.dump_node(child, depth + 1, source, tokens, out),
                Element::Token(token) => {
                    let tok = &tokens[token.0];
                    let _ = writeln!(
                        out,
                        "{}{:?} {:?}",
                        "  ".repeat(depth + 1),
                        tok.kind,
                        tok.text(source)
                    );
                }
            }
        }
    }
}
