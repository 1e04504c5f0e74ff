use std::fmt;

/// Half-open byte range into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, serde::Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Empty span at `offset`.
    #[must_use]
    pub const fn empty(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Smallest span covering both `self` and `other`.
    #[must_use]
    pub fn cover(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// True when the spans share at least one byte.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
    }
}

/// 1-based line and column, columns counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Maps byte offsets to line/column positions.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    #[must_use]
    pub fn new(source: &str) -> Self {
        let bytes = source.as_bytes();
        let mut line_starts = vec![0];
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\n' => line_starts.push(i + 1),
                b'\r' if bytes.get(i + 1) != Some(&b'\n') => line_starts.push(i + 1),
                _ => {}
            }
            i += 1;
        }
        Self { line_starts }
    }

    #[must_use]
    pub fn position(&self, source: &str, offset: usize) -> Position {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let start = self.line_starts[line];
        let end = offset.min(source.len());
        let column = source
            .get(start..end)
            .map_or(end - start, |text| text.chars().count());
        Position {
            line: line + 1,
            column: column + 1,
        }
    }
}

/// Kind of a single trivia piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriviaKind {
    /// Run of spaces, tabs, vertical tabs, or form feeds.
    Whitespace,
    /// `\n`, `\r\n`, or `\r`.
    Newline,
    /// `// ...` up to (not including) the line break.
    LineComment,
    /// `/* ... */`.
    BlockComment,
    /// Preprocessor line such as `#if DEBUG` or `#region`.
    Directive,
}

impl TriviaKind {
    /// Whitespace or a line break.
    #[must_use]
    pub const fn is_blank(self) -> bool {
        matches!(self, Self::Whitespace | Self::Newline)
    }
}

/// One piece of trivia with its source range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Trivia {
    pub kind: TriviaKind,
    pub span: Span,
}

impl Trivia {
    #[must_use]
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.start..self.span.end]
    }
}

/// Reserved C# keywords. Contextual keywords (`var`, `managed`,
/// `unmanaged`, `when`, ...) lex as identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Abstract,
    As,
    Base,
    Bool,
    Break,
    Byte,
    Case,
    Catch,
    Char,
    Checked,
    Class,
    Const,
    Continue,
    Decimal,
    Default,
    Delegate,
    Do,
    Double,
    Else,
    Enum,
    Event,
    Explicit,
    Extern,
    False,
    Finally,
    Fixed,
    Float,
    For,
    Foreach,
    Goto,
    If,
    Implicit,
    In,
    Int,
    Interface,
    Internal,
    Is,
    Lock,
    Long,
    Namespace,
    New,
    Null,
    Object,
    Operator,
    Out,
    Override,
    Params,
    Private,
    Protected,
    Public,
    Readonly,
    Ref,
    Return,
    Sbyte,
    Sealed,
    Short,
    Sizeof,
    Stackalloc,
    Static,
    String,
    Struct,
    Switch,
    This,
    Throw,
    True,
    Try,
    Typeof,
    Uint,
    Ulong,
    Unchecked,
    Unsafe,
    Ushort,
    Using,
    Virtual,
    Void,
    Volatile,
    While,
}

impl Keyword {
    #[must_use]
    pub fn from_text(text: &str) -> Option<Self> {
        let keyword = match text {
            "abstract" => Self::Abstract,
            "as" => Self::As,
            "base" => Self::Base,
            "bool" => Self::Bool,
            "break" => Self::Break,
            "byte" => Self::Byte,
            "case" => Self::Case,
            "catch" => Self::Catch,
            "char" => Self::Char,
            "checked" => Self::Checked,
            "class" => Self::Class,
            "const" => Self::Const,
            "continue" => Self::Continue,
            "decimal" => Self::Decimal,
            "default" => Self::Default,
            "delegate" => Self::Delegate,
            "do" => Self::Do,
            "double" => Self::Double,
            "else" => Self::Else,
            "enum" => Self::Enum,
            "event" => Self::Event,
            "explicit" => Self::Explicit,
            "extern" => Self::Extern,
            "false" => Self::False,
            "finally" => Self::Finally,
            "fixed" => Self::Fixed,
            "float" => Self::Float,
            "for" => Self::For,
            "foreach" => Self::Foreach,
            "goto" => Self::Goto,
            "if" => Self::If,
            "implicit" => Self::Implicit,
            "in" => Self::In,
            "int" => Self::Int,
            "interface" => Self::Interface,
            "internal" => Self::Internal,
            "is" => Self::Is,
            "lock" => Self::Lock,
            "long" => Self::Long,
            "namespace" => Self::Namespace,
            "new" => Self::New,
            "null" => Self::Null,
            "object" => Self::Object,
            "operator" => Self::Operator,
            "out" => Self::Out,
            "override" => Self::Override,
            "params" => Self::Params,
            "private" => Self::Private,
            "protected" => Self::Protected,
            "public" => Self::Public,
            "readonly" => Self::Readonly,
            "ref" => Self::Ref,
            "return" => Self::Return,
            "sbyte" => Self::Sbyte,
            "sealed" => Self::Sealed,
            "short" => Self::Short,
            "sizeof" => Self::Sizeof,
            "stackalloc" => Self::Stackalloc,
            "static" => Self::Static,
            "string" => Self::String,
            "struct" => Self::Struct,
            "switch" => Self::Switch,
            "this" => Self::This,
            "throw" => Self::Throw,
            "true" => Self::True,
            "try" => Self::Try,
            "typeof" => Self::Typeof,
            "uint" => Self::Uint,
            "ulong" => Self::Ulong,
            "unchecked" => Self::Unchecked,
            "unsafe" => Self::Unsafe,
            "ushort" => Self::Ushort,
            "using" => Self::Using,
            "virtual" => Self::Virtual,
            "void" => Self::Void,
            "volatile" => Self::Volatile,
            "while" => Self::While,
            _ => return None,
        };
        Some(keyword)
    }

    /// Built-in type keywords (`int`, `string`, `void`, ...).
    #[must_use]
    pub const fn is_predefined_type(self) -> bool {
        matches!(
            self,
            Self::Bool
                | Self::Byte
                | Self::Char
                | Self::Decimal
                | Self::Double
                | Self::Float
                | Self::Int
                | Self::Long
                | Self::Object
                | Self::Sbyte
                | Self::Short
                | Self::String
                | Self::Uint
                | Self::Ulong
                | Self::Ushort
                | Self::Void
        )
    }

    /// Declaration modifiers.
    #[must_use]
    pub const fn is_modifier(self) -> bool {
        matches!(
            self,
            Self::Abstract
                | Self::Const
                | Self::Extern
                | Self::Fixed
                | Self::Internal
                | Self::New
                | Self::Override
                | Self::Private
                | Self::Protected
                | Self::Public
                | Self::Readonly
                | Self::Sealed
                | Self::Static
                | Self::Unsafe
                | Self::Virtual
                | Self::Volatile
        )
    }
}

/// Token kinds produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    Keyword(Keyword),
    Number,
    String,
    Char,
    /// `$"`, `$@"`, `$$"""` and the like.
    InterpolatedStringStart,
    /// Literal text of an interpolated string, or a format specifier.
    InterpolatedStringText,
    /// Closing quote(s) of an interpolated string.
    InterpolatedStringEnd,
    /// Brace(s) opening a hole in an interpolated string.
    InterpolationOpen,
    /// Brace(s) closing a hole in an interpolated string.
    InterpolationClose,

    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    Semicolon,
    Comma,
    Dot,
    DotDot,
    Colon,
    ColonColon,
    Question,
    QuestionDot,
    QuestionQuestion,
    QuestionQuestionEq,
    Arrow,
    FatArrow,

    Plus,
    Minus,
    /// `*`
    Star,
    Slash,
    Percent,
    /// `&`
    Amp,
    Pipe,
    Caret,
    Bang,
    Tilde,
    Eq,
    Lt,
    /// Always a single `>`; the parser recombines `>>` and `>>=`.
    Gt,
    PlusPlus,
    MinusMinus,
    AmpAmp,
    PipePipe,
    EqEq,
    BangEq,
    LtEq,
    GtEq,
    LtLt,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    AmpEq,
    PipeEq,
    CaretEq,
    LtLtEq,

    /// Character that cannot start any token.
    Unknown,
    EndOfFile,
}

impl TokenKind {
    #[must_use]
    pub const fn is_keyword(self, keyword: Keyword) -> bool {
        matches!(self, Self::Keyword(k) if k as u8 == keyword as u8)
    }

    /// Assignment and compound-assignment operators (except `>>=`).
    #[must_use]
    pub const fn is_assignment(self) -> bool {
        matches!(
            self,
            Self::Eq
                | Self::PlusEq
                | Self::MinusEq
                | Self::StarEq
                | Self::SlashEq
                | Self::PercentEq
                | Self::AmpEq
                | Self::PipeEq
                | Self::CaretEq
                | Self::LtLtEq
                | Self::QuestionQuestionEq
        )
    }
}

/// A single token with its kind, source range, and attached trivia.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub leading: Vec<Trivia>,
    pub trailing: Vec<Trivia>,
}

impl Token {
    #[must_use]
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.start..self.span.end]
    }

    /// Range from the start of the leading trivia to the end of the
    /// trailing trivia.
    #[must_use]
    pub fn full_span(&self) -> Span {
        let start = self.leading.first().map_or(self.span.start, |t| t.span.start);
        let end = self.trailing.last().map_or(self.span.end, |t| t.span.end);
        Span::new(start, end)
    }
}
