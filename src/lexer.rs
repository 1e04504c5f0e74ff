use std::fmt;

use crate::token::{Keyword, Position, Span, Token, TokenKind, Trivia, TriviaKind};

/// Classifies a lexer error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexErrorKind {
    /// Regular or verbatim string without a closing quote.
    UnterminatedString,
    /// Raw string literal (`"""..."""`) without its closing delimiter.
    UnterminatedRawString { quotes: usize },
    /// Character literal without a closing quote.
    UnterminatedChar,
    /// `/*` without a matching `*/`.
    UnterminatedComment,
}

impl fmt::Display for LexErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnterminatedString => write!(f, "unterminated string literal"),
            Self::UnterminatedRawString { quotes } => {
                write!(
                    f,
                    "unterminated raw string literal, \
                     expected {quotes} closing quotes"
                )
            }
            Self::UnterminatedChar => write!(f, "unterminated character literal"),
            Self::UnterminatedComment => write!(f, "unterminated block comment"),
        }
    }
}

/// Error produced during lexing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at line {}, column {}", position.line, position.column)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub position: Position,
}

/// Tokenize C# source into tokens with attached trivia.
///
/// The last token is always `EndOfFile`; its leading trivia holds
/// whatever follows the final real token.
///
/// # Errors
///
/// Returns `LexError` on unterminated strings, character literals,
/// or block comments.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(input).tokenize()
}

const OPERATORS: &[(&str, TokenKind)] = &[
    ("??=", TokenKind::QuestionQuestionEq),
    ("<<=", TokenKind::LtLtEq),
    ("??", TokenKind::QuestionQuestion),
    ("?.", TokenKind::QuestionDot),
    ("::", TokenKind::ColonColon),
    ("..", TokenKind::DotDot),
    ("->", TokenKind::Arrow),
    ("=>", TokenKind::FatArrow),
    ("++", TokenKind::PlusPlus),
    ("--", TokenKind::MinusMinus),
    ("&&", TokenKind::AmpAmp),
    ("||", TokenKind::PipePipe),
    ("==", TokenKind::EqEq),
    ("!=", TokenKind::BangEq),
    ("<=", TokenKind::LtEq),
    (">=", TokenKind::GtEq),
    ("<<", TokenKind::LtLt),
    ("+=", TokenKind::PlusEq),
    ("-=", TokenKind::MinusEq),
    ("*=", TokenKind::StarEq),
    ("/=", TokenKind::SlashEq),
    ("%=", TokenKind::PercentEq),
    ("&=", TokenKind::AmpEq),
    ("|=", TokenKind::PipeEq),
    ("^=", TokenKind::CaretEq),
    ("{", TokenKind::OpenBrace),
    ("}", TokenKind::CloseBrace),
    ("(", TokenKind::OpenParen),
    (")", TokenKind::CloseParen),
    ("[", TokenKind::OpenBracket),
    ("]", TokenKind::CloseBracket),
    (";", TokenKind::Semicolon),
    (",", TokenKind::Comma),
    (".", TokenKind::Dot),
    (":", TokenKind::Colon),
    ("?", TokenKind::Question),
    ("+", TokenKind::Plus),
    ("-", TokenKind::Minus),
    ("*", TokenKind::Star),
    ("/", TokenKind::Slash),
    ("%", TokenKind::Percent),
    ("&", TokenKind::Amp),
    ("|", TokenKind::Pipe),
    ("^", TokenKind::Caret),
    ("!", TokenKind::Bang),
    ("~", TokenKind::Tilde),
    ("=", TokenKind::Eq),
    ("<", TokenKind::Lt),
    (">", TokenKind::Gt),
];

/// Which part of an interpolated string the cursor is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Text,
    /// Code between the braces.
    Hole,
    /// Format specifier after `:` inside a hole.
    Format,
}

/// An interpolated string whose closing quote has not been reached.
#[derive(Debug, Clone, Copy)]
struct InterpolatedFrame {
    start: Position,
    verbatim: bool,
    /// Length of the raw delimiter, zero for regular and verbatim strings.
    raw_quotes: usize,
    /// Braces that open or close a hole.
    braces: usize,
    segment: Segment,
    /// Open `(`, `[` and `{` inside the current hole.
    nesting: usize,
}

impl InterpolatedFrame {
    const fn unterminated(&self) -> LexError {
        let kind = if self.raw_quotes > 0 {
            LexErrorKind::UnterminatedRawString {
                quotes: self.raw_quotes,
            }
        } else {
            LexErrorKind::UnterminatedString
        };
        LexError {
            kind,
            position: self.start,
        }
    }

    /// Regular strings end at a line break outside their holes.
    const fn single_line(&self) -> bool {
        self.raw_quotes == 0 && !self.verbatim
    }
}

struct Lexer<'a> {
    source: &'a str,
    input: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
    at_line_start: bool,
    strings: Vec<InterpolatedFrame>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        let bytes = source.as_bytes();
        let start = if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
            3
        } else {
            0
        };
        Self {
            source,
            input: bytes,
            pos: start,
            line: 1,
            col: 1,
            at_line_start: true,
            strings: Vec::new(),
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        let mut leading = self.read_trivia(false)?;

        loop {
            if self.pos >= self.input.len() {
                if let Some(frame) = self.strings.last() {
                    return Err(frame.unterminated());
                }
                tokens.push(Token {
                    kind: TokenKind::EndOfFile,
                    span: Span::empty(self.pos),
                    leading,
                    trailing: Vec::new(),
                });
                return Ok(tokens);
            }

            let start = self.pos;
            let kind = self.read_next()?;
            self.at_line_start = false;
            let span = Span::new(start, self.pos);
            // string text owns its whitespace
            let in_code = !self.in_string_text();
            let trailing = if in_code {
                self.read_trivia(true)?
            } else {
                Vec::new()
            };
            tokens.push(Token {
                kind,
                span,
                leading,
                trailing,
            });
            leading = if in_code {
                self.read_trivia(false)?
            } else {
                Vec::new()
            };
        }
    }

    fn in_string_text(&self) -> bool {
        self.strings
            .last()
            .is_some_and(|f| f.segment != Segment::Hole)
    }

    fn read_next(&mut self) -> Result<TokenKind, LexError> {
        match self.strings.last().map(|f| f.segment) {
            None => self.read_token(),
            Some(Segment::Text) => self.read_string_text(),
            Some(Segment::Hole) => self.read_hole_token(),
            Some(Segment::Format) => self.read_format_text(),
        }
    }

    const fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.col,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn current_char(&self) -> Option<char> {
        self.source.get(self.pos..).and_then(|rest| rest.chars().next())
    }

    fn advance(&mut self) {
        let Some(ch) = self.current_char() else {
            return;
        };
        match ch {
            '\n' => {
                self.line += 1;
                self.col = 1;
            }
            '\r' if self.peek_at(1) != Some(b'\n') => {
                self.line += 1;
                self.col = 1;
            }
            _ => self.col += 1,
        }
        self.pos += ch.len_utf8();
    }

    fn advance_by(&mut self, count: usize) {
        for _ in 0..count {
            self.advance();
        }
    }

    const fn error(kind: LexErrorKind, position: Position) -> LexError {
        LexError { kind, position }
    }

    /// Read a run of trivia. Trailing trivia stops after the first
    /// line break; leading trivia runs up to the next token.
    fn read_trivia(&mut self, trailing: bool) -> Result<Vec<Trivia>, LexError> {
        let mut trivia = Vec::new();

        while let Some(ch) = self.peek() {
            let start = self.pos;
            let kind = match ch {
                b' ' | b'\t' | 0x0B | 0x0C => {
                    while matches!(self.peek(), Some(b' ' | b'\t' | 0x0B | 0x0C)) {
                        self.advance();
                    }
                    TriviaKind::Whitespace
                }
                b'\n' | b'\r' => {
                    if ch == b'\r' && self.peek_at(1) == Some(b'\n') {
                        self.advance();
                    }
                    self.advance();
                    self.at_line_start = true;
                    trivia.push(Trivia {
                        kind: TriviaKind::Newline,
                        span: Span::new(start, self.pos),
                    });
                    if trailing {
                        break;
                    }
                    continue;
                }
                b'/' if self.peek_at(1) == Some(b'/') => {
                    self.skip_to_line_end();
                    self.at_line_start = false;
                    TriviaKind::LineComment
                }
                b'/' if self.peek_at(1) == Some(b'*') => {
                    self.read_block_comment()?;
                    self.at_line_start = false;
                    TriviaKind::BlockComment
                }
                b'#' if self.at_line_start && !trailing => {
                    self.skip_to_line_end();
                    TriviaKind::Directive
                }
                _ => break,
            };
            trivia.push(Trivia {
                kind,
                span: Span::new(start, self.pos),
            });
        }

        Ok(trivia)
    }

    fn skip_to_line_end(&mut self) {
        while !matches!(self.peek(), None | Some(b'\n' | b'\r')) {
            self.advance();
        }
    }

    fn read_block_comment(&mut self) -> Result<(), LexError> {
        let start = self.position();
        self.advance_by(2);
        loop {
            match self.peek() {
                None => return Err(Self::error(LexErrorKind::UnterminatedComment, start)),
                Some(b'*') if self.peek_at(1) == Some(b'/') => {
                    self.advance_by(2);
                    return Ok(());
                }
                Some(_) => self.advance(),
            }
        }
    }

    fn read_token(&mut self) -> Result<TokenKind, LexError> {
        let ch = self.input[self.pos];
        match ch {
            b'"' => self.read_string(),
            b'\'' => self.read_char(),
            b'@' if self.peek_at(1) == Some(b'"') => {
                self.advance();
                self.read_verbatim_string()
            }
            b'@' | b'$' if self.starts_interpolated() => Ok(self.read_interpolated_string()),
            b'@' if self.peek_at(1).is_some_and(is_ident_start_byte) => {
                self.advance();
                self.read_identifier();
                Ok(TokenKind::Identifier)
            }
            b'0'..=b'9' => {
                self.read_number();
                Ok(TokenKind::Number)
            }
            b'.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.read_number();
                Ok(TokenKind::Number)
            }
            _ if self.current_char().is_some_and(is_ident_start) => {
                let start = self.pos;
                self.read_identifier();
                let text = &self.source[start..self.pos];
                Ok(Keyword::from_text(text).map_or(TokenKind::Identifier, TokenKind::Keyword))
            }
            _ => Ok(self.read_operator()),
        }
    }

    fn read_identifier(&mut self) {
        while self.current_char().is_some_and(is_ident_continue) {
            self.advance();
        }
    }

    fn read_number(&mut self) {
        let radix_prefix = self.peek() == Some(b'0')
            && matches!(self.peek_at(1), Some(b'x' | b'X' | b'b' | b'B'));
        if radix_prefix {
            self.advance_by(2);
            while self
                .peek()
                .is_some_and(|c| c.is_ascii_hexdigit() || c == b'_')
            {
                self.advance();
            }
        } else {
            self.read_digits();
            if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
                self.read_digits();
            }
            if matches!(self.peek(), Some(b'e' | b'E')) {
                let sign = usize::from(matches!(self.peek_at(1), Some(b'+' | b'-')));
                if self.peek_at(1 + sign).is_some_and(|c| c.is_ascii_digit()) {
                    self.advance_by(1 + sign);
                    self.read_digits();
                }
            }
        }
        // type suffixes: u, l, ul, f, d, m
        while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            self.advance();
        }
    }

    fn read_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == b'_') {
            self.advance();
        }
    }

    fn quote_run(&self, from: usize) -> usize {
        self.input[from..].iter().take_while(|&&c| c == b'"').count()
    }

    fn read_string(&mut self) -> Result<TokenKind, LexError> {
        let quotes = self.quote_run(self.pos);
        if quotes >= 3 {
            return self.read_raw_string(quotes).map(|()| TokenKind::String);
        }

        let start = self.position();
        self.advance(); // opening quote
        loop {
            match self.peek() {
                None | Some(b'\n' | b'\r') => {
                    return Err(Self::error(LexErrorKind::UnterminatedString, start));
                }
                Some(b'\\') => self.advance_by(2),
                Some(b'"') => {
                    self.advance();
                    return Ok(TokenKind::String);
                }
                Some(_) => self.advance(),
            }
        }
    }

    fn read_verbatim_string(&mut self) -> Result<TokenKind, LexError> {
        let start = self.position();
        self.advance(); // opening quote
        loop {
            match self.peek() {
                None => return Err(Self::error(LexErrorKind::UnterminatedString, start)),
                Some(b'"') if self.peek_at(1) == Some(b'"') => self.advance_by(2),
                Some(b'"') => {
                    self.advance();
                    return Ok(TokenKind::String);
                }
                Some(_) => self.advance(),
            }
        }
    }

    fn read_raw_string(&mut self, quotes: usize) -> Result<(), LexError> {
        let start = self.position();
        self.advance_by(quotes);
        while self.pos < self.input.len() {
            let run = self.quote_run(self.pos);
            if run >= quotes {
                self.advance_by(run);
                return Ok(());
            }
            self.advance_by(run.max(1));
        }
        Err(Self::error(LexErrorKind::UnterminatedRawString { quotes }, start))
    }

    fn read_char(&mut self) -> Result<TokenKind, LexError> {
        let start = self.position();
        self.advance(); // opening quote
        loop {
            match self.peek() {
                None | Some(b'\n' | b'\r') => {
                    return Err(Self::error(LexErrorKind::UnterminatedChar, start));
                }
                Some(b'\\') => self.advance_by(2),
                Some(b'\'') => {
                    self.advance();
                    return Ok(TokenKind::Char);
                }
                Some(_) => self.advance(),
            }
        }
    }

    /// `$"`, `$@"`, `@$"`, or `$$"""` and friends.
    fn starts_interpolated(&self) -> bool {
        let rest = &self.input[self.pos..];
        let dollars = rest.iter().take_while(|&&c| c == b'$').count();
        let after = &rest[dollars..];
        if dollars > 0 {
            return after.first() == Some(&b'"')
                || (after.first() == Some(&b'@') && after.get(1) == Some(&b'"'));
        }
        rest.first() == Some(&b'@') && rest.get(1) == Some(&b'$') && {
            let dollars = rest[1..].iter().take_while(|&&c| c == b'$').count();
            rest.get(1 + dollars) == Some(&b'"')
        }
    }

    /// Read the prefix and opening quotes; the rest of the string is
    /// lexed as text, hole, and end tokens.
    fn read_interpolated_string(&mut self) -> TokenKind {
        let start = self.position();
        let mut verbatim = false;
        let mut dollars = 0;
        while let Some(c @ (b'$' | b'@')) = self.peek() {
            if c == b'@' {
                verbatim = true;
            } else {
                dollars += 1;
            }
            self.advance();
        }

        let quotes = self.quote_run(self.pos);
        let raw_quotes = if quotes >= 3 { quotes } else { 0 };
        self.advance_by(raw_quotes.max(1));
        self.strings.push(InterpolatedFrame {
            start,
            verbatim,
            raw_quotes,
            braces: if raw_quotes > 0 { dollars } else { 1 },
            segment: Segment::Text,
            nesting: 0,
        });
        TokenKind::InterpolatedStringStart
    }

    fn run_of(&self, byte: u8) -> usize {
        self.input[self.pos..]
            .iter()
            .take_while(|&&c| c == byte)
            .count()
    }

    fn set_segment(&mut self, segment: Segment) {
        if let Some(frame) = self.strings.last_mut() {
            frame.segment = segment;
            frame.nesting = 0;
        }
    }

    /// Literal text up to the next hole or the closing quote, or the
    /// hole opener or closing quote itself.
    fn read_string_text(&mut self) -> Result<TokenKind, LexError> {
        let Some(frame) = self.strings.last().copied() else {
            return self.read_token();
        };
        let text_start = self.pos;
        loop {
            match self.peek() {
                None => return Err(frame.unterminated()),
                Some(b'"') if frame.raw_quotes > 0 => {
                    let run = self.quote_run(self.pos);
                    if run < frame.raw_quotes {
                        self.advance_by(run);
                        continue;
                    }
                    if self.pos > text_start {
                        break;
                    }
                    self.advance_by(run);
                    self.strings.pop();
                    return Ok(TokenKind::InterpolatedStringEnd);
                }
                Some(b'"') if frame.verbatim && self.peek_at(1) == Some(b'"') => {
                    self.advance_by(2);
                }
                Some(b'"') => {
                    if self.pos > text_start {
                        break;
                    }
                    self.advance();
                    self.strings.pop();
                    return Ok(TokenKind::InterpolatedStringEnd);
                }
                Some(b'{') => {
                    let run = self.run_of(b'{');
                    if frame.raw_quotes == 0 && run >= 2 {
                        self.advance_by(2);
                        continue;
                    }
                    if run < frame.braces {
                        self.advance_by(run);
                        continue;
                    }
                    // in raw strings the extra braces are content
                    self.advance_by(run - frame.braces);
                    if self.pos > text_start {
                        break;
                    }
                    self.advance_by(frame.braces);
                    self.set_segment(Segment::Hole);
                    return Ok(TokenKind::InterpolationOpen);
                }
                Some(b'}') if frame.raw_quotes == 0 && self.peek_at(1) == Some(b'}') => {
                    self.advance_by(2);
                }
                Some(b'\\') if frame.single_line() => self.advance_by(2),
                Some(b'\n' | b'\r') if frame.single_line() => {
                    return Err(frame.unterminated());
                }
                Some(_) => self.advance(),
            }
        }
        Ok(TokenKind::InterpolatedStringText)
    }

    /// A code token inside a hole, or the `:` or brace that ends the
    /// hole's expression.
    fn read_hole_token(&mut self) -> Result<TokenKind, LexError> {
        let index = self.strings.len() - 1;
        let frame = self.strings[index];
        if frame.nesting == 0 {
            match self.peek() {
                Some(b'}') if self.run_of(b'}') >= frame.braces => {
                    self.advance_by(frame.braces);
                    self.set_segment(Segment::Text);
                    return Ok(TokenKind::InterpolationClose);
                }
                Some(b':') if self.peek_at(1) != Some(b':') => {
                    self.advance();
                    self.set_segment(Segment::Format);
                    return Ok(TokenKind::Colon);
                }
                _ => {}
            }
        }

        let kind = self.read_token()?;
        let nesting = &mut self.strings[index].nesting;
        match kind {
            TokenKind::OpenParen | TokenKind::OpenBracket | TokenKind::OpenBrace => *nesting += 1,
            TokenKind::CloseParen | TokenKind::CloseBracket | TokenKind::CloseBrace => {
                *nesting = nesting.saturating_sub(1);
            }
            _ => {}
        }
        Ok(kind)
    }

    /// Format specifier text, or the brace closing the hole.
    fn read_format_text(&mut self) -> Result<TokenKind, LexError> {
        let Some(frame) = self.strings.last().copied() else {
            return self.read_token();
        };
        let text_start = self.pos;
        loop {
            match self.peek() {
                None => return Err(frame.unterminated()),
                Some(b'}') if self.run_of(b'}') >= frame.braces => {
                    if self.pos > text_start {
                        break;
                    }
                    self.advance_by(frame.braces);
                    self.set_segment(Segment::Text);
                    return Ok(TokenKind::InterpolationClose);
                }
                // a quote cannot appear in a format; the string ends here
                Some(b'"') if frame.raw_quotes == 0 => {
                    self.set_segment(Segment::Text);
                    if self.pos > text_start {
                        break;
                    }
                    return self.read_string_text();
                }
                Some(b'\n' | b'\r') if frame.single_line() => {
                    return Err(frame.unterminated());
                }
                Some(_) => self.advance(),
            }
        }
        Ok(TokenKind::InterpolatedStringText)
    }

    fn read_operator(&mut self) -> TokenKind {
        let rest = &self.input[self.pos..];
        for &(text, kind) in OPERATORS {
            if !rest.starts_with(text.as_bytes()) {
                continue;
            }
            // `a ?.5 : b` is a conditional, not a null-conditional access
            if kind == TokenKind::QuestionDot && rest.get(2).is_some_and(u8::is_ascii_digit) {
                continue;
            }
            self.advance_by(text.len());
            return kind;
        }
        self.advance();
        TokenKind::Unknown
    }
}

const fn is_ident_start_byte(byte: u8) -> bool {
    byte == b'_' || byte.is_ascii_alphabetic() || byte >= 0x80
}

fn is_ident_start(ch: char) -> bool {
    ch == '_' || ch.is_alphabetic()
}

fn is_ident_continue(ch: char) -> bool {
    ch == '_' || ch.is_alphanumeric()
}
