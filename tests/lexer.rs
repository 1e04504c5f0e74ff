//! Lexer edge cases and error tests.

use pointer_spacing::{LexErrorKind, Position, TokenKind, TriviaKind, tokenize};

/// Rebuild the source from token and trivia spans.
fn reassemble(source: &str) -> String {
    let tokens = tokenize(source).expect("tokenize failed");
    let mut out = String::new();
    for token in &tokens {
        for t in &token.leading {
            out.push_str(t.text(source));
        }
        out.push_str(token.text(source));
        for t in &token.trailing {
            out.push_str(t.text(source));
        }
    }
    out
}

// -----------------------------------------------------------
// Basic lexer behaviour.
// -----------------------------------------------------------

#[test]
fn lex_empty_input() {
    let tokens = tokenize("").expect("tokenize failed");
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].kind, TokenKind::EndOfFile);
}

#[test]
fn lex_only_trivia() {
    let tokens = tokenize("  \n// c\n/* d */\n").expect("tokenize failed");
    assert_eq!(tokens.len(), 1);
    let kinds: Vec<_> = tokens[0].leading.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TriviaKind::Whitespace,
            TriviaKind::Newline,
            TriviaKind::LineComment,
            TriviaKind::Newline,
            TriviaKind::BlockComment,
            TriviaKind::Newline,
        ]
    );
}

#[test]
fn lex_function_pointer() {
    let kinds: Vec<_> = tokenize("delegate* unmanaged[Cdecl]<int*, void>")
        .expect("tokenize failed")
        .iter()
        .map(|t| t.kind)
        .collect();
    assert_eq!(kinds[1], TokenKind::Star);
    assert_eq!(kinds[2], TokenKind::Identifier);
    assert_eq!(kinds[3], TokenKind::OpenBracket);
    assert_eq!(kinds[6], TokenKind::Lt);
    assert_eq!(kinds[8], TokenKind::Star);
    assert_eq!(kinds[11], TokenKind::Gt);
}

#[test]
fn lex_star_and_amp_variants() {
    let kinds: Vec<_> = tokenize("* & *= &= && ->")
        .expect("tokenize failed")
        .iter()
        .map(|t| t.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Star,
            TokenKind::Amp,
            TokenKind::StarEq,
            TokenKind::AmpEq,
            TokenKind::AmpAmp,
            TokenKind::Arrow,
            TokenKind::EndOfFile,
        ]
    );
}

#[test]
fn crlf_is_one_newline() {
    let source = "int*\r\np;";
    let tokens = tokenize(source).expect("tokenize failed");
    assert_eq!(tokens[1].trailing.len(), 1);
    assert_eq!(tokens[1].trailing[0].kind, TriviaKind::Newline);
    assert_eq!(tokens[1].trailing[0].text(source), "\r\n");
}

#[test]
fn lexing_is_lossless() {
    for source in [
        "unsafe delegate* managed<int*> FuncPtr;",
        "class C\r\n{\r\n    int /* a */ * p; // b\r\n}\r\n",
        "#if DEBUG\nint*p;\n#endif\n",
        "var s = $\"{a * b}\" + @\"x\"\"y\" + \"\"\"raw\"\"\";",
        "\tx = ( * q ) & m;\n\n",
    ] {
        assert_eq!(reassemble(source), source);
    }
}

#[test]
fn multibyte_text_keeps_byte_spans() {
    let source = "var é = \"ü\"; int *p;";
    let tokens = tokenize(source).expect("tokenize failed");
    let star = tokens
        .iter()
        .find(|t| t.kind == TokenKind::Star)
        .expect("no star");
    assert_eq!(star.text(source), "*");
    assert_eq!(&source[star.span.start..star.span.end], "*");
}

// -----------------------------------------------------------
// Errors.
// -----------------------------------------------------------

#[test]
fn error_unterminated_comment_position() {
    let err = tokenize("int*\n  /* never closed").unwrap_err();
    assert_eq!(err.kind, LexErrorKind::UnterminatedComment);
    assert_eq!(err.position, Position { line: 2, column: 3 });
    assert_eq!(
        err.to_string(),
        "unterminated block comment at line 2, column 3"
    );
}

#[test]
fn error_unterminated_char() {
    let err = tokenize("char c = 'a").unwrap_err();
    assert_eq!(err.kind, LexErrorKind::UnterminatedChar);
}

#[test]
fn error_unterminated_raw_string() {
    let err = tokenize("var s = \"\"\"abc").unwrap_err();
    assert_eq!(err.kind, LexErrorKind::UnterminatedRawString { quotes: 3 });
}

#[test]
fn unknown_characters_are_tokens() {
    let tokens = tokenize("int ` p;").expect("tokenize failed");
    assert_eq!(tokens[1].kind, TokenKind::Unknown);
}
