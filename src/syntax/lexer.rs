//! Logos-based lexer for the Python stub/usage subset.
//!
//! Raw tokens come from the logos-generated tokenizer; [`tokenize`] then runs a
//! layout pass that turns line structure into `Newline`/`Indent`/`Dedent`
//! tokens, the way the parser expects them.

use logos::Logos;
use smol_str::SmolStr;

use super::SyntaxError;
use crate::base::{TextRange, TextSize};

/// Token kinds seen by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Layout
    Newline,
    Indent,
    Dedent,
    Eof,
    Error,

    // Keywords
    From,
    Import,
    As,
    Class,
    Def,
    Async,
    Pass,
    True,
    False,
    None,
    /// `if`, `for`, `while`, ... compound statements we do not model
    BlockKeyword,
    /// `return`, `raise`, `del`, ... simple statements we do not model
    StmtKeyword,
    /// `and`, `or`, `not`, `in`, `is`, `await`
    WordOp,

    // Literals
    Ident,
    Int,
    Float,
    String,

    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semicolon,
    Dot,
    Ellipsis,
    Arrow,
    Eq,
    At,
    Star,
    DoubleStar,
    Minus,
    BinOp,
    AugAssign,
}

impl TokenKind {
    fn opens_bracket(self) -> bool {
        matches!(self, TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace)
    }

    fn closes_bracket(self) -> bool {
        matches!(self, TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace)
    }
}

/// A token with its kind, text, and position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub range: TextRange,
}

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\f]+")]
#[logos(skip r"#[^\r\n]*")]
#[logos(skip r"\\\r?\n")]
enum LogosToken {
    #[regex(r"\r?\n")]
    Newline,

    #[token("from")]
    From,
    #[token("import")]
    Import,
    #[token("as")]
    As,
    #[token("class")]
    Class,
    #[token("def")]
    Def,
    #[token("async")]
    Async,
    #[token("pass")]
    Pass,
    #[token("True")]
    True,
    #[token("False")]
    False,
    #[token("None")]
    None,

    #[token("if")]
    #[token("elif")]
    #[token("else")]
    #[token("for")]
    #[token("while")]
    #[token("with")]
    #[token("try")]
    #[token("except")]
    #[token("finally")]
    #[token("match")]
    BlockKeyword,

    #[token("return")]
    #[token("raise")]
    #[token("del")]
    #[token("global")]
    #[token("nonlocal")]
    #[token("assert")]
    #[token("break")]
    #[token("continue")]
    #[token("yield")]
    StmtKeyword,

    #[token("and")]
    #[token("or")]
    #[token("not")]
    #[token("in")]
    #[token("is")]
    #[token("await")]
    WordOp,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    #[regex(r"[0-9][0-9_]*")]
    #[regex(r"0[xX][0-9a-fA-F_]+")]
    #[regex(r"0[oO][0-7_]+")]
    #[regex(r"0[bB][01_]+")]
    Int,

    #[regex(r"[0-9][0-9_]*\.[0-9_]*([eE][+-]?[0-9]+)?")]
    #[regex(r"\.[0-9][0-9_]*([eE][+-]?[0-9]+)?")]
    #[regex(r"[0-9][0-9_]*[eE][+-]?[0-9]+")]
    Float,

    #[regex(r#"[rRbBuUfF]{0,2}"([^"\\\r\n]|\\.)*""#)]
    #[regex(r#"[rRbBuUfF]{0,2}'([^'\\\r\n]|\\.)*'"#)]
    #[regex(r#"[rRbBuUfF]{0,2}"""([^"\\]|\\(.|\n)|"[^"]|""[^"])*""""#)]
    #[regex(r#"[rRbBuUfF]{0,2}'''([^'\\]|\\(.|\n)|'[^']|''[^'])*'''"#)]
    String,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token(".")]
    Dot,
    #[token("...")]
    Ellipsis,
    #[token("->")]
    Arrow,
    #[token("=")]
    Eq,
    #[token("@")]
    At,
    #[token("*")]
    Star,
    #[token("**")]
    DoubleStar,
    #[token("-")]
    Minus,

    #[token("+")]
    #[token("/")]
    #[token("//")]
    #[token("%")]
    #[token("|")]
    #[token("&")]
    #[token("^")]
    #[token("~")]
    #[token("<")]
    #[token(">")]
    #[token("<=")]
    #[token(">=")]
    #[token("==")]
    #[token("!=")]
    #[token("<<")]
    #[token(">>")]
    #[token(":=")]
    BinOp,

    #[token("+=")]
    #[token("-=")]
    #[token("*=")]
    #[token("/=")]
    #[token("//=")]
    #[token("%=")]
    #[token("|=")]
    #[token("&=")]
    #[token("^=")]
    #[token("**=")]
    #[token("@=")]
    #[token("<<=")]
    #[token(">>=")]
    AugAssign,
}

impl From<LogosToken> for TokenKind {
    fn from(token: LogosToken) -> Self {
        match token {
            LogosToken::Newline => TokenKind::Newline,
            LogosToken::From => TokenKind::From,
            LogosToken::Import => TokenKind::Import,
            LogosToken::As => TokenKind::As,
            LogosToken::Class => TokenKind::Class,
            LogosToken::Def => TokenKind::Def,
            LogosToken::Async => TokenKind::Async,
            LogosToken::Pass => TokenKind::Pass,
            LogosToken::True => TokenKind::True,
            LogosToken::False => TokenKind::False,
            LogosToken::None => TokenKind::None,
            LogosToken::BlockKeyword => TokenKind::BlockKeyword,
            LogosToken::StmtKeyword => TokenKind::StmtKeyword,
            LogosToken::WordOp => TokenKind::WordOp,
            LogosToken::Ident => TokenKind::Ident,
            LogosToken::Int => TokenKind::Int,
            LogosToken::Float => TokenKind::Float,
            LogosToken::String => TokenKind::String,
            LogosToken::LParen => TokenKind::LParen,
            LogosToken::RParen => TokenKind::RParen,
            LogosToken::LBracket => TokenKind::LBracket,
            LogosToken::RBracket => TokenKind::RBracket,
            LogosToken::LBrace => TokenKind::LBrace,
            LogosToken::RBrace => TokenKind::RBrace,
            LogosToken::Comma => TokenKind::Comma,
            LogosToken::Colon => TokenKind::Colon,
            LogosToken::Semicolon => TokenKind::Semicolon,
            LogosToken::Dot => TokenKind::Dot,
            LogosToken::Ellipsis => TokenKind::Ellipsis,
            LogosToken::Arrow => TokenKind::Arrow,
            LogosToken::Eq => TokenKind::Eq,
            LogosToken::At => TokenKind::At,
            LogosToken::Star => TokenKind::Star,
            LogosToken::DoubleStar => TokenKind::DoubleStar,
            LogosToken::Minus => TokenKind::Minus,
            LogosToken::BinOp => TokenKind::BinOp,
            LogosToken::AugAssign => TokenKind::AugAssign,
        }
    }
}

/// Tokenize source text, including layout tokens.
///
/// The returned stream always ends with `Eof`. Lexing problems (stray
/// characters, unterminated strings, unbalanced brackets, bad dedents) are
/// reported alongside; the offending characters come through as `Error`
/// tokens so the parser can recover.
pub fn tokenize(text: &str) -> (Vec<Token<'_>>, Vec<SyntaxError>) {
    let mut layout = Layout::new(text);
    let mut lexer = LogosToken::lexer(text);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let range = TextRange::new(
            TextSize::from(span.start as u32),
            TextSize::from(span.end as u32),
        );
        let kind = match result {
            Ok(token) => TokenKind::from(token),
            Err(()) => TokenKind::Error,
        };
        layout.push(Token {
            kind,
            text: lexer.slice(),
            range,
        });
    }

    layout.finish()
}

struct Layout<'a> {
    text: &'a str,
    tokens: Vec<Token<'a>>,
    errors: Vec<SyntaxError>,
    indents: Vec<u32>,
    open_brackets: Vec<Token<'a>>,
    at_line_start: bool,
}

impl<'a> Layout<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            tokens: Vec::new(),
            errors: Vec::new(),
            indents: vec![0],
            open_brackets: Vec::new(),
            at_line_start: true,
        }
    }

    fn push(&mut self, token: Token<'a>) {
        if token.kind == TokenKind::Newline {
            if self.open_brackets.is_empty() && !self.at_line_start {
                self.tokens.push(token);
                self.at_line_start = true;
            }
            return;
        }

        if self.at_line_start && self.open_brackets.is_empty() {
            self.indent_to(token.range.start());
            self.at_line_start = false;
        }

        match token.kind {
            TokenKind::Error => self.errors.push(SyntaxError::new(
                lex_error_message(token.text),
                token.range,
            )),
            kind if kind.opens_bracket() => self.open_brackets.push(token.clone()),
            kind if kind.closes_bracket() => {
                if self.open_brackets.pop().is_none() {
                    self.errors.push(SyntaxError::new(
                        format!("unmatched '{}'", token.text),
                        token.range,
                    ));
                }
            }
            _ => {}
        }

        self.tokens.push(token);
    }

    fn indent_to(&mut self, start: TextSize) {
        let offset = usize::from(start);
        let line_start = self.text[..offset].rfind('\n').map_or(0, |idx| idx + 1);
        let column = (offset - line_start) as u32;
        let at = TextRange::empty(start);

        let top = self.indents.last().copied().unwrap_or(0);
        if column > top {
            self.indents.push(column);
            self.tokens.push(synthetic(TokenKind::Indent, at));
            return;
        }

        while column < self.indents.last().copied().unwrap_or(0) {
            self.indents.pop();
            self.tokens.push(synthetic(TokenKind::Dedent, at));
        }

        if column != self.indents.last().copied().unwrap_or(0) {
            self.errors.push(SyntaxError::new(
                "unindent does not match any outer indentation level",
                at,
            ));
            self.indents.push(column);
        }
    }

    fn finish(mut self) -> (Vec<Token<'a>>, Vec<SyntaxError>) {
        let end = TextRange::empty(TextSize::of(self.text));

        for bracket in std::mem::take(&mut self.open_brackets) {
            self.errors.push(SyntaxError::new(
                format!("'{}' was never closed", bracket.text),
                bracket.range,
            ));
        }

        if !self.at_line_start {
            self.tokens.push(synthetic(TokenKind::Newline, end));
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.tokens.push(synthetic(TokenKind::Dedent, end));
        }
        self.tokens.push(synthetic(TokenKind::Eof, end));

        (self.tokens, self.errors)
    }
}

fn synthetic<'a>(kind: TokenKind, range: TextRange) -> Token<'a> {
    Token {
        kind,
        text: "",
        range,
    }
}

fn lex_error_message(text: &str) -> SmolStr {
    match text.chars().next() {
        Some('"') | Some('\'') => SmolStr::new("unterminated string literal"),
        _ => smol_str::format_smolstr!("unexpected character {:?}", text),
    }
}
