//! Recursive descent parser over the layout-aware token stream.
//!
//! Statements that fail to parse are recorded as [`StmtKind::Error`] and the
//! parser resynchronises at the next logical line, skipping any block that
//! hangs off the broken line.

use smol_str::{SmolStr, format_smolstr};

use super::ast::{
    Arg, ClassDef, DottedName, Expr, ExprKind, FromImport, FromName, FromNames, FunctionDef,
    Ident, ImportAlias, Literal, Param, ParamKind, SourceFile, Stmt, StmtKind,
};
use super::lexer::{Token, TokenKind, tokenize};
use super::SyntaxError;
use crate::base::{TextRange, TextSize};

/// Parse result containing the syntax tree and any errors.
#[derive(Debug, Clone)]
pub struct Parse {
    pub file: SourceFile,
    pub errors: Vec<SyntaxError>,
}

impl Parse {
    /// Check if parsing succeeded without errors
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parse Python source text into a [`SourceFile`].
pub fn parse(text: &str) -> Parse {
    let (tokens, mut errors) = tokenize(text);
    let mut parser = Parser::new(&tokens);
    let body = parser.statements(false);
    errors.extend(parser.errors);

    Parse {
        file: SourceFile { body },
        errors,
    }
}

type PResult<T> = Result<T, SyntaxError>;

struct Parser<'a> {
    tokens: &'a [Token<'a>],
    pos: usize,
    /// End of the last consumed non-layout token.
    last_end: TextSize,
    errors: Vec<SyntaxError>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token<'a>]) -> Self {
        Self {
            tokens,
            pos: 0,
            last_end: TextSize::from(0),
            errors: Vec::new(),
        }
    }

    // =========================================================================
    // Token inspection
    // =========================================================================

    fn current(&self) -> &'a Token<'a> {
        let tokens = self.tokens;
        // The token stream always ends with Eof, which is never bumped past.
        &tokens[self.pos.min(tokens.len().saturating_sub(1))]
    }

    fn kind(&self) -> TokenKind {
        self.current().kind
    }

    fn nth(&self, n: usize) -> TokenKind {
        self.tokens
            .get(self.pos + n)
            .map_or(TokenKind::Eof, |token| token.kind)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.kind() == kind
    }

    /// At a keyword-class token with the given text (`if`, `for`, `not`, ...).
    fn at_keyword(&self, text: &str) -> bool {
        let token = self.current();
        matches!(
            token.kind,
            TokenKind::BlockKeyword | TokenKind::StmtKeyword | TokenKind::WordOp
        ) && token.text == text
    }

    fn at_line_end(&self) -> bool {
        matches!(self.kind(), TokenKind::Newline | TokenKind::Eof)
    }

    /// Identifiers plus keywords, which are valid after `.` and as keyword
    /// argument names.
    fn at_name_like(&self) -> bool {
        let token = self.current();
        token.kind == TokenKind::Ident
            || token
                .text
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic())
                && token.text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    fn start(&self) -> TextSize {
        self.current().range.start()
    }

    fn range_from(&self, start: TextSize) -> TextRange {
        TextRange::new(start, self.last_end.max(start))
    }

    // =========================================================================
    // Token consumption
    // =========================================================================

    fn bump(&mut self) -> &'a Token<'a> {
        let token = self.current();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        if !is_layout(token.kind) {
            self.last_end = token.range.end();
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> PResult<&'a Token<'a>> {
        if self.at(kind) {
            Ok(self.bump())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, what: &str) -> SyntaxError {
        let token = self.current();
        SyntaxError::new(
            format_smolstr!("expected {what}, found {}", describe(token)),
            token.range,
        )
    }

    fn ident(&mut self) -> PResult<Ident> {
        let token = self.expect(TokenKind::Ident, "identifier")?;
        Ok(Ident {
            text: SmolStr::new(token.text),
            range: token.range,
        })
    }

    fn name_like(&mut self) -> PResult<Ident> {
        if !self.at_name_like() {
            return Err(self.unexpected("identifier"));
        }
        let token = self.bump();
        Ok(Ident {
            text: SmolStr::new(token.text),
            range: token.range,
        })
    }

    // =========================================================================
    // Recovery
    // =========================================================================

    fn recover(&mut self, error: SyntaxError, start: TextSize) -> Stmt {
        let message = error.message.clone();
        self.errors.push(error);

        while !self.at_line_end() {
            self.bump();
        }
        self.eat(TokenKind::Newline);
        if self.at(TokenKind::Indent) {
            self.skip_block();
        }

        Stmt {
            kind: StmtKind::Error(message),
            range: self.range_from(start),
        }
    }

    /// Skip an indented block, including nested blocks. Expects `Indent`.
    fn skip_block(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.kind() {
                TokenKind::Indent => depth += 1,
                TokenKind::Dedent => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.bump();
                        return;
                    }
                }
                TokenKind::Eof => return,
                _ => {}
            }
            self.bump();
        }
    }

    /// Skip to the bracket closing the current group, leaving it unconsumed.
    fn skip_to_close(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.kind() {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                TokenKind::Newline | TokenKind::Eof => return,
                _ => {}
            }
            self.bump();
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn statements(&mut self, nested: bool) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        loop {
            match self.kind() {
                TokenKind::Eof => break,
                TokenKind::Dedent if nested => break,
                TokenKind::Dedent | TokenKind::Newline => {
                    self.bump();
                }
                TokenKind::Indent => {
                    let start = self.start();
                    let error = SyntaxError::new("unexpected indent", self.current().range);
                    self.errors.push(error);
                    self.skip_block();
                    stmts.push(Stmt {
                        kind: StmtKind::Error("unexpected indent".into()),
                        range: self.range_from(start),
                    });
                }
                _ => stmts.extend(self.statement()),
            }
        }
        stmts
    }

    fn statement(&mut self) -> Vec<Stmt> {
        let start = self.start();
        let result = match self.kind() {
            TokenKind::At | TokenKind::Class | TokenKind::Def | TokenKind::Async => {
                self.definition(start)
            }
            TokenKind::BlockKeyword => Ok(self.opaque_compound(start)),
            _ => return self.simple_line(),
        };

        match result {
            Ok(stmt) => vec![stmt],
            Err(error) => vec![self.recover(error, start)],
        }
    }

    /// One logical line of `;`-separated simple statements.
    fn simple_line(&mut self) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        loop {
            let start = self.start();
            match self.simple_stmt() {
                Ok(kind) => stmts.push(Stmt {
                    kind,
                    range: self.range_from(start),
                }),
                Err(error) => {
                    stmts.push(self.recover(error, start));
                    return stmts;
                }
            }
            if !self.eat(TokenKind::Semicolon) || self.at_line_end() {
                break;
            }
        }

        if !self.eat(TokenKind::Newline) && !self.at(TokenKind::Eof) {
            let start = self.start();
            let error = self.unexpected("end of statement");
            stmts.push(self.recover(error, start));
        }
        stmts
    }

    fn simple_stmt(&mut self) -> PResult<StmtKind> {
        match self.kind() {
            TokenKind::Pass => {
                self.bump();
                Ok(StmtKind::Pass)
            }
            TokenKind::From => self.from_import(),
            TokenKind::Import => self.import(),
            TokenKind::StmtKeyword => {
                while !self.at_line_end() && !self.at(TokenKind::Semicolon) {
                    self.bump();
                }
                Ok(StmtKind::Opaque)
            }
            _ => self.expr_statement(),
        }
    }

    fn import(&mut self) -> PResult<StmtKind> {
        self.bump();
        let mut aliases = Vec::new();
        loop {
            let path = self.dotted_name()?;
            let alias = if self.eat(TokenKind::As) {
                Some(self.ident()?)
            } else {
                None
            };
            aliases.push(ImportAlias { path, alias });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(StmtKind::Import(aliases))
    }

    fn from_import(&mut self) -> PResult<StmtKind> {
        self.bump();

        let mut level = 0;
        loop {
            match self.kind() {
                TokenKind::Dot => level += 1,
                TokenKind::Ellipsis => level += 3,
                _ => break,
            }
            self.bump();
        }

        let module = if level > 0 && self.at(TokenKind::Import) {
            None
        } else {
            Some(self.dotted_name()?)
        };
        self.expect(TokenKind::Import, "'import'")?;

        let names = if self.at(TokenKind::Star) {
            FromNames::Star(self.bump().range)
        } else {
            let parenthesized = self.eat(TokenKind::LParen);
            let mut names = Vec::new();
            loop {
                if parenthesized && self.at(TokenKind::RParen) {
                    break;
                }
                let name = self.ident()?;
                let alias = if self.eat(TokenKind::As) {
                    Some(self.ident()?)
                } else {
                    None
                };
                names.push(FromName { name, alias });
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            if parenthesized {
                self.expect(TokenKind::RParen, "')'")?;
            }
            FromNames::Names(names)
        };

        Ok(StmtKind::FromImport(FromImport {
            level,
            module,
            names,
        }))
    }

    fn dotted_name(&mut self) -> PResult<DottedName> {
        let mut parts = vec![self.ident()?];
        while self.eat(TokenKind::Dot) {
            parts.push(self.ident()?);
        }
        Ok(DottedName { parts })
    }

    fn expr_statement(&mut self) -> PResult<StmtKind> {
        let first = self.expr_list()?;
        match self.kind() {
            TokenKind::Colon => {
                self.bump();
                let annotation = self.expr()?;
                let value = if self.eat(TokenKind::Eq) {
                    Some(self.expr_list()?)
                } else {
                    None
                };
                Ok(StmtKind::AnnAssign {
                    target: first,
                    annotation,
                    value,
                })
            }
            TokenKind::Eq => {
                self.bump();
                let mut targets = vec![first];
                let mut value = self.expr_list()?;
                while self.eat(TokenKind::Eq) {
                    let next = self.expr_list()?;
                    targets.push(std::mem::replace(&mut value, next));
                }
                Ok(StmtKind::Assign { targets, value })
            }
            TokenKind::AugAssign => {
                self.bump();
                self.expr_list()?;
                Ok(StmtKind::Opaque)
            }
            _ => Ok(StmtKind::Expr(first)),
        }
    }

    /// `if`/`for`/`while`/`with`/`try` and friends: header and body skipped.
    fn opaque_compound(&mut self, start: TextSize) -> Stmt {
        while !self.at_line_end() {
            self.bump();
        }
        self.eat(TokenKind::Newline);
        if self.at(TokenKind::Indent) {
            self.skip_block();
        }
        Stmt {
            kind: StmtKind::Opaque,
            range: self.range_from(start),
        }
    }

    fn definition(&mut self, start: TextSize) -> PResult<Stmt> {
        let mut decorators = Vec::new();
        while self.eat(TokenKind::At) {
            decorators.push(self.expr()?);
            self.expect(TokenKind::Newline, "newline after decorator")?;
            while self.eat(TokenKind::Newline) {}
        }

        let kind = match self.kind() {
            TokenKind::Class => StmtKind::ClassDef(self.class_def(decorators)?),
            TokenKind::Def => StmtKind::FunctionDef(self.function_def(decorators, false)?),
            TokenKind::Async if self.nth(1) == TokenKind::Def => {
                self.bump();
                StmtKind::FunctionDef(self.function_def(decorators, true)?)
            }
            _ => return Err(self.unexpected("'class' or 'def'")),
        };

        Ok(Stmt {
            kind,
            range: self.range_from(start),
        })
    }

    fn class_def(&mut self, decorators: Vec<Expr>) -> PResult<ClassDef> {
        self.bump();
        let name = self.ident()?;
        let bases = if self.at(TokenKind::LParen) {
            self.call_args()?
        } else {
            Vec::new()
        };
        self.expect(TokenKind::Colon, "':'")?;
        let body = self.block()?;

        Ok(ClassDef {
            name,
            bases,
            decorators,
            body,
        })
    }

    fn block(&mut self) -> PResult<Vec<Stmt>> {
        if !self.eat(TokenKind::Newline) {
            return Ok(self.simple_line());
        }
        if !self.at(TokenKind::Indent) {
            return Err(SyntaxError::new(
                "expected an indented block",
                self.current().range,
            ));
        }
        self.bump();
        let body = self.statements(true);
        self.eat(TokenKind::Dedent);
        Ok(body)
    }

    fn function_def(&mut self, decorators: Vec<Expr>, is_async: bool) -> PResult<FunctionDef> {
        self.bump();
        let name = self.ident()?;
        self.expect(TokenKind::LParen, "'('")?;
        let params = self.params()?;
        self.expect(TokenKind::RParen, "')'")?;
        let returns = if self.eat(TokenKind::Arrow) {
            Some(self.expr()?)
        } else {
            None
        };
        self.expect(TokenKind::Colon, "':'")?;
        self.skip_suite();

        Ok(FunctionDef {
            name,
            params,
            returns,
            decorators,
            is_async,
        })
    }

    fn skip_suite(&mut self) {
        if self.eat(TokenKind::Newline) {
            if self.at(TokenKind::Indent) {
                self.skip_block();
            }
            return;
        }
        while !self.at_line_end() {
            self.bump();
        }
        self.eat(TokenKind::Newline);
    }

    fn params(&mut self) -> PResult<Vec<Param>> {
        let mut params = Vec::new();
        let mut keyword_only = false;

        while !self.at(TokenKind::RParen) {
            let kind = match self.kind() {
                TokenKind::BinOp if self.current().text == "/" => {
                    self.bump();
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                    continue;
                }
                TokenKind::Star => {
                    self.bump();
                    keyword_only = true;
                    if matches!(self.kind(), TokenKind::Comma | TokenKind::RParen) {
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                        continue;
                    }
                    ParamKind::VarArgs
                }
                TokenKind::DoubleStar => {
                    self.bump();
                    ParamKind::KwArgs
                }
                _ if keyword_only => ParamKind::KeywordOnly,
                _ => ParamKind::Positional,
            };

            let name = self.ident()?;
            let annotation = if self.eat(TokenKind::Colon) {
                Some(self.expr()?)
            } else {
                None
            };
            let default = if self.eat(TokenKind::Eq) {
                Some(self.expr()?)
            } else {
                None
            };
            params.push(Param {
                name,
                kind,
                annotation,
                default,
            });

            if !self.eat(TokenKind::Comma) {
                break;
            }
        }

        Ok(params)
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    /// Comma-separated expressions; more than one becomes a tuple.
    fn expr_list(&mut self) -> PResult<Expr> {
        let start = self.start();
        let first = self.star_or_expr()?;
        if !self.at(TokenKind::Comma) {
            return Ok(first);
        }

        let mut items = vec![first];
        while self.eat(TokenKind::Comma) {
            if matches!(
                self.kind(),
                TokenKind::Eq | TokenKind::Colon | TokenKind::Newline | TokenKind::Semicolon
                    | TokenKind::Eof
            ) {
                break;
            }
            items.push(self.star_or_expr()?);
        }
        Ok(Expr::new(ExprKind::Other(items), self.range_from(start)))
    }

    fn star_or_expr(&mut self) -> PResult<Expr> {
        if !matches!(self.kind(), TokenKind::Star | TokenKind::DoubleStar) {
            return self.expr();
        }
        let start = self.start();
        self.bump();
        let inner = self.expr()?;
        Ok(Expr::new(ExprKind::Other(vec![inner]), self.range_from(start)))
    }

    fn expr(&mut self) -> PResult<Expr> {
        if self.current().kind == TokenKind::Ident && self.current().text == "lambda" {
            return self.lambda();
        }

        let body = self.binary(1)?;
        if !self.at_keyword("if") {
            return Ok(body);
        }

        self.bump();
        let condition = self.binary(1)?;
        if !self.at_keyword("else") {
            return Err(self.unexpected("'else'"));
        }
        self.bump();
        let orelse = self.expr()?;
        let range = body.range.cover(orelse.range);
        Ok(Expr::new(ExprKind::Other(vec![body, condition, orelse]), range))
    }

    fn lambda(&mut self) -> PResult<Expr> {
        let start = self.start();
        self.bump();
        let mut depth = 0usize;
        while !(depth == 0 && self.at(TokenKind::Colon)) && !self.at_line_end() {
            match self.kind() {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    depth = depth.saturating_sub(1)
                }
                _ => {}
            }
            self.bump();
        }
        self.expect(TokenKind::Colon, "':'")?;
        let body = self.expr()?;
        Ok(Expr::new(ExprKind::Other(vec![body]), self.range_from(start)))
    }

    /// Binary operators by precedence climbing.
    fn binary(&mut self, min_prec: u8) -> PResult<Expr> {
        let mut lhs = self.unary()?;

        while let Some((op, prec, width)) = self.binary_op() {
            if prec < min_prec {
                break;
            }
            for _ in 0..width {
                self.bump();
            }
            // `**` is right-associative.
            let next_min = if op == "**" { prec } else { prec + 1 };
            let rhs = self.binary(next_min)?;
            let range = lhs.range.cover(rhs.range);
            lhs = Expr::new(
                ExprKind::BinOp {
                    lhs: Box::new(lhs),
                    op,
                    rhs: Box::new(rhs),
                },
                range,
            );
        }

        Ok(lhs)
    }

    /// The operator at the cursor, its precedence, and how many tokens it spans.
    fn binary_op(&self) -> Option<(SmolStr, u8, usize)> {
        let token = self.current();
        let next = self.tokens.get(self.pos + 1);
        let (op, width): (&str, usize) = match token.kind {
            TokenKind::BinOp if token.text != "~" => (token.text, 1),
            TokenKind::Minus => ("-", 1),
            TokenKind::Star => ("*", 1),
            TokenKind::DoubleStar => ("**", 1),
            TokenKind::At => ("@", 1),
            TokenKind::WordOp => match token.text {
                "and" | "or" | "in" => (token.text, 1),
                "is" if next.is_some_and(|t| t.text == "not") => ("is not", 2),
                "is" => ("is", 1),
                "not" if next.is_some_and(|t| t.text == "in") => ("not in", 2),
                _ => return None,
            },
            _ => return None,
        };

        let prec = match op {
            ":=" => 1,
            "or" => 2,
            "and" => 3,
            "in" | "not in" | "is" | "is not" | "<" | ">" | "<=" | ">=" | "==" | "!=" => 4,
            "|" => 5,
            "^" => 6,
            "&" => 7,
            "<<" | ">>" => 8,
            "+" | "-" => 9,
            "**" => 11,
            _ => 10,
        };
        Some((SmolStr::new(op), prec, width))
    }

    fn unary(&mut self) -> PResult<Expr> {
        let start = self.start();
        let token = self.current();
        let is_prefix = match token.kind {
            TokenKind::Minus => true,
            TokenKind::BinOp => matches!(token.text, "+" | "~"),
            TokenKind::WordOp => matches!(token.text, "not" | "await"),
            _ => false,
        };
        if !is_prefix {
            return self.postfix();
        }

        self.bump();
        // Negative numbers stay numeric literals.
        if token.kind == TokenKind::Minus
            && matches!(self.kind(), TokenKind::Int | TokenKind::Float)
        {
            let literal = if self.bump().kind == TokenKind::Int {
                Literal::Int
            } else {
                Literal::Float
            };
            return Ok(Expr::new(ExprKind::Literal(literal), self.range_from(start)));
        }

        let operand = self.unary()?;
        Ok(Expr::new(ExprKind::Other(vec![operand]), self.range_from(start)))
    }

    fn postfix(&mut self) -> PResult<Expr> {
        let start = self.start();
        let mut expr = self.atom()?;

        loop {
            expr = match self.kind() {
                TokenKind::Dot => {
                    self.bump();
                    let attr = self.name_like()?;
                    Expr::new(
                        ExprKind::Attribute {
                            base: Box::new(expr),
                            attr,
                        },
                        self.range_from(start),
                    )
                }
                TokenKind::LParen => {
                    let args = self.call_args()?;
                    Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        self.range_from(start),
                    )
                }
                TokenKind::LBracket => {
                    let items = self.subscript_items()?;
                    Expr::new(
                        ExprKind::Subscript {
                            base: Box::new(expr),
                            items,
                        },
                        self.range_from(start),
                    )
                }
                _ => return Ok(expr),
            };
        }
    }

    fn call_args(&mut self) -> PResult<Vec<Arg>> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut args = Vec::new();

        while !self.at(TokenKind::RParen) {
            let arg = if self.at_name_like() && self.nth(1) == TokenKind::Eq {
                let name = self.name_like()?;
                self.bump();
                Arg {
                    name: Some(name),
                    value: self.expr()?,
                }
            } else {
                let value = self.star_or_expr()?;
                if self.at_keyword("for") {
                    self.skip_to_close();
                }
                Arg { name: None, value }
            };
            args.push(arg);

            if !self.eat(TokenKind::Comma) {
                break;
            }
        }

        self.expect(TokenKind::RParen, "')'")?;
        Ok(args)
    }

    fn subscript_items(&mut self) -> PResult<Vec<Expr>> {
        self.bump();
        let mut items = Vec::new();

        while !self.at(TokenKind::RBracket) {
            items.push(self.slice_item()?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }

        self.expect(TokenKind::RBracket, "']'")?;
        Ok(items)
    }

    /// A subscript item, possibly a `lower:upper:step` slice.
    fn slice_item(&mut self) -> PResult<Expr> {
        let start = self.start();
        let mut parts = Vec::new();

        if !self.at(TokenKind::Colon) {
            let item = self.star_or_expr()?;
            if !self.at(TokenKind::Colon) {
                return Ok(item);
            }
            parts.push(item);
        }

        while self.eat(TokenKind::Colon) {
            if !matches!(
                self.kind(),
                TokenKind::Colon | TokenKind::Comma | TokenKind::RBracket
            ) {
                parts.push(self.expr()?);
            }
        }

        Ok(Expr::new(ExprKind::Other(parts), self.range_from(start)))
    }

    fn atom(&mut self) -> PResult<Expr> {
        let start = self.start();
        let token = self.current();

        let literal = match token.kind {
            TokenKind::Ident => {
                self.bump();
                return Ok(Expr::new(
                    ExprKind::Name(SmolStr::new(token.text)),
                    token.range,
                ));
            }
            TokenKind::Int => Literal::Int,
            TokenKind::Float => Literal::Float,
            TokenKind::True => Literal::Bool(true),
            TokenKind::False => Literal::Bool(false),
            TokenKind::None => Literal::None,
            TokenKind::Ellipsis => Literal::Ellipsis,
            TokenKind::String => return Ok(self.strings()),
            TokenKind::LParen => return self.parenthesized(),
            TokenKind::LBracket => return self.collection(TokenKind::RBracket, "']'"),
            TokenKind::LBrace => return self.collection(TokenKind::RBrace, "'}'"),
            _ => return Err(self.unexpected("expression")),
        };

        self.bump();
        Ok(Expr::new(ExprKind::Literal(literal), self.range_from(start)))
    }

    /// Adjacent string literals concatenate into one.
    fn strings(&mut self) -> Expr {
        let start = self.start();
        let mut value = String::new();
        let mut is_bytes = false;

        while self.at(TokenKind::String) {
            let token = self.bump();
            let (bytes, contents) = string_contents(token.text);
            is_bytes |= bytes;
            value.push_str(contents);
        }

        let literal = if is_bytes {
            Literal::Bytes
        } else {
            Literal::Str(SmolStr::new(value))
        };
        Expr::new(ExprKind::Literal(literal), self.range_from(start))
    }

    fn parenthesized(&mut self) -> PResult<Expr> {
        let start = self.start();
        self.bump();
        if self.eat(TokenKind::RParen) {
            return Ok(Expr::new(ExprKind::Other(Vec::new()), self.range_from(start)));
        }

        let first = self.star_or_expr()?;
        if self.at_keyword("for") {
            self.skip_to_close();
            self.expect(TokenKind::RParen, "')'")?;
            return Ok(Expr::new(ExprKind::Other(vec![first]), self.range_from(start)));
        }
        if self.eat(TokenKind::RParen) {
            return Ok(first);
        }

        let mut items = vec![first];
        while self.eat(TokenKind::Comma) {
            if self.at(TokenKind::RParen) {
                break;
            }
            items.push(self.star_or_expr()?);
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(Expr::new(ExprKind::Other(items), self.range_from(start)))
    }

    /// List, set and dict displays, including comprehensions.
    fn collection(&mut self, close: TokenKind, what: &str) -> PResult<Expr> {
        let start = self.start();
        self.bump();
        let mut items = Vec::new();

        while !self.at(close) {
            items.push(self.star_or_expr()?);
            if self.eat(TokenKind::Colon) {
                items.push(self.expr()?);
            }
            if self.at_keyword("for") {
                self.skip_to_close();
                break;
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }

        self.expect(close, what)?;
        Ok(Expr::new(ExprKind::Other(items), self.range_from(start)))
    }
}

fn is_layout(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent | TokenKind::Eof
    )
}

fn describe(token: &Token<'_>) -> SmolStr {
    match token.kind {
        TokenKind::Eof => "end of file".into(),
        TokenKind::Newline => "newline".into(),
        TokenKind::Indent => "indent".into(),
        TokenKind::Dedent => "dedent".into(),
        _ => format_smolstr!("'{}'", token.text),
    }
}

/// Split a string token into (is_bytes, contents between the quotes).
fn string_contents(text: &str) -> (bool, &str) {
    let prefix_len = text
        .find(|c: char| c == '"' || c == '\'')
        .unwrap_or(text.len());
    let (prefix, quoted) = text.split_at(prefix_len);
    let is_bytes = prefix.contains(['b', 'B']);

    let quote_len = if quoted.starts_with("\"\"\"") || quoted.starts_with("'''") {
        3
    } else {
        1
    };
    let contents = quoted
        .get(quote_len..quoted.len().saturating_sub(quote_len))
        .unwrap_or("");
    (is_bytes, contents)
}
