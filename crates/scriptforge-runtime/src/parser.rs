//! Recursive-descent parser for the plugin script subset.
//!
//! The grammar covers what plugin snippets actually use: import/export
//! declarations, `const`/`let` bindings, object/array literals, arrow
//! functions, calls, member access, `await`, `if`/`else`, `return` and a
//! small operator set. Type annotations are consumed and discarded; no type
//! checking happens here.

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{Lexer, Token, TokenKind};

/// Parse a whole source unit into span-carrying top-level items.
pub fn parse_program(source: &str) -> Result<Program, ParseError> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).program()
}

/// Parse the entire source text as one expression (legacy evaluation path).
pub fn parse_expression_source(source: &str) -> Result<Expr, ParseError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser::new(tokens);
    let expr = parser.expression()?;
    while parser.match_kind(TokenKind::Semicolon) {}
    parser.expect(TokenKind::Eof, "expected end of input after expression")?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    fn current_token(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous_token(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn token_at(&self, index: usize) -> &Token {
        self.tokens.get(index).unwrap_or_else(|| {
            // tokenize() always ends with Eof
            self.tokens.last().expect("token stream is never empty")
        })
    }

    fn is_at_end(&self) -> bool {
        self.current_token().kind == TokenKind::Eof
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        &self.tokens[self.current - 1]
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current_token().kind == kind
    }

    fn check_ident(&self, lexeme: &str) -> bool {
        let token = self.current_token();
        token.kind == TokenKind::Ident && token.lexeme == lexeme
    }

    fn match_kind(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        let token = self.current_token();
        let found = if token.kind == TokenKind::Eof {
            "end of input".to_string()
        } else {
            format!("`{}`", token.lexeme)
        };
        ParseError::new(
            format!("{}, found {}", message.into(), found),
            token.line,
            token.column,
        )
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Result<&Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(message))
        }
    }

    fn expect_ident(&mut self, message: &str) -> Result<String, ParseError> {
        if self.check(TokenKind::Ident) {
            Ok(self.advance().lexeme.clone())
        } else {
            Err(self.error_here(message))
        }
    }

    fn expect_contextual(&mut self, lexeme: &str) -> Result<(), ParseError> {
        if self.check_ident(lexeme) {
            self.advance();
            Ok(())
        } else {
            Err(self.error_here(format!("expected `{}`", lexeme)))
        }
    }

    fn expect_string(&mut self, message: &str) -> Result<String, ParseError> {
        if self.check(TokenKind::Str) {
            Ok(self.advance().lexeme.clone())
        } else {
            Err(self.error_here(message))
        }
    }

    /// Word-like token usable as a member name or object key.
    fn word_lexeme(token: &Token) -> Option<&str> {
        match token.kind {
            TokenKind::Ident
            | TokenKind::Import
            | TokenKind::Export
            | TokenKind::Const
            | TokenKind::Let
            | TokenKind::Return
            | TokenKind::Await
            | TokenKind::If
            | TokenKind::Else
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Null => Some(&token.lexeme),
            _ => None,
        }
    }

    fn program(&mut self) -> Result<Program, ParseError> {
        let mut items = Vec::new();
        while !self.is_at_end() {
            if self.match_kind(TokenKind::Semicolon) {
                continue;
            }
            let start = self.current_token().start;
            let stmt = self.statement()?;
            while self.match_kind(TokenKind::Semicolon) {}
            let end = self.previous_token().end;
            items.push(Item {
                stmt,
                span: Span::new(start, end),
            });
        }
        Ok(Program { items })
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        match self.current_token().kind {
            TokenKind::Import => {
                self.advance();
                self.import_statement()
            }
            TokenKind::Export => {
                self.advance();
                self.export_statement()
            }
            TokenKind::Const | TokenKind::Let => Ok(Stmt::Declaration(self.declaration()?)),
            TokenKind::Return => {
                self.advance();
                if self.check(TokenKind::Semicolon)
                    || self.check(TokenKind::RBrace)
                    || self.check(TokenKind::Eof)
                {
                    Ok(Stmt::Return(None))
                } else {
                    Ok(Stmt::Return(Some(self.expression()?)))
                }
            }
            TokenKind::If => {
                self.advance();
                Ok(Stmt::If(self.if_statement()?))
            }
            _ => Ok(Stmt::Expr(self.expression()?)),
        }
    }

    fn declaration(&mut self) -> Result<Declaration, ParseError> {
        self.advance(); // const / let
        let name = self.expect_ident("expected binding name")?;
        if self.match_kind(TokenKind::Colon) {
            self.skip_type(false)?;
        }
        self.expect(TokenKind::Assign, "expected `=` in declaration")?;
        let init = self.expression()?;
        Ok(Declaration { name, init })
    }

    fn if_statement(&mut self) -> Result<IfStmt, ParseError> {
        self.expect(TokenKind::LParen, "expected `(` after `if`")?;
        let cond = self.expression()?;
        self.expect(TokenKind::RParen, "expected `)` after condition")?;
        let then_branch = self.block()?;
        let else_branch = if self.match_kind(TokenKind::Else) {
            if self.match_kind(TokenKind::If) {
                Some(vec![Stmt::If(self.if_statement()?)])
            } else {
                Some(self.block()?)
            }
        } else {
            None
        };
        Ok(IfStmt {
            cond,
            then_branch,
            else_branch,
        })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(TokenKind::LBrace, "expected `{`")?;
        let mut statements = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            if self.match_kind(TokenKind::Semicolon) {
                continue;
            }
            statements.push(self.statement()?);
            while self.match_kind(TokenKind::Semicolon) {}
        }
        self.expect(TokenKind::RBrace, "expected `}`")?;
        Ok(statements)
    }

    fn import_statement(&mut self) -> Result<Stmt, ParseError> {
        // import "module"; — side-effect import, no bindings
        if self.check(TokenKind::Str) {
            let module = self.advance().lexeme.clone();
            return Ok(Stmt::Import(ImportDecl {
                default: None,
                namespace: None,
                named: Vec::new(),
                module,
                type_only: false,
            }));
        }

        let mut type_only = false;
        if self.check_ident("type") && self.type_marker_ahead() {
            type_only = true;
            self.advance();
        }

        let mut default = None;
        let mut namespace = None;
        let mut named = Vec::new();

        if self.check(TokenKind::Star) {
            namespace = Some(self.namespace_binding()?);
        } else if self.check(TokenKind::LBrace) {
            named = self.named_import_list()?;
        } else {
            default = Some(self.expect_ident("expected import binding")?);
            if self.match_kind(TokenKind::Comma) {
                if self.check(TokenKind::Star) {
                    namespace = Some(self.namespace_binding()?);
                } else {
                    named = self.named_import_list()?;
                }
            }
        }

        self.expect_contextual("from")?;
        let module = self.expect_string("expected module specifier")?;
        Ok(Stmt::Import(ImportDecl {
            default,
            namespace,
            named,
            module,
            type_only,
        }))
    }

    /// Whether the `type` word at the current position is the clause-level
    /// type-only marker, rather than a binding named `type`.
    fn type_marker_ahead(&self) -> bool {
        let next = self.token_at(self.current + 1);
        match next.kind {
            TokenKind::LBrace | TokenKind::Star => true,
            TokenKind::Ident => {
                // `import type from 'm'` binds a default import named `type`
                !(next.lexeme == "from" && self.token_at(self.current + 2).kind == TokenKind::Str)
            }
            _ => false,
        }
    }

    fn namespace_binding(&mut self) -> Result<String, ParseError> {
        self.expect(TokenKind::Star, "expected `*`")?;
        self.expect_contextual("as")?;
        self.expect_ident("expected namespace alias")
    }

    fn named_import_list(&mut self) -> Result<Vec<ImportSpecifier>, ParseError> {
        self.expect(TokenKind::LBrace, "expected `{` in import")?;
        let mut specifiers = Vec::new();
        while !self.check(TokenKind::RBrace) {
            let mut type_only = false;
            if self.check_ident("type") {
                let next = self.token_at(self.current + 1);
                if next.kind == TokenKind::Ident && next.lexeme != "as" {
                    type_only = true;
                    self.advance();
                }
            }
            let name = self.expect_ident("expected imported name")?;
            let alias = if self.check_ident("as") {
                self.advance();
                Some(self.expect_ident("expected import alias")?)
            } else {
                None
            };
            specifiers.push(ImportSpecifier {
                name,
                alias,
                type_only,
            });
            if !self.match_kind(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "expected `}` in import")?;
        Ok(specifiers)
    }

    fn export_statement(&mut self) -> Result<Stmt, ParseError> {
        if self.check_ident("default") {
            self.advance();
            let start = self.current_token().start;
            let expr = self.expression()?;
            let end = self.previous_token().end;
            return Ok(Stmt::ExportDefault {
                expr,
                expr_span: Span::new(start, end),
            });
        }

        if self.check(TokenKind::LBrace) {
            self.advance();
            let mut specifiers = Vec::new();
            while !self.check(TokenKind::RBrace) {
                let name = self.expect_ident("expected exported name")?;
                let alias = if self.check_ident("as") {
                    self.advance();
                    Some(self.expect_ident("expected export alias")?)
                } else {
                    None
                };
                specifiers.push(ExportSpecifier { name, alias });
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RBrace, "expected `}` in export")?;
            let module = if self.check_ident("from") {
                self.advance();
                Some(self.expect_string("expected module specifier")?)
            } else {
                None
            };
            return Ok(Stmt::ExportNamed(ExportNamedDecl { specifiers, module }));
        }

        if self.check(TokenKind::Const) || self.check(TokenKind::Let) {
            let start = self.current_token().start;
            let decl = self.declaration()?;
            let end = self.previous_token().end;
            return Ok(Stmt::ExportDecl {
                decl,
                decl_span: Span::new(start, end),
            });
        }

        Err(self.error_here("unsupported export statement"))
    }

    /// Consume a type annotation without interpreting it. Tracks bracket
    /// depth; stops (without consuming) at a token that terminates the
    /// annotation in the current context.
    fn skip_type(&mut self, stop_at_arrow: bool) -> Result<(), ParseError> {
        let mut depth = 0i32;
        loop {
            match self.current_token().kind {
                TokenKind::Lt | TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => {
                    depth += 1;
                }
                TokenKind::Gt => {
                    if depth > 0 {
                        depth -= 1;
                    }
                }
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    if depth == 0 {
                        return Ok(());
                    }
                    depth -= 1;
                }
                TokenKind::Assign | TokenKind::Comma | TokenKind::Semicolon => {
                    if depth == 0 {
                        return Ok(());
                    }
                }
                TokenKind::Arrow => {
                    if depth == 0 && stop_at_arrow {
                        return Ok(());
                    }
                }
                TokenKind::Eof => {
                    return Err(self.error_here("unexpected end of input in type annotation"));
                }
                _ => {}
            }
            self.advance();
        }
    }

    // ---- expressions -------------------------------------------------------

    fn expression(&mut self) -> Result<Expr, ParseError> {
        let cond = self.or_expr()?;
        if self.match_kind(TokenKind::Question) {
            let then = self.expression()?;
            self.expect(TokenKind::Colon, "expected `:` in conditional expression")?;
            let otherwise = self.expression()?;
            return Ok(Expr::Conditional {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });
        }
        Ok(cond)
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.and_expr()?;
        while self.match_kind(TokenKind::OrOr) {
            let right = self.and_expr()?;
            left = Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.equality()?;
        while self.match_kind(TokenKind::AndAnd) {
            let right = self.equality()?;
            left = Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.comparison()?;
        loop {
            let op = if self.match_kind(TokenKind::EqEq) {
                BinaryOp::Eq
            } else if self.match_kind(TokenKind::NotEq) {
                BinaryOp::NotEq
            } else {
                return Ok(left);
            };
            let right = self.comparison()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.additive()?;
        loop {
            let op = if self.match_kind(TokenKind::Lt) {
                BinaryOp::Lt
            } else if self.match_kind(TokenKind::Le) {
                BinaryOp::Le
            } else if self.match_kind(TokenKind::Gt) {
                BinaryOp::Gt
            } else if self.match_kind(TokenKind::Ge) {
                BinaryOp::Ge
            } else {
                return Ok(left);
            };
            let right = self.additive()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = if self.match_kind(TokenKind::Plus) {
                BinaryOp::Add
            } else if self.match_kind(TokenKind::Minus) {
                BinaryOp::Sub
            } else {
                return Ok(left);
            };
            let right = self.multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.unary()?;
        loop {
            let op = if self.match_kind(TokenKind::Star) {
                BinaryOp::Mul
            } else if self.match_kind(TokenKind::Slash) {
                BinaryOp::Div
            } else if self.match_kind(TokenKind::Percent) {
                BinaryOp::Mod
            } else {
                return Ok(left);
            };
            let right = self.unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.match_kind(TokenKind::Not) {
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(self.unary()?),
            });
        }
        if self.match_kind(TokenKind::Minus) {
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(self.unary()?),
            });
        }
        if self.match_kind(TokenKind::Await) {
            return Ok(Expr::Await(Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            if self.match_kind(TokenKind::Dot) {
                let token = self.current_token();
                let property = Self::word_lexeme(token)
                    .map(str::to_string)
                    .ok_or_else(|| self.error_here("expected member name after `.`"))?;
                self.advance();
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                };
            } else if self.match_kind(TokenKind::LParen) {
                let mut args = Vec::new();
                while !self.check(TokenKind::RParen) {
                    args.push(self.expression()?);
                    if !self.match_kind(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RParen, "expected `)` after arguments")?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else if self.match_kind(TokenKind::LBracket) {
                let index = self.expression()?;
                self.expect(TokenKind::RBracket, "expected `]` after index")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        match self.current_token().kind {
            TokenKind::Number => {
                let token = self.advance();
                let (lexeme, line, column) = (token.lexeme.clone(), token.line, token.column);
                let value = lexeme.parse::<f64>().map_err(|_| {
                    ParseError::new(format!("invalid number literal `{}`", lexeme), line, column)
                })?;
                Ok(Expr::Number(value))
            }
            TokenKind::Str => Ok(Expr::Str(self.advance().lexeme.clone())),
            TokenKind::True => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Null)
            }
            TokenKind::Ident => self.ident_or_arrow(),
            TokenKind::LParen => {
                if self.arrow_follows(self.current) {
                    self.arrow_function(false)
                } else {
                    self.advance();
                    let expr = self.expression()?;
                    self.expect(TokenKind::RParen, "expected `)`")?;
                    Ok(expr)
                }
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                while !self.check(TokenKind::RBracket) {
                    elements.push(self.expression()?);
                    if !self.match_kind(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket, "expected `]`")?;
                Ok(Expr::Array(elements))
            }
            TokenKind::LBrace => self.object_literal(),
            _ => Err(self.error_here("unexpected token in expression")),
        }
    }

    fn ident_or_arrow(&mut self) -> Result<Expr, ParseError> {
        let next = self.token_at(self.current + 1);

        // async arrow forms
        if self.check_ident("async") {
            if next.kind == TokenKind::LParen && self.arrow_follows(self.current + 1) {
                self.advance();
                return self.arrow_function(true);
            }
            if next.kind == TokenKind::Ident
                && self.token_at(self.current + 2).kind == TokenKind::Arrow
            {
                self.advance();
                return self.single_param_arrow(true);
            }
        }

        // single-parameter arrow: `x => ...`
        if next.kind == TokenKind::Arrow {
            return self.single_param_arrow(false);
        }

        Ok(Expr::Ident(self.advance().lexeme.clone()))
    }

    fn single_param_arrow(&mut self, is_async: bool) -> Result<Expr, ParseError> {
        let param = self.expect_ident("expected parameter name")?;
        self.expect(TokenKind::Arrow, "expected `=>`")?;
        let body = self.arrow_body()?;
        Ok(Expr::Arrow(ArrowFunction {
            params: vec![param],
            body,
            is_async,
        }))
    }

    fn arrow_function(&mut self, is_async: bool) -> Result<Expr, ParseError> {
        self.expect(TokenKind::LParen, "expected `(`")?;
        let mut params = Vec::new();
        while !self.check(TokenKind::RParen) {
            let name = self.expect_ident("expected parameter name")?;
            if self.match_kind(TokenKind::Question) {
                // optional parameter marker
            }
            if self.match_kind(TokenKind::Colon) {
                self.skip_type(false)?;
            }
            params.push(name);
            if !self.match_kind(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "expected `)` after parameters")?;
        if self.match_kind(TokenKind::Colon) {
            self.skip_type(true)?;
        }
        self.expect(TokenKind::Arrow, "expected `=>`")?;
        let body = self.arrow_body()?;
        Ok(Expr::Arrow(ArrowFunction {
            params,
            body,
            is_async,
        }))
    }

    fn arrow_body(&mut self) -> Result<ArrowBody, ParseError> {
        if self.check(TokenKind::LBrace) {
            Ok(ArrowBody::Block(self.block()?))
        } else {
            Ok(ArrowBody::Expr(Box::new(self.expression()?)))
        }
    }

    fn object_literal(&mut self) -> Result<Expr, ParseError> {
        self.expect(TokenKind::LBrace, "expected `{`")?;
        let mut entries = Vec::new();
        while !self.check(TokenKind::RBrace) {
            let token = self.current_token();
            let key = if token.kind == TokenKind::Str {
                PropKey::Str(self.advance().lexeme.clone())
            } else if token.kind == TokenKind::Number {
                PropKey::Str(self.advance().lexeme.clone())
            } else if let Some(word) = Self::word_lexeme(token) {
                let word = word.to_string();
                self.advance();
                PropKey::Ident(word)
            } else {
                return Err(self.error_here("expected object key"));
            };

            let value = if self.match_kind(TokenKind::Colon) {
                self.expression()?
            } else {
                // shorthand property
                Expr::Ident(key.as_str().to_string())
            };
            entries.push((key, value));
            if !self.match_kind(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "expected `}` in object literal")?;
        Ok(Expr::Object(entries))
    }

    /// Decide whether the parenthesis at `open_idx` opens an arrow-function
    /// parameter list. The token after the matching `)` is either `=>` or a
    /// return-type annotation followed by `=>`.
    fn arrow_follows(&self, open_idx: usize) -> bool {
        let mut depth = 0usize;
        let mut i = open_idx;
        while i < self.tokens.len() {
            match self.tokens[i].kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return self.arrow_after(i + 1);
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
            i += 1;
        }
        false
    }

    fn arrow_after(&self, idx: usize) -> bool {
        match self.token_at(idx).kind {
            TokenKind::Arrow => true,
            TokenKind::Colon => {
                // scan the candidate return annotation for `=>` at depth 0
                let mut depth = 0i32;
                let mut j = idx + 1;
                while j < self.tokens.len() {
                    match self.tokens[j].kind {
                        TokenKind::Lt
                        | TokenKind::LParen
                        | TokenKind::LBracket
                        | TokenKind::LBrace => depth += 1,
                        TokenKind::Gt => {
                            if depth > 0 {
                                depth -= 1;
                            }
                        }
                        TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                            if depth == 0 {
                                return false;
                            }
                            depth -= 1;
                        }
                        TokenKind::Arrow => {
                            if depth == 0 {
                                return true;
                            }
                        }
                        TokenKind::Comma | TokenKind::Semicolon => {
                            if depth == 0 {
                                return false;
                            }
                        }
                        TokenKind::Eof => return false,
                        _ => {}
                    }
                    j += 1;
                }
                false
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_stmt(source: &str) -> Stmt {
        parse_program(source).unwrap().items.remove(0).stmt
    }

    #[test]
    fn test_named_import() {
        let stmt = first_stmt("import { ICommandPalette as p, type Foo } from '@host/apputils';");
        let Stmt::Import(decl) = stmt else {
            panic!("expected import");
        };
        assert_eq!(decl.module, "@host/apputils");
        assert_eq!(decl.named.len(), 2);
        assert_eq!(decl.named[0].name, "ICommandPalette");
        assert_eq!(decl.named[0].alias.as_deref(), Some("p"));
        assert!(decl.named[1].type_only);
    }

    #[test]
    fn test_default_and_namespace_imports() {
        let Stmt::Import(default) = first_stmt("import widgets from 'widgets-lib';") else {
            panic!("expected import");
        };
        assert_eq!(default.default.as_deref(), Some("widgets"));

        let Stmt::Import(ns) = first_stmt("import * as lib from 'lib';") else {
            panic!("expected import");
        };
        assert_eq!(ns.namespace.as_deref(), Some("lib"));
    }

    #[test]
    fn test_type_only_clause() {
        let Stmt::Import(decl) = first_stmt("import type { Foo } from 'pkg';") else {
            panic!("expected import");
        };
        assert!(decl.type_only);
    }

    #[test]
    fn test_side_effect_import() {
        let Stmt::Import(decl) = first_stmt("import 'polyfill';") else {
            panic!("expected import");
        };
        assert!(decl.is_side_effect_only());
    }

    #[test]
    fn test_export_default_span_covers_expression() {
        let source = "export default { id: 'x' };";
        let Stmt::ExportDefault { expr_span, .. } = first_stmt(source) else {
            panic!("expected default export");
        };
        assert_eq!(&source[expr_span.start..expr_span.end], "{ id: 'x' }");
    }

    #[test]
    fn test_export_declaration() {
        let source = "export const answer = 42;";
        let Stmt::ExportDecl { decl, decl_span } = first_stmt(source) else {
            panic!("expected export declaration");
        };
        assert_eq!(decl.name, "answer");
        assert_eq!(&source[decl_span.start..decl_span.end], "const answer = 42");
    }

    #[test]
    fn test_export_named_list() {
        let Stmt::ExportNamed(decl) = first_stmt("export { a, b as c };") else {
            panic!("expected named export");
        };
        assert_eq!(decl.specifiers.len(), 2);
        assert_eq!(decl.specifiers[1].alias.as_deref(), Some("c"));
        assert!(decl.module.is_none());
    }

    #[test]
    fn test_object_and_arrow() {
        let stmt = first_stmt("const plugin = { id: 'p', activate: (app) => app };");
        let Stmt::Declaration(decl) = stmt else {
            panic!("expected declaration");
        };
        let Expr::Object(entries) = decl.init else {
            panic!("expected object literal");
        };
        assert_eq!(entries[0].0.as_str(), "id");
        assert!(matches!(entries[1].1, Expr::Arrow(_)));
    }

    #[test]
    fn test_typed_arrow_params_are_accepted() {
        let stmt = first_stmt("const f = (app: HostApp, registry: IRegistry<void>) => app;");
        let Stmt::Declaration(decl) = stmt else {
            panic!("expected declaration");
        };
        let Expr::Arrow(arrow) = decl.init else {
            panic!("expected arrow");
        };
        assert_eq!(arrow.params, vec!["app".to_string(), "registry".to_string()]);
    }

    #[test]
    fn test_typed_declaration() {
        let stmt = first_stmt("const plugin: HostPlugin<void> = { id: 'x' };");
        assert!(matches!(stmt, Stmt::Declaration(_)));
    }

    #[test]
    fn test_ternary_with_parenthesized_branch_is_not_an_arrow() {
        let expr = parse_expression_source("a ? (b) : c").unwrap();
        assert!(matches!(expr, Expr::Conditional { .. }));
    }

    #[test]
    fn test_await_and_calls() {
        let stmt = first_stmt("const x = await fetchModule('pkg');");
        let Stmt::Declaration(decl) = stmt else {
            panic!("expected declaration");
        };
        assert!(matches!(decl.init, Expr::Await(_)));
    }

    #[test]
    fn test_legacy_expression_source() {
        let expr = parse_expression_source("({ id: 'x', autoStart: true })").unwrap();
        assert!(matches!(expr, Expr::Object(_)));
    }

    #[test]
    fn test_if_else_chain() {
        let stmt = first_stmt("if (a) { b } else if (c) { d } else { e }");
        let Stmt::If(if_stmt) = stmt else {
            panic!("expected if");
        };
        assert!(if_stmt.else_branch.is_some());
    }

    #[test]
    fn test_parse_error_carries_position() {
        let err = parse_program("const = 1;").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("binding name"));
    }
}
