//! Recursive-descent parser for Glimpse script.

use std::sync::Arc;

use crate::ast::{AssignTarget, BinOp, Body, Expr, FunctionDecl, Stmt, UnOp};
use crate::error::Error;
use crate::lexer::{tokenize, Token, TokenKind};

/// Deepest nesting of expressions and blocks the parser accepts.
pub const MAX_NESTING: usize = 128;

/// Parse a snippet into its statements.
pub fn parse(source: &str) -> Result<Vec<Stmt>, Error> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    parser.statements(false)
}

struct Parser {
    /// Always ends with `Eof`.
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Number(n) => format!("number {}", n),
        TokenKind::Str(_) => "string literal".to_string(),
        TokenKind::Ident(name) => format!("identifier '{}'", name),
        TokenKind::Eof => "end of input".to_string(),
        other => format!("{:?}", other),
    }
}

impl Parser {
    fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn line(&self) -> usize {
        self.peek().line
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<(), Error> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, Error> {
        match self.peek_kind().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn unexpected(&self, expected: &str) -> Error {
        Error::syntax(
            self.line(),
            format!("expected {}, found {}", expected, describe(self.peek_kind())),
        )
    }

    fn previous_was(&self, kind: &TokenKind) -> bool {
        self.pos > 0 && &self.tokens[self.pos - 1].kind == kind
    }

    /// Run `f` one nesting level deeper.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, Error>) -> Result<T, Error> {
        if self.depth >= MAX_NESTING {
            return Err(Error::syntax(
                self.line(),
                format!("nesting deeper than {} levels", MAX_NESTING),
            ));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    // ── Statements ───────────────────────────────────────────────────────────

    fn statements(&mut self, in_block: bool) -> Result<Vec<Stmt>, Error> {
        let mut stmts = Vec::new();
        loop {
            while self.eat(&TokenKind::Semi) {}
            match self.peek_kind() {
                TokenKind::Eof if in_block => return Err(self.unexpected("'}'")),
                TokenKind::Eof => break,
                TokenKind::RBrace if in_block => break,
                _ => {}
            }

            stmts.push(self.statement()?);

            // Statements ending in a block need no separator.
            let ends_with_block = self.previous_was(&TokenKind::RBrace);
            if self.eat(&TokenKind::Semi) || ends_with_block {
                continue;
            }
            match self.peek_kind() {
                TokenKind::Eof => {}
                TokenKind::RBrace if in_block => {}
                _ => return Err(self.unexpected("';'")),
            }
        }
        Ok(stmts)
    }

    fn statement(&mut self) -> Result<Stmt, Error> {
        match self.peek_kind() {
            TokenKind::Use => {
                let line = self.line();
                self.advance();
                let path = self.path("namespace")?;
                Ok(Stmt::Use { path, line })
            }
            TokenKind::Let => {
                let line = self.line();
                self.advance();
                let name = self.expect_ident("binding name")?;
                self.expect(&TokenKind::Assign, "'='")?;
                let value = self.expr()?;
                Ok(Stmt::Let { name, value, line })
            }
            TokenKind::Fn => self.function(),
            _ => {
                let line = self.line();
                let expr = self.expr()?;
                if !self.eat(&TokenKind::Assign) {
                    return Ok(Stmt::Expr(expr));
                }
                let target = match expr {
                    Expr::Ident(name) => AssignTarget::Name(name),
                    Expr::Field { object, name: property } => match *object {
                        Expr::Ident(name) => AssignTarget::Property { name, property },
                        _ => return Err(Error::syntax(line, "invalid assignment target")),
                    },
                    _ => return Err(Error::syntax(line, "invalid assignment target")),
                };
                let value = self.expr()?;
                Ok(Stmt::Assign { target, value })
            }
        }
    }

    fn function(&mut self) -> Result<Stmt, Error> {
        self.advance();
        let name = self.expect_ident("function name")?;
        self.expect(&TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                params.push(self.expect_ident("parameter name")?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;

        let body = if self.eat(&TokenKind::Assign) {
            Body::Expr(self.expr()?)
        } else if self.check(&TokenKind::LBrace) {
            Body::Block(self.block()?)
        } else {
            return Err(self.unexpected("'=' or '{'"));
        };

        Ok(Stmt::Fn(Arc::new(FunctionDecl { name, params, body })))
    }

    fn block(&mut self) -> Result<Vec<Stmt>, Error> {
        self.expect(&TokenKind::LBrace, "'{'")?;
        let stmts = self.nested(|p| p.statements(true))?;
        self.expect(&TokenKind::RBrace, "'}'")?;
        Ok(stmts)
    }

    fn path(&mut self, what: &str) -> Result<Vec<String>, Error> {
        let mut path = vec![self.expect_ident(what)?];
        while self.eat(&TokenKind::Dot) {
            path.push(self.expect_ident(what)?);
        }
        Ok(path)
    }

    // ── Expressions ──────────────────────────────────────────────────────────

    fn expr(&mut self) -> Result<Expr, Error> {
        self.or()
    }

    fn binary_level(
        &mut self,
        next: fn(&mut Self) -> Result<Expr, Error>,
        ops: &[(TokenKind, BinOp)],
    ) -> Result<Expr, Error> {
        let mut left = next(self)?;
        'outer: loop {
            for (kind, op) in ops {
                if self.eat(kind) {
                    let right = next(self)?;
                    left = Expr::Binary {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn or(&mut self) -> Result<Expr, Error> {
        self.binary_level(Self::and, &[(TokenKind::OrOr, BinOp::Or)])
    }

    fn and(&mut self) -> Result<Expr, Error> {
        self.binary_level(Self::equality, &[(TokenKind::AndAnd, BinOp::And)])
    }

    fn equality(&mut self) -> Result<Expr, Error> {
        self.binary_level(
            Self::comparison,
            &[(TokenKind::EqEq, BinOp::Eq), (TokenKind::NotEq, BinOp::NotEq)],
        )
    }

    fn comparison(&mut self) -> Result<Expr, Error> {
        self.binary_level(
            Self::additive,
            &[
                (TokenKind::Le, BinOp::Le),
                (TokenKind::Ge, BinOp::Ge),
                (TokenKind::Lt, BinOp::Lt),
                (TokenKind::Gt, BinOp::Gt),
            ],
        )
    }

    fn additive(&mut self) -> Result<Expr, Error> {
        self.binary_level(
            Self::multiplicative,
            &[(TokenKind::Plus, BinOp::Add), (TokenKind::Minus, BinOp::Sub)],
        )
    }

    fn multiplicative(&mut self) -> Result<Expr, Error> {
        self.binary_level(
            Self::unary,
            &[
                (TokenKind::Star, BinOp::Mul),
                (TokenKind::Slash, BinOp::Div),
                (TokenKind::Percent, BinOp::Rem),
            ],
        )
    }

    fn unary(&mut self) -> Result<Expr, Error> {
        let op = if self.eat(&TokenKind::Minus) {
            UnOp::Neg
        } else if self.eat(&TokenKind::Bang) {
            UnOp::Not
        } else {
            return self.nested(Self::postfix);
        };
        let operand = self.nested(Self::unary)?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn postfix(&mut self) -> Result<Expr, Error> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&TokenKind::LParen) {
                let args = self.arguments()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else if self.eat(&TokenKind::Dot) {
                let name = self.expect_ident("member name")?;
                expr = Expr::Field {
                    object: Box::new(expr),
                    name,
                };
            } else if self.eat(&TokenKind::LBracket) {
                let index = self.expr()?;
                self.expect(&TokenKind::RBracket, "']'")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// Comma-separated expressions up to the closing ')'. The '(' has
    /// already been consumed.
    fn arguments(&mut self) -> Result<Vec<Expr>, Error> {
        self.list_until(&TokenKind::RParen, "')'")
    }

    fn list_until(&mut self, close: &TokenKind, what: &str) -> Result<Vec<Expr>, Error> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Ok(items);
        }
        loop {
            items.push(self.expr()?);
            if self.eat(close) {
                return Ok(items);
            }
            if !self.eat(&TokenKind::Comma) {
                return Err(self.unexpected(&format!("',' or {}", what)));
            }
            // Trailing comma
            if self.eat(close) {
                return Ok(items);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, Error> {
        let token = self.advance();
        match token.kind {
            TokenKind::Number(n) => Ok(Expr::Number(n)),
            TokenKind::Str(s) => Ok(Expr::Str(s)),
            TokenKind::True => Ok(Expr::Bool(true)),
            TokenKind::False => Ok(Expr::Bool(false)),
            TokenKind::Null => Ok(Expr::Null),
            TokenKind::Ident(name) => Ok(Expr::Ident(name)),
            TokenKind::LParen => {
                let inner = self.expr()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::LBracket => Ok(Expr::List(self.list_until(&TokenKind::RBracket, "']'")?)),
            TokenKind::New => {
                let path = self.path("type name")?;
                self.expect(&TokenKind::LParen, "'('")?;
                let args = self.arguments()?;
                Ok(Expr::New { path, args })
            }
            TokenKind::If => self.nested(Self::if_expr),
            other => Err(Error::syntax(
                token.line,
                format!("expected expression, found {}", describe(&other)),
            )),
        }
    }

    /// The `if` keyword has already been consumed.
    fn if_expr(&mut self) -> Result<Expr, Error> {
        let condition = self.expr()?;
        let then_block = self.block()?;
        let else_block = if self.eat(&TokenKind::Else) {
            if self.eat(&TokenKind::If) {
                Some(vec![Stmt::Expr(self.nested(Self::if_expr)?)])
            } else {
                Some(self.block()?)
            }
        } else {
            None
        };
        Ok(Expr::If {
            condition: Box::new(condition),
            then_block,
            else_block,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        let stmts = parse("1 + 2 * 3").unwrap();
        let Stmt::Expr(Expr::Binary { op: BinOp::Add, right, .. }) = &stmts[0] else {
            panic!("Expected addition, got {:?}", stmts);
        };
        assert!(matches!(**right, Expr::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn test_declarations() {
        let stmts = parse("use core.text; let x = 1; fn twice(n) = n * 2; x").unwrap();
        assert_eq!(stmts.len(), 4);
        assert_eq!(
            stmts[0],
            Stmt::Use {
                path: vec!["core".to_string(), "text".to_string()],
                line: 1
            }
        );
        assert!(matches!(&stmts[2], Stmt::Fn(decl) if decl.params == vec!["n".to_string()]));
        assert_eq!(stmts[3], Stmt::Expr(Expr::Ident("x".to_string())));
    }

    #[test]
    fn test_block_function_needs_no_semicolon() {
        let stmts = parse("fn f(a, b) { let c = a + b; c } f(1, 2)").unwrap();
        assert_eq!(stmts.len(), 2);
        let Stmt::Fn(decl) = &stmts[0] else {
            panic!("Expected fn");
        };
        assert!(matches!(&decl.body, Body::Block(body) if body.len() == 2));
    }

    #[test]
    fn test_new_with_qualified_path() {
        let stmts = parse("new ui.Label()").unwrap();
        assert_eq!(
            stmts[0],
            Stmt::Expr(Expr::New {
                path: vec!["ui".to_string(), "Label".to_string()],
                args: vec![],
            })
        );
    }

    #[test]
    fn test_property_assignment() {
        let stmts = parse("label.Text = \"hi\"").unwrap();
        assert_eq!(
            stmts[0],
            Stmt::Assign {
                target: AssignTarget::Property {
                    name: "label".to_string(),
                    property: "Text".to_string(),
                },
                value: Expr::Str("hi".to_string()),
            }
        );
    }

    #[test]
    fn test_else_if_chain() {
        let stmts = parse("if a { 1 } else if b { 2 } else { 3 }").unwrap();
        let Stmt::Expr(Expr::If { else_block: Some(else_block), .. }) = &stmts[0] else {
            panic!("Expected if");
        };
        assert!(matches!(&else_block[0], Stmt::Expr(Expr::If { .. })));
    }

    #[test]
    fn test_missing_separator() {
        let err = parse("let x = 1 let y = 2").unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 1, .. }), "{:?}", err);
    }

    #[test]
    fn test_unclosed_block() {
        let err = parse("fn f() {\n 1").unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 2, .. }), "{:?}", err);
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert!(parse(&nested(MAX_NESTING / 2)).is_ok());

        let err = parse(&nested(100_000)).unwrap_err();
        assert!(matches!(&err, Error::Syntax { message, .. } if message.contains("nesting")), "{:?}", err);

        let blocks = format!("{}1{}", "if true { ".repeat(100_000), " }".repeat(100_000));
        assert!(matches!(parse(&blocks), Err(Error::Syntax { .. })));

        let negations = format!("{}1", "-".repeat(100_000));
        assert!(matches!(parse(&negations), Err(Error::Syntax { .. })));
    }

    #[test]
    fn test_invalid_assignment_target() {
        assert!(parse("f() = 3").is_err());
    }
}
