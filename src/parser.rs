use std::rc::Rc;

use crate::{
    ast::{
        BinaryOp, Expr, ExprKind, FunctionDecl, Literal, Param, Program, Stmt, StmtKind, TypeTag,
        UnaryOp,
    },
    diagnostics::{Diagnostic, DiagnosticKind, SourcePos},
    lexer::{Keyword, Lexer, Token, TokenKind, TokenValue},
    stack::ensure_sufficient_stack,
};

pub fn parse_program(source: &str) -> Result<Program, Diagnostic> {
    let tokens = Lexer::new(source).tokenize()?;
    parse(tokens)
}

pub fn parse(tokens: Vec<Token>) -> Result<Program, Diagnostic> {
    Parser::new(tokens).parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    current: usize,
    loop_depth: usize,
    function_depth: usize,
}

impl Parser {
    fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|tok| tok.kind) != Some(TokenKind::Eof) {
            let pos = tokens.last().map(|tok| tok.pos).unwrap_or(SourcePos::new(1, 1));
            tokens.push(Token {
                kind: TokenKind::Eof,
                lexeme: String::new(),
                value: TokenValue::None,
                pos,
            });
        }
        Self {
            tokens,
            current: 0,
            loop_depth: 0,
            function_depth: 0,
        }
    }

    fn parse_program(&mut self) -> Result<Program, Diagnostic> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::Eof) {
            statements.push(self.parse_statement()?);
        }
        Ok(Program { statements })
    }

    fn parse_statement(&mut self) -> Result<Stmt, Diagnostic> {
        ensure_sufficient_stack(|| self.parse_statement_inner())
    }

    fn parse_statement_inner(&mut self) -> Result<Stmt, Diagnostic> {
        match self.peek().kind {
            TokenKind::Keyword(Keyword::Let) => {
                let stmt = self.parse_let()?;
                self.consume_optional_semicolon();
                Ok(stmt)
            }
            TokenKind::Keyword(Keyword::Fn) => self.parse_function(),
            TokenKind::Keyword(Keyword::Return) => self.parse_return(),
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::For) => self.parse_for(),
            TokenKind::Keyword(Keyword::While) => self.parse_while(),
            TokenKind::Keyword(Keyword::Break) => self.parse_loop_control(StmtKind::Break, "break"),
            TokenKind::Keyword(Keyword::Continue) => {
                self.parse_loop_control(StmtKind::Continue, "continue")
            }
            TokenKind::Keyword(Keyword::Import) => self.parse_import(),
            TokenKind::LBrace => {
                let pos = self.peek().pos;
                let statements = self.parse_block()?;
                Ok(Stmt {
                    kind: StmtKind::Block(statements),
                    pos,
                })
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_let(&mut self) -> Result<Stmt, Diagnostic> {
        let pos = self.consume_keyword(Keyword::Let)?.pos;
        let name = self.consume_identifier("expected variable name after `let`")?;
        let annotation = if self.matches(TokenKind::Colon) {
            Some(self.parse_type_tag()?)
        } else {
            None
        };
        self.consume(TokenKind::Assign, "expected `=` in let binding")?;
        let value = self.parse_expression()?;
        Ok(Stmt {
            kind: StmtKind::Let {
                name: name.lexeme,
                annotation,
                value,
            },
            pos,
        })
    }

    fn parse_type_tag(&mut self) -> Result<TypeTag, Diagnostic> {
        let token = self.consume_identifier("expected type annotation")?;
        TypeTag::from_name(&token.lexeme).ok_or_else(|| {
            Diagnostic::new(
                DiagnosticKind::Parser,
                format!(
                    "unknown type `{}`; expected int, string, float, or bool",
                    token.lexeme
                ),
            )
            .with_pos(token.pos)
        })
    }

    fn parse_function(&mut self) -> Result<Stmt, Diagnostic> {
        let pos = self.consume_keyword(Keyword::Fn)?.pos;
        let name = self.consume_identifier("expected function name")?;
        self.consume(TokenKind::LParen, "expected `(` after function name")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let param = self.consume_identifier("expected parameter name")?;
                let annotation = if self.matches(TokenKind::Colon) {
                    Some(self.parse_type_tag()?)
                } else {
                    None
                };
                params.push(Param {
                    name: param.lexeme,
                    annotation,
                });
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "expected `)` after parameters")?;
        let return_type = if self.matches(TokenKind::Arrow) {
            Some(self.parse_type_tag()?)
        } else {
            None
        };

        let enclosing_loops = std::mem::replace(&mut self.loop_depth, 0);
        self.function_depth += 1;
        let body = self.parse_block();
        self.function_depth -= 1;
        self.loop_depth = enclosing_loops;

        Ok(Stmt {
            kind: StmtKind::Function(Rc::new(FunctionDecl {
                name: name.lexeme,
                params,
                return_type,
                body: body?,
            })),
            pos,
        })
    }

    fn parse_return(&mut self) -> Result<Stmt, Diagnostic> {
        let token = self.consume_keyword(Keyword::Return)?;
        if self.function_depth == 0 {
            return Err(self.error(&token, "`return` outside of a function"));
        }
        let value = if self.check(TokenKind::Semicolon)
            || self.check(TokenKind::RBrace)
            || self.check(TokenKind::Eof)
        {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume_optional_semicolon();
        Ok(Stmt {
            kind: StmtKind::Return(value),
            pos: token.pos,
        })
    }

    fn parse_loop_control(&mut self, kind: StmtKind, word: &str) -> Result<Stmt, Diagnostic> {
        let token = self.advance();
        if self.loop_depth == 0 {
            return Err(self.error(&token, &format!("`{word}` outside of a loop")));
        }
        self.consume_optional_semicolon();
        Ok(Stmt {
            kind,
            pos: token.pos,
        })
    }

    fn parse_import(&mut self) -> Result<Stmt, Diagnostic> {
        let pos = self.consume_keyword(Keyword::Import)?.pos;
        let name = self.consume_identifier("expected module name after `import`")?;
        self.consume_optional_semicolon();
        Ok(Stmt {
            kind: StmtKind::Import(name.lexeme),
            pos,
        })
    }

    fn parse_if(&mut self) -> Result<Stmt, Diagnostic> {
        let pos = self.consume_keyword(Keyword::If)?.pos;
        self.consume(TokenKind::LParen, "expected `(` after `if`")?;
        let condition = self.parse_expression()?;
        self.consume(TokenKind::RParen, "expected `)` after if condition")?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.matches_keyword(Keyword::Else) {
            if self.check(TokenKind::Keyword(Keyword::If)) {
                Some(vec![self.parse_if()?])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(Stmt {
            kind: StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
            pos,
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, Diagnostic> {
        let pos = self.consume_keyword(Keyword::For)?.pos;
        self.consume(TokenKind::LParen, "expected `(` after `for`")?;
        let init = if self.check(TokenKind::Keyword(Keyword::Let)) {
            Some(Box::new(self.parse_let()?))
        } else if self.check(TokenKind::Semicolon) {
            None
        } else {
            let expr = self.parse_expression()?;
            Some(Box::new(Stmt {
                pos: expr.pos,
                kind: StmtKind::Expr(expr),
            }))
        };
        self.consume(TokenKind::Semicolon, "expected `;` after for-loop initializer")?;
        let condition = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(TokenKind::Semicolon, "expected `;` after for-loop condition")?;
        let update = if self.check(TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(TokenKind::RParen, "expected `)` after for-loop clauses")?;
        let body = self.parse_loop_body()?;
        Ok(Stmt {
            kind: StmtKind::For {
                init,
                condition,
                update,
                body,
            },
            pos,
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, Diagnostic> {
        let pos = self.consume_keyword(Keyword::While)?.pos;
        self.consume(TokenKind::LParen, "expected `(` after `while`")?;
        let condition = self.parse_expression()?;
        self.consume(TokenKind::RParen, "expected `)` after while condition")?;
        let body = self.parse_loop_body()?;
        Ok(Stmt {
            kind: StmtKind::While { condition, body },
            pos,
        })
    }

    fn parse_loop_body(&mut self) -> Result<Vec<Stmt>, Diagnostic> {
        self.loop_depth += 1;
        let body = self.parse_block();
        self.loop_depth -= 1;
        body
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, Diagnostic> {
        self.consume(TokenKind::LBrace, "expected `{` to start block")?;
        let mut statements = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            statements.push(self.parse_statement()?);
        }
        self.consume(TokenKind::RBrace, "expected `}` to close block")?;
        Ok(statements)
    }

    fn parse_expression_statement(&mut self) -> Result<Stmt, Diagnostic> {
        let expr = self.parse_expression()?;
        self.consume_optional_semicolon();
        Ok(Stmt {
            pos: expr.pos,
            kind: StmtKind::Expr(expr),
        })
    }

    fn parse_expression(&mut self) -> Result<Expr, Diagnostic> {
        ensure_sufficient_stack(|| self.parse_assignment())
    }

    fn parse_assignment(&mut self) -> Result<Expr, Diagnostic> {
        let expr = self.parse_or()?;
        if !self.check(TokenKind::Assign) {
            return Ok(expr);
        }
        let equals = self.advance();
        let name = match expr.kind {
            ExprKind::Identifier(name) => name,
            _ => return Err(self.error(&equals, "invalid assignment target")),
        };
        let value = self.parse_assignment()?;
        Ok(Expr {
            kind: ExprKind::Assign {
                name,
                value: Box::new(value),
            },
            pos: expr.pos,
        })
    }

    fn parse_or(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_and()?;
        while self.matches(TokenKind::DoublePipe) {
            let pos = self.previous().pos;
            let right = self.parse_and()?;
            expr = binary(BinaryOp::Or, expr, right, pos);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_equality()?;
        while self.matches(TokenKind::DoubleAmpersand) {
            let pos = self.previous().pos;
            let right = self.parse_equality()?;
            expr = binary(BinaryOp::And, expr, right, pos);
        }
        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_comparison()?;
        while let Some(op) = self.match_operator(&[
            (TokenKind::EqualEqual, BinaryOp::Equal),
            (TokenKind::BangEqual, BinaryOp::NotEqual),
        ]) {
            let pos = self.previous().pos;
            let right = self.parse_comparison()?;
            expr = binary(op, expr, right, pos);
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_term()?;
        while let Some(op) = self.match_operator(&[
            (TokenKind::Less, BinaryOp::Less),
            (TokenKind::LessEqual, BinaryOp::LessEqual),
            (TokenKind::Greater, BinaryOp::Greater),
            (TokenKind::GreaterEqual, BinaryOp::GreaterEqual),
        ]) {
            let pos = self.previous().pos;
            let right = self.parse_term()?;
            expr = binary(op, expr, right, pos);
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_factor()?;
        while let Some(op) = self.match_operator(&[
            (TokenKind::Plus, BinaryOp::Add),
            (TokenKind::Minus, BinaryOp::Sub),
        ]) {
            let pos = self.previous().pos;
            let right = self.parse_factor()?;
            expr = binary(op, expr, right, pos);
        }
        Ok(expr)
    }

    fn parse_factor(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_unary()?;
        while let Some(op) = self.match_operator(&[
            (TokenKind::Star, BinaryOp::Mul),
            (TokenKind::Slash, BinaryOp::Div),
            (TokenKind::Percent, BinaryOp::Mod),
        ]) {
            let pos = self.previous().pos;
            let right = self.parse_unary()?;
            expr = binary(op, expr, right, pos);
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, Diagnostic> {
        let op = if self.matches(TokenKind::Minus) {
            UnaryOp::Negate
        } else if self.matches(TokenKind::Bang) {
            UnaryOp::Not
        } else {
            return self.parse_postfix();
        };
        let pos = self.previous().pos;
        let operand = ensure_sufficient_stack(|| self.parse_unary())?;
        Ok(Expr {
            kind: ExprKind::Unary {
                op,
                expr: Box::new(operand),
            },
            pos,
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.matches(TokenKind::LParen) {
                let mut args = Vec::new();
                if !self.check(TokenKind::RParen) {
                    loop {
                        args.push(self.parse_expression()?);
                        if !self.matches(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.consume(TokenKind::RParen, "expected `)` after arguments")?;
                let pos = expr.pos;
                expr = Expr {
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    pos,
                };
            } else if self.matches(TokenKind::Dot) {
                let member = self.consume_identifier("expected member name after `.`")?;
                let pos = expr.pos;
                expr = Expr {
                    kind: ExprKind::Member {
                        object: Box::new(expr),
                        member: member.lexeme,
                    },
                    pos,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        let token = self.peek().clone();
        let kind = match token.kind {
            TokenKind::Number => match token.value {
                TokenValue::Int(n) => ExprKind::Literal(Literal::Int(n)),
                TokenValue::Float(n) => ExprKind::Literal(Literal::Float(n)),
                _ => return Err(self.error(&token, "malformed number literal")),
            },
            TokenKind::String => match token.value {
                TokenValue::Str(ref text) => ExprKind::Literal(Literal::String(text.clone())),
                _ => return Err(self.error(&token, "malformed string literal")),
            },
            TokenKind::Keyword(Keyword::True) => ExprKind::Literal(Literal::Bool(true)),
            TokenKind::Keyword(Keyword::False) => ExprKind::Literal(Literal::Bool(false)),
            TokenKind::Keyword(Keyword::Null) => ExprKind::Literal(Literal::Null),
            TokenKind::Identifier => ExprKind::Identifier(token.lexeme.clone()),
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.consume(TokenKind::RParen, "expected `)` after expression")?;
                return Ok(inner);
            }
            _ => return Err(self.error(&token, "expected expression")),
        };
        self.advance();
        Ok(Expr {
            kind,
            pos: token.pos,
        })
    }

    fn match_operator(&mut self, table: &[(TokenKind, BinaryOp)]) -> Option<BinaryOp> {
        let current = self.peek().kind;
        let op = table
            .iter()
            .find(|(kind, _)| *kind == current)
            .map(|(_, op)| *op)?;
        self.advance();
        Some(op)
    }

    fn consume_optional_semicolon(&mut self) {
        let _ = self.matches(TokenKind::Semicolon);
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn matches_keyword(&mut self, keyword: Keyword) -> bool {
        self.matches(TokenKind::Keyword(keyword))
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, Diagnostic> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(self.peek(), message))
        }
    }

    fn consume_keyword(&mut self, keyword: Keyword) -> Result<Token, Diagnostic> {
        let message = format!("expected keyword `{}`", format!("{keyword:?}").to_lowercase());
        self.consume(TokenKind::Keyword(keyword), &message)
    }

    fn consume_identifier(&mut self, message: &str) -> Result<Token, Diagnostic> {
        self.consume(TokenKind::Identifier, message)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous().clone()
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn error(&self, token: &Token, message: &str) -> Diagnostic {
        let found = if token.kind == TokenKind::Eof {
            "end of input".to_string()
        } else {
            format!("`{}`", token.lexeme)
        };
        Diagnostic::new(DiagnosticKind::Parser, format!("{message}, found {found}"))
            .with_pos(token.pos)
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr, pos: SourcePos) -> Expr {
    Expr {
        kind: ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        pos,
    }
}
