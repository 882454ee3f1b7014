use std::sync::Arc;

use crate::{
    ast::{DeclKind, Expr, Stmt, StmtKind, SwitchCase, Target},
    op::BinOp,
    token::Token,
};

use super::{Parser, Result};

impl<'a> Parser<'a> {
    pub(super) fn parse_statement(&mut self) -> Result<Stmt> {
        let line = self.line();
        let Some(tok) = self.peek() else {
            return Err(self.err("Expected a statement but reached end of input"));
        };
        let kind = match tok {
            Token::Local => self.parse_declaration(DeclKind::Local)?,
            Token::Private => self.parse_declaration(DeclKind::Private)?,
            Token::Global => self.parse_declaration(DeclKind::Global)?,
            Token::Function | Token::Sub if matches!(self.peek_at(1), Some(Token::Id(_))) => {
                let returns_value = *tok == Token::Function;
                self.pos += 1;
                let name = self.expect_ident("function name")?;
                let decl = self.parse_function_rest(name, returns_value, line)?;
                StmtKind::Function(Arc::new(decl))
            }
            Token::If => self.parse_if()?,
            Token::While => {
                self.pos += 1;
                let condition = self.parse_expr()?;
                self.expect(Token::Do)?;
                let body = self.parse_block()?;
                self.expect(Token::End)?;
                StmtKind::While { condition, body }
            }
            Token::For => self.parse_for()?,
            Token::Switch => self.parse_switch()?,
            Token::Do => {
                self.pos += 1;
                let body = self.parse_block()?;
                self.expect(Token::End)?;
                StmtKind::Block(body)
            }
            Token::Break => {
                self.pos += 1;
                StmtKind::Break
            }
            Token::Continue => {
                self.pos += 1;
                StmtKind::Continue
            }
            Token::Return => {
                self.pos += 1;
                let value = if self.at_statement_end() {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                StmtKind::Return(value)
            }
            Token::Throw => {
                self.pos += 1;
                StmtKind::Throw(self.parse_expr()?)
            }
            Token::Try => self.parse_try()?,
            Token::Assert => {
                self.pos += 1;
                let condition = self.parse_expr()?;
                let message = if self.eat(&Token::Comma) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                StmtKind::Assert { condition, message }
            }
            _ => self.parse_assign_or_call()?,
        };
        Ok(Stmt::new(kind, line))
    }

    /// `return` takes no value when the next token closes the block.
    fn at_statement_end(&self) -> bool {
        matches!(
            self.peek(),
            None | Some(
                Token::End
                    | Token::Else
                    | Token::Elseif
                    | Token::Case
                    | Token::Default
                    | Token::Catch
                    | Token::Semicolon
            )
        )
    }

    fn parse_declaration(&mut self, kind: DeclKind) -> Result<StmtKind> {
        self.pos += 1;
        let name = self.expect_ident("variable name")?;
        let value = if self.eat(&Token::Assign) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(StmtKind::Declare { kind, name, value })
    }

    fn parse_if(&mut self) -> Result<StmtKind> {
        self.expect(Token::If)?;
        let mut branches = Vec::new();
        let condition = self.parse_expr()?;
        self.expect(Token::Then)?;
        branches.push((condition, self.parse_block()?));
        let mut otherwise = None;
        loop {
            if self.eat(&Token::Elseif) {
                let condition = self.parse_expr()?;
                self.expect(Token::Then)?;
                branches.push((condition, self.parse_block()?));
            } else if self.eat(&Token::Else) {
                otherwise = Some(self.parse_block()?);
                self.expect(Token::End)?;
                break;
            } else {
                self.expect(Token::End)?;
                break;
            }
        }
        Ok(StmtKind::If { branches, otherwise })
    }

    /// `for i = a, b [, step] do` or `for [k,] v in expr do`.
    fn parse_for(&mut self) -> Result<StmtKind> {
        self.expect(Token::For)?;
        let first = self.expect_ident("loop variable")?;
        if self.eat(&Token::Assign) {
            let start = self.parse_expr()?;
            self.expect(Token::Comma)?;
            let limit = self.parse_expr()?;
            let step = if self.eat(&Token::Comma) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            self.expect(Token::Do)?;
            let body = self.parse_block()?;
            self.expect(Token::End)?;
            return Ok(StmtKind::NumericFor {
                var: first,
                start,
                limit,
                step,
                body,
            });
        }
        let (key, value) = if self.eat(&Token::Comma) {
            let second = self.expect_ident("loop value variable")?;
            if second == first {
                return Err(self.err(format!("Duplicate loop variable '{second}'")));
            }
            (Some(first), second)
        } else {
            (None, first)
        };
        self.expect(Token::In)?;
        let iterable = self.parse_expr()?;
        self.expect(Token::Do)?;
        let body = self.parse_block()?;
        self.expect(Token::End)?;
        Ok(StmtKind::ForEach {
            key,
            value,
            iterable,
            body,
        })
    }

    fn parse_switch(&mut self) -> Result<StmtKind> {
        self.expect(Token::Switch)?;
        let subject = self.parse_expr()?;
        let mut cases = Vec::new();
        let mut default = None;
        loop {
            let line = self.line();
            if self.eat(&Token::Case) {
                let mut values = vec![self.parse_expr()?];
                while self.eat(&Token::Comma) {
                    values.push(self.parse_expr()?);
                }
                self.expect(Token::Then)?;
                let body = self.parse_block()?;
                cases.push(SwitchCase { values, body, line });
            } else if self.eat(&Token::Default) {
                if default.is_some() {
                    return Err(self.err("Duplicate 'default' in switch"));
                }
                default = Some(self.parse_block()?);
            } else {
                self.expect(Token::End)?;
                return Ok(StmtKind::Switch {
                    subject,
                    cases,
                    default,
                });
            }
        }
    }

    fn parse_try(&mut self) -> Result<StmtKind> {
        self.expect(Token::Try)?;
        let body = self.parse_block()?;
        self.expect(Token::Catch)?;
        let binding = self.expect_ident("catch variable")?;
        let handler = self.parse_block()?;
        self.expect(Token::End)?;
        Ok(StmtKind::Try {
            body,
            binding,
            handler,
        })
    }

    fn parse_assign_or_call(&mut self) -> Result<StmtKind> {
        let expr = self.parse_postfix()?;
        let op = match self.peek() {
            Some(Token::Assign) => None,
            Some(Token::AddAssign) => Some(BinOp::Add),
            Some(Token::SubAssign) => Some(BinOp::Sub),
            Some(Token::MulAssign) => Some(BinOp::Mul),
            Some(Token::DivAssign) => Some(BinOp::Div),
            Some(Token::ModAssign) => Some(BinOp::Mod),
            Some(Token::ConcatAssign) => Some(BinOp::Concat),
            _ => {
                if expr.is_call() {
                    return Ok(StmtKind::Expr(expr));
                }
                return Err(self.err("Expected an assignment or a call"));
            }
        };
        let target = match expr {
            Expr::Name(name) => Target::Name(name),
            Expr::Index(obj, key) => Target::Index(*obj, *key),
            Expr::Field(obj, field) => Target::Field(*obj, field),
            _ => return Err(self.err("Invalid assignment target")),
        };
        self.pos += 1;
        let value = self.parse_expr()?;
        Ok(StmtKind::Assign { target, op, value })
    }
}
