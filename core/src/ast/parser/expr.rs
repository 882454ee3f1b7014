use std::sync::Arc;

use crate::{
    ast::{Expr, FunctionDecl, MapItem},
    op::{BinOp, UnaryOp},
    token::Token,
};

use super::{Parser, Result};

/// Name given to anonymous `function(...)` / `sub(...)` expressions.
pub(crate) const ANONYMOUS: &str = "<anonymous>";

impl<'a> Parser<'a> {
    pub(super) fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_comparison()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_comparison()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        self.parse_binary_level(
            &[
                (Token::Eq, BinOp::Eq),
                (Token::Ne, BinOp::Ne),
                (Token::Lt, BinOp::Lt),
                (Token::Le, BinOp::Le),
                (Token::Gt, BinOp::Gt),
                (Token::Ge, BinOp::Ge),
            ],
            Self::parse_bit_or,
        )
    }

    fn parse_bit_or(&mut self) -> Result<Expr> {
        self.parse_binary_level(&[(Token::Pipe, BinOp::BitOr)], Self::parse_bit_xor)
    }

    fn parse_bit_xor(&mut self) -> Result<Expr> {
        self.parse_binary_level(&[(Token::Caret, BinOp::BitXor)], Self::parse_bit_and)
    }

    fn parse_bit_and(&mut self) -> Result<Expr> {
        self.parse_binary_level(&[(Token::Amp, BinOp::BitAnd)], Self::parse_shift)
    }

    fn parse_shift(&mut self) -> Result<Expr> {
        self.parse_binary_level(
            &[
                (Token::Shl, BinOp::Shl),
                (Token::Shr, BinOp::Shr),
                (Token::UShr, BinOp::UShr),
            ],
            Self::parse_concat,
        )
    }

    fn parse_concat(&mut self) -> Result<Expr> {
        self.parse_binary_level(
            &[(Token::Concat, BinOp::Concat), (Token::MapConcat, BinOp::MapConcat)],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        self.parse_binary_level(
            &[(Token::Plus, BinOp::Add), (Token::Minus, BinOp::Sub)],
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        self.parse_binary_level(
            &[
                (Token::Star, BinOp::Mul),
                (Token::Slash, BinOp::Div),
                (Token::Percent, BinOp::Mod),
            ],
            Self::parse_unary,
        )
    }

    /// One left-associative precedence level.
    fn parse_binary_level(
        &mut self,
        ops: &[(Token, BinOp)],
        next: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let mut lhs = next(self)?;
        'outer: loop {
            for (tok, op) in ops {
                if self.eat(tok) {
                    let rhs = next(self)?;
                    lhs = Expr::Binary(Box::new(lhs), *op, Box::new(rhs));
                    continue 'outer;
                }
            }
            return Ok(lhs);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Not) => UnaryOp::Not,
            Some(Token::Tilde) => UnaryOp::BitNot,
            Some(Token::Hash) => UnaryOp::Len,
            _ => return self.parse_postfix(),
        };
        self.pos += 1;
        let operand = self.parse_unary()?;
        Ok(match (op, operand) {
            (UnaryOp::Neg, Expr::Number(n)) => Expr::Number(-n),
            (op, operand) => Expr::Unary(op, Box::new(operand)),
        })
    }

    pub(super) fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::LParen) => {
                    let args = self.parse_args()?;
                    expr = Expr::Call(Box::new(expr), args);
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let key = self.parse_expr()?;
                    self.expect(Token::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(key));
                }
                Some(Token::Dot) => {
                    self.pos += 1;
                    let field = self.expect_ident("field name after '.'")?;
                    expr = Expr::Field(Box::new(expr), field);
                }
                Some(Token::Colon) => {
                    self.pos += 1;
                    let method = self.expect_ident("method name after ':'")?;
                    let args = self.parse_args()?;
                    expr = Expr::Method(Box::new(expr), method, args);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>> {
        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            self.expect(Token::Comma)?;
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let Some(tok) = self.peek() else {
            return Err(self.err("Expected an expression but reached end of input"));
        };
        let expr = match tok {
            Token::Num(n) => Expr::Number(*n),
            Token::Str(s) => Expr::Str(Arc::from(s.as_str())),
            Token::Null => Expr::Null,
            Token::True => Expr::Number(1.0),
            Token::False => Expr::Number(0.0),
            Token::Id(name) => Expr::Name(name.clone()),
            Token::LParen => {
                self.pos += 1;
                let inner = self.parse_expr()?;
                self.expect(Token::RParen)?;
                return Ok(inner);
            }
            Token::LBrace => return self.parse_map_literal(),
            Token::Function | Token::Sub => {
                let returns_value = *tok == Token::Function;
                let line = self.line();
                self.pos += 1;
                let decl = self.parse_function_rest(ANONYMOUS.to_string(), returns_value, line)?;
                return Ok(Expr::Function(Arc::new(decl)));
            }
            other => return Err(self.err(format!("Unexpected '{other}' in expression"))),
        };
        self.pos += 1;
        Ok(expr)
    }

    /// `{ v, key = v, [expr] = v }`
    fn parse_map_literal(&mut self) -> Result<Expr> {
        self.expect(Token::LBrace)?;
        let mut items = Vec::new();
        loop {
            if self.eat(&Token::RBrace) {
                return Ok(Expr::Map(items));
            }
            let item = match (self.peek(), self.peek_at(1)) {
                (Some(Token::Id(name)), Some(Token::Assign)) => {
                    let key = Expr::Str(Arc::from(name.as_str()));
                    self.pos += 2;
                    MapItem::Keyed(key, self.parse_expr()?)
                }
                (Some(Token::LBracket), _) => {
                    self.pos += 1;
                    let key = self.parse_expr()?;
                    self.expect(Token::RBracket)?;
                    self.expect(Token::Assign)?;
                    MapItem::Keyed(key, self.parse_expr()?)
                }
                _ => MapItem::Positional(self.parse_expr()?),
            };
            items.push(item);
            if !self.eat(&Token::Comma) && !self.eat(&Token::Semicolon) {
                self.expect(Token::RBrace)?;
                return Ok(Expr::Map(items));
            }
        }
    }

    /// Parameter list and body after the `function`/`sub` keyword (and name).
    pub(super) fn parse_function_rest(
        &mut self,
        name: String,
        returns_value: bool,
        line: u32,
    ) -> Result<FunctionDecl> {
        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                let param = self.expect_ident("parameter name")?;
                if params.contains(&param) {
                    return Err(self.err(format!("Duplicate parameter '{param}'")));
                }
                params.push(param);
                if self.eat(&Token::RParen) {
                    break;
                }
                self.expect(Token::Comma)?;
            }
        }
        if params.len() > u8::MAX as usize {
            return Err(self.err("Too many parameters"));
        }
        let body = self.parse_block()?;
        let end_line = self.line();
        self.expect(Token::End)?;
        Ok(FunctionDecl {
            name,
            params,
            body,
            returns_value,
            line,
            end_line,
        })
    }
}
