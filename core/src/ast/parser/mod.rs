use crate::token::{ParseError, Position, Span, Token, Tokenizer};

use super::{Program, Stmt};

mod expr;
mod stmt;

pub(super) type Result<T> = std::result::Result<T, ParseError>;

/// Recursive-descent parser over a token slice with index-aligned spans.
pub struct Parser<'a> {
    tokens: &'a [Token],
    spans: &'a [Span],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token], spans: &'a [Span]) -> Self {
        Self { tokens, spans, pos: 0 }
    }

    /// Tokenize and parse a complete source unit.
    pub fn parse_source(source: &str) -> Result<Program> {
        let (tokens, spans) = Tokenizer::tokenize(source)?;
        Parser::new(&tokens, &spans).parse_program()
    }

    pub fn parse_program(&mut self) -> Result<Program> {
        let statements = self.parse_block()?;
        if let Some(tok) = self.peek() {
            return Err(self.err(format!("Unexpected '{tok}'")));
        }
        Ok(Program { statements })
    }

    /// Statements up to (not including) a block terminator or end of input.
    pub(super) fn parse_block(&mut self) -> Result<Vec<Stmt>> {
        let mut out = Vec::new();
        loop {
            while self.eat(&Token::Semicolon) {}
            match self.peek() {
                None
                | Some(
                    Token::End | Token::Else | Token::Elseif | Token::Case | Token::Default | Token::Catch,
                ) => return Ok(out),
                Some(_) => out.push(self.parse_statement()?),
            }
        }
    }

    #[inline]
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    #[inline]
    fn peek_at(&self, ahead: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + ahead)
    }

    fn check(&self, tok: &Token) -> bool {
        self.peek() == Some(tok)
    }

    fn eat(&mut self, tok: &Token) -> bool {
        if self.check(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Token) -> Result<()> {
        if self.eat(&tok) {
            return Ok(());
        }
        Err(match self.peek() {
            Some(found) => self.err(format!("Expected '{tok}', found '{found}'")),
            None => self.err(format!("Expected '{tok}' but reached end of input")),
        })
    }

    fn expect_ident(&mut self, what: &str) -> Result<String> {
        match self.peek() {
            Some(Token::Id(name)) => {
                self.pos += 1;
                Ok(name.clone())
            }
            Some(found) => Err(self.err(format!("Expected {what}, found '{found}'"))),
            None => Err(self.err(format!("Expected {what} but reached end of input"))),
        }
    }

    /// Line of the current token, or of the last token at end of input.
    fn line(&self) -> u32 {
        self.current_span().map_or(1, |s| s.line())
    }

    fn current_span(&self) -> Option<Span> {
        self.spans
            .get(self.pos)
            .or_else(|| self.spans.last())
            .copied()
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        match self.current_span() {
            Some(span) => ParseError::with_span(message, span),
            None => ParseError::with_position(message, Position::start()),
        }
    }
}
