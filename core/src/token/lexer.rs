use std::fmt;

use crate::token::{ParseError, Position, Span};

type Result<T> = std::result::Result<T, ParseError>;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LParen,       // (
    RParen,       // )
    LBrace,       // {
    RBrace,       // }
    LBracket,     // [
    RBracket,     // ]
    Dot,          // .
    Colon,        // :
    Comma,        // ,
    Semicolon,    // ;
    Assign,       // =
    AddAssign,    // +=
    SubAssign,    // -=
    MulAssign,    // *=
    DivAssign,    // /=
    ModAssign,    // %=
    ConcatAssign, // ..=
    Eq,           // ==
    Ne,           // !=
    Gt,           // >
    Lt,           // <
    Ge,           // >=
    Le,           // <=
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /
    Percent,      // %
    Concat,       // ..
    MapConcat,    // ++
    Amp,          // &
    Pipe,         // |
    Caret,        // ^
    Tilde,        // ~
    Shl,          // <<
    Shr,          // >>
    UShr,         // >>>
    Hash,         // #
    // Declarations
    Local,
    Private,
    Global,
    Function,
    Sub,
    End,
    // Control flow
    If,
    Then,
    Elseif,
    Else,
    While,
    Do,
    For,
    In,
    Switch,
    Case,
    Default,
    Break,
    Continue,
    Return,
    Throw,
    Try,
    Catch,
    Assert,
    // Literals and operators spelled as words
    Null,
    True,
    False,
    And,
    Or,
    Not,
    Str(String),
    Num(f64),
    Id(String),
}

impl Token {
    fn keyword(word: &str) -> Option<Token> {
        let tok = match word {
            "local" => Token::Local,
            "private" => Token::Private,
            "global" => Token::Global,
            "function" => Token::Function,
            "sub" => Token::Sub,
            "end" => Token::End,
            "if" => Token::If,
            "then" => Token::Then,
            "elseif" => Token::Elseif,
            "else" => Token::Else,
            "while" => Token::While,
            "do" => Token::Do,
            "for" => Token::For,
            "in" => Token::In,
            "switch" => Token::Switch,
            "case" => Token::Case,
            "default" => Token::Default,
            "break" => Token::Break,
            "continue" => Token::Continue,
            "return" => Token::Return,
            "throw" => Token::Throw,
            "try" => Token::Try,
            "catch" => Token::Catch,
            "assert" => Token::Assert,
            "null" => Token::Null,
            "true" => Token::True,
            "false" => Token::False,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            _ => return None,
        };
        Some(tok)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Dot => ".",
            Token::Colon => ":",
            Token::Comma => ",",
            Token::Semicolon => ";",
            Token::Assign => "=",
            Token::AddAssign => "+=",
            Token::SubAssign => "-=",
            Token::MulAssign => "*=",
            Token::DivAssign => "/=",
            Token::ModAssign => "%=",
            Token::ConcatAssign => "..=",
            Token::Eq => "==",
            Token::Ne => "!=",
            Token::Gt => ">",
            Token::Lt => "<",
            Token::Ge => ">=",
            Token::Le => "<=",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Concat => "..",
            Token::MapConcat => "++",
            Token::Amp => "&",
            Token::Pipe => "|",
            Token::Caret => "^",
            Token::Tilde => "~",
            Token::Shl => "<<",
            Token::Shr => ">>",
            Token::UShr => ">>>",
            Token::Hash => "#",
            Token::Local => "local",
            Token::Private => "private",
            Token::Global => "global",
            Token::Function => "function",
            Token::Sub => "sub",
            Token::End => "end",
            Token::If => "if",
            Token::Then => "then",
            Token::Elseif => "elseif",
            Token::Else => "else",
            Token::While => "while",
            Token::Do => "do",
            Token::For => "for",
            Token::In => "in",
            Token::Switch => "switch",
            Token::Case => "case",
            Token::Default => "default",
            Token::Break => "break",
            Token::Continue => "continue",
            Token::Return => "return",
            Token::Throw => "throw",
            Token::Try => "try",
            Token::Catch => "catch",
            Token::Assert => "assert",
            Token::Null => "null",
            Token::True => "true",
            Token::False => "false",
            Token::And => "and",
            Token::Or => "or",
            Token::Not => "not",
            Token::Str(s) => return write!(f, "{s:?}"),
            Token::Num(n) => return write!(f, "{n}"),
            Token::Id(name) => return write!(f, "{name}"),
        };
        f.write_str(s)
    }
}

const ASCII_WHITESPACE: u8 = 1 << 0;
const ASCII_DIGIT: u8 = 1 << 1;
const ASCII_IDENT_START: u8 = 1 << 2;
const ASCII_IDENT_CONT: u8 = 1 << 3;

const fn build_ascii_class() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let c = i as u8;
        if matches!(c, b' ' | b'\t' | b'\n' | b'\r' | 0x0B | 0x0C) {
            table[i] |= ASCII_WHITESPACE;
        }
        if c >= b'0' && c <= b'9' {
            table[i] |= ASCII_DIGIT | ASCII_IDENT_CONT;
        }
        if (c >= b'a' && c <= b'z') || (c >= b'A' && c <= b'Z') || c == b'_' {
            table[i] |= ASCII_IDENT_START | ASCII_IDENT_CONT;
        }
        i += 1;
    }
    table
}

const ASCII_CLASS: [u8; 256] = build_ascii_class();

#[inline]
fn ascii_flags(c: char) -> u8 {
    if c.is_ascii() { ASCII_CLASS[c as usize] } else { 0 }
}

#[inline]
fn is_space_char(c: char) -> bool {
    let flags = ascii_flags(c);
    if flags != 0 {
        flags & ASCII_WHITESPACE != 0
    } else {
        c.is_whitespace()
    }
}

#[inline]
fn is_ident_start(c: char) -> bool {
    let flags = ascii_flags(c);
    if flags != 0 {
        flags & ASCII_IDENT_START != 0
    } else {
        c.is_alphabetic()
    }
}

#[inline]
fn is_ident_continue(c: char) -> bool {
    let flags = ascii_flags(c);
    if flags != 0 {
        flags & ASCII_IDENT_CONT != 0
    } else {
        c.is_alphanumeric()
    }
}

/// Turns source text into tokens with spans aligned by index.
pub struct Tokenizer {
    chars: Vec<char>,
    idx: usize,
    len: usize,
    tokens: Vec<Token>,
    spans: Vec<Span>,
    line: u32,
    column: u32,
}

impl Tokenizer {
    pub fn tokenize(s: &str) -> Result<(Vec<Token>, Vec<Span>)> {
        let chars: Vec<char> = s.chars().collect();
        let mut t = Tokenizer {
            len: chars.len(),
            chars,
            idx: 0,
            tokens: Vec::with_capacity(s.len() / 4),
            spans: Vec::with_capacity(s.len() / 4),
            line: 1,
            column: 1,
        };
        t.parse()?;
        Ok((t.tokens, t.spans))
    }

    fn current_position(&self) -> Position {
        Position::new(self.line, self.column, self.idx)
    }

    fn err<T>(&self, msg: impl Into<String>) -> Result<T> {
        Err(ParseError::with_position(msg, self.current_position()))
    }

    fn eof(&self) -> bool {
        self.idx >= self.len
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.idx + ahead).copied()
    }

    fn advance_char(&mut self) {
        if !self.eof() && self.chars[self.idx] == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        self.idx += 1;
    }

    fn push_with_span(&mut self, token: Token, start: Position) {
        let end = self.current_position();
        self.tokens.push(token);
        self.spans.push(Span::new(start, end));
    }

    /// Consume `width` characters and emit `token`.
    fn punct(&mut self, token: Token, width: usize) {
        let start = self.current_position();
        for _ in 0..width {
            self.advance_char();
        }
        self.push_with_span(token, start);
    }

    fn parse(&mut self) -> Result<()> {
        while !self.eof() {
            let c = self.chars[self.idx];
            if is_space_char(c) {
                self.advance_char();
                continue;
            }
            let next = self.peek_at(1);
            let third = self.peek_at(2);
            match c {
                '/' if next == Some('/') => self.skip_line_comment(),
                '/' if next == Some('*') => self.skip_block_comment()?,
                '/' if next == Some('=') => self.punct(Token::DivAssign, 2),
                '/' => self.punct(Token::Slash, 1),
                '(' => self.punct(Token::LParen, 1),
                ')' => self.punct(Token::RParen, 1),
                '{' => self.punct(Token::LBrace, 1),
                '}' => self.punct(Token::RBrace, 1),
                '[' => self.punct(Token::LBracket, 1),
                ']' => self.punct(Token::RBracket, 1),
                ':' => self.punct(Token::Colon, 1),
                ',' => self.punct(Token::Comma, 1),
                ';' => self.punct(Token::Semicolon, 1),
                '#' => self.punct(Token::Hash, 1),
                '~' => self.punct(Token::Tilde, 1),
                '&' => self.punct(Token::Amp, 1),
                '|' => self.punct(Token::Pipe, 1),
                '^' => self.punct(Token::Caret, 1),
                '.' if next == Some('.') && third == Some('=') => self.punct(Token::ConcatAssign, 3),
                '.' if next == Some('.') => self.punct(Token::Concat, 2),
                '.' => self.punct(Token::Dot, 1),
                '+' if next == Some('+') => self.punct(Token::MapConcat, 2),
                '+' if next == Some('=') => self.punct(Token::AddAssign, 2),
                '+' => self.punct(Token::Plus, 1),
                '-' if next == Some('=') => self.punct(Token::SubAssign, 2),
                '-' => self.punct(Token::Minus, 1),
                '*' if next == Some('=') => self.punct(Token::MulAssign, 2),
                '*' => self.punct(Token::Star, 1),
                '%' if next == Some('=') => self.punct(Token::ModAssign, 2),
                '%' => self.punct(Token::Percent, 1),
                '=' if next == Some('=') => self.punct(Token::Eq, 2),
                '=' => self.punct(Token::Assign, 1),
                '!' if next == Some('=') => self.punct(Token::Ne, 2),
                '<' if next == Some('<') => self.punct(Token::Shl, 2),
                '<' if next == Some('=') => self.punct(Token::Le, 2),
                '<' => self.punct(Token::Lt, 1),
                '>' if next == Some('>') && third == Some('>') => self.punct(Token::UShr, 3),
                '>' if next == Some('>') => self.punct(Token::Shr, 2),
                '>' if next == Some('=') => self.punct(Token::Ge, 2),
                '>' => self.punct(Token::Gt, 1),
                '"' | '\'' => self.parse_str()?,
                c if c.is_ascii_digit() => self.parse_num()?,
                c if is_ident_start(c) => self.parse_word(),
                other => return self.err(format!("Unexpected character '{other}'")),
            }
        }
        Ok(())
    }

    fn skip_line_comment(&mut self) {
        while !self.eof() {
            let c = self.chars[self.idx];
            self.advance_char();
            if c == '\n' {
                break;
            }
        }
    }

    fn skip_block_comment(&mut self) -> Result<()> {
        // Skip past /*
        self.advance_char();
        self.advance_char();

        while !self.eof() {
            if self.chars[self.idx] == '*' && self.peek_at(1) == Some('/') {
                self.advance_char();
                self.advance_char();
                return Ok(());
            }
            self.advance_char();
        }

        self.err("Block comment not closed")
    }

    fn parse_str(&mut self) -> Result<()> {
        let start = self.current_position();
        let quote = self.chars[self.idx];
        self.advance_char();

        let mut content = String::new();
        while !self.eof() {
            let c = self.chars[self.idx];
            if c == quote {
                self.advance_char();
                self.push_with_span(Token::Str(content), start);
                return Ok(());
            }
            if c == '\\' {
                self.advance_char();
                let Some(escaped) = self.peek_at(0) else {
                    return self.err("Incomplete escape sequence at end of string");
                };
                match escaped {
                    'n' => content.push('\n'),
                    'r' => content.push('\r'),
                    't' => content.push('\t'),
                    '\\' => content.push('\\'),
                    '\'' => content.push('\''),
                    '"' => content.push('"'),
                    '0' => content.push('\0'),
                    _ => {
                        // Unknown escapes are kept verbatim
                        content.push('\\');
                        content.push(escaped);
                    }
                }
                self.advance_char();
            } else {
                content.push(c);
                self.advance_char();
            }
        }

        Err(ParseError::with_position("String not closed", start))
    }

    fn parse_num(&mut self) -> Result<()> {
        let start = self.current_position();

        if self.chars[self.idx] == '0' && matches!(self.peek_at(1), Some('x' | 'X')) {
            self.advance_char();
            self.advance_char();
            let mut digits = String::new();
            while let Some(c) = self.peek_at(0)
                && c.is_ascii_hexdigit()
            {
                digits.push(c);
                self.advance_char();
            }
            let value = u64::from_str_radix(&digits, 16)
                .map_err(|_| ParseError::with_position("Invalid hex literal", start))?;
            self.push_with_span(Token::Num(value as f64), start);
            return Ok(());
        }

        let mut num = String::new();
        let mut seen_dot = false;
        let mut seen_exp = false;
        while let Some(c) = self.peek_at(0) {
            if c.is_ascii_digit() {
                num.push(c);
                self.advance_char();
            } else if c == '.' && !seen_dot && !seen_exp {
                // `1..2` is a concat of two numbers, not a malformed float
                if !self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) {
                    break;
                }
                seen_dot = true;
                num.push(c);
                self.advance_char();
            } else if (c == 'e' || c == 'E') && !seen_exp {
                let sign = self.peek_at(1);
                let digit_at = if matches!(sign, Some('+' | '-')) { 2 } else { 1 };
                if !self.peek_at(digit_at).is_some_and(|d| d.is_ascii_digit()) {
                    break;
                }
                seen_exp = true;
                for _ in 0..digit_at {
                    num.push(self.chars[self.idx]);
                    self.advance_char();
                }
            } else {
                break;
            }
        }

        if self.peek_at(0).is_some_and(is_ident_start) {
            return self.err(format!("Invalid number literal '{num}'"));
        }
        let value: f64 = num
            .parse()
            .map_err(|_| ParseError::with_position(format!("Invalid number literal '{num}'"), start))?;
        self.push_with_span(Token::Num(value), start);
        Ok(())
    }

    fn parse_word(&mut self) {
        let start = self.current_position();
        let mut word = String::new();
        while let Some(c) = self.peek_at(0)
            && is_ident_continue(c)
        {
            word.push(c);
            self.advance_char();
        }
        let token = Token::keyword(&word).unwrap_or(Token::Id(word));
        self.push_with_span(token, start);
    }
}
