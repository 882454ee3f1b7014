//! Syntax tree produced by the parser and walked by the compiler.

use std::sync::Arc;

use crate::op::{BinOp, UnaryOp};

mod parser;

pub use parser::Parser;


/// A whole source unit: the top-level statements in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: u32,
}

impl Stmt {
    pub fn new(kind: StmtKind, line: u32) -> Self {
        Self { kind, line }
    }
}

/// Storage class requested by a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Local,
    Private,
    Global,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Declare {
        kind: DeclKind,
        name: String,
        value: Option<Expr>,
    },
    /// Named `function` or `sub`; only legal at top level.
    Function(Arc<FunctionDecl>),
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        otherwise: Option<Vec<Stmt>>,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
    },
    NumericFor {
        var: String,
        start: Expr,
        limit: Expr,
        step: Option<Expr>,
        body: Vec<Stmt>,
    },
    ForEach {
        key: Option<String>,
        value: String,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    Switch {
        subject: Expr,
        cases: Vec<SwitchCase>,
        default: Option<Vec<Stmt>>,
    },
    Block(Vec<Stmt>),
    Break,
    Continue,
    Return(Option<Expr>),
    Throw(Expr),
    Try {
        body: Vec<Stmt>,
        binding: String,
        handler: Vec<Stmt>,
    },
    Assert {
        condition: Expr,
        message: Option<Expr>,
    },
    /// `target op= value`; `op` is `None` for plain `=`.
    Assign {
        target: Target,
        op: Option<BinOp>,
        value: Expr,
    },
    /// A call evaluated for its effect.
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub values: Vec<Expr>,
    pub body: Vec<Stmt>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Name(String),
    Index(Expr, Expr),
    Field(Expr, String),
}

/// Named or anonymous function body. `returns_value` separates `function` from `sub`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub returns_value: bool,
    pub line: u32,
    pub end_line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapItem {
    Positional(Expr),
    Keyed(Expr, Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Number(f64),
    Str(Arc<str>),
    Name(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(Box<Expr>, BinOp, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    /// `recv:name(args)`
    Method(Box<Expr>, String, Vec<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Field(Box<Expr>, String),
    Map(Vec<MapItem>),
    Function(Arc<FunctionDecl>),
}

impl Expr {
    pub fn is_call(&self) -> bool {
        matches!(self, Expr::Call(..) | Expr::Method(..))
    }
}
