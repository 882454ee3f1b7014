//! Compile-time and runtime error types.

use std::fmt;

use crate::token::ParseError;
use crate::val::Value;

/// Category of a runtime failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    TypeMismatch,
    ArgumentMismatch,
    UnknownMethod,
    /// Indicates a resolver bug: verified code never names a missing slot.
    UnknownVariable,
    /// Indicates a resolver bug: verified code never names a missing function.
    UnknownFunction,
    AssertionFailed,
    StackOverflow,
    /// Raised by a script `throw`; the payload is the thrown value.
    Thrown,
    /// Returned by a host thunk.
    Host,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::ArgumentMismatch => "ArgumentMismatch",
            ErrorKind::UnknownMethod => "UnknownMethod",
            ErrorKind::UnknownVariable => "UnknownVariable",
            ErrorKind::UnknownFunction => "UnknownFunction",
            ErrorKind::AssertionFailed => "AssertionFailed",
            ErrorKind::StackOverflow => "StackOverflow",
            ErrorKind::Thrown => "Thrown",
            ErrorKind::Host => "Host",
        };
        f.write_str(s)
    }
}

/// The single exception type of the runtime.
///
/// `value` carries the language-level payload of a `throw`; `trace` collects one
/// `function (origin:line)` entry per frame the error unwound through, innermost first.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
    pub value: Option<Value>,
    pub trace: Vec<String>,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            value: None,
            trace: Vec::new(),
        }
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch, message)
    }

    pub fn argument_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ArgumentMismatch, message)
    }

    pub fn stack_overflow(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StackOverflow, message)
    }

    pub fn thrown(value: Value) -> Self {
        Self {
            kind: ErrorKind::Thrown,
            message: value.to_string(),
            value: Some(value),
            trace: Vec::new(),
        }
    }

    /// Convert an error returned by a host thunk. Runtime errors raised by nested
    /// script calls pass through unchanged.
    pub fn from_host(err: anyhow::Error) -> Self {
        match err.downcast::<RuntimeError>() {
            Ok(inner) => inner,
            Err(other) => Self::new(ErrorKind::Host, format!("{other:#}")),
        }
    }

    /// The value a `catch` block binds: the thrown value, or `"Kind: message"`.
    pub fn payload(&self) -> Value {
        match &self.value {
            Some(value) => value.clone(),
            None => Value::from(self.to_string()),
        }
    }

    pub(crate) fn push_frame(&mut self, entry: String) {
        self.trace.push(entry);
    }
}

/// Fatal compilation failure with source context.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{file}:{line}: {message}")]
pub struct CompileError {
    pub message: String,
    pub line: u32,
    pub file: String,
}

impl CompileError {
    pub fn new(message: impl Into<String>, line: u32, file: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line,
            file: file.into(),
        }
    }

    pub(crate) fn from_parse(err: ParseError, file: &str) -> Self {
        let line = err.line();
        Self::new(err.message, line, file)
    }
}
