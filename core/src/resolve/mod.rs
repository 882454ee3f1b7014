//! Compile-time name resolution.
//!
//! The compiler drives a [`ScopeChain`] while it walks the syntax tree: entering a
//! block allocates local slots from the enclosing function's free list, leaving it
//! releases them, and names found across an anonymous-function border are promoted
//! to closure captures.

mod scope;

pub use scope::{CaptureSource, FunctionLayout, JumpTarget, Resolved, ScopeChain, ScopeKind};
