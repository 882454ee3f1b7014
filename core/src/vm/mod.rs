//! Instruction set, compiler back end and execution engine.
//!
//! [`Engine`] compiles source into a [`CompiledUnit`]; a [`Runtime`] executes it.

mod bytecode;
mod compiler;
mod config;
pub(crate) mod engine;
mod opt;
mod runtime;
pub(crate) mod unit;
mod verify;

pub use bytecode::{Code, Constant, FuncRef, Instr, Label, Op, ScriptFunction};
pub use config::{CompileOptions, RuntimeConfig};
pub use engine::{Engine, EngineBuilder};
pub use opt::optimize;
pub use runtime::{Runtime, execute};
pub use unit::{CompiledUnit, ENTRY_FUNCTION};
pub use verify::{VerifyError, verify};

#[cfg(test)]
mod vm_test;
