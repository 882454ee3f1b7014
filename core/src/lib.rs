//! Kiln: an embeddable, dynamically typed scripting language.
//!
//! ```
//! let unit = kiln_core::compile("return 1 + 2 * 3", "doc").unwrap();
//! assert_eq!(kiln_core::execute(&unit, vec![]).unwrap(), kiln_core::val::Value::Number(7.0));
//! ```

pub mod ast;
pub mod error;
pub mod op;
pub mod resolve;
pub mod token;
pub mod util;
pub mod val;
pub mod vm;

pub use error::{CompileError, ErrorKind, RuntimeError};
pub use val::{Value, ValueTag};
pub use vm::{CompileOptions, CompiledUnit, Engine, EngineBuilder, Runtime, RuntimeConfig, execute};

/// Compile `source` against an engine with no host functions.
pub fn compile(source: &str, origin: &str) -> Result<std::sync::Arc<CompiledUnit>, CompileError> {
    Engine::default().compile(source, origin)
}
