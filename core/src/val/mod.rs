mod function;
mod map;
mod values;

pub use function::{FunctionBody, FunctionValue, HostFn};
pub use map::ScriptMap;
pub use values::{MapRef, ObjectRef, Value, ValueTag};

#[cfg(test)]
mod map_test;
#[cfg(test)]
mod val_test;
