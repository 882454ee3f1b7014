pub(super) use std::sync::Arc;

pub(super) use crate::{
    error::{ErrorKind, RuntimeError},
    val::{ScriptMap, Value, ValueTag},
    vm::{CompiledUnit, Engine, EngineBuilder, Runtime, RuntimeConfig},
};

pub(super) fn compile_with(engine: &Engine, src: &str) -> Arc<CompiledUnit> {
    engine.compile(src, "test").unwrap()
}

pub(super) fn run(src: &str) -> Value {
    run_with(&Engine::default(), src)
}

pub(super) fn run_with(engine: &Engine, src: &str) -> Value {
    Runtime::new(compile_with(engine, src)).execute(Vec::new()).unwrap()
}

pub(super) fn run_err(src: &str) -> RuntimeError {
    Runtime::new(compile_with(&Engine::default(), src))
        .execute(Vec::new())
        .unwrap_err()
}

pub(super) fn num(n: f64) -> Value {
    Value::Number(n)
}


/// Numbers of an ordered map, in order.
pub(super) fn numbers(value: &Value) -> Vec<f64> {
    let map = value.as_map().expect("expected a map").read();
    map.values().map(|v| v.as_number().expect("expected a number")).collect()
}

mod closures;
mod concurrency;
mod control_flow;
mod errors;
mod functions;
mod native;
mod semantics;
