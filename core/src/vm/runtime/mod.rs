//! The execution engine: one operand stack, a frame stack and an active-closure
//! stack per [`Runtime`].

use std::sync::Arc;

use tracing::debug;

use crate::error::RuntimeError;
use crate::val::{FunctionBody, FunctionValue, Value};
use crate::vm::{CompiledUnit, RuntimeConfig, unit::ENTRY_FUNCTION};

mod dispatch;
mod frame;
mod invoke;


use frame::{Frame, ReturnMode};

/// Outcome of running the top frame until it can go no further on its own.
pub(super) enum Flow {
    /// A script call pushed a new frame.
    Switch,
    /// The frame closed, with a value unless it is a sub.
    Return(Option<Value>),
}

/// Executes one [`CompiledUnit`]. Not shareable between threads; create one
/// runtime per thread over the same `Arc<CompiledUnit>`.
pub struct Runtime {
    unit: Arc<CompiledUnit>,
    stack: Vec<Value>,
    frames: Vec<Frame>,
    closures: Vec<Arc<FunctionValue>>,
    config: RuntimeConfig,
}

impl Runtime {
    pub fn new(unit: Arc<CompiledUnit>) -> Self {
        Self::with_config(unit, RuntimeConfig::default())
    }

    pub fn with_config(unit: Arc<CompiledUnit>, config: RuntimeConfig) -> Self {
        Self {
            unit,
            stack: Vec::with_capacity(config.stack_capacity),
            frames: Vec::with_capacity(config.max_frames),
            closures: Vec::new(),
            config,
        }
    }

    pub fn unit(&self) -> &Arc<CompiledUnit> {
        &self.unit
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Run the unit's entry function with `args` bound to its `args` parameter.
    pub fn execute(&mut self, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let stop = self.frames.len();
        let floor = self.stack.len();
        self.stack.push(Value::from(args));
        if let Err(err) = self.enter_script(Arc::clone(&self.unit), ENTRY_FUNCTION, 1, ReturnMode::Entry, None) {
            self.stack.truncate(floor);
            return Err(err);
        }
        self.run(stop)
    }

    /// Call a function value from host code, including from inside a host thunk.
    pub fn call(&mut self, callee: &Value, args: &[Value]) -> Result<Value, RuntimeError> {
        let Value::Function(func) = callee else {
            return Err(RuntimeError::type_mismatch(format!(
                "cannot call a {}",
                callee.type_name()
            )));
        };
        let argc = u8::try_from(args.len())
            .map_err(|_| RuntimeError::argument_mismatch("too many arguments"))?;
        let func = Self::resolve_arity(func, argc, &self.unit)?;
        match func.body() {
            FunctionBody::Host(thunk) => {
                let result = thunk(self, args).map_err(RuntimeError::from_host)?;
                Ok(if func.returns_value() { result } else { Value::Null })
            }
            FunctionBody::Script { id, env, .. } => {
                let unit = invoke::owner_of(&func)?;
                if self.stack.len() + args.len() > self.config.stack_capacity {
                    return Err(RuntimeError::stack_overflow(format!(
                        "operand stack exceeded {} slots",
                        self.config.stack_capacity
                    )));
                }
                let stop = self.frames.len();
                let floor = self.stack.len();
                self.stack.extend(args.iter().cloned());
                let closure = env.is_some().then(|| Arc::clone(&func));
                if let Err(err) = self.enter_script(unit, *id, argc, ReturnMode::Entry, closure) {
                    self.stack.truncate(floor);
                    return Err(err);
                }
                self.run(stop)
            }
        }
    }

    /// Drive frames until the one started at depth `stop` returns.
    fn run(&mut self, stop: usize) -> Result<Value, RuntimeError> {
        loop {
            match self.run_frame() {
                Ok(Flow::Switch) => {}
                Ok(Flow::Return(value)) => {
                    if let Some(result) = self.leave_frame(value, stop) {
                        return Ok(result);
                    }
                }
                Err(err) => {
                    if let Err(err) = self.unwind(err, stop) {
                        debug!(target: "kiln::vm", kind = %err.kind, message = %err.message, "uncaught error");
                        return Err(err);
                    }
                }
            }
        }
    }
}

/// Run `unit` on a fresh runtime with default limits.
pub fn execute(unit: &Arc<CompiledUnit>, args: Vec<Value>) -> Result<Value, RuntimeError> {
    Runtime::new(Arc::clone(unit)).execute(args)
}
