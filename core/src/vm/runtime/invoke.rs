use std::sync::Arc;

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::error::{ErrorKind, RuntimeError};
use crate::val::{FunctionBody, FunctionValue, HostFn, Value};
use crate::vm::CompiledUnit;

use super::{
    Runtime,
    frame::{Frame, ReturnMode},
};

impl Runtime {
    /// Push a frame for script function `id` of `unit` whose `argc` arguments are
    /// already on the stack.
    pub(super) fn enter_script(
        &mut self,
        unit: Arc<CompiledUnit>,
        id: u32,
        argc: u8,
        ret: ReturnMode,
        closure: Option<Arc<FunctionValue>>,
    ) -> Result<(), RuntimeError> {
        let Some(func) = unit.functions.get(id as usize) else {
            return Err(RuntimeError::new(
                ErrorKind::UnknownFunction,
                format!("no script function #{id}"),
            ));
        };
        if self.frames.len() >= self.config.max_frames {
            return Err(RuntimeError::stack_overflow(format!(
                "call depth exceeded {} frames",
                self.config.max_frames
            )));
        }
        let base = self.stack.len() - usize::from(argc);
        if base + func.frame_size() > self.config.stack_capacity {
            return Err(RuntimeError::stack_overflow(format!(
                "operand stack exceeded {} slots",
                self.config.stack_capacity
            )));
        }
        trace!(target: "kiln::vm", function = %func.name, argc, depth = self.frames.len(), "enter");
        let is_closure = closure.is_some();
        if let Some(closure) = closure {
            self.closures.push(closure);
        }
        self.frames.push(Frame::new(unit, id, base, is_closure, ret));
        Ok(())
    }

    /// A function value called with the wrong arity falls back to the overload
    /// with the same name. Script overloads come from the unit that defined the
    /// function; host overloads from `caller`.
    pub(super) fn resolve_arity(
        func: &Arc<FunctionValue>,
        argc: u8,
        caller: &CompiledUnit,
    ) -> Result<Arc<FunctionValue>, RuntimeError> {
        if func.arity() == argc {
            return Ok(Arc::clone(func));
        }
        let found = match func.body() {
            FunctionBody::Script { .. } => owner_of(func)?.lookup_function(func.name(), argc),
            FunctionBody::Host(_) => caller.lookup_function(func.name(), argc),
        };
        found.ok_or_else(|| {
            RuntimeError::argument_mismatch(format!(
                "{} expects {} argument(s), got {argc}",
                func.name(),
                func.arity()
            ))
        })
    }

    /// Call `func` with its `argc` arguments on top of the stack. Returns true when
    /// a script frame was pushed.
    pub(super) fn invoke(&mut self, func: Arc<FunctionValue>, argc: u8, ret: ReturnMode) -> Result<bool, RuntimeError> {
        match func.body() {
            FunctionBody::Script { id, env, .. } => {
                let unit = owner_of(&func)?;
                let closure = env.is_some().then(|| Arc::clone(&func));
                self.enter_script(unit, *id, argc, ret, closure)?;
                Ok(true)
            }
            FunctionBody::Host(thunk) => {
                let thunk = Arc::clone(thunk);
                self.invoke_host(&thunk, func.returns_value(), argc, ret)?;
                Ok(false)
            }
        }
    }

    pub(super) fn invoke_host(
        &mut self,
        thunk: &HostFn,
        returns_value: bool,
        argc: u8,
        ret: ReturnMode,
    ) -> Result<(), RuntimeError> {
        let start = self.stack.len() - usize::from(argc);
        let args: SmallVec<[Value; 8]> = self.stack.drain(start..).collect();
        if ret == ReturnMode::ReplaceCallee {
            self.stack.pop();
        }
        let result = thunk(self, &args).map_err(RuntimeError::from_host)?;
        match ret {
            ReturnMode::Discard | ReturnMode::Entry => {}
            ReturnMode::Push | ReturnMode::ReplaceCallee => {
                self.stack.push(if returns_value { result } else { Value::Null });
            }
        }
        Ok(())
    }

    /// Pop the top frame and deliver its result. Returns the value once the frame
    /// started at depth `stop` has finished.
    pub(super) fn leave_frame(&mut self, value: Option<Value>, stop: usize) -> Option<Value> {
        let frame = self.frames.pop()?;
        if frame.closure {
            self.closures.pop();
        }
        self.stack.truncate(frame.floor());
        let value = value.unwrap_or_default();
        match frame.ret {
            ReturnMode::Push | ReturnMode::ReplaceCallee => self.stack.push(value),
            ReturnMode::Discard => {}
            ReturnMode::Entry => return Some(value),
        }
        debug_assert!(self.frames.len() > stop, "non-entry frame at the run boundary");
        None
    }

    /// Route `err` to the innermost handler above depth `stop`, popping frames
    /// without one. Returns the error once no handler remains.
    pub(super) fn unwind(&mut self, mut err: RuntimeError, stop: usize) -> Result<(), RuntimeError> {
        while self.frames.len() > stop {
            let Some(frame) = self.frames.last_mut() else { break };
            if let Some(handler) = frame.handlers.pop() {
                frame.pc = handler.pc;
                self.stack.truncate(handler.depth);
                debug!(target: "kiln::vm", kind = %err.kind, message = %err.message, "error caught");
                self.stack.push(err.payload());
                return Ok(());
            }
            let Some(frame) = self.frames.pop() else { break };
            err.push_frame(Self::trace_entry(&frame));
            if frame.closure {
                self.closures.pop();
            }
            self.stack.truncate(frame.floor());
        }
        Err(err)
    }

    fn trace_entry(frame: &Frame) -> String {
        let unit = &frame.unit;
        match unit.functions.get(frame.function as usize) {
            Some(func) => {
                let line = func
                    .code
                    .instrs
                    .get(frame.pc.saturating_sub(1))
                    .map_or(func.line, |instr| instr.line);
                format!("{} ({}:{line})", func.name, unit.origin)
            }
            None => format!("#{} ({})", frame.function, unit.origin),
        }
    }
}

/// The live unit a script function value belongs to.
pub(super) fn owner_of(func: &FunctionValue) -> Result<Arc<CompiledUnit>, RuntimeError> {
    func.owner().ok_or_else(|| {
        RuntimeError::new(
            ErrorKind::UnknownFunction,
            format!("{} belongs to a unit that was dropped", func.name()),
        )
    })
}
