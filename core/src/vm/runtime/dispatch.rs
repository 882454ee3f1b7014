use std::sync::Arc;

use crate::error::{ErrorKind, RuntimeError};
use crate::resolve::CaptureSource;
use crate::val::{FunctionBody, FunctionValue, ObjectRef, Value};
use crate::vm::{CompiledUnit, Constant, FuncRef, Label, Op, ScriptFunction};

use super::{
    Flow, Runtime,
    frame::{Handler, MapCursor, ReturnMode},
};

/// Verified code never trips these; reaching one means a compiler bug.
pub(super) fn internal(message: impl std::fmt::Display) -> RuntimeError {
    RuntimeError::new(ErrorKind::UnknownVariable, format!("internal error: {message}"))
}

fn missing_function(id: u32) -> RuntimeError {
    RuntimeError::new(ErrorKind::UnknownFunction, format!("no script function #{id}"))
}

#[inline]
fn label_pc(func: &ScriptFunction, label: Label) -> Result<usize, RuntimeError> {
    func.code
        .label_pc(label)
        .ok_or_else(|| internal(format!("undefined label {label} in {}", func.name)))
}

#[inline]
fn in_range(value: f64, limit: f64, step: f64) -> bool {
    if step < 0.0 { value >= limit } else { value <= limit }
}

fn get_index(object: &Value, key: &Value) -> Result<Value, RuntimeError> {
    match object {
        Value::Map(map) => Ok(map.read().get(key).cloned().unwrap_or_default()),
        other => Err(RuntimeError::type_mismatch(format!(
            "cannot index a {}",
            other.type_name()
        ))),
    }
}

fn get_key(object: &Value, key: &Constant) -> Result<Value, RuntimeError> {
    match (object, key) {
        (Value::Map(map), Constant::Str(name)) => Ok(map.read().get_str(name).cloned().unwrap_or_default()),
        (Value::Map(map), key) => Ok(map.read().get(&key.to_value()).cloned().unwrap_or_default()),
        (other, key) => Err(RuntimeError::type_mismatch(format!(
            "cannot read field {key} of a {}",
            other.type_name()
        ))),
    }
}

fn set_index(object: &Value, key: Value, value: Value) -> Result<(), RuntimeError> {
    match object {
        Value::Map(map) => {
            map.write().set(key, value);
            Ok(())
        }
        other => Err(RuntimeError::type_mismatch(format!(
            "cannot assign into a {}",
            other.type_name()
        ))),
    }
}

impl Runtime {
    #[inline]
    fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack.pop().ok_or_else(|| internal("operand stack underflow"))
    }

    #[inline]
    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn closure_env(&self) -> Result<&parking_lot::Mutex<Vec<Value>>, RuntimeError> {
        match self.closures.last().map(|c| c.body()) {
            Some(FunctionBody::Script { env: Some(env), .. }) => Ok(env),
            _ => Err(internal("closure slot accessed outside a closure")),
        }
    }

    fn load_closure(&self, slot: u16) -> Result<Value, RuntimeError> {
        self.closure_env()?
            .lock()
            .get(usize::from(slot))
            .cloned()
            .ok_or_else(|| internal(format!("closure slot {slot} out of range")))
    }

    fn store_closure(&self, slot: u16, value: Value) -> Result<(), RuntimeError> {
        let env = self.closure_env()?;
        let mut env = env.lock();
        match env.get_mut(usize::from(slot)) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(internal(format!("closure slot {slot} out of range"))),
        }
    }

    /// Run the top frame until it calls a script function, returns or fails.
    pub(super) fn run_frame(&mut self) -> Result<Flow, RuntimeError> {
        let Some(frame) = self.frames.last() else {
            return Err(internal("no active frame"));
        };
        let frame_index = self.frames.len() - 1;
        let (function, base, mut pc) = (frame.function, frame.base, frame.pc);
        let unit = Arc::clone(&frame.unit);
        let Some(func) = unit.functions.get(function as usize) else {
            return Err(missing_function(function));
        };
        let result = self.dispatch(&unit, func, frame_index, base, &mut pc);
        if let Some(frame) = self.frames.get_mut(frame_index) {
            frame.pc = pc;
        }
        result
    }

    fn dispatch(
        &mut self,
        unit: &Arc<CompiledUnit>,
        func: &ScriptFunction,
        frame_index: usize,
        base: usize,
        pc: &mut usize,
    ) -> Result<Flow, RuntimeError> {
        let instrs = &func.code.instrs;
        loop {
            let Some(instr) = instrs.get(*pc) else {
                return Err(internal(format!("{} ran past its end", func.name)));
            };
            *pc += 1;
            match &instr.op {
                Op::Label(_) => {}
                Op::Jump(target) => *pc = label_pc(func, *target)?,
                Op::JumpIf { when, target } => {
                    if self.pop()?.truthy() == *when {
                        *pc = label_pc(func, *target)?;
                    }
                }
                Op::JumpOrPop { when, target } => {
                    let taken = self.stack.last().is_some_and(|v| v.truthy() == *when);
                    if taken {
                        *pc = label_pc(func, *target)?;
                    } else {
                        self.pop()?;
                    }
                }
                Op::CompareJump { op, imm, when, target } => {
                    let rhs = match imm {
                        Some(c) => c.to_value(),
                        None => self.pop()?,
                    };
                    let lhs = self.pop()?;
                    if op.test(&lhs, &rhs)? == *when {
                        *pc = label_pc(func, *target)?;
                    }
                }

                Op::PushNull => self.push(Value::Null),
                Op::Const(c) => self.push(c.to_value()),
                Op::PushFunction(target) => {
                    let value = match target {
                        FuncRef::Script(id) => unit.function_values.get(*id as usize).cloned().flatten(),
                        FuncRef::Host(idx) => unit.host.function(*idx).cloned(),
                    };
                    match value {
                        Some(f) => self.push(Value::Function(f)),
                        None => {
                            return Err(RuntimeError::new(
                                ErrorKind::UnknownFunction,
                                format!("no function value for {target}"),
                            ));
                        }
                    }
                }
                Op::Dup => {
                    let top = self.stack.last().cloned().ok_or_else(|| internal("dup on empty stack"))?;
                    self.push(top);
                }
                Op::Dup2 => {
                    let len = self.stack.len();
                    if len < 2 {
                        return Err(internal("dup2 on a short stack"));
                    }
                    self.stack.extend_from_within(len - 2..);
                }
                Op::Pop(n) => {
                    let len = self.stack.len().saturating_sub(usize::from(*n));
                    self.stack.truncate(len);
                }

                Op::LoadLocal(slot) => {
                    let value = self.stack[base + usize::from(*slot)].clone();
                    self.push(value);
                }
                Op::StoreLocal(slot) => {
                    let value = self.pop()?;
                    self.stack[base + usize::from(*slot)] = value;
                }
                Op::LoadPrivate(idx) => {
                    let value = unit.privates[*idx as usize].read().clone();
                    self.push(value);
                }
                Op::StorePrivate(idx) => {
                    let value = self.pop()?;
                    *unit.privates[*idx as usize].write() = value;
                }
                Op::LoadGlobal(idx) => {
                    let value = unit.globals[*idx as usize].read().clone();
                    self.push(value);
                }
                Op::StoreGlobal(idx) => {
                    let value = self.pop()?;
                    *unit.globals[*idx as usize].write() = value;
                }
                Op::LoadClosure(slot) => {
                    let value = self.load_closure(*slot)?;
                    self.push(value);
                }
                Op::StoreClosure(slot) => {
                    let value = self.pop()?;
                    self.store_closure(*slot, value)?;
                }

                Op::Binary(op, imm) => {
                    let rhs = match imm {
                        Some(c) => c.to_value(),
                        None => self.pop()?,
                    };
                    let lhs = self.pop()?;
                    let result = op.eval(&lhs, &rhs)?;
                    self.push(result);
                }
                Op::Unary(op) => {
                    let operand = self.pop()?;
                    let result = op.eval(&operand)?;
                    self.push(result);
                }

                Op::Call { target, argc, returns } => {
                    let ret = if *returns { ReturnMode::Push } else { ReturnMode::Discard };
                    match target {
                        FuncRef::Script(id) => {
                            self.enter_script(Arc::clone(unit), *id, *argc, ret, None)?;
                            return Ok(Flow::Switch);
                        }
                        FuncRef::Host(idx) => {
                            let Some(callee) = unit.host.function(*idx) else {
                                return Err(RuntimeError::new(
                                    ErrorKind::UnknownFunction,
                                    format!("no host function #{idx}"),
                                ));
                            };
                            if self.invoke(Arc::clone(callee), *argc, ret)? {
                                return Ok(Flow::Switch);
                            }
                        }
                    }
                }
                Op::StackCall { argc } => {
                    let callee_at = self
                        .stack
                        .len()
                        .checked_sub(usize::from(*argc) + 1)
                        .ok_or_else(|| internal("stack call without a callee"))?;
                    let callee = match &self.stack[callee_at] {
                        Value::Function(f) => Arc::clone(f),
                        other => {
                            return Err(RuntimeError::type_mismatch(format!(
                                "cannot call a {}",
                                other.type_name()
                            )));
                        }
                    };
                    let callee = Self::resolve_arity(&callee, *argc, unit)?;
                    if self.invoke(callee, *argc, ReturnMode::ReplaceCallee)? {
                        return Ok(Flow::Switch);
                    }
                }
                Op::SpecialCall { name, argc } => {
                    let receiver_at = self
                        .stack
                        .len()
                        .checked_sub(usize::from(*argc))
                        .ok_or_else(|| internal("method call without a receiver"))?;
                    let tag = self.stack[receiver_at].tag();
                    let Some(method) = unit.host.method(tag, name, *argc) else {
                        return Err(RuntimeError::new(
                            ErrorKind::UnknownMethod,
                            format!("{tag} has no method '{name}' taking {} argument(s)", argc - 1),
                        ));
                    };
                    if self.invoke(Arc::clone(method), *argc, ReturnMode::Push)? {
                        return Ok(Flow::Switch);
                    }
                }

                Op::NewMap => self.push(Value::new_map()),
                Op::MapAppend => {
                    let value = self.pop()?;
                    match self.stack.last() {
                        Some(Value::Map(map)) => map.write().append(value),
                        _ => return Err(internal("map literal without a map")),
                    }
                }
                Op::MapInit => {
                    let value = self.pop()?;
                    let key = self.pop()?;
                    match self.stack.last() {
                        Some(Value::Map(map)) => map.write().set(key, value),
                        _ => return Err(internal("map literal without a map")),
                    }
                }
                Op::GetIndex => {
                    let key = self.pop()?;
                    let object = self.pop()?;
                    let value = get_index(&object, &key)?;
                    self.push(value);
                }
                Op::GetKey(key) => {
                    let object = self.pop()?;
                    let value = get_key(&object, key)?;
                    self.push(value);
                }
                Op::SetIndex => {
                    let value = self.pop()?;
                    let key = self.pop()?;
                    let object = self.pop()?;
                    set_index(&object, key, value)?;
                }
                Op::SetKey(key) => {
                    let value = self.pop()?;
                    let object = self.pop()?;
                    set_index(&object, key.to_value(), value)?;
                }

                Op::MakeClosure(id) => {
                    let Some(proto) = unit.functions.get(*id as usize) else {
                        return Err(missing_function(*id));
                    };
                    let mut env = Vec::with_capacity(proto.captures.len());
                    for source in &proto.captures {
                        env.push(match source {
                            CaptureSource::Local(slot) => self.stack[base + usize::from(*slot)].clone(),
                            CaptureSource::Closure(slot) => self.load_closure(*slot)?,
                        });
                    }
                    let closure = FunctionValue::closure(
                        Arc::clone(&proto.name),
                        proto.arity,
                        proto.returns_value,
                        Arc::downgrade(unit),
                        *id,
                        env,
                    );
                    self.push(Value::Function(Arc::new(closure)));
                }

                Op::ForPrep { var, limit, step, exit } => {
                    let step_value = self.pop()?.to_number()?;
                    let limit_value = self.pop()?.to_number()?;
                    let start = self.pop()?.to_number()?;
                    self.stack[base + usize::from(*var)] = Value::Number(start);
                    self.stack[base + usize::from(*limit)] = Value::Number(limit_value);
                    self.stack[base + usize::from(*step)] = Value::Number(step_value);
                    if !in_range(start, limit_value, step_value) {
                        *pc = label_pc(func, *exit)?;
                    }
                }
                Op::ForStep { var, limit, step, body } => {
                    let step_value = self.stack[base + usize::from(*step)].to_number()?;
                    let limit_value = self.stack[base + usize::from(*limit)].to_number()?;
                    let next = self.stack[base + usize::from(*var)].to_number()? + step_value;
                    self.stack[base + usize::from(*var)] = Value::Number(next);
                    if in_range(next, limit_value, step_value) {
                        *pc = label_pc(func, *body)?;
                    }
                }
                Op::ForEachPrep { cursor } => {
                    let cursor_value = match self.pop()? {
                        Value::Map(map) => Value::Object(ObjectRef::new(MapCursor::new(map))),
                        other => {
                            return Err(RuntimeError::type_mismatch(format!(
                                "cannot iterate over a {}",
                                other.type_name()
                            )));
                        }
                    };
                    self.stack[base + usize::from(*cursor)] = cursor_value;
                }
                Op::ForEachNext { cursor, key, value, exit } => {
                    let next = self.stack[base + usize::from(*cursor)]
                        .as_object()
                        .and_then(|o| o.downcast_ref::<MapCursor>())
                        .ok_or_else(|| internal("foreach cursor slot was overwritten"))?
                        .advance();
                    match next {
                        Some((k, v)) => {
                            if let Some(key) = key {
                                self.stack[base + usize::from(*key)] = k;
                            }
                            self.stack[base + usize::from(*value)] = v;
                        }
                        None => *pc = label_pc(func, *exit)?,
                    }
                }

                Op::PushHandler(target) => {
                    let handler = Handler {
                        pc: label_pc(func, *target)?,
                        depth: self.stack.len(),
                    };
                    self.frames[frame_index].handlers.push(handler);
                }
                Op::PopHandler => {
                    self.frames[frame_index].handlers.pop();
                }
                Op::Throw => {
                    let value = self.pop()?;
                    return Err(RuntimeError::thrown(value));
                }
                Op::Assert { has_message } => {
                    let message = if *has_message { Some(self.pop()?) } else { None };
                    if !self.pop()?.truthy() {
                        let message = message.map_or_else(|| "assertion failed".to_string(), |m| m.display_string());
                        return Err(RuntimeError::new(ErrorKind::AssertionFailed, message));
                    }
                }

                Op::OpenFrame => self.stack.resize(base + usize::from(func.locals), Value::Null),
                Op::CloseFrame => return Ok(Flow::Return(None)),
                Op::CloseFrameValue => {
                    let value = self.pop()?;
                    return Ok(Flow::Return(Some(value)));
                }
            }
        }
    }
}
