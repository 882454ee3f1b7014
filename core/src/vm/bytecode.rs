use std::fmt;
use std::sync::Arc;

use crate::op::{BinOp, UnaryOp};
use crate::resolve::CaptureSource;
use crate::val::Value;

/// Jump target within one function. Labels stay in finalized code as no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Compile-time constant operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Null,
    Number(f64),
    Str(Arc<str>),
}

impl Constant {
    pub fn to_value(&self) -> Value {
        match self {
            Constant::Null => Value::Null,
            Constant::Number(n) => Value::Number(*n),
            Constant::Str(s) => Value::String(s.clone()),
        }
    }

    /// Only scalar results can become constants again.
    pub fn from_value(value: &Value) -> Option<Constant> {
        match value {
            Value::Null => Some(Constant::Null),
            Value::Number(n) => Some(Constant::Number(*n)),
            Value::String(s) => Some(Constant::Str(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Str(s) => write!(f, "{s:?}"),
            other => write!(f, "{}", other.to_value()),
        }
    }
}

/// Callee of a direct call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncRef {
    /// Index into the unit's script functions.
    Script(u32),
    /// Index into the engine's frozen host-function table.
    Host(u32),
}

impl fmt::Display for FuncRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FuncRef::Script(id) => write!(f, "script#{id}"),
            FuncRef::Host(id) => write!(f, "host#{id}"),
        }
    }
}

/// One stack-machine instruction. Stack effects are noted as `[before] -> [after]`.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Label(Label),
    Jump(Label),
    /// `[c] -> []`, jumps when `truthy(c) == when`.
    JumpIf { when: bool, target: Label },
    /// Short-circuit: jumps keeping `v` when `truthy(v) == when`, otherwise pops it.
    JumpOrPop { when: bool, target: Label },
    /// `[l, r] -> []` (or `[l] -> []` with an immediate), jumps when `op.test(l, r) == when`.
    CompareJump {
        op: BinOp,
        imm: Option<Constant>,
        when: bool,
        target: Label,
    },

    PushNull,
    Const(Constant),
    PushFunction(FuncRef),
    /// `[a] -> [a, a]`
    Dup,
    /// `[a, b] -> [a, b, a, b]`
    Dup2,
    Pop(u16),

    LoadLocal(u16),
    StoreLocal(u16),
    LoadPrivate(u32),
    StorePrivate(u32),
    LoadGlobal(u32),
    StoreGlobal(u32),
    LoadClosure(u16),
    StoreClosure(u16),

    /// `[l, r] -> [l op r]`, or `[l] -> [l op imm]` with an immediate.
    Binary(BinOp, Option<Constant>),
    Unary(UnaryOp),

    /// `[args..] -> [result]` (nothing for procedures).
    Call { target: FuncRef, argc: u8, returns: bool },
    /// `[callee, args..] -> [result]`, Null when the callee is a procedure.
    StackCall { argc: u8 },
    /// `[recv, args..] -> [result]`; `argc` counts the receiver.
    SpecialCall { name: Arc<str>, argc: u8 },

    /// `[] -> [map]`
    NewMap,
    /// `[map, v] -> [map]`
    MapAppend,
    /// `[map, k, v] -> [map]`
    MapInit,
    /// `[obj, k] -> [v]`
    GetIndex,
    /// `[obj] -> [v]`
    GetKey(Constant),
    /// `[obj, k, v] -> []`
    SetIndex,
    /// `[obj, v] -> []`
    SetKey(Constant),

    /// Instantiate script function `id` copying its captures. `[] -> [closure]`
    MakeClosure(u32),

    /// `[start, limit, step] -> []`, coerces and stores all three, skips to `exit` if
    /// the loop would not run.
    ForPrep { var: u16, limit: u16, step: u16, exit: Label },
    /// Advance `var` by `step`, jump back to `body` while in range.
    ForStep { var: u16, limit: u16, step: u16, body: Label },
    /// `[map] -> []`, stores a cursor in `cursor`.
    ForEachPrep { cursor: u16 },
    ForEachNext {
        cursor: u16,
        key: Option<u16>,
        value: u16,
        exit: Label,
    },

    /// Install a handler for the current frame; the catch block starts at the label
    /// with the payload pushed.
    PushHandler(Label),
    PopHandler,
    /// `[v] -> !`
    Throw,
    /// `[c] -> []` or `[c, msg] -> []`
    Assert { has_message: bool },

    /// Reserve the frame's non-parameter locals.
    OpenFrame,
    CloseFrame,
    /// `[.., v] -> !`, returns `v`.
    CloseFrameValue,
}

impl Op {
    /// Control never reaches the next instruction.
    pub fn is_terminator(&self) -> bool {
        matches!(self, Op::Jump(_) | Op::Throw | Op::CloseFrame | Op::CloseFrameValue)
    }

    /// Label this instruction may transfer control to.
    pub fn branch_target(&self) -> Option<Label> {
        match self {
            Op::Jump(l)
            | Op::JumpIf { target: l, .. }
            | Op::JumpOrPop { target: l, .. }
            | Op::CompareJump { target: l, .. }
            | Op::ForPrep { exit: l, .. }
            | Op::ForStep { body: l, .. }
            | Op::ForEachNext { exit: l, .. }
            | Op::PushHandler(l) => Some(*l),
            _ => None,
        }
    }

    pub(crate) fn branch_target_mut(&mut self) -> Option<&mut Label> {
        match self {
            Op::Jump(l)
            | Op::JumpIf { target: l, .. }
            | Op::JumpOrPop { target: l, .. }
            | Op::CompareJump { target: l, .. }
            | Op::ForPrep { exit: l, .. }
            | Op::ForStep { body: l, .. }
            | Op::ForEachNext { exit: l, .. }
            | Op::PushHandler(l) => Some(l),
            _ => None,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn imm(c: &Option<Constant>) -> String {
            c.as_ref().map(|c| format!(" {c}")).unwrap_or_default()
        }
        match self {
            Op::Label(l) => write!(f, "{l}:"),
            Op::Jump(l) => write!(f, "jump {l}"),
            Op::JumpIf { when, target } => write!(f, "jump_if {when} {target}"),
            Op::JumpOrPop { when, target } => write!(f, "jump_or_pop {when} {target}"),
            Op::CompareJump { op, imm: c, when, target } => {
                write!(f, "cmp_jump {op}{} {when} {target}", imm(c))
            }
            Op::PushNull => write!(f, "push_null"),
            Op::Const(c) => write!(f, "const {c}"),
            Op::PushFunction(r) => write!(f, "push_function {r}"),
            Op::Dup => write!(f, "dup"),
            Op::Dup2 => write!(f, "dup2"),
            Op::Pop(n) => write!(f, "pop {n}"),
            Op::LoadLocal(i) => write!(f, "load_local {i}"),
            Op::StoreLocal(i) => write!(f, "store_local {i}"),
            Op::LoadPrivate(i) => write!(f, "load_private {i}"),
            Op::StorePrivate(i) => write!(f, "store_private {i}"),
            Op::LoadGlobal(i) => write!(f, "load_global {i}"),
            Op::StoreGlobal(i) => write!(f, "store_global {i}"),
            Op::LoadClosure(i) => write!(f, "load_closure {i}"),
            Op::StoreClosure(i) => write!(f, "store_closure {i}"),
            Op::Binary(op, c) => write!(f, "binary {op}{}", imm(c)),
            Op::Unary(op) => write!(f, "unary {op}"),
            Op::Call { target, argc, returns } => write!(f, "call {target} argc={argc} returns={returns}"),
            Op::StackCall { argc } => write!(f, "stack_call argc={argc}"),
            Op::SpecialCall { name, argc } => write!(f, "special_call {name} argc={argc}"),
            Op::NewMap => write!(f, "new_map"),
            Op::MapAppend => write!(f, "map_append"),
            Op::MapInit => write!(f, "map_init"),
            Op::GetIndex => write!(f, "get_index"),
            Op::GetKey(c) => write!(f, "get_key {c}"),
            Op::SetIndex => write!(f, "set_index"),
            Op::SetKey(c) => write!(f, "set_key {c}"),
            Op::MakeClosure(id) => write!(f, "make_closure script#{id}"),
            Op::ForPrep { var, limit, step, exit } => {
                write!(f, "for_prep var={var} limit={limit} step={step} exit={exit}")
            }
            Op::ForStep { var, limit, step, body } => {
                write!(f, "for_step var={var} limit={limit} step={step} body={body}")
            }
            Op::ForEachPrep { cursor } => write!(f, "foreach_prep cursor={cursor}"),
            Op::ForEachNext { cursor, key, value, exit } => match key {
                Some(k) => write!(f, "foreach_next cursor={cursor} key={k} value={value} exit={exit}"),
                None => write!(f, "foreach_next cursor={cursor} value={value} exit={exit}"),
            },
            Op::PushHandler(l) => write!(f, "push_handler {l}"),
            Op::PopHandler => write!(f, "pop_handler"),
            Op::Throw => write!(f, "throw"),
            Op::Assert { has_message } => write!(f, "assert message={has_message}"),
            Op::OpenFrame => write!(f, "open_frame"),
            Op::CloseFrame => write!(f, "close_frame"),
            Op::CloseFrameValue => write!(f, "close_frame_value"),
        }
    }
}

/// An instruction with the source line it was generated for.
#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    pub op: Op,
    pub line: u32,
}

impl Instr {
    pub fn new(op: Op, line: u32) -> Self {
        Self { op, line }
    }
}

/// Finalized instruction stream with a label-to-pc table.
#[derive(Debug, Clone, Default)]
pub struct Code {
    pub instrs: Vec<Instr>,
    label_pcs: Vec<u32>,
}

impl Code {
    const MISSING: u32 = u32::MAX;

    pub fn new(instrs: Vec<Instr>) -> Self {
        let mut label_pcs = Vec::new();
        for (pc, instr) in instrs.iter().enumerate() {
            if let Op::Label(Label(id)) = instr.op {
                let id = id as usize;
                if label_pcs.len() <= id {
                    label_pcs.resize(id + 1, Self::MISSING);
                }
                label_pcs[id] = pc as u32;
            }
        }
        Self { instrs, label_pcs }
    }

    #[inline]
    pub fn label_pc(&self, label: Label) -> Option<usize> {
        match self.label_pcs.get(label.0 as usize) {
            Some(&pc) if pc != Self::MISSING => Some(pc as usize),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }
}

/// A compiled script function: named, anonymous, or the unit entry.
#[derive(Debug, Clone)]
pub struct ScriptFunction {
    pub name: Arc<str>,
    pub arity: u8,
    pub returns_value: bool,
    /// Frame slots including parameters.
    pub locals: u16,
    /// Deepest operand stack above the locals.
    pub max_stack: u16,
    /// Capture sources in the creating function, for anonymous functions.
    pub captures: Vec<CaptureSource>,
    pub code: Code,
    pub line: u32,
}

impl ScriptFunction {
    /// Slots a call needs above its arguments' base.
    pub fn frame_size(&self) -> usize {
        self.locals as usize + self.max_stack as usize
    }
}
