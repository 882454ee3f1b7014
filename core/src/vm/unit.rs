use std::{fmt::Write, sync::Arc};

use parking_lot::RwLock;

use crate::{
    util::FrozenTable,
    val::{FunctionValue, Value},
    vm::{ScriptFunction, engine::HostTables},
};

/// Id of the entry function of every unit.
pub const ENTRY_FUNCTION: u32 = 0;

/// The output of compilation: immutable function tables plus the unit's mutable
/// global and private slots. Share it between threads with `Arc`.
pub struct CompiledUnit {
    pub(crate) origin: Arc<str>,
    pub(crate) functions: Vec<ScriptFunction>,
    /// First-class values of the entry and named functions; `None` for anonymous ones.
    pub(crate) function_values: Vec<Option<Arc<FunctionValue>>>,
    pub(crate) signatures: FrozenTable<(Arc<str>, u8), u32>,
    pub(crate) global_names: FrozenTable<Arc<str>, u32>,
    pub(crate) globals: Vec<RwLock<Value>>,
    pub(crate) private_names: Vec<Arc<str>>,
    pub(crate) privates: Vec<RwLock<Value>>,
    pub(crate) host: Arc<HostTables>,
}

impl CompiledUnit {
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn functions(&self) -> &[ScriptFunction] {
        &self.functions
    }

    pub fn entry(&self) -> &ScriptFunction {
        &self.functions[ENTRY_FUNCTION as usize]
    }

    /// Named script function by exact signature.
    pub fn function(&self, name: &str, arity: u8) -> Option<&ScriptFunction> {
        self.signature(name, arity).map(|id| &self.functions[id as usize])
    }

    fn signature(&self, name: &str, arity: u8) -> Option<u32> {
        self.signatures
            .get_by(|(n, a)| (&**n, *a).cmp(&(name, arity)))
            .copied()
    }

    /// Resolve `(name, arity)` against the unit's functions, then the host table.
    pub(crate) fn lookup_function(&self, name: &str, arity: u8) -> Option<Arc<FunctionValue>> {
        if let Some(value) = self
            .signature(name, arity)
            .and_then(|id| self.function_values.get(id as usize))
            .and_then(Option::as_ref)
        {
            return Some(Arc::clone(value));
        }
        self.host.lookup(name, arity).cloned()
    }

    /// A named function as a first-class value.
    pub fn function_value(&self, name: &str, arity: u8) -> Option<Value> {
        self.lookup_function(name, arity).map(Value::Function)
    }

    fn global_index(&self, name: &str) -> Option<usize> {
        self.global_names
            .get_by(|n| (**n).cmp(name))
            .map(|&i| i as usize)
    }

    pub fn global_names(&self) -> impl Iterator<Item = &str> {
        self.global_names.iter().map(|(n, _)| n.as_ref())
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.global_index(name).map(|i| self.globals[i].read().clone())
    }

    /// Overwrite a global slot. Returns false for undeclared names.
    pub fn set_global(&self, name: &str, value: Value) -> bool {
        match self.global_index(name) {
            Some(i) => {
                *self.globals[i].write() = value;
                true
            }
            None => false,
        }
    }

    /// Human-readable listing of every function's finalized instructions.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        for (id, func) in self.functions.iter().enumerate() {
            let kind = if func.returns_value { "function" } else { "sub" };
            let _ = writeln!(
                out,
                "{kind} {}/{} #{id} (locals={}, max_stack={}, captures={}, line {})",
                func.name,
                func.arity,
                func.locals,
                func.max_stack,
                func.captures.len(),
                func.line,
            );
            for (pc, instr) in func.code.instrs.iter().enumerate() {
                let _ = match instr.op {
                    crate::vm::Op::Label(_) => writeln!(out, "  {pc:04} {:>4}  {}", instr.line, instr.op),
                    _ => writeln!(out, "  {pc:04} {:>4}      {}", instr.line, instr.op),
                };
            }
        }
        if !self.private_names.is_empty() {
            let _ = writeln!(out, "privates: {}", self.private_names.join(", "));
        }
        if !self.global_names.is_empty() {
            let names: Vec<&str> = self.global_names().collect();
            let _ = writeln!(out, "globals: {}", names.join(", "));
        }
        out
    }
}

impl std::fmt::Debug for CompiledUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledUnit")
            .field("origin", &self.origin)
            .field("functions", &self.functions.len())
            .field("globals", &self.globals.len())
            .field("privates", &self.privates.len())
            .finish()
    }
}
