use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::debug;

use crate::{
    ast::{DeclKind, FunctionDecl, Program, StmtKind},
    error::CompileError,
    resolve::{FunctionLayout, Resolved, ScopeChain, ScopeKind},
    util::{FastHashMap, FrozenTable},
    val::{FunctionValue, Value},
    vm::{
        Code, CompileOptions, CompiledUnit, FuncRef, Instr, Op, ScriptFunction, engine::HostTables, opt, verify,
        unit::ENTRY_FUNCTION,
    },
};

use super::builder::{FunctionBuilder, FunctionRole};

pub(crate) type CompileResult<T> = Result<T, CompileError>;

/// A named script function known from the signature pre-pass.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Signature {
    pub(crate) id: u32,
    pub(crate) arity: u8,
    pub(crate) returns_value: bool,
}

/// Lowers a parsed program into a [`CompiledUnit`].
///
/// Named functions are collected up front so calls may precede declarations; their
/// bodies are compiled where they appear, so they see privates declared above them.
pub(crate) struct Compiler {
    pub(super) host: Arc<HostTables>,
    pub(super) origin: Arc<str>,
    options: CompileOptions,
    pub(super) scopes: ScopeChain,
    pub(super) builders: Vec<FunctionBuilder>,
    functions: Vec<Option<ScriptFunction>>,
    /// Whether each function id gets a first-class value (entry and named ones).
    named: Vec<bool>,
    pub(super) signatures: FastHashMap<(Arc<str>, u8), Signature>,
    pub(super) overloads: FastHashMap<Arc<str>, Vec<Signature>>,
    pub(super) privates: FastHashMap<String, u32>,
    private_names: Vec<Arc<str>>,
    pub(super) globals: FastHashMap<String, u32>,
    global_names: Vec<Arc<str>>,
}

impl Compiler {
    pub(crate) fn new(host: Arc<HostTables>, origin: &str, options: CompileOptions) -> Self {
        Self {
            host,
            origin: Arc::from(origin),
            options,
            scopes: ScopeChain::new(),
            builders: Vec::new(),
            functions: Vec::new(),
            named: Vec::new(),
            signatures: FastHashMap::default(),
            overloads: FastHashMap::default(),
            privates: FastHashMap::default(),
            private_names: Vec::new(),
            globals: FastHashMap::default(),
            global_names: Vec::new(),
        }
    }

    pub(crate) fn compile_program(mut self, program: &Program) -> CompileResult<Arc<CompiledUnit>> {
        self.functions.push(None);
        self.named.push(true);
        self.collect_declarations(program)?;

        let last_line = program.statements.last().map_or(1, |s| s.line);
        self.scopes.push_function(ScopeKind::Function);
        self.builders.push(FunctionBuilder::new(FunctionRole::Entry, 1));
        self.scopes
            .declare_local("args")
            .map_err(|msg| self.error(msg, 1))?;
        self.builder().emit(Op::OpenFrame);
        self.block(&program.statements)?;
        self.builder().set_line(last_line);
        self.builder().emit(Op::PushNull);
        self.builder().emit(Op::CloseFrameValue);
        let entry = self.finish_function("main", 1, FunctionRole::Entry, 1, last_line)?;
        self.functions[ENTRY_FUNCTION as usize] = Some(entry.0);

        let mut functions = Vec::with_capacity(self.functions.len());
        for (id, func) in self.functions.into_iter().enumerate() {
            match func {
                Some(func) => functions.push(func),
                None => {
                    return Err(CompileError::new(
                        format!("internal error: function #{id} was never compiled"),
                        1,
                        self.origin.as_ref(),
                    ));
                }
            }
        }
        debug!(
            target: "kiln::compile",
            origin = %self.origin,
            functions = functions.len(),
            globals = self.global_names.len(),
            privates = self.private_names.len(),
            "unit compiled"
        );

        let signatures: FastHashMap<_, _> = self
            .signatures
            .into_iter()
            .map(|(key, sig)| (key, sig.id))
            .collect();
        let global_names: FastHashMap<Arc<str>, u32> = self
            .global_names
            .iter()
            .enumerate()
            .map(|(i, name)| (Arc::clone(name), i as u32))
            .collect();
        let named = self.named;
        Ok(Arc::new_cyclic(|unit: &Weak<CompiledUnit>| {
            let function_values = functions
                .iter()
                .zip(&named)
                .enumerate()
                .map(|(id, (func, &named))| {
                    named.then(|| {
                        Arc::new(FunctionValue::script(
                            Arc::clone(&func.name),
                            func.arity,
                            func.returns_value,
                            unit.clone(),
                            id as u32,
                        ))
                    })
                })
                .collect();
            CompiledUnit {
                origin: self.origin,
                functions,
                function_values,
                signatures: FrozenTable::from(signatures),
                globals: (0..global_names.len()).map(|_| RwLock::new(Value::Null)).collect(),
                global_names: FrozenTable::from(global_names),
                privates: self.private_names.iter().map(|_| RwLock::new(Value::Null)).collect(),
                private_names: self.private_names,
                host: self.host,
            }
        }))
    }

    /// Pre-pass over top-level statements: function signatures and global names.
    fn collect_declarations(&mut self, program: &Program) -> CompileResult<()> {
        for stmt in &program.statements {
            match &stmt.kind {
                StmtKind::Function(decl) => {
                    let arity = self.arity_of(decl, stmt.line)?;
                    let name: Arc<str> = Arc::from(decl.name.as_str());
                    if self.signatures.contains_key(&(Arc::clone(&name), arity))
                        || (decl.name == "main" && arity == 1)
                    {
                        return Err(self.error(
                            format!("function '{}' with {arity} parameter(s) is already defined", decl.name),
                            stmt.line,
                        ));
                    }
                    let id = self.functions.len() as u32;
                    self.functions.push(None);
                    self.named.push(true);
                    let sig = Signature {
                        id,
                        arity,
                        returns_value: decl.returns_value,
                    };
                    self.signatures.insert((Arc::clone(&name), arity), sig);
                    self.overloads.entry(name).or_default().push(sig);
                }
                StmtKind::Declare {
                    kind: DeclKind::Global,
                    name,
                    ..
                } => {
                    if self.globals.contains_key(name) {
                        return Err(self.error(format!("global '{name}' is already declared"), stmt.line));
                    }
                    self.globals.insert(name.clone(), self.global_names.len() as u32);
                    self.global_names.push(Arc::from(name.as_str()));
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub(super) fn arity_of(&self, decl: &FunctionDecl, line: u32) -> CompileResult<u8> {
        u8::try_from(decl.params.len()).map_err(|_| self.error("too many parameters", line))
    }

    pub(super) fn declare_private(&mut self, name: &str, line: u32) -> CompileResult<u32> {
        if self.privates.contains_key(name) {
            return Err(self.error(format!("private '{name}' is already declared"), line));
        }
        let idx = self.private_names.len() as u32;
        self.privates.insert(name.to_string(), idx);
        self.private_names.push(Arc::from(name));
        Ok(idx)
    }

    /// Compile a named `function`/`sub` whose id was assigned by the pre-pass.
    pub(super) fn named_function(&mut self, decl: &FunctionDecl, line: u32) -> CompileResult<()> {
        let arity = self.arity_of(decl, line)?;
        let Some(sig) = self.signatures.get(&(Arc::from(decl.name.as_str()), arity)).copied() else {
            return Err(self.error(format!("'{}' must be declared at top level", decl.name), line));
        };
        let role = if decl.returns_value {
            FunctionRole::Function
        } else {
            FunctionRole::Sub
        };
        let kind = if decl.returns_value {
            ScopeKind::Function
        } else {
            ScopeKind::Sub
        };
        let (func, _) = self.function_body(decl, kind, role)?;
        self.functions[sig.id as usize] = Some(func);
        Ok(())
    }

    /// Compile an anonymous function and return its id.
    pub(super) fn anonymous_function(&mut self, decl: &FunctionDecl) -> CompileResult<u32> {
        let role = if decl.returns_value {
            FunctionRole::Function
        } else {
            FunctionRole::Sub
        };
        let (func, _) = self.function_body(decl, ScopeKind::Border, role)?;
        let id = self.functions.len() as u32;
        self.functions.push(Some(func));
        self.named.push(false);
        Ok(id)
    }

    fn function_body(
        &mut self,
        decl: &FunctionDecl,
        kind: ScopeKind,
        role: FunctionRole,
    ) -> CompileResult<(ScriptFunction, FunctionLayout)> {
        let arity = self.arity_of(decl, decl.line)?;
        self.scopes.push_function(kind);
        self.builders.push(FunctionBuilder::new(role, decl.line));
        for param in &decl.params {
            self.scopes
                .declare_local(param)
                .map_err(|msg| self.error(msg, decl.line))?;
        }
        self.builder().emit(Op::OpenFrame);
        self.block(&decl.body)?;
        if role == FunctionRole::Sub {
            self.builder().set_line(decl.end_line);
            self.builder().emit(Op::CloseFrame);
        }
        let (mut func, layout) = self.finish_function(&decl.name, arity, role, decl.line, decl.end_line)?;
        func.captures = layout.captures.iter().map(|(_, source)| *source).collect();
        Ok((func, layout))
    }

    /// Pop the innermost builder and scope, optimize, verify and finalize.
    fn finish_function(
        &mut self,
        name: &str,
        arity: u8,
        role: FunctionRole,
        line: u32,
        end_line: u32,
    ) -> CompileResult<(ScriptFunction, FunctionLayout)> {
        let layout = self.scopes.pop_function();
        let Some(builder) = self.builders.pop() else {
            return Err(self.error("internal error: no function under construction", line));
        };
        let mut code: Vec<Instr> = builder.finish();
        let before = code.len();
        let rewrites = if self.options.optimize {
            opt::optimize(&mut code)
        } else {
            0
        };
        let max_stack = verify::verify(&code, role.returns_value(), layout.locals, end_line)
            .map_err(|e| self.error(e.message, e.line))?;
        debug!(
            target: "kiln::compile",
            function = name,
            arity,
            locals = layout.locals,
            max_stack,
            instrs = code.len(),
            removed = before.saturating_sub(code.len()),
            rewrites,
            "function compiled"
        );
        let func = ScriptFunction {
            name: Arc::from(name),
            arity,
            returns_value: role.returns_value(),
            locals: layout.locals,
            max_stack,
            captures: Vec::new(),
            code: Code::new(code),
            line,
        };
        Ok((func, layout))
    }

    #[inline]
    pub(super) fn builder(&mut self) -> &mut FunctionBuilder {
        // the entry builder is pushed before any statement is compiled
        let last = self.builders.len().saturating_sub(1);
        &mut self.builders[last]
    }

    pub(super) fn role(&self) -> FunctionRole {
        self.builders.last().map_or(FunctionRole::Entry, |b| b.role)
    }

    pub(super) fn error(&self, message: impl Into<String>, line: u32) -> CompileError {
        CompileError::new(message, line, self.origin.as_ref())
    }

    pub(super) fn error_here(&self, message: impl Into<String>) -> CompileError {
        let line = self.builders.last().map_or(1, |b| b.line());
        self.error(message, line)
    }

    /// Locals and captures first, then privates declared so far, then globals.
    pub(super) fn resolve_var(&mut self, name: &str) -> Resolved {
        match self.scopes.resolve(name) {
            Resolved::Unresolved => {
                if let Some(&idx) = self.privates.get(name) {
                    Resolved::Private(idx)
                } else if let Some(&idx) = self.globals.get(name) {
                    Resolved::Global(idx)
                } else {
                    Resolved::Unresolved
                }
            }
            found => found,
        }
    }

    /// Direct-call target for `name(argc args)`: unit functions shadow host ones.
    pub(super) fn resolve_call(&self, name: &str, argc: u8) -> Option<(FuncRef, bool)> {
        if let Some(sig) = self.signatures.get(&(Arc::from(name), argc)) {
            return Some((FuncRef::Script(sig.id), sig.returns_value));
        }
        let idx = self.host.function_index(name, argc)?;
        let returns = self.host.function(idx).is_some_and(|f| f.returns_value());
        Some((FuncRef::Host(idx), returns))
    }

    /// A function referenced by bare name as a value. An overloaded name yields its
    /// lowest-arity overload; calling it with another argument count finds the
    /// matching overload at run time.
    pub(super) fn resolve_function_value(&self, name: &str) -> Option<FuncRef> {
        if let Some(sig) = self.overloads.get(name).and_then(|sigs| sigs.iter().min_by_key(|sig| sig.arity)) {
            return Some(FuncRef::Script(sig.id));
        }
        // host overloads are sorted by arity
        self.host.overloads(name).first().map(|&idx| FuncRef::Host(idx))
    }

    pub(super) fn has_function_named(&self, name: &str) -> bool {
        self.overloads.contains_key(name) || !self.host.overloads(name).is_empty()
    }
}
