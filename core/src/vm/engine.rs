use std::sync::Arc;

use tracing::debug;

use crate::{
    ast::Parser,
    error::CompileError,
    util::{FastHashMap, FrozenTable},
    val::{FunctionValue, HostFn, Value, ValueTag},
    vm::{CompileOptions, CompiledUnit, Runtime, compiler::Compiler},
};

type FunctionKey = (Arc<str>, u8);
type MethodKey = (ValueTag, Arc<str>, u8);

/// Frozen host-function and per-type method tables shared by an engine and every
/// unit it compiles.
#[derive(Debug, Default)]
pub(crate) struct HostTables {
    functions: FrozenTable<FunctionKey, Arc<FunctionValue>>,
    methods: FrozenTable<MethodKey, Arc<FunctionValue>>,
}

impl HostTables {
    pub(crate) fn function_index(&self, name: &str, arity: u8) -> Option<u32> {
        self.functions
            .position_by(|(n, a)| (&**n, *a).cmp(&(name, arity)))
            .map(|i| i as u32)
    }

    pub(crate) fn function(&self, index: u32) -> Option<&Arc<FunctionValue>> {
        self.functions.entry(index as usize).map(|(_, f)| f)
    }

    pub(crate) fn lookup(&self, name: &str, arity: u8) -> Option<&Arc<FunctionValue>> {
        self.function_index(name, arity).and_then(|i| self.function(i))
    }

    /// Indices of every host function called `name`.
    pub(crate) fn overloads(&self, name: &str) -> Vec<u32> {
        self.functions
            .span_by(|(n, _)| (**n).cmp(name))
            .map(|i| i as u32)
            .collect()
    }

    pub(crate) fn method(&self, tag: ValueTag, name: &str, arity: u8) -> Option<&Arc<FunctionValue>> {
        self.methods.get_by(|(t, n, a)| {
            t.cmp(&tag)
                .then_with(|| (**n).cmp(name))
                .then_with(|| a.cmp(&arity))
        })
    }
}

/// Collects host functions and type methods, then freezes them into an [`Engine`].
#[derive(Default)]
pub struct EngineBuilder {
    functions: FastHashMap<FunctionKey, Arc<FunctionValue>>,
    methods: FastHashMap<MethodKey, Arc<FunctionValue>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a global host function callable from scripts as `name(args)`.
    /// A later registration with the same name and arity replaces the earlier one.
    pub fn register_host_function<F>(&mut self, name: &str, arity: u8, returns_value: bool, thunk: F) -> &mut Self
    where
        F: Fn(&mut Runtime, &[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let name: Arc<str> = Arc::from(name);
        let thunk: HostFn = Arc::new(thunk);
        let function = Arc::new(FunctionValue::host(name.clone(), arity, returns_value, thunk));
        self.functions.insert((name, arity), function);
        self
    }

    /// Register `function` as method `name` of values tagged `tag`, invoked as
    /// `recv:name(args)`. `arity` counts the receiver. A script function runs in the
    /// unit that compiled it, which must still be alive when the method is called.
    pub fn register_type_method(
        &mut self,
        tag: ValueTag,
        name: &str,
        arity: u8,
        function: Arc<FunctionValue>,
    ) -> &mut Self {
        self.methods.insert((tag, Arc::from(name), arity), function);
        self
    }

    /// Shorthand for [`register_type_method`](Self::register_type_method) with a host thunk.
    pub fn register_host_method<F>(&mut self, tag: ValueTag, name: &str, arity: u8, thunk: F) -> &mut Self
    where
        F: Fn(&mut Runtime, &[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let thunk: HostFn = Arc::new(thunk);
        let function = Arc::new(FunctionValue::host(name, arity, true, thunk));
        self.register_type_method(tag, name, arity, function)
    }

    pub fn build(&self) -> Engine {
        let tables = HostTables {
            functions: FrozenTable::from(self.functions.clone()),
            methods: FrozenTable::from(self.methods.clone()),
        };
        debug!(
            target: "kiln::compile",
            functions = tables.functions.len(),
            methods = tables.methods.len(),
            "engine built"
        );
        Engine {
            tables: Arc::new(tables),
        }
    }
}

/// A frozen set of host bindings. Cheap to clone and shareable across threads.
#[derive(Clone, Default)]
pub struct Engine {
    tables: Arc<HostTables>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Compile `source` into a shareable unit. `origin` labels errors and traces.
    pub fn compile(&self, source: &str, origin: &str) -> Result<Arc<CompiledUnit>, CompileError> {
        self.compile_with(source, origin, &CompileOptions::default())
    }

    pub fn compile_with(
        &self,
        source: &str,
        origin: &str,
        options: &CompileOptions,
    ) -> Result<Arc<CompiledUnit>, CompileError> {
        let program = Parser::parse_source(source).map_err(|e| CompileError::from_parse(e, origin))?;
        Compiler::new(Arc::clone(&self.tables), origin, *options).compile_program(&program)
    }

    pub fn has_host_function(&self, name: &str, arity: u8) -> bool {
        self.tables.function_index(name, arity).is_some()
    }

    pub fn has_method(&self, tag: ValueTag, name: &str, arity: u8) -> bool {
        self.tables.method(tag, name, arity).is_some()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("functions", &self.tables.functions.len())
            .field("methods", &self.tables.methods.len())
            .finish()
    }
}
