use std::{
    fmt,
    sync::{Arc, Weak},
};

use parking_lot::Mutex;

use crate::vm::{CompiledUnit, Runtime};

use super::Value;

/// A host-implemented callable. It receives the calling runtime so it can re-enter
/// script code through [`Runtime::call`].
pub type HostFn = Arc<dyn Fn(&mut Runtime, &[Value]) -> anyhow::Result<Value> + Send + Sync>;

pub enum FunctionBody {
    /// Function `id` of the unit that compiled it. The unit is held weakly since
    /// its own globals may store this value. `env` is present for closures: the
    /// captured values, copied when the closure was instantiated.
    Script {
        unit: Weak<CompiledUnit>,
        id: u32,
        env: Option<Mutex<Vec<Value>>>,
    },
    Host(HostFn),
}

/// A first-class function value.
pub struct FunctionValue {
    name: Arc<str>,
    arity: u8,
    returns_value: bool,
    body: FunctionBody,
}

impl FunctionValue {
    pub fn script(name: Arc<str>, arity: u8, returns_value: bool, unit: Weak<CompiledUnit>, id: u32) -> Self {
        Self {
            name,
            arity,
            returns_value,
            body: FunctionBody::Script { unit, id, env: None },
        }
    }

    pub fn closure(
        name: Arc<str>,
        arity: u8,
        returns_value: bool,
        unit: Weak<CompiledUnit>,
        id: u32,
        env: Vec<Value>,
    ) -> Self {
        Self {
            name,
            arity,
            returns_value,
            body: FunctionBody::Script {
                unit,
                id,
                env: Some(Mutex::new(env)),
            },
        }
    }

    pub fn host(name: impl Into<Arc<str>>, arity: u8, returns_value: bool, thunk: HostFn) -> Self {
        Self {
            name: name.into(),
            arity,
            returns_value,
            body: FunctionBody::Host(thunk),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn arity(&self) -> u8 {
        self.arity
    }

    #[inline]
    pub fn returns_value(&self) -> bool {
        self.returns_value
    }

    #[inline]
    pub fn body(&self) -> &FunctionBody {
        &self.body
    }

    /// The unit a script function runs in, while that unit is alive.
    pub fn owner(&self) -> Option<Arc<CompiledUnit>> {
        match &self.body {
            FunctionBody::Script { unit, .. } => unit.upgrade(),
            FunctionBody::Host(_) => None,
        }
    }

    pub fn is_closure(&self) -> bool {
        matches!(self.body, FunctionBody::Script { env: Some(_), .. })
    }
}

impl fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.body {
            FunctionBody::Script { env: Some(_), .. } => "closure",
            FunctionBody::Script { .. } => "script",
            FunctionBody::Host(_) => "host",
        };
        f.debug_struct("FunctionValue")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("returns_value", &self.returns_value)
            .field("kind", &kind)
            .finish()
    }
}
