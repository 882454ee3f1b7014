use std::{any::Any, fmt, sync::Arc};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::RuntimeError;
use crate::val::{FunctionValue, ScriptMap};

mod convert;
mod ops;

/// The runtime type of a [`Value`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueTag {
    Null,
    Number,
    String,
    Map,
    Function,
    Object,
}

impl ValueTag {
    pub fn name(self) -> &'static str {
        match self {
            ValueTag::Null => "Null",
            ValueTag::Number => "Number",
            ValueTag::String => "String",
            ValueTag::Map => "Map",
            ValueTag::Function => "Function",
            ValueTag::Object => "Object",
        }
    }
}

impl fmt::Display for ValueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shared, mutable map cell. Cloning aliases the same map.
#[derive(Clone, Default)]
pub struct MapRef(Arc<RwLock<ScriptMap>>);

impl MapRef {
    pub fn new(map: ScriptMap) -> Self {
        Self(Arc::new(RwLock::new(map)))
    }

    /// Reads are recursive so nested traversal of self-referencing maps cannot deadlock.
    pub fn read(&self) -> RwLockReadGuard<'_, ScriptMap> {
        self.0.read_recursive()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, ScriptMap> {
        self.0.write()
    }

    pub fn ptr_eq(&self, other: &MapRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Opaque host handle. Scripts can store and compare it but never look inside.
#[derive(Clone)]
pub struct ObjectRef(Arc<dyn Any + Send + Sync>);

impl ObjectRef {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

/// A script value. Exactly one variant is active; cloning copies the tag and either
/// the number bits or a shared reference.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Number(f64),
    /// Strings are immutable and shared
    String(Arc<str>),
    Map(MapRef),
    Function(Arc<FunctionValue>),
    Object(ObjectRef),
}

impl Value {
    #[inline]
    pub fn tag(&self) -> ValueTag {
        match self {
            Value::Null => ValueTag::Null,
            Value::Number(_) => ValueTag::Number,
            Value::String(_) => ValueTag::String,
            Value::Map(_) => ValueTag::Map,
            Value::Function(_) => ValueTag::Function,
            Value::Object(_) => ValueTag::Object,
        }
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.tag().name()
    }

    #[inline]
    pub fn from_bool(b: bool) -> Value {
        Value::Number(if b { 1.0 } else { 0.0 })
    }

    pub fn new_map() -> Value {
        Value::Map(MapRef::default())
    }

    /// Null is false, numbers are true when non-zero, strings and maps when non-empty.
    #[inline]
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Map(m) => !m.read().is_empty(),
            Value::Function(_) | Value::Object(_) => true,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapRef> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Arc<FunctionValue>> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Numeric coercion used by arithmetic: numbers pass through, strings are parsed.
    pub fn to_number(&self) -> Result<f64, RuntimeError> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| RuntimeError::type_mismatch(format!("cannot convert string {s:?} to a number"))),
            other => Err(RuntimeError::type_mismatch(format!(
                "expected a number, found {}",
                other.type_name()
            ))),
        }
    }

    /// Truncate to a 32-bit signed integer (saturating, NaN → 0) for bitwise operators.
    #[inline]
    pub fn to_i32(&self) -> Result<i32, RuntimeError> {
        Ok(self.to_number()? as i32)
    }

    /// Length of a string (in characters) or a map (in entries).
    pub fn len(&self) -> Result<usize, RuntimeError> {
        match self {
            Value::String(s) => Ok(s.chars().count()),
            Value::Map(m) => Ok(m.read().len()),
            other => Err(RuntimeError::type_mismatch(format!(
                "{} has no length",
                other.type_name()
            ))),
        }
    }
}

impl PartialEq for Value {
    /// Type mismatch is never an error, just unequal. Maps, functions and objects
    /// compare by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}
