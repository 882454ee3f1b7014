use std::cmp::Ordering;

use crate::error::RuntimeError;
use crate::val::ScriptMap;

use super::Value;

impl Value {
    /// Ordering for `< <= > >=`. Only Null (always equal), Number and String are orderable.
    pub fn compare(&self, other: &Value) -> Result<Ordering, RuntimeError> {
        match (self, other) {
            (Value::Null, Value::Null) => Ok(Ordering::Equal),
            (Value::Number(a), Value::Number(b)) => a
                .partial_cmp(b)
                .ok_or_else(|| RuntimeError::type_mismatch("cannot order NaN")),
            (Value::String(a), Value::String(b)) => Ok(a.as_ref().cmp(b.as_ref())),
            (l, r) if l.tag() != r.tag() => Err(RuntimeError::type_mismatch(format!(
                "cannot compare {} with {}",
                l.type_name(),
                r.type_name()
            ))),
            (l, _) => Err(RuntimeError::type_mismatch(format!(
                "{} values are not orderable",
                l.type_name()
            ))),
        }
    }

    /// `l .. r`: concatenation of both display strings.
    pub fn concat_strings(l: &Value, r: &Value) -> Value {
        match (l, r) {
            (Value::String(a), Value::String(b)) if b.is_empty() => Value::String(a.clone()),
            (Value::String(a), Value::String(b)) if a.is_empty() => Value::String(b.clone()),
            _ => {
                let mut out = l.display_string();
                out.push_str(&r.display_string());
                Value::from(out)
            }
        }
    }

    /// `l ++ r`: list concatenation when both maps are ordered, otherwise a key-wise
    /// merge where right-hand entries win. Always produces a new map.
    pub fn concat_maps(l: &Value, r: &Value) -> Result<Value, RuntimeError> {
        match (l, r) {
            (Value::Map(a), Value::Map(b)) => {
                // Snapshot the right side first so `m ++ m` never holds two guards at once
                let right = b.read().clone();
                let merged = ScriptMap::concat(&a.read(), &right);
                Ok(Value::from(merged))
            }
            _ => Err(RuntimeError::type_mismatch(format!(
                "cannot concatenate {} with {} as maps",
                l.type_name(),
                r.type_name()
            ))),
        }
    }
}
