use std::{fmt, sync::Arc};

use crate::val::{FunctionValue, ScriptMap};

use super::{MapRef, ObjectRef, Value};

/// Nested maps deeper than this are elided when displayed, which also keeps
/// self-referencing maps printable.
const DISPLAY_DEPTH: usize = 8;

/// Integral numbers below this magnitude print without a fraction.
const INTEGRAL_DISPLAY_LIMIT: f64 = 1e15;

pub(crate) fn format_number(n: f64, out: &mut String) {
    if n.is_nan() {
        out.push_str("NaN");
    } else if n.is_infinite() {
        out.push_str(if n > 0.0 { "Infinity" } else { "-Infinity" });
    } else if n.fract() == 0.0 && n.abs() < INTEGRAL_DISPLAY_LIMIT {
        let mut buf = itoa::Buffer::new();
        out.push_str(buf.format(n as i64));
    } else {
        let mut buf = ryu::Buffer::new();
        out.push_str(buf.format_finite(n));
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Arc<str>> for Value {
    fn from(s: Arc<str>) -> Self {
        Value::String(s)
    }
}

impl From<ScriptMap> for Value {
    fn from(map: ScriptMap) -> Self {
        Value::Map(MapRef::new(map))
    }
}

/// A vector becomes an ordered map (a list).
impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::from(ScriptMap::from_list(items))
    }
}

impl From<Arc<FunctionValue>> for Value {
    fn from(f: Arc<FunctionValue>) -> Self {
        Value::Function(f)
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Value::Object(o)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl Value {
    fn write_display(&self, out: &mut String, depth: usize, nested: bool) {
        match self {
            Value::Null => out.push_str("null"),
            Value::Number(n) => format_number(*n, out),
            Value::String(s) if nested => {
                out.push('"');
                out.push_str(s);
                out.push('"');
            }
            Value::String(s) => out.push_str(s),
            Value::Map(m) => {
                if depth >= DISPLAY_DEPTH {
                    out.push_str("{...}");
                    return;
                }
                let map = m.read();
                if map.is_ordered() {
                    out.push('[');
                    for (i, (_, v)) in map.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        v.write_display(out, depth + 1, true);
                    }
                    out.push(']');
                } else {
                    out.push('{');
                    for (i, (k, v)) in map.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        k.write_display(out, depth + 1, true);
                        out.push_str(": ");
                        v.write_display(out, depth + 1, true);
                    }
                    out.push('}');
                }
            }
            Value::Function(f) => {
                out.push_str("function ");
                out.push_str(f.name());
                out.push('/');
                let mut buf = itoa::Buffer::new();
                out.push_str(buf.format(f.arity()));
            }
            Value::Object(_) => out.push_str("object"),
        }
    }

    /// Display-string form used by `..` and by hosts printing results.
    pub fn display_string(&self) -> String {
        match self {
            Value::String(s) => s.to_string(),
            other => {
                let mut out = String::new();
                other.write_display(&mut out, 0, false);
                out
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_display(&mut out, 0, true);
        f.write_str(&out)
    }
}
