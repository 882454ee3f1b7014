use std::sync::Arc;

use crate::util::FastHashMap;

use super::Value;

/// Index class of a key.
enum KeyClass<'a> {
    Int(i64),
    Str(&'a Arc<str>),
    Other,
}

/// Largest magnitude at which every integral `f64` is exact.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

fn classify(key: &Value) -> KeyClass<'_> {
    match key {
        Value::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_EXACT_INT => KeyClass::Int(*n as i64),
        Value::String(s) => KeyClass::Str(s),
        _ => KeyClass::Other,
    }
}

/// Hybrid list/dictionary.
///
/// Entries are kept in insertion order. Integral number keys and string keys are
/// additionally indexed; any other key (fractional numbers, maps, functions...) is
/// found by a linear scan using value equality. `ordered` holds while the keys are
/// exactly `0..len` in insertion order and is never re-derived once cleared.
#[derive(Clone, Debug)]
pub struct ScriptMap {
    entries: Vec<(Value, Value)>,
    int_index: FastHashMap<i64, usize>,
    str_index: FastHashMap<Arc<str>, usize>,
    ordered: bool,
}

impl Default for ScriptMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptMap {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            int_index: crate::util::fast_hash_map_with_capacity(capacity),
            str_index: FastHashMap::default(),
            ordered: true,
        }
    }

    /// Build a list: keys `0..items.len()`.
    pub fn from_list(items: impl IntoIterator<Item = Value>) -> Self {
        let iter = items.into_iter();
        let mut map = Self::with_capacity(iter.size_hint().0);
        for item in iter {
            map.append(item);
        }
        map
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    fn find(&self, key: &Value) -> Option<usize> {
        match classify(key) {
            KeyClass::Int(i) => self.int_index.get(&i).copied(),
            KeyClass::Str(s) => self.str_index.get(s).copied(),
            KeyClass::Other => self.entries.iter().position(|(k, _)| k == key),
        }
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.find(key).is_some()
    }

    /// Lookup; missing keys read as `None` (Null at the language level).
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.find(key).map(|i| &self.entries[i].1)
    }

    pub fn get_str(&self, key: &str) -> Option<&Value> {
        self.str_index.get(key).map(|&i| &self.entries[i].1)
    }

    /// Insert or replace. A new key keeps the map ordered only when it is the next
    /// sequential integer; replacing an existing key never touches the flag.
    pub fn set(&mut self, key: Value, value: Value) {
        if let Some(i) = self.find(&key) {
            self.entries[i].1 = value;
            return;
        }
        let pos = self.entries.len();
        match classify(&key) {
            KeyClass::Int(i) => {
                if i != pos as i64 {
                    self.ordered = false;
                }
                self.int_index.insert(i, pos);
            }
            KeyClass::Str(s) => {
                self.ordered = false;
                self.str_index.insert(s.clone(), pos);
            }
            KeyClass::Other => self.ordered = false,
        }
        // normalise -0 so it displays and iterates as 0
        let key = match key {
            Value::Number(n) if n == 0.0 => Value::Number(0.0),
            other => other,
        };
        self.entries.push((key, value));
    }

    /// Add at key `len()`.
    pub fn append(&mut self, value: Value) {
        let key = Value::from(self.entries.len());
        self.set(key, value);
    }

    /// The `i`-th entry in insertion order, used by foreach cursors.
    pub fn entry(&self, i: usize) -> Option<(&Value, &Value)> {
        self.entries.get(i).map(|(k, v)| (k, v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> + '_ {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> + '_ {
        self.entries.iter().map(|(_, v)| v)
    }

    /// `left ++ right`: two lists concatenate; anything else merges key-wise with
    /// `right` winning.
    pub fn concat(left: &ScriptMap, right: &ScriptMap) -> ScriptMap {
        if left.ordered && right.ordered {
            return ScriptMap::from_list(left.values().chain(right.values()).cloned());
        }
        let mut out = left.clone();
        for (k, v) in right.iter() {
            out.set(k.clone(), v.clone());
        }
        out
    }
}
