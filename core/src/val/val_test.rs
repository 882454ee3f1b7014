#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use crate::error::ErrorKind;
    use crate::val::{ObjectRef, ScriptMap, Value};

    fn list(items: &[f64]) -> Value {
        Value::from(items.iter().map(|&n| Value::Number(n)).collect::<Vec<_>>())
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.truthy());
        assert!(!Value::Number(0.0).truthy());
        assert!(Value::Number(-2.0).truthy());
        assert!(!Value::from("").truthy());
        assert!(Value::from("x").truthy());
        assert!(!Value::new_map().truthy());
        assert!(list(&[1.0]).truthy());
        assert!(Value::from(ObjectRef::new(5u8)).truthy());
    }

    #[test]
    fn test_equality_never_errors_on_mismatch() {
        assert_eq!(Value::Null, Value::Null);
        assert_ne!(Value::Number(1.0), Value::from("1"));
        assert_ne!(Value::Null, Value::Number(0.0));
        assert_eq!(Value::from("ab"), Value::from(String::from("ab")));
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
    }

    #[test]
    fn test_maps_compare_by_identity() {
        let a = list(&[1.0, 2.0]);
        let b = list(&[1.0, 2.0]);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_objects_compare_by_identity() {
        let o = ObjectRef::new(String::from("handle"));
        assert_eq!(Value::from(o.clone()), Value::from(o));
        assert_ne!(Value::from(ObjectRef::new(1u8)), Value::from(ObjectRef::new(1u8)));
    }

    #[test]
    fn test_ordering() {
        assert_eq!(Value::Null.compare(&Value::Null).unwrap(), Ordering::Equal);
        assert_eq!(Value::Number(1.0).compare(&Value::Number(2.0)).unwrap(), Ordering::Less);
        assert_eq!(Value::from("b").compare(&Value::from("a")).unwrap(), Ordering::Greater);
        let err = Value::Number(1.0).compare(&Value::from("1")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
        let err = list(&[]).compare(&list(&[])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_string_number_coercion() {
        assert_eq!(Value::from(" 42 ").to_number().unwrap(), 42.0);
        assert_eq!(Value::from("abc").to_number().unwrap_err().kind, ErrorKind::TypeMismatch);
        assert_eq!(Value::Null.to_number().unwrap_err().kind, ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_to_i32_saturates() {
        assert_eq!(Value::Number(f64::NAN).to_i32().unwrap(), 0);
        assert_eq!(Value::Number(1e20).to_i32().unwrap(), i32::MAX);
        assert_eq!(Value::Number(-3.9).to_i32().unwrap(), -3);
    }

    #[test]
    fn test_len() {
        assert_eq!(Value::from("héllo").len().unwrap(), 5);
        assert_eq!(list(&[1.0, 2.0, 3.0]).len().unwrap(), 3);
        assert!(Value::Number(1.0).len().is_err());
    }

    #[test]
    fn test_display_numbers() {
        assert_eq!(Value::Number(7.0).to_string(), "7");
        assert_eq!(Value::Number(-0.5).to_string(), "-0.5");
        assert_eq!(Value::Number(1e20).to_string(), "1e20");
        assert_eq!(Value::Number(f64::NAN).to_string(), "NaN");
        assert_eq!(Value::Number(f64::NEG_INFINITY).to_string(), "-Infinity");
    }

    #[test]
    fn test_display_maps() {
        assert_eq!(list(&[1.0, 2.0]).to_string(), "[1, 2]");
        let mut m = ScriptMap::new();
        m.set(Value::from("a"), Value::from("x"));
        m.set(Value::Number(2.0), Value::Null);
        assert_eq!(Value::from(m).to_string(), r#"{"a": "x", 2: null}"#);
        assert_eq!(Value::Null.to_string(), "null");
    }

    #[test]
    fn test_display_self_reference_terminates() {
        let m = Value::new_map();
        if let Value::Map(cell) = &m {
            cell.write().append(m.clone());
        }
        let shown = m.to_string();
        assert!(shown.starts_with("[["));
        assert!(shown.contains("{...}"));
    }

    #[test]
    fn test_concat_strings() {
        let v = Value::concat_strings(&Value::from("n="), &Value::Number(3.0));
        assert_eq!(v, Value::from("n=3"));
        let v = Value::concat_strings(&Value::Null, &list(&[1.0]));
        assert_eq!(v, Value::from("null[1]"));
    }

    #[test]
    fn test_concat_maps_always_new() {
        let a = list(&[1.0]);
        let out = Value::concat_maps(&a, &list(&[])).unwrap();
        assert_ne!(out, a);
        assert_eq!(out.len().unwrap(), 1);
        let self_concat = Value::concat_maps(&a, &a).unwrap();
        assert_eq!(self_concat.to_string(), "[1, 1]");
        let err = Value::concat_maps(&a, &Value::Number(1.0)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
    }
}
