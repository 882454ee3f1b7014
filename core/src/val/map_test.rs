#[cfg(test)]
mod tests {
    use crate::val::{ScriptMap, Value};

    fn list(items: &[f64]) -> ScriptMap {
        ScriptMap::from_list(items.iter().map(|&n| Value::Number(n)))
    }

    #[test]
    fn test_append_keeps_ordered() {
        let mut m = ScriptMap::new();
        assert!(m.is_ordered());
        m.append(Value::from("a"));
        m.append(Value::from("b"));
        assert!(m.is_ordered());
        assert_eq!(m.len(), 2);
        assert_eq!(m.get(&Value::Number(1.0)), Some(&Value::from("b")));
    }

    #[test]
    fn test_next_sequential_key_keeps_ordered() {
        let mut m = list(&[10.0]);
        m.set(Value::Number(1.0), Value::Number(20.0));
        assert!(m.is_ordered());
        m.set(Value::Number(5.0), Value::Number(30.0));
        assert!(!m.is_ordered());
    }

    #[test]
    fn test_ordered_never_rederived() {
        let mut m = ScriptMap::new();
        m.set(Value::Number(1.0), Value::Null);
        assert!(!m.is_ordered());
        // keys are now {1, 0}: not in insertion order, so stays cleared
        m.set(Value::Number(0.0), Value::Null);
        assert!(!m.is_ordered());
    }

    #[test]
    fn test_replace_existing_key_keeps_flag() {
        let mut m = list(&[1.0, 2.0]);
        m.set(Value::Number(0.0), Value::from("x"));
        assert!(m.is_ordered());
        assert_eq!(m.len(), 2);
        assert_eq!(m.get(&Value::Number(0.0)), Some(&Value::from("x")));
    }

    #[test]
    fn test_string_key_clears_ordered() {
        let mut m = list(&[1.0]);
        m.set(Value::from("name"), Value::from("kiln"));
        assert!(!m.is_ordered());
        assert_eq!(m.get_str("name"), Some(&Value::from("kiln")));
    }

    #[test]
    fn test_negative_zero_is_zero() {
        let mut m = ScriptMap::new();
        m.set(Value::Number(-0.0), Value::from("z"));
        assert!(m.is_ordered());
        assert_eq!(m.get(&Value::Number(0.0)), Some(&Value::from("z")));
    }

    #[test]
    fn test_other_keys_use_linear_scan() {
        let key = Value::new_map();
        let mut m = ScriptMap::new();
        m.set(Value::Number(1.5), Value::from("frac"));
        m.set(key.clone(), Value::from("map"));
        assert_eq!(m.get(&Value::Number(1.5)), Some(&Value::from("frac")));
        assert_eq!(m.get(&key), Some(&Value::from("map")));
        assert_eq!(m.get(&Value::new_map()), None);
    }

    #[test]
    fn test_missing_key() {
        let m = list(&[1.0]);
        assert!(m.get(&Value::Number(3.0)).is_none());
        assert!(m.get(&Value::from("0")).is_none());
    }

    #[test]
    fn test_entry_follows_insertion_order() {
        let mut m = ScriptMap::new();
        m.set(Value::from("b"), Value::Number(1.0));
        m.set(Value::from("a"), Value::Number(2.0));
        let (k, v) = m.entry(1).unwrap();
        assert_eq!(k, &Value::from("a"));
        assert_eq!(v, &Value::Number(2.0));
        assert!(m.entry(2).is_none());
    }

    #[test]
    fn test_concat_lists() {
        let out = ScriptMap::concat(&list(&[1.0, 2.0]), &list(&[3.0]));
        assert!(out.is_ordered());
        assert_eq!(out.len(), 3);
        assert_eq!(out.get(&Value::Number(2.0)), Some(&Value::Number(3.0)));
    }

    #[test]
    fn test_concat_merge_right_wins() {
        let mut left = ScriptMap::new();
        left.set(Value::from("a"), Value::Number(1.0));
        left.set(Value::from("b"), Value::Number(2.0));
        let mut right = ScriptMap::new();
        right.set(Value::from("b"), Value::Number(20.0));
        right.set(Value::from("c"), Value::Number(30.0));
        let out = ScriptMap::concat(&left, &right);
        assert_eq!(out.len(), 3);
        assert_eq!(out.get_str("a"), Some(&Value::Number(1.0)));
        assert_eq!(out.get_str("b"), Some(&Value::Number(20.0)));
        assert_eq!(out.get_str("c"), Some(&Value::Number(30.0)));
    }

    #[test]
    fn test_concat_list_with_dict_merges_indices() {
        let mut right = ScriptMap::new();
        right.set(Value::Number(0.0), Value::from("r0"));
        right.set(Value::from("k"), Value::from("rk"));
        let out = ScriptMap::concat(&list(&[1.0, 2.0]), &right);
        assert_eq!(out.len(), 3);
        assert_eq!(out.get(&Value::Number(0.0)), Some(&Value::from("r0")));
        assert_eq!(out.get(&Value::Number(1.0)), Some(&Value::Number(2.0)));
    }

    mod concat_property {
        use super::list;
        use crate::val::{ScriptMap, Value};
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn ordered_concat_preserves_both_sides(
                a in proptest::collection::vec(-1e6f64..1e6, 0..32),
                b in proptest::collection::vec(-1e6f64..1e6, 0..32),
            ) {
                let m1 = list(&a);
                let m2 = list(&b);
                let out = ScriptMap::concat(&m1, &m2);
                prop_assert!(out.is_ordered());
                prop_assert_eq!(out.len(), m1.len() + m2.len());
                for i in 0..out.len() {
                    let expected = if i < m1.len() {
                        m1.get(&Value::from(i))
                    } else {
                        m2.get(&Value::from(i - m1.len()))
                    };
                    prop_assert_eq!(out.get(&Value::from(i)), expected);
                }
            }
        }
    }
}
