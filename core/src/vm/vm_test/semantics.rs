use super::*;

#[test]
fn test_vm_arithmetic_and_coercion() {
    assert_eq!(run("return 7 % 3 + 10 / 4"), num(3.5));
    assert_eq!(run("return -7 % 3"), num(-1.0));
    assert_eq!(run(r#"return "2" * "21""#), num(42.0));
    assert_eq!(run(r#"local a = "4" return a + 1"#), num(5.0));
}

#[test]
fn test_vm_arithmetic_type_errors() {
    assert_eq!(run_err(r#"local s = "abc" return s + 1"#).kind, ErrorKind::TypeMismatch);
    assert_eq!(run_err("local n = null return n + 1").kind, ErrorKind::TypeMismatch);
    assert_eq!(run_err("local m = {} return m * 2").kind, ErrorKind::TypeMismatch);
}

#[test]
fn test_vm_bitwise() {
    assert_eq!(run("local a = 6 return a & 3"), num(2.0));
    assert_eq!(run("local a = 6 return a | 9"), num(15.0));
    assert_eq!(run("local a = 6 return a ^ 5"), num(3.0));
    assert_eq!(run("local a = 1 return a << 33"), num(2.0));
    assert_eq!(run("local a = -16 return a >> 2"), num(-4.0));
    assert_eq!(run("local a = -1 return a >>> 28"), num(15.0));
    assert_eq!(run("local a = 5.9 return ~a"), num(-6.0));
}

#[test]
fn test_vm_comparisons_produce_numbers() {
    assert_eq!(run("local a = 1 return a < 2"), num(1.0));
    assert_eq!(run(r#"local a = "abc" return a < "abd""#), num(1.0));
    assert_eq!(run("local a = null return a <= null"), num(1.0));
    assert_eq!(run("local a = 2 return not (a > 1)"), num(0.0));
    assert_eq!(run(r#"local a = 1 return a == "1""#), num(0.0));
}

#[test]
fn test_vm_ordering_mismatch_is_type_error() {
    assert_eq!(run_err(r#"local a = 1 return a < "2""#).kind, ErrorKind::TypeMismatch);
    assert_eq!(run_err("local a = {} return a < {}").kind, ErrorKind::TypeMismatch);
}

#[test]
fn test_vm_truthiness() {
    let out = run(r#"
        local r = ""
        for v in {0, 1, "", "x", {}, {1}} do
            if v then r = r .. "T" else r = r .. "F" end
        end
        if null then r = r .. "T" else r = r .. "F" end
        return r
    "#);
    assert_eq!(out, Value::from("FTFTFTF"));
}

#[test]
fn test_vm_map_identity() {
    let out = run(r#"
        local a = {1, 2}
        local b = {1, 2}
        local c = a
        return (a == b) .. (a == a) .. (a == c) .. (a != b)
    "#);
    assert_eq!(out, Value::from("0111"));
}

#[test]
fn test_vm_maps_alias_on_assignment() {
    let out = run(r#"
        local a = {x = 1}
        local b = a
        b.x = 5
        return a.x
    "#);
    assert_eq!(out, num(5.0));
}

#[test]
fn test_vm_map_reads_and_writes() {
    let out = run(r#"
        local m = {10, 20, name = "kiln", [1 + 1] = 30}
        m.extra = m[0] + m[1]
        m["name"] = m.name .. "!"
        return m.extra .. m.name .. m[2] .. #m
    "#);
    assert_eq!(out, Value::from("30kiln!305"));
}

#[test]
fn test_vm_missing_key_is_null() {
    assert_eq!(run("local m = {} return m.nope"), Value::Null);
    assert_eq!(run("local m = {1} return m[5]"), Value::Null);
}

#[test]
fn test_vm_index_non_map_is_type_error() {
    assert_eq!(run_err("local n = 3 return n[0]").kind, ErrorKind::TypeMismatch);
    assert_eq!(run_err("local n = 3 n.x = 1").kind, ErrorKind::TypeMismatch);
}

#[test]
fn test_vm_compound_assignment() {
    let out = run(r#"
        local m = {1, 2}
        local s = "a"
        m[0] += 10
        m[1] *= 3
        s ..= "b"
        local obj = {count = 1}
        obj.count -= 3
        return m[0] .. "," .. m[1] .. "," .. s .. "," .. obj.count
    "#);
    assert_eq!(out, Value::from("11,6,ab,-2"));
}

#[test]
fn test_vm_string_concat_display() {
    assert_eq!(run(r#"return "n=" .. 1.5 .. "," .. 2 .. "," .. null"#), Value::from("n=1.5,2,null"));
    assert_eq!(run(r#"local m = {1, "x"} return "" .. m"#), Value::from(r#"[1, "x"]"#));
    assert_eq!(run(r#"local m = {a = 1} return "" .. m"#), Value::from("{\"a\": 1}"));
}

#[test]
fn test_vm_map_concat() {
    let out = run("local a = {1, 2} local b = {3} local c = a ++ b return c");
    assert_eq!(numbers(&out), vec![1.0, 2.0, 3.0]);

    let out = run(r#"
        local a = {x = 1, y = 2}
        local b = {y = 3}
        local c = a ++ b
        return c.x .. c.y .. a.y .. (c == a)
    "#);
    assert_eq!(out, Value::from("1320"));

    assert_eq!(run_err("local a = {} return a ++ 1").kind, ErrorKind::TypeMismatch);
}

#[test]
fn test_vm_self_concat_is_fresh() {
    let out = run("local a = {1} local b = a ++ a return #b .. #a");
    assert_eq!(out, Value::from("21"));
}

#[test]
fn test_vm_length_operator() {
    assert_eq!(run(r#"local s = "héllo" return #s"#), num(5.0));
    assert_eq!(run("local m = {1, 2, k = 3} return #m"), num(3.0));
    assert_eq!(run_err("local n = 1 return #n").kind, ErrorKind::TypeMismatch);
}

#[test]
fn test_vm_true_false_are_numbers() {
    assert_eq!(run("return true + true"), num(2.0));
    assert_eq!(run("return false"), num(0.0));
}

#[test]
fn test_vm_nan_compares_false() {
    let out = run(r#"
        local nan = 0 / 0
        return (nan < 1) .. (nan >= 1) .. (nan == nan)
    "#);
    assert_eq!(out, Value::from("000"));
}
