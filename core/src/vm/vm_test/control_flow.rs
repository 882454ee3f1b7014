use super::*;

#[test]
fn test_vm_while_and_if() {
    let out = run(r#"
        local x = 0
        local i = 0
        while i < 3 do
            x = x + 2
            i = i + 1
        end
        if x == 6 then return x else return 0 end
    "#);
    assert_eq!(out, num(6.0));
}

#[test]
fn test_vm_elseif_chain() {
    let src = r#"
        function classify(n)
            if n < 0 then return "negative"
            elseif n == 0 then return "zero"
            elseif n < 10 then return "small"
            else return "large" end
        end
        return classify(-1) .. "," .. classify(0) .. "," .. classify(3) .. "," .. classify(99)
    "#;
    assert_eq!(run(src), Value::from("negative,zero,small,large"));
}

#[test]
fn test_vm_for_ascending_runs_ten_times() {
    let out = run(r#"
        local seen = {}
        for i = 1, 10, 1 do seen[#seen] = i end
        return seen
    "#);
    assert_eq!(numbers(&out), (1..=10).map(f64::from).collect::<Vec<_>>());
}

#[test]
fn test_vm_for_descending_runs_ten_times() {
    let out = run(r#"
        local seen = {}
        for i = 10, 1, -1 do seen[#seen] = i end
        return seen
    "#);
    assert_eq!(numbers(&out), (1..=10).rev().map(f64::from).collect::<Vec<_>>());
}

#[test]
fn test_vm_for_empty_range_never_runs() {
    let out = run(r#"
        local count = 0
        for i = 1, 0, 1 do count = count + 1 end
        return count
    "#);
    assert_eq!(out, num(0.0));
}

#[test]
fn test_vm_for_default_step_and_fractional_bounds() {
    assert_eq!(run("local s = 0 for i = 1, 4 do s = s + i end return s"), num(10.0));
    assert_eq!(run("local s = 0 for i = 0, 1, 0.25 do s = s + 1 end return s"), num(5.0));
}

#[test]
fn test_vm_for_bounds_are_coerced_once() {
    let out = run(r#"
        local limit = "3"
        local s = 0
        for i = "1", limit do
            limit = 100
            s = s + i
        end
        return s
    "#);
    assert_eq!(out, num(6.0));
}

#[test]
fn test_vm_zero_step_with_empty_range_never_runs() {
    // step 0 with start above limit fails the pre-test
    assert_eq!(run("local n = 0 for i = 5, 1, 0 do n = n + 1 end return n"), num(0.0));
}

#[test]
fn test_vm_break_and_continue() {
    let out = run(r#"
        local s = 0
        for i = 1, 100 do
            if i % 2 == 0 then continue end
            if i > 9 then break end
            s = s + i
        end
        return s
    "#);
    assert_eq!(out, num(25.0));
}

#[test]
fn test_vm_nested_loop_break_only_exits_inner() {
    let out = run(r#"
        local pairs = 0
        local i = 0
        while i < 3 do
            i = i + 1
            local j = 0
            while 1 do
                j = j + 1
                if j > 2 then break end
                pairs = pairs + 1
            end
        end
        return pairs
    "#);
    assert_eq!(out, num(6.0));
}

#[test]
fn test_vm_foreach_values_and_keys() {
    let out = run(r#"
        local total = 0
        for v in {1, 2, 3} do total = total + v end
        local keys = ""
        for k, v in {a = 1, b = 2} do keys = keys .. k .. v end
        return total .. ":" .. keys
    "#);
    assert_eq!(out, Value::from("6:a1b2"));
}

#[test]
fn test_vm_foreach_sees_appended_entries() {
    let out = run(r#"
        local m = {1}
        local n = 0
        for v in m do
            n = n + 1
            if #m < 4 then m[#m] = v + 1 end
        end
        return n
    "#);
    assert_eq!(out, num(4.0));
}

#[test]
fn test_vm_foreach_rejects_non_map() {
    let err = run_err("for v in 3 do end");
    assert_eq!(err.kind, ErrorKind::TypeMismatch);
}

#[test]
fn test_vm_switch_cases_and_default() {
    let src = r#"
        function name(n)
            local out = "?"
            switch n
            case 1, 2 then out = "low"
            case 3 then out = "three"
            default out = "other"
            end
            return out
        end
        return name(1) .. name(2) .. name(3) .. name(7)
    "#;
    assert_eq!(run(src), Value::from("lowlowthreeother"));
}

#[test]
fn test_vm_break_leaves_switch() {
    let out = run(r#"
        local r = 0
        switch 2
        case 2 then
            r = 1
            break
            r = 2
        end
        return r
    "#);
    assert_eq!(out, num(1.0));
}

#[test]
fn test_vm_short_circuit_yields_operand() {
    assert_eq!(run(r#"return null or "fallback""#), Value::from("fallback"));
    assert_eq!(run(r#"return 0 and "never""#), num(0.0));
    assert_eq!(run(r#"return "a" and "b""#), Value::from("b"));
}

#[test]
fn test_vm_short_circuit_skips_evaluation() {
    let out = run(r#"
        local calls = 0
        local bump = function() calls = calls + 1 return 1 end
        local a = 1 or bump()
        return calls
    "#);
    assert_eq!(out, num(0.0));
}

#[test]
fn test_vm_do_block_scopes_locals() {
    let out = run(r#"
        local x = 1
        do
            local x = 2
            x = x + 1
        end
        return x
    "#);
    assert_eq!(out, num(1.0));
}

#[test]
fn test_vm_entry_args_and_implicit_null() {
    let unit = compile_with(&Engine::default(), "local n = #args");
    assert_eq!(Runtime::new(unit).execute(vec![num(1.0)]).unwrap(), Value::Null);

    let unit = compile_with(&Engine::default(), "return args[1] .. #args");
    let out = Runtime::new(unit).execute(vec![Value::from("a"), Value::from("b")]).unwrap();
    assert_eq!(out, Value::from("b2"));
}
