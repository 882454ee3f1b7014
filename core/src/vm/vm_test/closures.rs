use super::*;

#[test]
fn test_vm_closure_captures_by_value() {
    let out = run(r#"
        local x = 1
        local get = function() return x end
        x = 2
        return get()
    "#);
    assert_eq!(out, num(1.0));
}

#[test]
fn test_vm_closures_from_same_call_do_not_alias() {
    let out = run(r#"
        function make()
            local n = 0
            local inc = function() n = n + 1 return n end
            local peek = function() return n end
            return {inc, peek}
        end
        local pair = make()
        local inc = pair[0]
        local peek = pair[1]
        inc()
        inc()
        return inc() .. "/" .. peek()
    "#);
    assert_eq!(out, Value::from("3/0"));
}

#[test]
fn test_vm_closure_state_persists_between_calls() {
    let out = run(r#"
        function counter(start)
            local n = start
            return function() n = n + 1 return n end
        end
        local a = counter(10)
        local b = counter(100)
        a()
        b()
        return a() + b()
    "#);
    assert_eq!(out, num(12.0 + 102.0));
}

#[test]
fn test_vm_nested_closures_forward_captures() {
    let out = run(r#"
        function outer(x)
            return function(y)
                return function(z) return x + y + z end
            end
        end
        local f = outer(1)
        local g = f(10)
        return g(100)
    "#);
    assert_eq!(out, num(111.0));
}

#[test]
fn test_vm_closure_captures_loop_variable_per_iteration() {
    let out = run(r#"
        local fns = {}
        for i = 1, 3 do
            fns[#fns] = function() return i end
        end
        return fns[0]() + fns[1]() * 10 + fns[2]() * 100
    "#);
    assert_eq!(out, num(321.0));
}

#[test]
fn test_vm_anonymous_sub_yields_null_through_stack_call() {
    let out = run(r#"
        local hits = {}
        local record = sub(v) hits[#hits] = v end
        local r = record(5)
        return r == null and hits[0] == 5
    "#);
    assert_eq!(out, num(1.0));
}

#[test]
fn test_vm_function_value_by_name() {
    let out = run(r#"
        function twice(f, v) return f(f(v)) end
        function inc(v) return v + 1 end
        return twice(inc, 5)
    "#);
    assert_eq!(out, num(7.0));
}

#[test]
fn test_vm_closure_equality_is_identity() {
    let out = run(r#"
        local a = function() return 1 end
        local b = function() return 1 end
        local c = a
        return (a == c) .. (a == b)
    "#);
    assert_eq!(out, Value::from("10"));
}
