use super::*;

#[test]
fn test_vm_throw_and_catch_value() {
    let out = run(r#"
        try
            throw {reason = "bad"}
        catch e
            return e.reason
        end
    "#);
    assert_eq!(out, Value::from("bad"));
}

#[test]
fn test_vm_catch_engine_error_payload() {
    let out = run(r#"
        try
            local m = {}
            local x = m + 1
        catch e
            return e
        end
    "#);
    let text = out.to_string();
    assert!(text.starts_with("TypeMismatch: "), "{text}");
}

#[test]
fn test_vm_uncaught_throw_carries_value_and_trace() {
    let err = run_err(r#"
        function inner() throw "boom" end
        function outer() return inner() end
        outer()
    "#);
    assert_eq!(err.kind, ErrorKind::Thrown);
    assert_eq!(err.value, Some(Value::from("boom")));
    assert_eq!(err.trace, vec![
        "inner (test:2)".to_string(),
        "outer (test:3)".to_string(),
        "main (test:4)".to_string(),
    ]);
}

#[test]
fn test_vm_error_unwinds_through_frames_to_handler() {
    let out = run(r#"
        function deep(n)
            if n == 0 then throw n end
            local pad = {n}
            return deep(n - 1)
        end
        local before = "kept"
        try
            deep(5)
        catch e
            return before .. e
        end
    "#);
    assert_eq!(out, Value::from("kept0"));
}

#[test]
fn test_vm_rethrow_from_catch() {
    let err = run_err(r#"
        try
            throw 1
        catch e
            throw e + 1
        end
    "#);
    assert_eq!(err.value, Some(num(2.0)));
}

#[test]
fn test_vm_nested_try_inner_handles_first() {
    let out = run(r#"
        local log = ""
        try
            try
                throw "a"
            catch e
                log = log .. "inner:" .. e
            end
            throw "b"
        catch e
            log = log .. ",outer:" .. e
        end
        return log
    "#);
    assert_eq!(out, Value::from("inner:a,outer:b"));
}

#[test]
fn test_vm_break_out_of_try_pops_handler() {
    let out = run(r#"
        local n = 0
        while 1 do
            try
                n = n + 1
                if n == 3 then break end
            catch e
            end
        end
        try
            throw "after"
        catch e
            return n .. e
        end
    "#);
    assert_eq!(out, Value::from("3after"));
}

#[test]
fn test_vm_handler_does_not_outlive_return() {
    let err = run_err(r#"
        function guarded()
            try
                return 1
            catch e
            end
            return 0
        end
        guarded()
        throw "escaped"
    "#);
    assert_eq!(err.kind, ErrorKind::Thrown);
}

#[test]
fn test_vm_assert() {
    assert_eq!(run("assert 1 return 5"), num(5.0));
    let err = run_err(r#"assert 1 == 2, "math is " .. "broken""#);
    assert_eq!(err.kind, ErrorKind::AssertionFailed);
    assert_eq!(err.message, "math is broken");
    let err = run_err("local z = 0 assert z");
    assert_eq!(err.message, "assertion failed");
}

#[test]
fn test_vm_stack_overflow_is_catchable_and_runtime_stays_usable() {
    let unit = compile_with(&Engine::default(), r#"
        function forever(n) return forever(n + 1) end
        try
            forever(0)
        catch e
            return e
        end
    "#);
    let mut rt = Runtime::new(Arc::clone(&unit));
    let out = rt.execute(Vec::new()).unwrap();
    assert!(out.to_string().starts_with("StackOverflow: "), "{out}");

    let out = rt.execute(Vec::new()).unwrap();
    assert!(out.to_string().starts_with("StackOverflow: "), "{out}");
}

#[test]
fn test_vm_uncaught_stack_overflow() {
    let config = RuntimeConfig {
        stack_capacity: 1_024,
        max_frames: 4_096,
    };
    let unit = compile_with(&Engine::default(), "function f(n) return f(n + 1) + 1 end return f(0)");
    let mut rt = Runtime::with_config(unit, config);
    let err = rt.execute(Vec::new()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::StackOverflow);
    assert!(err.trace.len() > 10);
}

#[test]
fn test_vm_host_call_checks_capacity_before_pushing_arguments() {
    let config = RuntimeConfig {
        stack_capacity: 16,
        max_frames: 64,
    };
    let params: Vec<String> = (0..20).map(|i| format!("p{i}")).collect();
    let src = format!("function wide({}) return p0 end function one(a) return a end", params.join(", "));
    let unit = compile_with(&Engine::default(), &src);
    let mut rt = Runtime::with_config(Arc::clone(&unit), config);

    let wide = unit.function_value("wide", 20).unwrap();
    let args = vec![num(1.0); 20];
    let err = rt.call(&wide, &args).unwrap_err();
    assert_eq!(err.kind, ErrorKind::StackOverflow);

    let one = unit.function_value("one", 1).unwrap();
    assert_eq!(rt.call(&one, &[num(7.0)]).unwrap(), num(7.0));
}

#[test]
fn test_vm_missing_script_function_is_unknown_function() {
    use crate::val::FunctionValue;

    let unit = compile_with(&Engine::default(), "return 1");
    let ghost = FunctionValue::script(Arc::from("ghost"), 0, true, Arc::downgrade(&unit), 999);
    let mut rt = Runtime::new(Arc::clone(&unit));
    let err = rt.call(&Value::Function(Arc::new(ghost)), &[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnknownFunction);
    assert_eq!(err.message, "no script function #999");
}

#[test]
fn test_vm_closure_stack_consistent_after_caught_error() {
    let out = run(r#"
        local secret = "outer"
        local reader = function() return secret end
        local failing = function(v)
            local inner = function() throw v end
            inner()
            return 0
        end
        local caught = 0
        for i = 1, 3 do
            try
                failing(i)
            catch e
                caught = caught + e
            end
        end
        return reader() .. caught
    "#);
    assert_eq!(out, Value::from("outer6"));
}

#[test]
fn test_vm_error_inside_closure_then_closure_reads_own_env() {
    let out = run(r#"
        local a = "A"
        local b = "B"
        local fa = function() return a end
        local fb = function(x) if x then throw "x" end return b end
        local r = ""
        try fb(1) catch e r = r .. e end
        r = r .. fa() .. fb(0)
        return r
    "#);
    assert_eq!(out, Value::from("xAB"));
}
