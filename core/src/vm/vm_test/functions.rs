use super::*;

#[test]
fn test_vm_recursion() {
    let out = run(r#"
        function fib(n)
            if n < 2 then return n end
            return fib(n - 1) + fib(n - 2)
        end
        return fib(20)
    "#);
    assert_eq!(out, num(6765.0));
}

#[test]
fn test_vm_call_before_declaration() {
    let out = run(r#"
        local v = later(4)
        function later(n) return n * n end
        return v
    "#);
    assert_eq!(out, num(16.0));
}

#[test]
fn test_vm_overloads_by_arity() {
    let out = run(r#"
        function area(r) return 3 * r * r end
        function area(w, h) return w * h end
        return area(2) .. "," .. area(2, 5)
    "#);
    assert_eq!(out, Value::from("12,10"));
}

#[test]
fn test_vm_sub_called_as_statement() {
    let out = run(r#"
        global total = 0
        sub add(n) total = total + n end
        add(3)
        add(4)
        return total
    "#);
    assert_eq!(out, num(7.0));
}

#[test]
fn test_vm_sub_early_return() {
    let out = run(r#"
        global hits = 0
        sub maybe(n)
            if n > 1 then return end
            hits = hits + 1
        end
        maybe(1)
        maybe(5)
        return hits
    "#);
    assert_eq!(out, num(1.0));
}

#[test]
fn test_vm_private_visible_to_later_functions() {
    let out = run(r#"
        private scale = 3
        function scaled(v) return v * scale end
        scale = 4
        return scaled(2)
    "#);
    assert_eq!(out, num(8.0));
}

#[test]
fn test_vm_globals_are_shared_with_host() {
    let unit = compile_with(&Engine::default(), r#"
        global counter = 1
        function bump() counter = counter + 1 return counter end
        return bump()
    "#);
    let mut rt = Runtime::new(Arc::clone(&unit));
    assert_eq!(rt.execute(Vec::new()).unwrap(), num(2.0));
    assert_eq!(unit.global("counter"), Some(num(2.0)));
    assert!(unit.set_global("counter", num(40.0)));
    assert!(!unit.set_global("missing", num(0.0)));

    let bump = unit.function_value("bump", 0).unwrap();
    assert_eq!(rt.call(&bump, &[]).unwrap(), num(41.0));
}

#[test]
fn test_vm_global_declared_later_is_visible() {
    let out = run(r#"
        function read() return late end
        global late = "set"
        return read()
    "#);
    assert_eq!(out, Value::from("set"));
}

#[test]
fn test_vm_runtime_call_with_arguments() {
    let unit = compile_with(&Engine::default(), "function add(a, b) return a + b end");
    let mut rt = Runtime::new(Arc::clone(&unit));
    rt.execute(Vec::new()).unwrap();
    let add = unit.function_value("add", 2).unwrap();
    assert_eq!(rt.call(&add, &[num(2.0), num(3.0)]).unwrap(), num(5.0));
    let err = rt.call(&add, &[num(2.0)]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ArgumentMismatch);
}

#[test]
fn test_vm_call_arity_mismatch_uses_named_overload() {
    let unit = compile_with(&Engine::default(), r#"
        function pad(s) return pad(s, "-") end
        function pad(s, c) return c .. s .. c end
    "#);
    let mut rt = Runtime::new(Arc::clone(&unit));
    let pad1 = unit.function_value("pad", 1).unwrap();
    assert_eq!(rt.call(&pad1, &[Value::from("x")]).unwrap(), Value::from("-x-"));
    assert_eq!(rt.call(&pad1, &[Value::from("x"), Value::from("*")]).unwrap(), Value::from("*x*"));
}

#[test]
fn test_vm_overloaded_name_as_value_dispatches_on_arity() {
    let src = |call: &str| format!("function f(a) return a end function f(a, b) return a + b end local g = f return {call}");
    assert_eq!(run(&src("g(1, 2)")), num(3.0));
    assert_eq!(run(&src("g(5)")), num(5.0));
    let err = run_err(&src("g(1, 2, 3)"));
    assert_eq!(err.kind, ErrorKind::ArgumentMismatch);
}

#[test]
fn test_vm_runtime_call_runs_the_owning_unit() {
    let a = compile_with(&Engine::default(), r#"
        global greeting = "from A"
        function hello() return greeting end
        function counter() local n = 0 return function() n = n + 1 return n end end
    "#);
    Runtime::new(Arc::clone(&a)).execute(Vec::new()).unwrap();
    let b = compile_with(&Engine::default(), r#"
        function hello() return "from B" end
        function counter() return 0 end
    "#);
    let mut rt = Runtime::new(b);

    let hello = a.function_value("hello", 0).unwrap();
    assert_eq!(rt.call(&hello, &[]).unwrap(), Value::from("from A"));

    let counter = a.function_value("counter", 0).unwrap();
    let next = rt.call(&counter, &[]).unwrap();
    rt.call(&next, &[]).unwrap();
    assert_eq!(rt.call(&next, &[]).unwrap(), num(2.0));
}

#[test]
fn test_vm_runtime_call_after_owner_dropped() {
    let hello = {
        let a = compile_with(&Engine::default(), r#"function hello() return "gone" end"#);
        a.function_value("hello", 0).unwrap()
    };
    let mut rt = Runtime::new(compile_with(&Engine::default(), "return 1"));
    let err = rt.call(&hello, &[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnknownFunction);
    assert_eq!(rt.execute(Vec::new()).unwrap(), num(1.0));
}
