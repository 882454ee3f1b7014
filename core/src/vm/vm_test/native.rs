use parking_lot::Mutex;

use super::*;
use crate::val::FunctionValue;

fn engine_with_len() -> Engine {
    let mut builder = EngineBuilder::new();
    builder
        .register_host_method(ValueTag::String, "len", 1, |_, args| Ok(Value::from(args[0].len()?)))
        .register_host_method(ValueTag::Map, "len", 1, |_, args| Ok(Value::from(args[0].len()?)));
    builder.build()
}

#[test]
fn test_vm_host_function_call() {
    let mut builder = EngineBuilder::new();
    builder.register_host_function("add", 2, true, |_, args| {
        Ok(Value::Number(args[0].to_number()? + args[1].to_number()?))
    });
    let engine = builder.build();
    assert!(engine.has_host_function("add", 2));
    assert!(!engine.has_host_function("add", 3));
    assert_eq!(run_with(&engine, "return add(2, 40)"), num(42.0));
}

#[test]
fn test_vm_host_sub_as_statement() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let mut builder = EngineBuilder::new();
    builder.register_host_function("emit", 1, false, move |_, args| {
        sink.lock().push(args[0].to_string());
        Ok(Value::Null)
    });
    let engine = builder.build();
    run_with(&engine, r#"emit("a") emit(1 + 1)"#);
    assert_eq!(*log.lock(), vec!["a".to_string(), "2".to_string()]);
}

#[test]
fn test_vm_host_sub_result_is_compile_error() {
    let mut builder = EngineBuilder::new();
    builder.register_host_function("emit", 1, false, |_, _| Ok(Value::Null));
    let err = builder.build().compile("local x = emit(1)", "test").unwrap_err();
    assert!(err.message.contains("does not return a value"), "{}", err.message);
}

#[test]
fn test_vm_script_function_shadows_host() {
    let mut builder = EngineBuilder::new();
    builder.register_host_function("value", 0, true, |_, _| Ok(Value::from("host")));
    let engine = builder.build();
    assert_eq!(run_with(&engine, "return value()"), Value::from("host"));
    assert_eq!(
        run_with(&engine, r#"function value() return "script" end return value()"#),
        Value::from("script")
    );
}

#[test]
fn test_vm_special_call_len() {
    let engine = engine_with_len();
    assert!(engine.has_method(ValueTag::String, "len", 1));
    assert_eq!(run_with(&engine, r#"local s = "four" return s:len()"#), num(4.0));
    assert_eq!(run_with(&engine, "local m = {1, 2, 3} return m:len()"), num(3.0));

    let unit = compile_with(&engine, "local n = 5 return n:len()");
    let err = Runtime::new(unit).execute(Vec::new()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnknownMethod);
}

fn script_method(src: &str, name: &str) -> (Arc<CompiledUnit>, Arc<FunctionValue>) {
    let helper = compile_with(&Engine::default(), src);
    let Some(Value::Function(method)) = helper.function_value(name, 1) else {
        panic!("{name}/1 not compiled");
    };
    (helper, method)
}

#[test]
fn test_vm_script_type_method_runs_in_its_own_unit() {
    let (_helper, twice) = script_method("function twice(s) return s .. s end", "twice");
    let mut builder = EngineBuilder::new();
    builder.register_type_method(ValueTag::String, "twice", 1, twice);
    let engine = builder.build();
    assert!(engine.has_method(ValueTag::String, "twice", 1));

    // `other` sits at the same function index in the calling unit
    let out = run_with(&engine, r#"
        function other(x) return 99 end
        local s = "ab"
        return s:twice()
    "#);
    assert_eq!(out, Value::from("abab"));
}

#[test]
fn test_vm_script_type_method_reads_its_own_globals() {
    let (helper, tag) = script_method(r#"
        global prefix = "?"
        function tag(s) return prefix .. s end
    "#, "tag");
    helper.set_global("prefix", Value::from("#"));
    let mut builder = EngineBuilder::new();
    builder.register_type_method(ValueTag::String, "tag", 1, tag);
    let engine = builder.build();
    let out = run_with(&engine, r#"
        global prefix = "caller"
        local s = "x"
        return s:tag()
    "#);
    assert_eq!(out, Value::from("#x"));
}

#[test]
fn test_vm_script_type_method_of_dropped_unit() {
    let (helper, twice) = script_method("function twice(s) return s .. s end", "twice");
    drop(helper);
    let mut builder = EngineBuilder::new();
    builder.register_type_method(ValueTag::String, "twice", 1, twice);
    let engine = builder.build();

    let unit = compile_with(&engine, r#"local s = "ab" return s:twice()"#);
    let err = Runtime::new(unit).execute(Vec::new()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnknownFunction);
    assert!(err.message.contains("dropped"), "{}", err.message);

    let out = run_with(&engine, r#"try local s = "ab" return s:twice() catch e return "caught" end"#);
    assert_eq!(out, Value::from("caught"));
}

#[test]
fn test_vm_host_method_reenters_foreign_script_function() {
    let (_helper, shout) = script_method(r#"function shout(s) return s .. "!" end"#, "shout");
    let mut builder = EngineBuilder::new();
    builder.register_host_method(ValueTag::String, "shout", 1, move |rt, args| {
        Ok(rt.call(&Value::Function(Arc::clone(&shout)), args)?)
    });
    let engine = builder.build();
    assert_eq!(run_with(&engine, r#"local s = "hey" return s:shout()"#), Value::from("hey!"));
}

#[test]
fn test_vm_host_reenters_script_callback() {
    let mut builder = EngineBuilder::new();
    builder.register_host_function("map_list", 2, true, |rt, args| {
        let f = args[1].clone();
        let items: Vec<Value> = match &args[0] {
            Value::Map(m) => m.read().values().cloned().collect(),
            _ => anyhow::bail!("map_list expects a map"),
        };
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(rt.call(&f, &[item])?);
        }
        Ok(Value::from(out))
    });
    let engine = builder.build();
    let out = run_with(&engine, r#"
        local k = 10
        return map_list({1, 2, 3}, function(v) return v * k end)
    "#);
    assert_eq!(numbers(&out), vec![10.0, 20.0, 30.0]);
}

#[test]
fn test_vm_host_error_kind() {
    let mut builder = EngineBuilder::new();
    builder.register_host_function("fail", 0, true, |_, _| anyhow::bail!("disk on fire"));
    let engine = builder.build();
    let unit = compile_with(&engine, "return fail()");
    let err = Runtime::new(unit).execute(Vec::new()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Host);
    assert!(err.message.contains("disk on fire"));

    let out = run_with(&engine, "try fail() catch e return e end");
    assert_eq!(out, Value::from("Host: disk on fire"));
}

#[test]
fn test_vm_script_error_passes_through_host() {
    let mut builder = EngineBuilder::new();
    builder.register_host_function("invoke", 1, true, |rt, args| Ok(rt.call(&args[0], &[])?));
    let engine = builder.build();
    let out = run_with(&engine, r#"
        try
            invoke(function() throw {code = 7} end)
        catch e
            return e.code
        end
    "#);
    assert_eq!(out, num(7.0));
}

#[test]
fn test_vm_host_function_as_value() {
    let mut builder = EngineBuilder::new();
    builder.register_host_function("double", 1, true, |_, args| Ok(Value::Number(args[0].to_number()? * 2.0)));
    let engine = builder.build();
    assert_eq!(run_with(&engine, "local f = double return f(21)"), num(42.0));
}

#[test]
fn test_vm_object_handles_are_opaque() {
    use crate::val::ObjectRef;

    struct Token(u32);
    let mut builder = EngineBuilder::new();
    builder
        .register_host_function("token", 1, true, |_, args| {
            Ok(Value::Object(ObjectRef::new(Token(args[0].to_number()? as u32))))
        })
        .register_host_function("token_id", 1, true, |_, args| {
            let id = args[0]
                .as_object()
                .and_then(|o| o.downcast_ref::<Token>())
                .map(|t| t.0)
                .ok_or_else(|| anyhow::anyhow!("not a token"))?;
            Ok(Value::from(id as usize))
        });
    let engine = builder.build();
    let out = run_with(&engine, r#"
        local t = token(9)
        local u = t
        if t then return token_id(u) + (t == u) + (t == token(9)) end
    "#);
    assert_eq!(out, num(10.0));
}
