use std::thread;

use super::*;

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn test_vm_unit_and_engine_are_shareable() {
    assert_send_sync::<CompiledUnit>();
    assert_send_sync::<Engine>();
    assert_send_sync::<Value>();
    fn assert_send<T: Send>() {}
    assert_send::<Runtime>();
}

#[test]
fn test_vm_runtimes_share_one_unit_across_threads() {
    let unit = compile_with(&Engine::default(), r#"
        function sum(n)
            local s = 0
            for i = 1, n do s = s + i end
            return s
        end
        return sum(args[0])
    "#);
    let results: Vec<Value> = thread::scope(|scope| {
        let handles: Vec<_> = (1..=4)
            .map(|k| {
                let unit = Arc::clone(&unit);
                scope.spawn(move || Runtime::new(unit).execute(vec![num(f64::from(k) * 100.0)]).unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(results, vec![num(5050.0), num(20100.0), num(45150.0), num(80200.0)]);
}

#[test]
fn test_vm_concurrent_global_writes_stay_in_bounds() {
    let unit = compile_with(&Engine::default(), r#"
        global hits = 0
        function hit()
            for i = 1, 200 do hits = hits + 1 end
            return hits
        end
    "#);
    Runtime::new(Arc::clone(&unit)).execute(Vec::new()).unwrap();
    let hit = unit.function_value("hit", 0).unwrap();
    thread::scope(|scope| {
        for _ in 0..4 {
            let unit = Arc::clone(&unit);
            let hit = hit.clone();
            scope.spawn(move || {
                Runtime::new(unit).call(&hit, &[]).unwrap();
            });
        }
    });
    // read-modify-write is not atomic: updates may be lost, never invented
    let hits = unit.global("hits").and_then(|v| v.as_number()).unwrap();
    assert!((1.0..=800.0).contains(&hits), "{hits}");
}

#[test]
fn test_vm_shared_map_across_runtimes() {
    let unit = compile_with(&Engine::default(), r#"
        sub push(m, v) m[#m] = v end
    "#);
    let shared = Value::from(ScriptMap::new());
    let push = unit.function_value("push", 2).unwrap();
    thread::scope(|scope| {
        for t in 0..4 {
            let unit = Arc::clone(&unit);
            let push = push.clone();
            let shared = shared.clone();
            scope.spawn(move || {
                let mut rt = Runtime::new(unit);
                for i in 0..50 {
                    rt.call(&push, &[shared.clone(), num(f64::from(t * 100 + i))]).unwrap();
                }
            });
        }
    });
    assert!(shared.len().unwrap() <= 200);
}
