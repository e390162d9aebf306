use pypp::{
    diagnostics::{DiagnosticKind, PyppError},
    runtime::Interpreter,
    value::{Value, ValueKind},
};

fn eval(source: &str) -> Value {
    let mut interpreter = Interpreter::new();
    interpreter
        .eval_source(source)
        .expect("evaluation should succeed")
}

fn eval_error(source: &str) -> PyppError {
    let mut interpreter = Interpreter::new();
    match interpreter.eval_source(source) {
        Ok(value) => panic!("expected error, received value {value}"),
        Err(err) => err,
    }
}

fn expect_int(value: &Value) -> i64 {
    match value.kind() {
        ValueKind::Int(n) => *n,
        _ => panic!("expected int, found {}", value.type_name()),
    }
}

fn expect_float(value: &Value) -> f64 {
    match value.kind() {
        ValueKind::Float(n) => *n,
        _ => panic!("expected float, found {}", value.type_name()),
    }
}

fn expect_bool(value: &Value) -> bool {
    match value.kind() {
        ValueKind::Bool(b) => *b,
        _ => panic!("expected bool, found {}", value.type_name()),
    }
}

fn expect_str(value: &Value) -> String {
    match value.kind() {
        ValueKind::String(s) => s.clone(),
        _ => panic!("expected string, found {}", value.type_name()),
    }
}

#[test]
fn respects_operator_precedence() {
    assert_eq!(expect_int(&eval("2 + 3 * 4")), 14);
    assert_eq!(expect_int(&eval("(2 + 3) * 4")), 20);
    assert_eq!(expect_int(&eval("-2 * 3")), -6);
}

#[test]
fn let_bindings_are_visible_to_later_statements() {
    assert_eq!(expect_int(&eval("let x = 10; let y = 5; x + y")), 15);
}

#[test]
fn calls_user_functions() {
    let value = eval("fn double(n) { return n * 2; } double(5)");
    assert_eq!(expect_int(&value), 10);
}

#[test]
fn recursion_resolves_through_name_lookup() {
    let value = eval(
        r#"
        fn fib(n) {
            if (n < 2) { return n; }
            return fib(n - 1) + fib(n - 2);
        }
        fib(15)
        "#,
    );
    assert_eq!(expect_int(&value), 610);
}

#[test]
fn function_without_return_yields_null() {
    assert!(eval("fn noop() { 1 + 1; } noop()").is_null());
}

#[test]
fn arity_mismatch_is_a_type_error() {
    let err = eval_error("fn one(a) { return a; } one(1, 2)");
    assert_eq!(err.kind(), Some(DiagnosticKind::Type));
    assert!(err.to_string().contains("expected 1 argument(s), got 2"));
}

#[test]
fn for_loop_runs_update_clause() {
    let value = eval(
        r#"
        let seen = array();
        for (let i = 0; i < 3; i = i + 1) { push(seen, i); }
        seen
        "#,
    );
    let ValueKind::Array(items) = value.kind() else {
        panic!("expected array");
    };
    let items: Vec<i64> = items.borrow().iter().map(expect_int).collect();
    assert_eq!(items, vec![0, 1, 2]);
}

#[test]
fn continue_in_for_still_updates() {
    let value = eval(
        r#"
        let total = 0;
        for (let i = 0; i < 6; i = i + 1) {
            if (i % 2 == 0) { continue; }
            total = total + i;
        }
        total
        "#,
    );
    assert_eq!(expect_int(&value), 9);
}

#[test]
fn break_exits_while_loop() {
    let value = eval(
        r#"
        let n = 0;
        while (true) {
            n = n + 1;
            if (n == 4) { break; }
        }
        n
        "#,
    );
    assert_eq!(expect_int(&value), 4);
}

#[test]
fn return_propagates_out_of_loops() {
    let value = eval(
        r#"
        fn first_over(limit) {
            let i = 0;
            while (true) {
                if (i * i > limit) { return i; }
                i = i + 1;
            }
        }
        first_over(50)
        "#,
    );
    assert_eq!(expect_int(&value), 8);
}

#[test]
fn undefined_name_is_reported_with_position() {
    let err = eval_error("let a = 1;\nmissing + a");
    assert_eq!(err.kind(), Some(DiagnosticKind::Name));
    let message = err.to_string();
    assert!(message.contains("`missing`"), "{message}");
    assert!(message.contains("line 2, column 1"), "{message}");
}

#[test]
fn closures_capture_a_snapshot_of_the_enclosing_frame() {
    let value = eval(
        r#"
        fn outer() {
            let x = 1;
            fn inner() { return x; }
            x = 2;
            return inner;
        }
        let f = outer();
        f()
        "#,
    );
    assert_eq!(expect_int(&value), 1);
}

#[test]
fn top_level_functions_see_later_globals() {
    let value = eval(
        r#"
        fn read() { return counter; }
        let counter = 7;
        read()
        "#,
    );
    assert_eq!(expect_int(&value), 7);
}

#[test]
fn callees_see_caller_frames() {
    let value = eval(
        r#"
        fn helper() { return local; }
        fn caller() { let local = 42; return helper(); }
        caller()
        "#,
    );
    assert_eq!(expect_int(&value), 42);
}

#[test]
fn assignment_inside_function_stays_local() {
    let value = eval(
        r#"
        let x = 1;
        fn set() { x = 5; return x; }
        set() + x
        "#,
    );
    assert_eq!(expect_int(&value), 6);
}

#[test]
fn else_if_chains_pick_first_match() {
    let source = |n: i64| {
        format!(
            r#"
            fn classify(n) {{
                if (n < 0) {{ return "neg"; }}
                else if (n == 0) {{ return "zero"; }}
                else {{ return "pos"; }}
            }}
            classify({n})
            "#
        )
    };
    assert_eq!(expect_str(&eval(&source(-3))), "neg");
    assert_eq!(expect_str(&eval(&source(0))), "zero");
    assert_eq!(expect_str(&eval(&source(9))), "pos");
}

#[test]
fn let_type_tags_are_checked() {
    let err = eval_error("let x: int = \"five\"");
    assert_eq!(err.kind(), Some(DiagnosticKind::Type));
    assert!(err.to_string().contains("expected int, got string"));

    assert_eq!(expect_float(&eval("let y: float = 1.5; y")), 1.5);
    assert_eq!(expect_int(&eval("let z: float = 2; z")), 2);
    assert!(eval_error("let b: int = true").to_string().contains("got bool"));
}

#[test]
fn parameter_and_return_tags_are_checked() {
    let err = eval_error("fn f(a: string) { return a; } f(1)");
    assert_eq!(err.kind(), Some(DiagnosticKind::Type));
    assert!(err.to_string().contains("parameter `a`"));

    let err = eval_error("fn g() -> int { return \"no\"; } g()");
    assert!(err.to_string().contains("declared return type int"));
}

#[test]
fn logical_operators_evaluate_both_sides() {
    let value = eval(
        r#"
        let calls = array();
        fn mark(v) { push(calls, v); return v; }
        let r = mark(false) && mark(true);
        length(calls) * 10 + int(r)
        "#,
    );
    assert_eq!(expect_int(&value), 20);
    assert!(expect_bool(&eval("0 || \"x\"")));
}

#[test]
fn division_is_true_division() {
    assert_eq!(expect_float(&eval("7 / 2")), 3.5);
    assert_eq!(expect_float(&eval("6 / 3")), 2.0);
}

#[test]
fn modulo_follows_divisor_sign() {
    assert_eq!(expect_int(&eval("-7 % 3")), 2);
    assert_eq!(expect_int(&eval("7 % -3")), -2);
}

#[test]
fn division_by_zero_is_a_runtime_error() {
    let err = eval_error("1 / 0");
    assert_eq!(err.kind(), Some(DiagnosticKind::Runtime));
    assert!(err.to_string().contains("division by zero"));
    assert_eq!(eval_error("5 % 0").kind(), Some(DiagnosticKind::Runtime));
}

#[test]
fn integer_overflow_is_reported() {
    let err = eval_error("9223372036854775807 + 1");
    assert_eq!(err.kind(), Some(DiagnosticKind::Runtime));
    assert!(err.to_string().contains("overflow"));
}

#[test]
fn string_operators() {
    assert_eq!(expect_str(&eval("\"py\" + \"++\"")), "py++");
    assert_eq!(expect_str(&eval("\"ab\" * 3")), "ababab");
    assert!(expect_bool(&eval("\"apple\" < \"banana\"")));
    assert_eq!(
        eval_error("\"a\" + 1").kind(),
        Some(DiagnosticKind::Type)
    );
}

#[test]
fn equality_is_structural() {
    assert!(expect_bool(&eval("1 == 1.0")));
    assert!(expect_bool(&eval("array(1, 2) == array(1, 2)")));
    assert!(expect_bool(&eval("\"1\" != 1")));
    assert!(expect_bool(&eval("null == none")));
}

#[test]
fn comparing_mixed_kinds_is_a_type_error() {
    let err = eval_error("1 < \"2\"");
    assert_eq!(err.kind(), Some(DiagnosticKind::Type));
    assert!(err.to_string().contains("cannot compare int and string"));
}

#[test]
fn truthiness_rules() {
    let falsy = ["null", "false", "0", "0.0", "\"\"", "array()"];
    for source in falsy {
        assert!(!expect_bool(&eval(&format!("bool({source})"))), "{source}");
    }
    let truthy = ["1", "\"a\"", "array(0)", "object()", "set()", "print"];
    for source in truthy {
        assert!(expect_bool(&eval(&format!("bool({source})"))), "{source}");
    }
}

#[test]
fn member_access_reads_object_fields() {
    assert_eq!(expect_int(&eval("let o = object(\"a\", 1); o.a")), 1);
    assert!(eval("let o = object(); o.missing").is_null());
    let err = eval_error("let n = 3; n.value");
    assert_eq!(err.kind(), Some(DiagnosticKind::Type));
}

#[test]
fn calling_a_non_function_fails() {
    let err = eval_error("let x = 3; x()");
    assert_eq!(err.kind(), Some(DiagnosticKind::Type));
    assert!(err.to_string().contains("value of type int is not callable"));
}

#[test]
fn builtin_errors_carry_call_position() {
    let err = eval_error("let a = array();\npop(a)");
    assert_eq!(err.kind(), Some(DiagnosticKind::Runtime));
    assert!(err.to_string().contains("line 2, column 1"));
}

#[test]
fn user_bindings_shadow_builtins() {
    assert_eq!(expect_int(&eval("fn len(x) { return 99; } len(\"abc\")")), 99);
}

#[test]
fn arrays_are_shared_by_reference() {
    let value = eval(
        r#"
        let a = array(1);
        let b = a;
        push(b, 2);
        length(a)
        "#,
    );
    assert_eq!(expect_int(&value), 2);
}

#[test]
fn blocks_do_not_open_scopes() {
    assert_eq!(expect_int(&eval("{ let inner = 3; } inner")), 3);
}

#[test]
fn globals_are_inspectable_after_evaluation() {
    let mut interpreter = Interpreter::new();
    interpreter
        .eval_source("let answer = 42; let _hidden = 1;")
        .expect("evaluate");
    assert_eq!(
        interpreter.global("answer").map(|v| expect_int(&v)),
        Some(42)
    );
    let exports = interpreter.exports();
    assert!(exports.contains_key("answer"));
    assert!(!exports.contains_key("_hidden"));
}

#[test]
fn runaway_recursion_is_stopped_on_a_default_thread() {
    let outcome = std::thread::spawn(|| {
        let mut interpreter = Interpreter::new();
        interpreter
            .eval_source("fn down(n) { return down(n + 1); } down(0)")
            .map(|_| ())
            .map_err(|err| err.to_string())
    })
    .join()
    .expect("evaluator thread");
    let message = outcome.expect_err("recursion should be cut off");
    assert!(message.contains("maximum call depth"));
}

#[test]
fn deeply_nested_expressions_evaluate() {
    let depth = 2000;
    let source = format!("{}1{}", "(1 + ".repeat(depth), ")".repeat(depth));
    let value = std::thread::spawn(move || {
        let mut interpreter = Interpreter::new();
        interpreter
            .eval_source(&source)
            .map(|value| expect_int(&value))
            .map_err(|err| err.to_string())
    })
    .join()
    .expect("evaluator thread");
    assert_eq!(value, Ok(2001));
}

#[test]
fn huge_string_repetition_is_a_runtime_error() {
    let err = eval_error("\"ab\" * 9223372036854775807");
    assert_eq!(err.kind(), Some(DiagnosticKind::Runtime));
    assert!(err.to_string().contains("too long"));
    assert_eq!(expect_str(&eval("\"\" * 9223372036854775807")), "");
    assert_eq!(expect_str(&eval("\"ab\" * -2")), "");
}

#[test]
fn self_referencing_containers_render() {
    assert_eq!(
        expect_str(&eval("let a = array(); push(a, a); str(a)")),
        "[[...]]"
    );
    assert_eq!(
        expect_str(&eval("let o = object(); put(o, \"me\", o); str(o)")),
        "{\"me\": {...}}"
    );
}

#[test]
fn cyclic_containers_compare_without_looping() {
    let value = eval(
        r#"
        let a = array();
        let b = array();
        push(a, b);
        push(b, a);
        a == b
        "#,
    );
    assert!(expect_bool(&value));
    let value = eval(
        r#"
        let a = array(1);
        let b = array(2);
        push(a, a);
        push(b, b);
        a == b
        "#,
    );
    assert!(!expect_bool(&value));
}
