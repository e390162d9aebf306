use pypp::{
    diagnostics::{DiagnosticKind, PyppError},
    runtime::Interpreter,
    stdlib::Builtins,
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

/// Renders the result the way nested values are displayed.
fn show(source: &str) -> String {
    format!("{:?}", eval(source))
}

#[test]
fn registry_exposes_standard_names() {
    let builtins = Builtins::standard();
    for name in ["print", "len", "push", "sqrt", "uppercase", "isNull", "stringify"] {
        assert!(builtins.contains(name), "missing builtin {name}");
    }
    assert!(!Builtins::empty().contains("print"));
}

#[test]
fn custom_registry_replaces_builtins() {
    fn answer(_: &[Value]) -> pypp::Result<Value> {
        Ok(Value::int(42))
    }
    let mut builtins = Builtins::empty();
    builtins.register("answer", answer);
    let mut interpreter = Interpreter::with_parts(
        std::rc::Rc::new(builtins),
        std::rc::Rc::new(pypp::ModuleLoader::default()),
    );
    assert_eq!(show_value(interpreter.eval_source("answer()")), "42");
    let err = interpreter
        .eval_source("print(1)")
        .expect_err("print is not registered");
    assert_eq!(err.kind(), Some(DiagnosticKind::Name));
}

fn show_value(result: pypp::Result<Value>) -> String {
    format!("{:?}", result.expect("evaluate"))
}

#[test]
fn len_counts_characters_and_elements() {
    assert_eq!(show("len(\"héllo\")"), "5");
    assert_eq!(show("len(array(1, 2, 3))"), "3");
    assert_eq!(show("len(object(\"a\", 1))"), "1");
    assert_eq!(eval_error("len(5)").kind(), Some(DiagnosticKind::Type));
}

#[test]
fn builtins_validate_their_own_arity() {
    let err = eval_error("len()");
    assert_eq!(err.kind(), Some(DiagnosticKind::Type));
    assert!(err.to_string().contains("`len` expected 1 argument but received 0"));
}

#[test]
fn range_forms() {
    assert_eq!(show("range(3)"), "[0, 1, 2]");
    assert_eq!(show("range(2, 5)"), "[2, 3, 4]");
    assert_eq!(show("range(5, 0, -2)"), "[5, 3, 1]");
    assert_eq!(eval_error("range(0, 5, 0)").kind(), Some(DiagnosticKind::Runtime));
}

#[test]
fn conversions() {
    assert_eq!(show("int(\" 42 \")"), "42");
    assert_eq!(show("int(3.9)"), "3");
    assert_eq!(show("float(\"2.5\")"), "2.5");
    assert_eq!(show("str(1.0)"), "\"1.0\"");
    assert_eq!(show("type(array())"), "\"array\"");
    assert_eq!(show("typeof(print)"), "\"function\"");
    assert_eq!(eval_error("int(\"abc\")").kind(), Some(DiagnosticKind::Runtime));
}

#[test]
fn random_values_stay_in_range() {
    for _ in 0..20 {
        let value = eval("randint(1, 3)");
        let ValueKind::Int(n) = value.kind() else {
            panic!("randint should return an int");
        };
        assert!((1..=3).contains(n));
    }
    let value = eval("random()");
    let ValueKind::Float(f) = value.kind() else {
        panic!("random should return a float");
    };
    assert!((0.0..1.0).contains(f));
}

#[test]
fn json_round_trip() {
    let value = eval(
        r#"
        let data = object("name", "py", "tags", array(1, 2.5, true, null));
        let text = stringify(data);
        parse(text) == data
        "#,
    );
    assert_eq!(format!("{value:?}"), "true");
    assert_eq!(
        show("stringify(object(\"a\", array(1, \"x\")))"),
        r#""{\"a\":[1,\"x\"]}""#
    );
    assert_eq!(eval_error("parse(\"{oops\")").kind(), Some(DiagnosticKind::Runtime));
}

#[test]
fn array_mutators_work_in_place() {
    let source = r#"
        let a = array(3, 1, 2);
        push(a, 5);
        unshift(a, 0);
        sort(a);
        reverse(a);
        a
    "#;
    assert_eq!(show(source), "[5, 3, 2, 1, 0]");
    assert_eq!(show("let a = array(1, 2); pop(a) + shift(a)"), "3");
}

#[test]
fn empty_array_pop_and_shift_fail() {
    assert_eq!(eval_error("pop(array())").kind(), Some(DiagnosticKind::Runtime));
    assert_eq!(eval_error("shift(array())").kind(), Some(DiagnosticKind::Runtime));
}

#[test]
fn sort_rejects_mixed_kinds() {
    let err = eval_error("sort(array(1, \"a\"))");
    assert_eq!(err.kind(), Some(DiagnosticKind::Runtime));
}

#[test]
fn slice_join_and_search() {
    assert_eq!(show("slice(array(1, 2, 3, 4), 1, 3)"), "[2, 3]");
    assert_eq!(show("slice(array(1, 2, 3, 4), -2)"), "[3, 4]");
    assert_eq!(show("join(array(\"a\", \"b\"), \"-\")"), "\"a-b\"");
    assert_eq!(show("join(array(1, 2))"), "\"12\"");
    assert_eq!(show("includes(array(1, 2), 2.0)"), "true");
    assert_eq!(show("indexOf(array(\"x\", \"y\"), \"y\")"), "1");
    assert_eq!(show("indexOf(\"hello\", \"z\")"), "-1");
}

#[test]
fn get_and_put_are_bounds_checked() {
    assert_eq!(show("get(array(10, 20), 1)"), "20");
    assert_eq!(show("let o = object(); put(o, \"k\", 1); get(o, \"k\")"), "1");
    assert_eq!(show("let a = array(1, 2); put(a, 0, 9); a"), "[9, 2]");
    assert_eq!(eval_error("get(array(1), 1)").kind(), Some(DiagnosticKind::Runtime));
    assert_eq!(eval_error("get(array(1), -1)").kind(), Some(DiagnosticKind::Runtime));
    assert_eq!(eval_error("get(object(), \"k\")").kind(), Some(DiagnosticKind::Runtime));
    assert_eq!(eval_error("put(array(), 0, 1)").kind(), Some(DiagnosticKind::Runtime));
}

#[test]
fn object_helpers() {
    let source = r#"
        let o = object("a", 1, "b", 2);
        delete(o, "a");
        keys(merge(o, object("c", 3)))
    "#;
    assert_eq!(show(source), "[\"b\", \"c\"]");
    assert_eq!(show("has(object(\"a\", 1), \"a\")"), "true");
    assert_eq!(show("values(object(\"a\", 1))"), "[1]");
    assert_eq!(eval_error("object(\"a\")").kind(), Some(DiagnosticKind::Type));
}

#[test]
fn set_operations() {
    assert_eq!(show("size(set(1, 1, 2, 2.0))"), "2");
    assert_eq!(show("union(set(1, 2), set(2, 3))"), "{1, 2, 3}");
    assert_eq!(show("intersection(set(1, 2), set(2, 3))"), "{2}");
    assert_eq!(show("difference(set(1, 2), set(2, 3))"), "{1}");
    assert_eq!(show("let s = set(); add(s, \"x\"); has(s, \"x\")"), "true");
    assert_eq!(show("let s = set(1); remove(s, 1)"), "true");
    let err = eval_error("set(array())");
    assert_eq!(err.kind(), Some(DiagnosticKind::Type));
    assert!(err.to_string().contains("unhashable"));
}

#[test]
fn math_functions() {
    assert_eq!(show("sqrt(16)"), "4.0");
    assert_eq!(show("floor(2.7)"), "2");
    assert_eq!(show("ceil(2.1)"), "3");
    assert_eq!(show("round(2.5)"), "3");
    assert_eq!(show("round(3.14159, 2)"), "3.14");
    assert_eq!(show("log(1000)"), "3.0");
    assert_eq!(show("log(8, 2)"), "3.0");
    assert_eq!(show("gcd(12, 18)"), "6");
    assert_eq!(show("lcm(4, 6)"), "12");
    assert_eq!(show("abs(-3)"), "3");
    assert_eq!(show("min(3, 1.5, 2)"), "1.5");
    assert_eq!(show("max(3, 1.5, 2)"), "3");
}

#[test]
fn math_domain_errors() {
    assert_eq!(eval_error("sqrt(-1)").kind(), Some(DiagnosticKind::Runtime));
    assert_eq!(eval_error("log(0)").kind(), Some(DiagnosticKind::Runtime));
    assert_eq!(eval_error("min()").kind(), Some(DiagnosticKind::Type));
}

#[test]
fn string_functions() {
    assert_eq!(show("uppercase(\"abc\")"), "\"ABC\"");
    assert_eq!(show("lowercase(\"ABC\")"), "\"abc\"");
    assert_eq!(show("capitalize(\"hELLO\")"), "\"Hello\"");
    assert_eq!(show("trim(\"  x \")"), "\"x\"");
    assert_eq!(show("split(\"a b c\")"), "[\"a\", \"b\", \"c\"]");
    assert_eq!(show("split(\"a,b\", \",\")"), "[\"a\", \"b\"]");
    assert_eq!(show("replace(\"aaa\", \"a\", \"b\")"), "\"bbb\"");
    assert_eq!(show("substring(\"hello\", 1, 3)"), "\"el\"");
    assert_eq!(show("startsWith(\"hello\", \"he\")"), "true");
    assert_eq!(show("endsWith(\"hello\", \"lo\")"), "true");
    assert_eq!(show("contains(\"hello\", \"ell\")"), "true");
    assert_eq!(show("repeat(\"ab\", 2)"), "\"abab\"");
    assert_eq!(eval_error("split(\"a\", \"\")").kind(), Some(DiagnosticKind::Runtime));
}

#[test]
fn validation_predicates() {
    assert_eq!(show("isNumber(1.5)"), "true");
    assert_eq!(show("isNumber(\"1\")"), "false");
    assert_eq!(show("isString(\"\")"), "true");
    assert_eq!(show("isBoolean(false)"), "true");
    assert_eq!(show("isNull(none)"), "true");
    assert_eq!(show("fn f() {} isFunction(f)"), "true");
    assert_eq!(show("isArray(array())"), "true");
    assert_eq!(show("isObject(object())"), "true");
    assert_eq!(show("isSet(set())"), "true");
}

#[test]
fn oversized_arguments_fail_cleanly() {
    let err = eval_error("repeat(\"ab\", 9223372036854775807)");
    assert_eq!(err.kind(), Some(DiagnosticKind::Runtime));
    assert!(err.to_string().contains("too long"));

    let err = eval_error("sleep(100000000000000000000.0)");
    assert_eq!(err.kind(), Some(DiagnosticKind::Runtime));
    assert!(err.to_string().contains("out of range"));
}

#[test]
fn stringify_rejects_self_reference() {
    let err = eval_error("let a = array(); push(a, a); stringify(a)");
    assert_eq!(err.kind(), Some(DiagnosticKind::Runtime));
    assert!(err.to_string().contains("self-referencing"));
    assert_eq!(
        show("let inner = array(1); stringify(array(inner, inner))"),
        r#""[[1],[1]]""#
    );
}
