use std::{fs, path::Path, rc::Rc};

use pypp::{
    diagnostics::{DiagnosticKind, PyppError},
    module_loader::{LoaderConfig, ModuleLoader},
    runtime::Interpreter,
    value::{Value, ValueKind},
};
use tempfile::tempdir;

fn loader_for(dir: &Path) -> Rc<ModuleLoader> {
    Rc::new(ModuleLoader::new(LoaderConfig::empty().with_search_path(dir)))
}

fn write_module(dir: &Path, name: &str, source: &str) {
    fs::write(dir.join(format!("{name}.pypp")), source).expect("write module");
}

fn run(loader: &Rc<ModuleLoader>, source: &str) -> Result<Value, PyppError> {
    let mut interpreter = Interpreter::with_loader(Rc::clone(loader));
    interpreter.eval_source(source)
}

fn expect_int(value: &Value) -> i64 {
    match value.kind() {
        ValueKind::Int(n) => *n,
        _ => panic!("expected int, found {}", value.type_name()),
    }
}

#[test]
fn import_binds_module_exports() {
    let dir = tempdir().expect("create temp dir");
    write_module(
        dir.path(),
        "mathx",
        "fn square(n) { return n * n; }\nlet base = 3;",
    );
    let loader = loader_for(dir.path());
    let value = run(&loader, "import mathx; square(base) + 1").expect("evaluate");
    assert_eq!(expect_int(&value), 10);
    assert!(loader.is_loaded("mathx"));
}

#[test]
fn underscore_names_stay_private() {
    let dir = tempdir().expect("create temp dir");
    write_module(dir.path(), "secret", "let _key = 1; let visible = 2;");
    let loader = loader_for(dir.path());
    run(&loader, "import secret; visible").expect("visible is exported");
    let err = run(&loader, "import secret; _key").expect_err("_key is private");
    assert_eq!(err.kind(), Some(DiagnosticKind::Name));
}

#[test]
fn modules_are_evaluated_once_per_loader() {
    let dir = tempdir().expect("create temp dir");
    write_module(dir.path(), "shared", "let state = object(\"hits\", 0);");
    let loader = loader_for(dir.path());

    let mut first = Interpreter::with_loader(Rc::clone(&loader));
    first.eval_source("import shared").expect("first import");
    let mut second = Interpreter::with_loader(Rc::clone(&loader));
    second.eval_source("import shared").expect("second import");

    let a = first.global("state").expect("state bound in first");
    let b = second.global("state").expect("state bound in second");
    assert!(a.ptr_eq(&b), "cached exports should be shared");
}

#[test]
fn cached_module_ignores_later_file_changes() {
    let dir = tempdir().expect("create temp dir");
    write_module(dir.path(), "version", "let v = 1;");
    let loader = loader_for(dir.path());
    run(&loader, "import version").expect("first import");
    write_module(dir.path(), "version", "let v = 2;");
    let value = run(&loader, "import version; v").expect("second import");
    assert_eq!(expect_int(&value), 1);
}

#[test]
fn search_paths_are_tried_in_order() {
    let first = tempdir().expect("create temp dir");
    let second = tempdir().expect("create temp dir");
    write_module(first.path(), "pick", "let which = 1;");
    write_module(second.path(), "pick", "let which = 2;");
    write_module(second.path(), "only_second", "let found = true;");
    let loader = Rc::new(ModuleLoader::new(
        LoaderConfig::empty()
            .with_search_path(first.path())
            .with_search_path(second.path()),
    ));
    let value = run(&loader, "import pick; import only_second; which").expect("evaluate");
    assert_eq!(expect_int(&value), 1);
    let path = loader.module_path("pick").expect("pick recorded");
    assert_eq!(
        path,
        first.path().join("pick.pypp").canonicalize().expect("canonical")
    );
}

#[test]
fn missing_module_lists_searched_paths() {
    let dir = tempdir().expect("create temp dir");
    let loader = loader_for(dir.path());
    let err = run(&loader, "import nowhere").expect_err("module is missing");
    assert_eq!(err.kind(), Some(DiagnosticKind::Module));
    let message = err.to_string();
    assert!(message.contains("module `nowhere` not found"), "{message}");
    assert!(message.contains("nowhere.pypp"), "{message}");
}

#[test]
fn circular_imports_are_detected() {
    let dir = tempdir().expect("create temp dir");
    write_module(dir.path(), "ping", "import pong; let p = 1;");
    write_module(dir.path(), "pong", "import ping; let q = 2;");
    let loader = loader_for(dir.path());
    let err = run(&loader, "import ping").expect_err("cycle");
    assert_eq!(err.kind(), Some(DiagnosticKind::Module));
    assert!(err.to_string().contains("circular import of module `ping`"));
    assert!(!loader.is_loaded("ping"));
    assert!(!loader.is_loaded("pong"));
}

#[test]
fn failed_load_can_be_retried() {
    let dir = tempdir().expect("create temp dir");
    write_module(dir.path(), "flaky", "let x = ;");
    let loader = loader_for(dir.path());
    let err = run(&loader, "import flaky").expect_err("syntax error");
    assert_eq!(err.kind(), Some(DiagnosticKind::Parser));
    assert!(err.to_string().contains("in module `flaky`"));

    write_module(dir.path(), "flaky", "let x = 5;");
    let value = run(&loader, "import flaky; x").expect("retry succeeds");
    assert_eq!(expect_int(&value), 5);
}

#[test]
fn modules_can_import_other_modules() {
    let dir = tempdir().expect("create temp dir");
    write_module(dir.path(), "inner", "fn triple(n) { return n * 3; }");
    write_module(dir.path(), "outer", "import inner; fn nine() { return triple(3); }");
    let loader = loader_for(dir.path());
    let value = run(&loader, "import outer; nine() + triple(1)").expect("evaluate");
    assert_eq!(expect_int(&value), 12);
    assert!(loader.is_loaded("inner"));
}

#[test]
fn import_inside_function_binds_locally() {
    let dir = tempdir().expect("create temp dir");
    write_module(dir.path(), "consts", "let ten = 10;");
    let loader = loader_for(dir.path());
    let value = run(&loader, "fn f() { import consts; return ten; } f()").expect("evaluate");
    assert_eq!(expect_int(&value), 10);
    let err = run(&loader, "fn g() { import consts; return 0; } g(); ten")
        .expect_err("ten is local to g");
    assert_eq!(err.kind(), Some(DiagnosticKind::Name));
}

#[test]
fn default_config_searches_cwd_then_stdlib() {
    let config = LoaderConfig::default();
    let paths: Vec<_> = config
        .search_paths()
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    assert_eq!(paths, vec![".", "stdlib"]);
    assert_eq!(config.extension(), "pypp");
}
