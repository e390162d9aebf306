//! Core library for the py++ scripting language: tokenizer, parser,
//! tree-walking evaluator, builtin registry and module loader.

pub mod ast;
pub mod diagnostics;
pub mod environment;
pub mod lexer;
pub mod module_loader;
pub mod parser;
pub mod repl;
pub mod runtime;
pub mod stack;
pub mod stdlib;
pub mod value;

pub use diagnostics::{Diagnostic, DiagnosticKind, PyppError, Result, SourcePos};
pub use module_loader::{LoaderConfig, ModuleLoader};
pub use repl::Repl;
pub use runtime::Interpreter;
pub use stdlib::Builtins;
pub use value::Value;
