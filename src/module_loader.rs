//! Locates, evaluates and caches imported modules.
//!
//! A module is a source file found on the search path. It is evaluated once
//! by a fresh interpreter that shares the importing interpreter's loader and
//! builtin registry; its exports are the top-level bindings whose names do
//! not start with `_`.

use std::{
    cell::RefCell,
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};

use indexmap::IndexMap;
use tracing::debug;

use crate::{
    diagnostics::{Diagnostic, DiagnosticKind, PyppError, Result},
    parser,
    runtime::Interpreter,
    value::Scope,
};

pub const DEFAULT_EXTENSION: &str = "pypp";

/// Where and how the loader looks for module files.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    search_paths: Vec<PathBuf>,
    extension: String,
}

impl LoaderConfig {
    /// An empty search path; add directories with [`LoaderConfig::with_search_path`].
    pub fn empty() -> Self {
        Self {
            search_paths: Vec::new(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    pub fn with_search_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.search_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Puts `path` ahead of every directory already configured.
    pub fn with_priority_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.insert(0, path.into());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self::empty().with_search_paths([".", "stdlib"])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Loaded,
}

#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub name: String,
    pub path: PathBuf,
    pub exports: Scope,
    pub state: LoadState,
}

#[derive(Debug, Default)]
pub struct ModuleLoader {
    config: LoaderConfig,
    modules: RefCell<IndexMap<String, ModuleRecord>>,
}

impl ModuleLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            modules: RefCell::new(IndexMap::new()),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        self.config.search_paths()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.modules
            .borrow()
            .get(name)
            .map(|record| record.state == LoadState::Loaded)
            .unwrap_or(false)
    }

    /// Canonical path of a module that has been loaded or is loading.
    pub fn module_path(&self, name: &str) -> Option<PathBuf> {
        self.modules
            .borrow()
            .get(name)
            .map(|record| record.path.clone())
    }

    /// Returns the exports of `name`, evaluating the module on first use.
    ///
    /// `factory` builds the interpreter that runs the module body; it receives
    /// this loader so nested imports share the same cache.
    pub fn load_module<F>(self: &Rc<Self>, name: &str, factory: F) -> Result<Scope>
    where
        F: FnOnce(Rc<ModuleLoader>) -> Interpreter,
    {
        if let Some(record) = self.modules.borrow().get(name) {
            return match record.state {
                LoadState::Loaded => {
                    debug!(module = name, "module cache hit");
                    Ok(record.exports.clone())
                }
                LoadState::Loading => Err(module_error(format!(
                    "circular import of module `{name}`"
                ))),
            };
        }

        let path = self.resolve(name)?;
        debug!(module = name, path = %path.display(), "loading module");
        self.modules.borrow_mut().insert(
            name.to_string(),
            ModuleRecord {
                name: name.to_string(),
                path: path.clone(),
                exports: Scope::new(),
                state: LoadState::Loading,
            },
        );

        let outcome = self.evaluate_module(&path, factory);
        let mut modules = self.modules.borrow_mut();
        match outcome {
            Ok(exports) => {
                if let Some(record) = modules.get_mut(name) {
                    record.exports = exports.clone();
                    record.state = LoadState::Loaded;
                }
                debug!(module = name, exports = exports.len(), "module loaded");
                Ok(exports)
            }
            Err(err) => {
                modules.shift_remove(name);
                Err(in_module(err, name, &path))
            }
        }
    }

    /// Finds the first `<name>.<ext>` file along the search path.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let file_name = format!("{name}.{}", self.config.extension);
        let mut searched = Vec::new();
        for dir in &self.config.search_paths {
            let candidate = dir.join(&file_name);
            if candidate.is_file() {
                debug!(module = name, path = %candidate.display(), "resolved module");
                return candidate.canonicalize().map_err(|err| {
                    module_error(format!(
                        "cannot resolve `{}`: {err}",
                        candidate.display()
                    ))
                });
            }
            searched.push(candidate);
        }

        let mut diagnostic =
            Diagnostic::new(DiagnosticKind::Module, format!("module `{name}` not found"));
        for candidate in searched {
            diagnostic = diagnostic.with_note(format!("searched {}", candidate.display()));
        }
        Err(PyppError::from(diagnostic))
    }

    fn evaluate_module<F>(self: &Rc<Self>, path: &Path, factory: F) -> Result<Scope>
    where
        F: FnOnce(Rc<ModuleLoader>) -> Interpreter,
    {
        let source = fs::read_to_string(path).map_err(|err| {
            module_error(format!("cannot read `{}`: {err}", path.display()))
        })?;
        let program = parser::parse_program(&source)?;
        let mut interpreter = factory(Rc::clone(self));
        interpreter.evaluate(&program)?;
        Ok(interpreter.exports())
    }
}

fn module_error(message: impl Into<String>) -> PyppError {
    PyppError::from(Diagnostic::new(DiagnosticKind::Module, message))
}

fn in_module(err: PyppError, name: &str, path: &Path) -> PyppError {
    match err {
        PyppError::Diagnostic(diag) => PyppError::from(
            diag.with_note(format!("in module `{name}` ({})", path.display())),
        ),
        other => other,
    }
}
