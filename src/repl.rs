use std::rc::Rc;

use rustyline::{error::ReadlineError, DefaultEditor};

use crate::{
    diagnostics::{PyppError, Result},
    module_loader::ModuleLoader,
    runtime::Interpreter,
};

/// Line-at-a-time session; bindings persist between inputs.
pub struct Repl {
    interpreter: Interpreter,
}

impl Repl {
    pub fn new() -> Self {
        Self {
            interpreter: Interpreter::new(),
        }
    }

    pub fn with_loader(loader: Rc<ModuleLoader>) -> Self {
        Self {
            interpreter: Interpreter::with_loader(loader),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new().map_err(readline_error)?;
        loop {
            match editor.readline("py++> ") {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed == ":quit" || trimmed == ":exit" {
                        break;
                    }
                    if trimmed.is_empty() {
                        continue;
                    }
                    editor.add_history_entry(trimmed).ok();
                    match self.interpreter.eval_source(trimmed) {
                        Ok(value) if value.is_null() => {}
                        Ok(value) => println!("{value:?}"),
                        Err(err) => eprintln!("error: {err}"),
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => return Err(readline_error(err)),
            }
        }
        Ok(())
    }
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}

fn readline_error(err: ReadlineError) -> PyppError {
    PyppError::from(std::io::Error::new(std::io::ErrorKind::Other, err))
}
