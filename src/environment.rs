use crate::value::{Scope, Value};

/// The scope stack of one interpreter.
///
/// Top-level bindings live in `globals`; every user-function call pushes a
/// frame. Lookups walk the frames innermost-first and then the globals, so a
/// callee also sees the frames of its callers.
#[derive(Debug, Default)]
pub struct Environment {
    globals: Scope,
    frames: Vec<Scope>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` in the innermost frame, or globally when no call is active.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        let scope = match self.frames.last_mut() {
            Some(frame) => frame,
            None => &mut self.globals,
        };
        scope.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .or_else(|| self.globals.get(name))
            .cloned()
    }

    /// Copy of the innermost frame, as captured by a function declaration.
    pub fn snapshot(&self) -> Scope {
        self.frames.last().cloned().unwrap_or_default()
    }

    pub fn push_frame(&mut self, frame: Scope) {
        self.frames.push(frame);
    }

    pub fn pop_frame(&mut self) -> Option<Scope> {
        self.frames.pop()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn globals(&self) -> &Scope {
        &self.globals
    }
}
