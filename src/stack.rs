//! Stack growth for the recursive parts of the interpreter.
//!
//! Parsing, evaluation and value rendering all recurse on the shape of the
//! program or value. Wrapping those entry points keeps deep nesting from
//! overflowing a small thread stack.

/// If less than this remains, the stack is grown before recursing.
const RED_ZONE: usize = 100 * 1024;

/// Size of each new stack segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}
