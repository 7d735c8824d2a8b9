//! Native stack growth for the recursive evaluator.
//!
//! Block calls, statement bodies and expression sub-ranges all recurse on
//! the host stack. The logical depth is bounded separately by
//! `InterpreterConfig::max_depth`.

/// If less than this remains, the stack is grown before recursing.
const RED_ZONE: usize = 100 * 1024;

const STACK_PER_RECURSION: usize = 1024 * 1024;

#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}
