//! Host stack growth for recursive evaluation and parsing.
//!
//! Guest calls and nested source constructs recurse on the host stack. The
//! call-depth and nesting limits bound that recursion, and growing the stack
//! on demand keeps those limits reachable on small threads.

const RED_ZONE: usize = 1024 * 1024; // 1MB
const STACK_PER_RECURSION: usize = 8 * 1024 * 1024; // 8MB

/// Runs `f`, switching to a fresh stack segment when less than the red zone
/// remains on the current one.
#[inline]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}
