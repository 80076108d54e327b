//! Native stack headroom for recursive evaluation.

/// Space that must remain before a nested call is entered.
const RED_ZONE: usize = 128 * 1024;

/// Size of each new stack segment once the red zone is reached.
const STACK_SEGMENT: usize = 1024 * 1024;

/// Runs `f`, moving onto a freshly allocated stack segment when the current
/// one is nearly exhausted. Lets script recursion reach the configured call
/// depth on threads with small stacks.
#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_SEGMENT, f)
}
