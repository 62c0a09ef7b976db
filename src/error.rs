//! Synchronous errors the pool can report to a caller.
//!
//! Processor faults are not represented here — they're caught and carried
//! through [`results`](crate::pool::Pool::results) as a per-task outcome (see
//! [`ProcessorPanic`](crate::task::ProcessorPanic)) so a failing task never
//! stalls the ordering. `PoolError` is strictly for misuse the pool can
//! detect and reject at the call that caused it, matching spec.md §7's three
//! error kinds (1: misuse, 3: shutdown; kind 2 lives on `Completed::output`).
//!
//! Hand-rolled `Display`/`Error` impls rather than a derive macro, matching
//! the teacher's own error types (`src/frame/types.rs::Lz4FError`).

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// `Pool::new` was asked for zero workers.
    InvalidPoolSize,
    /// `enqueue` was called with an index already admitted and not yet emitted.
    DuplicateIndex(u64),
    /// `enqueue` was called after `close()`.
    Closed,
    /// `TicketDispenser::release` was called with no matching `acquire`.
    TicketOverrelease,
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::InvalidPoolSize => write!(f, "pool size must be at least 1"),
            PoolError::DuplicateIndex(i) => {
                write!(f, "index {i} is already admitted and not yet emitted")
            }
            PoolError::Closed => write!(f, "pool is closed"),
            PoolError::TicketOverrelease => {
                write!(f, "released a ticket beyond the dispenser's initial capacity")
            }
        }
    }
}

impl std::error::Error for PoolError {}
