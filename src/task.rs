//! Task types flowing through the pool.
//!
//! The Go source (`orderedtask/orderedtaskpool.go`) represents a unit of work
//! with a single `Task` struct carrying untyped `Input`/`Output` fields, the
//! latter populated in place by the processor. A typed Rust API is clearer as
//! two directional structs instead: [`Submission`] goes in through
//! [`enqueue`](crate::pool::Pool::enqueue), [`Completed`] comes out through
//! [`results`](crate::pool::Pool::results).

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;

/// A unit of work submitted to the pool.
///
/// `index` is the caller-assigned ordering key — typically an offset into an
/// ordered log. Indices must be unique across concurrently in-flight
/// submissions; gaps between indices are fine.
pub struct Submission<I> {
    pub index: u64,
    pub input: I,
}

impl<I> Submission<I> {
    pub fn new(index: u64, input: I) -> Self {
        Submission { index, input }
    }
}

/// The payload captured when a processor invocation unwinds instead of
/// returning normally.
///
/// Per the reference design's failure semantics (spec.md §4.4, choice (b)),
/// a processor fault does not abort the pool or drop the task's place in the
/// ordering — it is recorded here and still emitted at its rightful index.
#[derive(Debug)]
pub struct ProcessorPanic {
    message: String,
}

impl ProcessorPanic {
    pub(crate) fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "processor panicked with a non-string payload".to_owned()
        };
        ProcessorPanic { message }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProcessorPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "processor panicked: {}", self.message)
    }
}

impl std::error::Error for ProcessorPanic {}

/// A task that has finished processing, in the original submission's index
/// order. Yielded by [`Pool::results`](crate::pool::Pool::results).
pub struct Completed<O> {
    pub index: u64,
    pub output: Result<O, ProcessorPanic>,
}

/// Wraps a completed output for storage in the [`MinHeap`](crate::heap::MinHeap),
/// ordering entries by `index` alone — ties cannot occur because `enqueue`
/// rejects duplicate indices, but `Ord`/`Eq` must still be total.
pub(crate) struct HeapEntry<O> {
    pub index: u64,
    pub output: Result<O, ProcessorPanic>,
}

impl<O> PartialEq for HeapEntry<O> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<O> Eq for HeapEntry<O> {}

impl<O> PartialOrd for HeapEntry<O> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<O> Ord for HeapEntry<O> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index.cmp(&other.index)
    }
}

impl<O> From<HeapEntry<O>> for Completed<O> {
    fn from(entry: HeapEntry<O>) -> Self {
        Completed {
            index: entry.index,
            output: entry.output,
        }
    }
}
