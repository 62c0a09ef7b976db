//! Counting semaphore used to give RPC-style callers — a single thread of
//! control that both submits tasks and consumes results — a bounded
//! admission window.
//!
//! Grounded on `original_source/orderedtask/tickettracker.go`
//! (`TicketDispenser`, a `chan bool` pre-filled to capacity) and on the
//! teacher's `src/threadpool.rs` `TPool`, whose `slot_tx`/`slot_rx` pair is
//! the same pattern realized with `crossbeam_channel` instead of a raw Go
//! channel.
//!
//! Without this, a caller that both enqueues and drains results on one
//! thread can deadlock: it blocks submitting into a full input queue while
//! the only thread that could drain the output queue — itself — is stuck
//! doing the submitting. Acquiring a ticket before every `enqueue` and
//! releasing one after every consumed result keeps the number of
//! outstanding submissions strictly under the input queue's capacity, so
//! `enqueue` can never block on a queue a ticket-holding caller can't drain.

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::PoolError;

/// A fixed-capacity counting semaphore, initialized full.
pub struct TicketDispenser {
    tx: Sender<()>,
    rx: Receiver<()>,
    capacity: usize,
}

impl TicketDispenser {
    /// Create a dispenser with `capacity` tickets, all immediately available.
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        for _ in 0..capacity {
            // Channel was just created with capacity >= `capacity`; this can't fail.
            tx.send(()).expect("freshly created ticket channel has room");
        }
        TicketDispenser { tx, rx, capacity }
    }

    /// Block until a ticket is available, then consume it.
    pub fn acquire(&self) {
        self.rx
            .recv()
            .expect("ticket dispenser outlives its own sender");
    }

    /// Try to acquire a ticket without blocking.
    pub fn try_acquire(&self) -> bool {
        self.rx.try_recv().is_ok()
    }

    /// The channel of available tickets, exposed so a caller can `select!`
    /// jointly on ticket availability and other events (e.g. pool results).
    pub fn tickets(&self) -> &Receiver<()> {
        &self.rx
    }

    /// Return a ticket to the pool.
    ///
    /// Returns [`PoolError::TicketOverrelease`] if this would exceed the
    /// dispenser's initial capacity — releasing more tickets than were ever
    /// issued is a caller error, not silently absorbed.
    pub fn release(&self) -> Result<(), PoolError> {
        self.tx
            .try_send(())
            .map_err(|_| PoolError::TicketOverrelease)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
