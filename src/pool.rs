//! The ordered task pool itself.
//!
//! Grounded on `original_source/orderedtask/orderedtaskpool.go` for the
//! algorithm — specifically the variant spec.md §9 singles out as the one
//! that's deadlock-safe for RPC-style callers: admission recorded inside
//! `enqueue` (before the task ever reaches a worker), and a full output
//! queue handled by releasing the mutex and retrying rather than blocking on
//! a send while holding it. The teacher's `src/threadpool.rs` `TPool`
//! contributes the Rust realization of the channel/thread plumbing
//! (`crossbeam_channel` bounded queues, `Arc`-shared state, a `Drop` that
//! joins worker threads), generalized from `TPool`'s arbitrary closures to a
//! single `processor` invoked sequentially per worker, since `spec.md` §3
//! invariant 5 requires each worker to run its processor calls one at a
//! time rather than dispatching them onto a work-stealing pool.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, Receiver, Sender, TryRecvError};

use crate::error::PoolError;
use crate::heap::MinHeap;
use crate::task::{Completed, HeapEntry, ProcessorPanic, Submission};
use crate::ticket::TicketDispenser;

/// Default interval the drain routine sleeps before retrying a full output
/// queue. spec.md §9 leaves this as a tunable; this is the value the Go
/// source hardwires (`time.Sleep(time.Microsecond * 100)`).
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_micros(100);

/// Shared ordering state, guarded by one mutex for both heaps together
/// (spec.md §5: "A single pool-level mutex guards both heaps together").
struct State<O> {
    /// Indices submitted but not yet emitted — the low watermark is its minimum.
    index_heap: MinHeap<u64>,
    /// Mirrors `index_heap`'s contents as a set, for O(1) duplicate detection
    /// on enqueue (spec.md §4.2 permits rejecting duplicates defensively;
    /// scanning the heap for every enqueue would be O(n)).
    admitted: HashSet<u64>,
    /// Completed tasks buffered until they're the global minimum.
    task_heap: MinHeap<HeapEntry<O>>,
    closed: bool,
}

/// A fixed-size worker pool that processes indexed tasks in parallel and
/// emits results in strictly ascending index order.
///
/// `I` is the task input type, `O` is the processor's output type. The
/// per-worker scratch type (`W` in spec.md's `workerLocal`) is generic over
/// the constructor only — once workers are spawned the pool itself has no
/// further need to name it.
pub struct Pool<I, O> {
    input_tx: Sender<Submission<I>>,
    output_rx: Receiver<Completed<O>>,
    state: Arc<Mutex<State<O>>>,
    tickets: TicketDispenser,
    abort_tx: Mutex<Option<Sender<()>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<I, O> Pool<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Create a pool of `poolsize` workers (`poolsize >= 1`), each running
    /// `processor` against a worker-local scratch value created once per
    /// worker by `local_init`. Uses [`DEFAULT_RETRY_INTERVAL`] for the
    /// output-queue-full retry interval.
    pub fn new<W, F, P>(poolsize: usize, local_init: F, processor: P) -> Result<Self, PoolError>
    where
        W: 'static,
        F: Fn() -> W + Send + Sync + 'static,
        P: Fn(&mut W, I) -> O + Send + Sync + 'static,
    {
        Self::with_retry_interval(poolsize, local_init, processor, DEFAULT_RETRY_INTERVAL)
    }

    /// As [`Pool::new`], but with an explicit sleep-retry interval for the
    /// drain routine's full-output-queue backoff.
    pub fn with_retry_interval<W, F, P>(
        poolsize: usize,
        local_init: F,
        processor: P,
        retry_interval: Duration,
    ) -> Result<Self, PoolError>
    where
        W: 'static,
        F: Fn() -> W + Send + Sync + 'static,
        P: Fn(&mut W, I) -> O + Send + Sync + 'static,
    {
        if poolsize == 0 {
            return Err(PoolError::InvalidPoolSize);
        }

        // Input/output queues each get capacity `poolsize + 1`. The ticket
        // dispenser (sized `poolsize`, strictly less than the input queue's
        // capacity) relies on this gap to stay deadlock-safe — see
        // `TicketDispenser` and spec.md §5.
        let queue_capacity = poolsize + 1;
        let (input_tx, input_rx) = bounded::<Submission<I>>(queue_capacity);
        let (output_tx, output_rx) = bounded::<Completed<O>>(queue_capacity);
        let (abort_tx, abort_rx) = bounded::<()>(0);

        let state = Arc::new(Mutex::new(State {
            index_heap: MinHeap::new(),
            admitted: HashSet::new(),
            task_heap: MinHeap::new(),
            closed: false,
        }));

        let local_init = Arc::new(local_init);
        let processor = Arc::new(processor);

        let mut workers = Vec::with_capacity(poolsize);
        for id in 0..poolsize {
            let input_rx = input_rx.clone();
            let abort_rx = abort_rx.clone();
            let state = Arc::clone(&state);
            let output_tx = output_tx.clone();
            let local_init = Arc::clone(&local_init);
            let processor = Arc::clone(&processor);

            let handle = thread::Builder::new()
                .name(format!("ordered-task-pool-worker-{id}"))
                .spawn(move || {
                    worker_loop(
                        id,
                        input_rx,
                        abort_rx,
                        state,
                        output_tx,
                        retry_interval,
                        local_init,
                        processor,
                    );
                })
                .expect("failed to spawn ordered task pool worker thread");
            workers.push(handle);
        }

        // These clones were only for handing to workers; the pool itself
        // sends on `input_tx` and reads from `output_rx`, not the reverse.
        // Dropping them here means the output channel closes (and `results`
        // stops yielding) once every worker has exited, and the abort
        // channel's only remaining sender is the one `close` holds.
        drop(output_tx);
        drop(input_rx);
        drop(abort_rx);

        log::debug!(
            "ordered_task_pool: started {poolsize} workers (queue capacity {queue_capacity})"
        );

        Ok(Pool {
            input_tx,
            output_rx,
            state,
            tickets: TicketDispenser::new(poolsize),
            abort_tx: Mutex::new(Some(abort_tx)),
            workers: Mutex::new(workers),
        })
    }

    /// Admit `submission` and hand it to a worker. May block if the input
    /// queue is at capacity.
    ///
    /// If `enqueue(a)` happens-before `enqueue(b)` on a single thread of
    /// control, `a` is admitted (visible to the ordering protocol) before
    /// `b`. Concurrent enqueues from different producers are linearized by
    /// the pool's mutex, but admission order only determines `IndexMinHeap`
    /// contents, never emission order — that's governed solely by index.
    pub fn enqueue(&self, submission: Submission<I>) -> Result<(), PoolError> {
        let index = submission.index;
        {
            let mut state = self.state.lock().unwrap();
            if state.closed {
                return Err(PoolError::Closed);
            }
            if !state.admitted.insert(index) {
                return Err(PoolError::DuplicateIndex(index));
            }
            // Admission must happen before the task reaches the input queue:
            // otherwise a worker could finish processing before the admission
            // is recorded, and drain could briefly see a later index as the
            // low watermark and emit out of order.
            state.index_heap.push(index);
        }

        if self.input_tx.send(submission).is_err() {
            // Every worker has exited (pool closed concurrently between the
            // check above and this send). Retract the admission we just made.
            let mut state = self.state.lock().unwrap();
            state.admitted.remove(&index);
            state.index_heap.remove_one(&index);
            return Err(PoolError::Closed);
        }
        Ok(())
    }

    /// The output event source: completed tasks in ascending-index order.
    ///
    /// Stops yielding once every worker has exited after `close()` and every
    /// buffered and in-flight task has drained — not eagerly on `close()`
    /// itself (spec.md §6 permits either; see SPEC_FULL.md §6).
    pub fn results(&self) -> &Receiver<Completed<O>> {
        &self.output_rx
    }

    /// The admission-control semaphore for RPC-style callers that both
    /// submit tasks and consume results on the same thread of control.
    pub fn ticket_dispenser(&self) -> &TicketDispenser {
        &self.tickets
    }

    /// Idempotent shutdown. Workers exit at their next dispatch point;
    /// in-flight processor invocations run to completion, and
    /// queued-but-undispatched tasks are discarded. Non-blocking: does not
    /// wait for workers to drain (for that, drop the pool).
    pub fn close(&self) {
        let mut newly_closed = false;
        {
            let mut state = self.state.lock().unwrap();
            if !state.closed {
                state.closed = true;
                newly_closed = true;
            }
        }
        if newly_closed {
            // Dropping the only sender closes the channel, waking every
            // worker's `select!` permanently — the same broadcast-via-close
            // idiom as the Go source's `close(abort)`.
            self.abort_tx.lock().unwrap().take();
            log::debug!("ordered_task_pool: pool closed");
        }
    }
}

impl<I, O> Drop for Pool<I, O> {
    /// Ensure no worker threads are leaked: signal abort (idempotent with an
    /// explicit `close()`) and join every worker.
    fn drop(&mut self) {
        self.close();
        if let Ok(mut workers) = self.workers.lock() {
            for handle in workers.drain(..) {
                let _ = handle.join();
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn worker_loop<I, O, W, F, P>(
    id: usize,
    input_rx: Receiver<Submission<I>>,
    abort_rx: Receiver<()>,
    state: Arc<Mutex<State<O>>>,
    output_tx: Sender<Completed<O>>,
    retry_interval: Duration,
    local_init: Arc<F>,
    processor: Arc<P>,
) where
    F: Fn() -> W,
    P: Fn(&mut W, I) -> O,
{
    let mut local = local_init();

    loop {
        // Check abort before blocking on input so a closed pool stops
        // dispatching new work promptly rather than racing select!'s
        // arbitrary tie-break between two simultaneously ready arms.
        // Nothing is ever sent on `abort_rx` — `close()` only drops its
        // sender — so the channel becomes disconnected, never ready with a
        // value; `try_recv` must be checked against `Disconnected`, not `Ok`.
        if matches!(abort_rx.try_recv(), Err(TryRecvError::Disconnected)) {
            return;
        }

        let submission = select! {
            recv(input_rx) -> msg => match msg {
                Ok(submission) => submission,
                // Input channel closed: the pool was dropped out from under us.
                Err(_) => return,
            },
            recv(abort_rx) -> _ => return,
        };

        let Submission { index, input } = submission;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| processor(&mut local, input)));

        let entry = match outcome {
            Ok(output) => HeapEntry {
                index,
                output: Ok(output),
            },
            Err(payload) => {
                let panic = ProcessorPanic::from_payload(payload);
                log::warn!(
                    "ordered_task_pool: worker {id} caught a processor panic on task {index}: {panic}"
                );
                HeapEntry {
                    index,
                    output: Err(panic),
                }
            }
        };

        drain(&state, entry, &output_tx, retry_interval);
    }
}

/// Invoked once a worker's processor call has returned for task `entry`.
/// Buffers `entry` and emits as many ordered tasks as possible.
fn drain<O>(
    state: &Mutex<State<O>>,
    entry: HeapEntry<O>,
    output_tx: &Sender<Completed<O>>,
    retry_interval: Duration,
) {
    let mut guard = state.lock().unwrap();
    guard.task_heap.push(entry);

    loop {
        let is_lowest_outstanding = match guard.task_heap.peek_min() {
            Some(finished) => {
                let admitted_min = *guard.index_heap.peek_min().expect(
                    "a buffered completed task's index must still be in index_heap \
                     (TaskMinHeap is a subset of IndexMinHeap by construction)",
                );
                finished.index == admitted_min
            }
            None => false,
        };

        if !is_lowest_outstanding {
            // Some strictly older task is still being processed elsewhere.
            // That worker will re-enter drain on completion and take over
            // responsibility for forward progress.
            return;
        }

        let output_capacity = output_tx
            .capacity()
            .expect("output queue is constructed bounded");
        if output_tx.len() < output_capacity {
            let finished = guard
                .task_heap
                .pop_min()
                .expect("just confirmed task_heap's minimum is ready");
            guard.index_heap.pop_min();
            guard.admitted.remove(&finished.index);
            output_tx
                .try_send(finished.into())
                .expect("capacity was just checked under this same mutex hold");
        } else {
            // Release the mutex before waiting so other workers can keep
            // draining (and producers can keep enqueueing). Emitting
            // synchronously here while full would block every other
            // worker's drain, and if the consumer is also the producer
            // (RPC-style use) it would then be stuck waiting on input-queue
            // space that only this emission could free — a self-deadlock.
            log::debug!("ordered_task_pool: output queue full, retrying in {retry_interval:?}");
            drop(guard);
            thread::sleep(retry_interval);
            guard = state.lock().unwrap();
        }
    }
}
