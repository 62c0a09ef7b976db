//! A fixed-size worker pool that processes indexed tasks in parallel and
//! emits results in strictly ascending index order.
//!
//! Producers submit [`Submission`]s carrying a caller-assigned `index`
//! through [`Pool::enqueue`]. A fixed number of worker threads process
//! submissions concurrently, but [`Pool::results`] always yields
//! [`Completed`] tasks in ascending index order, regardless of the order in
//! which workers actually finish them — a slow task at index 3 holds back
//! the already-finished task at index 4 until it's ready.
//!
//! ```no_run
//! use ordered_task_pool::{Pool, Submission};
//!
//! let pool = Pool::new(4, || (), |_local, n: u64| n * n).unwrap();
//! for i in 0..10 {
//!     pool.enqueue(Submission::new(i, i)).unwrap();
//! }
//! pool.close();
//! for completed in pool.results().iter() {
//!     println!("{}: {:?}", completed.index, completed.output);
//! }
//! ```
//!
//! RPC-style callers — a single thread of control that both submits tasks
//! and drains results — should pair every `enqueue` with a
//! [`TicketDispenser`] acquire/release (see [`Pool::ticket_dispenser`]) to
//! avoid deadlocking against themselves.

pub mod error;
pub mod heap;
pub mod pool;
pub mod task;
pub mod ticket;

pub use error::PoolError;
pub use pool::{Pool, DEFAULT_RETRY_INTERVAL};
pub use task::{Completed, ProcessorPanic, Submission};
pub use ticket::TicketDispenser;
