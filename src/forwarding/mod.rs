//! Forward Scheduler and collector transport
//!
//! ```text
//! DroneState ──snapshot──▶ ForwardScheduler ──Batch──▶ BatchSink ──▶ central collector
//!     ▲                          │
//!     └──── acknowledge(n) ◀─────┘ (only on success)
//! ```

pub mod scheduler;
pub mod sink;

pub use scheduler::{run_forward_loop, ForwardOutcome, ForwardScheduler};
pub use sink::{BatchSink, ForwardError, TcpCollectorSink};
