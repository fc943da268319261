//! Service layer
//!
//! Services contain the side-effecting work the runner delegates to.
//! They are trait-based so the runner can be tested without spawning
//! real processes.

mod execution;

pub use execution::{ProcessExecutor, StageExecutor};
