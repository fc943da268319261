//! Scheduler layer
//!
//! Pulls trigger signals off the request queue and drives the pipeline,
//! one run at a time.

pub mod runner;

pub use runner::{DEFAULT_STAGE_TIMEOUT, PipelineRunner};
