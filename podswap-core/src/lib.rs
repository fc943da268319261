//! Podswap Core
//!
//! Core types and building blocks for the podswap deploy hook.
//!
//! This crate contains:
//! - Domain types: pipeline configuration, stages, run outcomes
//! - Signature verification for incoming webhook deliveries
//! - Command tokenization and executable resolution
//! - The workflow file configuration source

pub mod command;
pub mod domain;
pub mod error;
pub mod signature;
pub mod workflow;

pub use command::CommandLine;
pub use domain::pipeline::{PipelineConfig, TriggerSignal};
pub use domain::run::{PipelineStep, RunOutcome, RunSummary, RunnerState, RunnerStatus};
pub use domain::stage::{Stage, StageOutcome, StageResult};
pub use error::{CommandError, ConfigError};
pub use workflow::{ConfigSource, WorkflowFile};
