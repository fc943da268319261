//! Core domain types
//!
//! This module contains the values that flow between the webhook receiver,
//! the request queue and the pipeline runner.

pub mod pipeline;
pub mod run;
pub mod stage;
