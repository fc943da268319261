//! Stage domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One externally executed command within a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    PreBuild,
    Build,
    Deploy,
}

impl Stage {
    /// All command stages in execution order
    pub const ALL: [Stage; 3] = [Stage::PreBuild, Stage::Build, Stage::Deploy];

    /// Stable name used in logs and in the workflow file
    pub fn name(&self) -> &'static str {
        match self {
            Stage::PreBuild => "pre-build",
            Stage::Build => "build",
            Stage::Deploy => "deploy",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a stage command ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Exit status zero
    Succeeded,
    /// Non-zero exit, or killed by a signal (`code` is `None`)
    Exited { code: Option<i32> },
    /// Still running when the stage timeout fired; the process was killed
    TimedOut { after: Duration },
    /// The process could not be started, or the command string was unusable
    LaunchFailed { reason: String },
}

/// Result of executing one stage
///
/// Only exists for the duration of a run: it is logged and dropped.
#[derive(Debug, Clone)]
pub struct StageResult {
    pub stage: Stage,
    /// Stdout followed by stderr
    pub output: String,
    pub elapsed: Duration,
    pub outcome: StageOutcome,
}

impl StageResult {
    /// Builds a launch failure result with no output
    pub fn launch_failed(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            output: String::new(),
            elapsed: Duration::ZERO,
            outcome: StageOutcome::LaunchFailed {
                reason: reason.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, StageOutcome::Succeeded)
    }

    /// Human readable failure description, `None` on success
    pub fn failure_reason(&self) -> Option<String> {
        match &self.outcome {
            StageOutcome::Succeeded => None,
            StageOutcome::Exited { code: Some(code) } => Some(format!("exit status {}", code)),
            StageOutcome::Exited { code: None } => Some("terminated by signal".to_string()),
            StageOutcome::TimedOut { after } => Some(format!("timed out after {:?}", after)),
            StageOutcome::LaunchFailed { reason } => Some(format!("failed to launch: {}", reason)),
        }
    }
}
