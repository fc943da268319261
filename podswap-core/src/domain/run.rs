//! Pipeline run domain types
//!
//! Runs are not persisted. The runner publishes its current state and the
//! summary of the last run so the health endpoint can report them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::stage::Stage;

/// A step of a pipeline run, including the configuration reload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStep {
    PreBuild,
    Reload,
    Build,
    Deploy,
}

impl From<Stage> for PipelineStep {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::PreBuild => PipelineStep::PreBuild,
            Stage::Build => PipelineStep::Build,
            Stage::Deploy => PipelineStep::Deploy,
        }
    }
}

/// State of the pipeline runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "step", rename_all = "snake_case")]
pub enum RunnerState {
    Waiting,
    Running(PipelineStep),
    /// Terminal, entered on cancellation
    Stopped,
}

/// How a pipeline run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded,
    StageFailed { stage: Stage },
    ReloadFailed,
    /// Shutdown was observed before `before` could start
    Cancelled { before: PipelineStep },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Succeeded)
    }
}

/// Record of one finished pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: RunOutcome,
}

/// What the runner publishes after every state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerStatus {
    #[serde(flatten)]
    pub state: RunnerState,
    pub last_run: Option<RunSummary>,
}

impl Default for RunnerStatus {
    fn default() -> Self {
        Self {
            state: RunnerState::Waiting,
            last_run: None,
        }
    }
}
