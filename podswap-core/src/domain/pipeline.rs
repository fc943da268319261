//! Pipeline domain types

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::command::{CommandLine, resolve_executable_from};
use crate::domain::stage::Stage;
use crate::error::ConfigError;

/// Marker that a validated push webhook arrived
///
/// Carries no payload: the runner only needs to know that it should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TriggerSignal;

/// Commands of one pipeline and the directory they run in
///
/// Replaced wholesale on every reload, never patched in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub pre_build: String,
    pub build: String,
    pub deploy: String,
    pub work_dir: PathBuf,
}

impl PipelineConfig {
    pub fn new(
        pre_build: impl Into<String>,
        build: impl Into<String>,
        deploy: impl Into<String>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            pre_build: pre_build.into(),
            build: build.into(),
            deploy: deploy.into(),
            work_dir: work_dir.into(),
        }
    }

    /// Command string configured for a stage
    pub fn command(&self, stage: Stage) -> &str {
        match stage {
            Stage::PreBuild => &self.pre_build,
            Stage::Build => &self.build,
            Stage::Deploy => &self.deploy,
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Checks that the work dir is a directory and every command resolves
    /// to an executable, relative paths being taken from the work dir
    pub fn validate(&self) -> Result<(), ConfigError> {
        let metadata = std::fs::metadata(&self.work_dir)
            .map_err(|e| ConfigError::work_dir(&self.work_dir, e))?;
        if !metadata.is_dir() {
            return Err(ConfigError::work_dir(&self.work_dir, "not a directory"));
        }

        for stage in Stage::ALL {
            let field = workflow_key(stage);
            let command = CommandLine::parse(self.command(stage))
                .map_err(|source| ConfigError::Command { field, source })?;
            let path = resolve_executable_from(&command.program, &self.work_dir)
                .map_err(|source| ConfigError::Command { field, source })?;
            tracing::debug!(
                "resolved {} to {} {:?}",
                field,
                path.display(),
                command.args
            );
        }

        Ok(())
    }
}

/// Key of a stage command in the workflow file
pub(crate) fn workflow_key(stage: Stage) -> &'static str {
    match stage {
        Stage::PreBuild => "pre-build-cmd",
        Stage::Build => "build-cmd",
        Stage::Deploy => "deploy-cmd",
    }
}
