//! Workflow file configuration source
//!
//! The stage commands live next to the project in a GitHub-Actions shaped
//! YAML document, so a pre-build step that pulls new sources can also change
//! the commands used for the rest of the same run:
//!
//! ```yaml
//! jobs:
//!   podswap:
//!     uses: podswap
//!     with:
//!       pre-build-cmd: git pull
//!       build-cmd: docker compose build
//!       deploy-cmd: docker compose up -d
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::pipeline::{PipelineConfig, workflow_key};
use crate::domain::stage::Stage;
use crate::error::ConfigError;

/// Default location of the workflow file, relative to the project
pub const DEFAULT_WORKFLOW_PATH: &str = ".github/workflows/podswap.yml";

/// Source of truth for the pipeline configuration
///
/// Called once at startup and again between pre-build and build of every run.
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Result<PipelineConfig, ConfigError>;
}

/// Top level of the workflow document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowDocument {
    pub jobs: WorkflowJobs,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowJobs {
    pub podswap: PodswapJob,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodswapJob {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses: Option<String>,
    #[serde(default)]
    pub with: StageCommands,
}

/// The `with:` block of the podswap job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCommands {
    #[serde(rename = "pre-build-cmd", default)]
    pub pre_build: String,
    #[serde(rename = "build-cmd", default)]
    pub build: String,
    #[serde(rename = "deploy-cmd", default)]
    pub deploy: String,
}

impl StageCommands {
    fn get(&self, stage: Stage) -> &str {
        match stage {
            Stage::PreBuild => &self.pre_build,
            Stage::Build => &self.build,
            Stage::Deploy => &self.deploy,
        }
    }

    /// Rejects the first command that is missing or blank
    pub fn validate(&self) -> Result<(), ConfigError> {
        for stage in Stage::ALL {
            if self.get(stage).trim().is_empty() {
                return Err(ConfigError::MissingField(workflow_key(stage)));
            }
        }
        Ok(())
    }
}

impl WorkflowDocument {
    /// Parses a workflow document; commands are not checked here
    pub fn parse(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Starter document printed by `--template`
    pub fn template() -> Self {
        Self {
            jobs: WorkflowJobs {
                podswap: PodswapJob {
                    uses: Some("podswap".to_string()),
                    with: StageCommands {
                        pre_build: "git pull".to_string(),
                        build: "docker compose build".to_string(),
                        deploy: "docker compose up -d".to_string(),
                    },
                },
            },
        }
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Loads the pipeline configuration from a workflow file in the project
#[derive(Debug, Clone)]
pub struct WorkflowFile {
    work_dir: PathBuf,
    path: PathBuf,
}

impl WorkflowFile {
    /// `path` is taken relative to `work_dir` unless it is absolute
    pub fn new(work_dir: impl Into<PathBuf>, path: impl AsRef<Path>) -> Self {
        let work_dir = work_dir.into();
        let path = work_dir.join(path.as_ref());
        Self { work_dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}

impl ConfigSource for WorkflowFile {
    fn load(&self) -> Result<PipelineConfig, ConfigError> {
        let work_dir = self
            .work_dir
            .canonicalize()
            .map_err(|e| ConfigError::work_dir(&self.work_dir, e))?;

        let contents =
            std::fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
                path: self.path.clone(),
                source,
            })?;

        let document =
            WorkflowDocument::parse(&contents).map_err(|source| ConfigError::Parse {
                path: self.path.clone(),
                source,
            })?;

        let commands = document.jobs.podswap.with;
        commands.validate()?;

        let config = PipelineConfig::new(
            commands.pre_build,
            commands.build,
            commands.deploy,
            work_dir,
        );
        config.validate()?;

        debug!("Loaded pipeline config from {}", self.path.display());
        Ok(config)
    }
}
