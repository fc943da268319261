//! Server configuration
//!
//! Command line flags, each with an environment fallback.

use clap::Parser;
use podswap_core::workflow::DEFAULT_WORKFLOW_PATH;
use std::path::PathBuf;
use std::time::Duration;

use crate::api::health::HEALTH_PATH;
use crate::lifecycle::DEFAULT_SHUTDOWN_GRACE;
use crate::queue::QUEUE_CAPACITY;
use crate::scheduler::DEFAULT_STAGE_TIMEOUT;

#[derive(Debug, Clone, Parser)]
#[command(name = "podswap")]
#[command(about = "Rebuild and redeploy a project on every authenticated push", long_about = None)]
pub struct Config {
    /// Interface the webhook listener binds to
    #[arg(long, env = "PODSWAP_HOST", default_value = "localhost")]
    pub host: String,

    /// Port the webhook listener binds to
    #[arg(long, env = "PODSWAP_PORT", default_value_t = 8888)]
    pub port: u16,

    /// Directory the pipeline commands run in
    #[arg(long, env = "PODSWAP_PROJECT_PATH", default_value = ".")]
    pub project_path: PathBuf,

    /// Workflow file, relative to the project path
    #[arg(long, env = "PODSWAP_WORKFLOW", default_value = DEFAULT_WORKFLOW_PATH)]
    pub workflow: PathBuf,

    /// Path the webhook is served on
    #[arg(long, env = "PODSWAP_WEBHOOK_PATH", default_value = "/")]
    pub webhook_path: String,

    /// Shared secret used to sign webhook deliveries
    #[arg(long, env = "WEBHOOK_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// Seconds a single stage may run before it is killed
    #[arg(
        long,
        env = "PODSWAP_STAGE_TIMEOUT",
        default_value_t = DEFAULT_STAGE_TIMEOUT.as_secs()
    )]
    pub stage_timeout: u64,

    /// Triggers that can wait while a run is in progress
    #[arg(long, env = "PODSWAP_QUEUE_CAPACITY", default_value_t = QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Seconds open connections get to finish once shutdown starts
    #[arg(
        long,
        env = "PODSWAP_SHUTDOWN_GRACE",
        default_value_t = DEFAULT_SHUTDOWN_GRACE.as_secs()
    )]
    pub shutdown_grace: u64,

    /// Print a starter workflow file and exit
    #[arg(long)]
    pub template: bool,
}

impl Config {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace)
    }

    /// HMAC key, empty when no secret is configured
    pub fn secret_bytes(&self) -> &[u8] {
        self.secret.as_deref().unwrap_or_default().as_bytes()
    }

    pub fn has_secret(&self) -> bool {
        !self.secret_bytes().is_empty()
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.host.is_empty() {
            anyhow::bail!("host cannot be empty");
        }

        if !self.webhook_path.starts_with('/') {
            anyhow::bail!("webhook path must start with /");
        }

        if self.webhook_path == HEALTH_PATH {
            anyhow::bail!("webhook path cannot be {}", HEALTH_PATH);
        }

        if self.stage_timeout == 0 {
            anyhow::bail!("stage_timeout must be greater than 0");
        }

        if self.queue_capacity == 0 {
            anyhow::bail!("queue_capacity must be greater than 0");
        }

        if self.shutdown_grace == 0 {
            anyhow::bail!("shutdown_grace must be greater than 0");
        }

        Ok(())
    }
}
