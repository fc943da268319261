//! Podswap Server
//!
//! Listens for signed push webhooks and redeploys the project on each one.
//!
//! Architecture:
//! - Configuration: command line flags with environment fallbacks
//! - API: webhook receiver and health endpoint
//! - Queue: bounded hand-off between the receiver and the runner
//! - Scheduler: the pipeline runner (pre-build, reload, build, deploy)
//! - Services: stage command execution
//! - Lifecycle: listener, serve loop and graceful shutdown

mod api;
mod config;
mod lifecycle;
mod queue;
mod scheduler;
mod service;
mod shutdown;

use anyhow::{Context, Result};
use clap::Parser;
use podswap_core::workflow::WorkflowDocument;
use podswap_core::{ConfigSource, Stage, WorkflowFile};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::{AppState, create_router};
use crate::config::Config;
use crate::lifecycle::{Coordinator, TcpBinder};
use crate::scheduler::PipelineRunner;
use crate::service::ProcessExecutor;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    if config.template {
        let template = WorkflowDocument::template()
            .to_yaml()
            .context("Failed to render workflow template")?;
        print!("{}", template);
        return Ok(());
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "podswap_server=info,podswap_core=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting podswap");

    config.validate().context("Invalid configuration")?;

    let source = Arc::new(WorkflowFile::new(&config.project_path, &config.workflow));
    info!("Loading workflow from {}", source.path().display());
    let pipeline = source.load().context("Failed to load workflow")?;

    let runner = PipelineRunner::new(
        pipeline,
        source,
        Arc::new(ProcessExecutor::new()),
        config.stage_timeout(),
    );

    info!("Project path: {}", runner.config().work_dir().display());
    for stage in Stage::ALL {
        info!("  {}: {}", stage, runner.config().command(stage));
    }
    info!("Stage timeout: {:?}", config.stage_timeout());

    if !config.has_secret() {
        warn!("WEBHOOK_SECRET is not set, webhook signatures are checked against an empty key");
    }

    let (queue_tx, queue_rx) = queue::channel(config.queue_capacity);

    let state = AppState::new(config.secret_bytes(), queue_tx, runner.subscribe());
    let app = create_router(state, &config.webhook_path);
    info!("Webhook path: {}", config.webhook_path);

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown::cancel_on_signal(cancel.clone()));

    Coordinator::new(app, runner, queue_rx, config.shutdown_grace())
        .run(&TcpBinder::new(config.bind_addr()), cancel)
        .await
        .context("Server stopped with an error")?;

    info!("Podswap stopped");
    Ok(())
}
