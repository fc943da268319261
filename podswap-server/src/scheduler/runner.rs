//! Pipeline runner
//!
//! Single consumer of the request queue. Each trigger runs the pipeline
//! pre-build → reload → build → deploy, strictly in order, one run at a time,
//! so deploys never overlap.
//!
//! Failures abandon the rest of the run and the runner goes back to waiting.
//! Nothing is retried and nothing is rolled back.

use chrono::Utc;
use podswap_core::{
    CommandLine, ConfigSource, PipelineConfig, PipelineStep, RunOutcome, RunSummary, RunnerState,
    RunnerStatus, Stage, StageResult,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::queue::TriggerReceiver;
use crate::service::StageExecutor;

/// Default time a single stage may run before it is killed
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(500);

/// Runs the pipeline once per trigger signal
pub struct PipelineRunner {
    config: PipelineConfig,
    source: Arc<dyn ConfigSource>,
    executor: Arc<dyn StageExecutor>,
    stage_timeout: Duration,
    status: watch::Sender<RunnerStatus>,
}

impl PipelineRunner {
    /// Creates a runner starting from an already loaded configuration
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn ConfigSource>,
        executor: Arc<dyn StageExecutor>,
        stage_timeout: Duration,
    ) -> Self {
        let (status, _) = watch::channel(RunnerStatus::default());
        Self {
            config,
            source,
            executor,
            stage_timeout,
            status,
        }
    }

    /// Receives every state change and the summary of the last run
    pub fn subscribe(&self) -> watch::Receiver<RunnerStatus> {
        self.status.subscribe()
    }

    /// Configuration the next stage would use
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Consumes triggers until `cancel` fires or the queue closes
    ///
    /// Cancellation is only observed while waiting for a trigger and between
    /// stages. A command that is already running is left to finish or time out.
    pub async fn run(mut self, mut queue: TriggerReceiver, cancel: CancellationToken) {
        info!(
            "Pipeline runner is active (stage timeout: {:?})",
            self.stage_timeout
        );

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    info!("Shutdown requested, stopping pipeline runner");
                    break;
                }

                trigger = queue.next() => {
                    if trigger.is_none() {
                        info!("Request queue closed, stopping pipeline runner");
                        break;
                    }
                    self.run_pipeline(&cancel).await;
                }
            }
        }

        self.status.send_modify(|status| status.state = RunnerState::Stopped);
        info!("Pipeline runner stopped");
    }

    /// Executes one full pipeline run
    pub async fn run_pipeline(&mut self, cancel: &CancellationToken) -> RunSummary {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        let outcome = match self
            .execute_steps(cancel)
            .instrument(info_span!("pipeline_run", %run_id))
            .await
        {
            Ok(()) => {
                info!("Pipeline run {} succeeded", run_id);
                RunOutcome::Succeeded
            }
            Err(outcome) => {
                warn!("Pipeline run {} abandoned: {:?}", run_id, outcome);
                outcome
            }
        };

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            outcome,
        };

        self.status.send_modify(|status| {
            status.state = RunnerState::Waiting;
            status.last_run = Some(summary.clone());
        });

        summary
    }

    async fn execute_steps(&mut self, cancel: &CancellationToken) -> Result<(), RunOutcome> {
        info!("Received pipeline trigger");

        self.run_stage(Stage::PreBuild, cancel).await?;
        self.reload(cancel).await?;
        self.run_stage(Stage::Build, cancel).await?;
        self.run_stage(Stage::Deploy, cancel).await?;

        Ok(())
    }

    /// Replaces the configuration so commands changed by pre-build apply to
    /// the rest of this run
    async fn reload(&mut self, cancel: &CancellationToken) -> Result<(), RunOutcome> {
        self.enter(PipelineStep::Reload, cancel)?;

        let source = Arc::clone(&self.source);
        let loaded = match tokio::task::spawn_blocking(move || source.load()).await {
            Ok(loaded) => loaded,
            Err(e) => {
                error!("Config reload task failed: {}", e);
                return Err(RunOutcome::ReloadFailed);
            }
        };

        match loaded {
            Ok(config) => {
                if config != self.config {
                    info!(
                        "Updated config: pre-build={:?} build={:?} deploy={:?} workdir={}",
                        config.pre_build,
                        config.build,
                        config.deploy,
                        config.work_dir.display()
                    );
                } else {
                    debug!("Reloaded config is unchanged");
                }
                self.config = config;
                Ok(())
            }
            Err(e) => {
                error!("Failed to reload config: {}", e);
                Err(RunOutcome::ReloadFailed)
            }
        }
    }

    async fn run_stage(&self, stage: Stage, cancel: &CancellationToken) -> Result<(), RunOutcome> {
        self.enter(stage.into(), cancel)?;

        let raw = self.config.command(stage);
        info!("Running {} command {:?}", stage, raw);

        let result = match CommandLine::parse(raw) {
            Ok(command) => {
                self.executor
                    .execute(stage, &command, self.config.work_dir(), self.stage_timeout)
                    .await
            }
            Err(e) => StageResult::launch_failed(stage, e.to_string()),
        };

        match result.failure_reason() {
            None => {
                info!(
                    "{} command succeeded in {:?}, output:\n{}",
                    stage, result.elapsed, result.output
                );
                Ok(())
            }
            Some(reason) => {
                error!(
                    "{} command failed ({}) after {:?}, output:\n{}",
                    stage, reason, result.elapsed, result.output
                );
                Err(RunOutcome::StageFailed { stage })
            }
        }
    }

    /// Publishes the new step, refusing to start it after shutdown was requested
    fn enter(&self, step: PipelineStep, cancel: &CancellationToken) -> Result<(), RunOutcome> {
        if cancel.is_cancelled() {
            warn!("Shutdown requested, not starting {:?}", step);
            return Err(RunOutcome::Cancelled { before: step });
        }
        self.status
            .send_modify(|status| status.state = RunnerState::Running(step));
        Ok(())
    }
}
