//! Lifecycle coordination
//!
//! Owns the listener and the pipeline runner task:
//! - Obtains a listening socket from a [`ListenerProvider`]
//! - Serves HTTP and runs the pipeline runner concurrently
//! - On cancellation, closes the server within a grace period and lets the
//!   runner finish the command it is currently running

use async_trait::async_trait;
use axum::Router;
use std::future::IntoFuture;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::queue::TriggerReceiver;
use crate::scheduler::PipelineRunner;

/// Default time given to open connections once shutdown starts
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Supplies the socket the webhook endpoint is served on
#[async_trait]
pub trait ListenerProvider: Send + Sync {
    async fn obtain(&self, cancel: &CancellationToken) -> io::Result<TcpListener>;
}

/// Binds a local TCP address
#[derive(Debug, Clone)]
pub struct TcpBinder {
    addr: String,
}

impl TcpBinder {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl ListenerProvider for TcpBinder {
    async fn obtain(&self, cancel: &CancellationToken) -> io::Result<TcpListener> {
        tokio::select! {
            listener = TcpListener::bind(&self.addr) => listener,
            () = cancel.cancelled() => Err(io::Error::new(
                io::ErrorKind::Interrupted,
                "shutdown requested before the listener was bound",
            )),
        }
    }
}

/// Errors that end the service
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to obtain listener: {0}")]
    Listener(#[source] io::Error),

    #[error("server error: {0}")]
    Serve(#[source] io::Error),

    #[error("server stopped before shutdown was requested")]
    ServerStopped,

    #[error("server task failed: {0}")]
    ServerTask(#[source] JoinError),

    #[error("pipeline runner task failed: {0}")]
    Runner(#[source] JoinError),
}

/// Runs the HTTP server and the pipeline runner until cancellation
pub struct Coordinator {
    router: Router,
    runner: PipelineRunner,
    queue: TriggerReceiver,
    shutdown_grace: Duration,
}

impl Coordinator {
    pub fn new(
        router: Router,
        runner: PipelineRunner,
        queue: TriggerReceiver,
        shutdown_grace: Duration,
    ) -> Self {
        Self {
            router,
            runner,
            queue,
            shutdown_grace,
        }
    }

    /// Serves until `cancel` fires or the server fails
    ///
    /// A cancellation-triggered shutdown returns `Ok(())`, even when open
    /// connections outlive the grace period.
    pub async fn run(
        self,
        provider: &dyn ListenerProvider,
        cancel: CancellationToken,
    ) -> Result<(), LifecycleError> {
        let listener = provider
            .obtain(&cancel)
            .await
            .map_err(LifecycleError::Listener)?;

        match listener.local_addr() {
            Ok(addr) => info!("Listener started on {}", addr),
            Err(e) => warn!("Listener started, address unknown: {}", e),
        }

        // Also cancelled when the server fails on its own
        let shutdown = cancel.child_token();

        let runner = tokio::spawn(self.runner.run(self.queue, shutdown.clone()));

        let mut server = tokio::spawn(
            axum::serve(listener, self.router)
                .with_graceful_shutdown(shutdown.clone().cancelled_owned())
                .into_future(),
        );
        info!("Started server");

        let served = tokio::select! {
            biased;

            () = shutdown.cancelled() => {
                info!("Shutdown requested, stopping the server");
                match tokio::time::timeout(self.shutdown_grace, &mut server).await {
                    Ok(Ok(Ok(()))) => {
                        info!("Stopped server");
                        Ok(())
                    }
                    Ok(Ok(Err(e))) => {
                        error!("Error trying to shut down server: {}", e);
                        Err(LifecycleError::Serve(e))
                    }
                    Ok(Err(e)) => Err(LifecycleError::ServerTask(e)),
                    Err(_) => {
                        server.abort();
                        error!(
                            "Server connections refused to close within {:?}, ending anyway",
                            self.shutdown_grace
                        );
                        Ok(())
                    }
                }
            }

            result = &mut server => {
                match result {
                    Ok(Ok(())) if shutdown.is_cancelled() => {
                        info!("Stopped server");
                        Ok(())
                    }
                    Ok(Ok(())) => {
                        error!("Server stopped before shutdown was requested");
                        Err(LifecycleError::ServerStopped)
                    }
                    Ok(Err(e)) => {
                        error!("Server error: {}", e);
                        Err(LifecycleError::Serve(e))
                    }
                    Err(e) => Err(LifecycleError::ServerTask(e)),
                }
            }
        };

        shutdown.cancel();
        info!("Waiting for the pipeline runner to stop");
        if let Err(e) = runner.await {
            error!("Pipeline runner task failed: {}", e);
            if served.is_ok() {
                return Err(LifecycleError::Runner(e));
            }
        }

        served
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{AppState, create_router};
    use crate::queue;
    use crate::service::ProcessExecutor;
    use axum::routing::get;
    use podswap_core::{
        ConfigError, ConfigSource, PipelineConfig, RunOutcome, RunnerState, RunnerStatus,
        signature,
    };
    use std::sync::{Arc, Mutex};
    use std::time::Instant;
    use tokio::sync::watch;

    const SECRET: &str = "It's a Secret to Everybody";

    struct StaticSource(PipelineConfig);

    impl ConfigSource for StaticSource {
        fn load(&self) -> Result<PipelineConfig, ConfigError> {
            Ok(self.0.clone())
        }
    }

    /// Hands out a listener bound by the test
    struct Prebound(Mutex<Option<TcpListener>>);

    #[async_trait]
    impl ListenerProvider for Prebound {
        async fn obtain(&self, _cancel: &CancellationToken) -> io::Result<TcpListener> {
            self.0
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| io::Error::other("listener already taken"))
        }
    }

    struct Failing;

    #[async_trait]
    impl ListenerProvider for Failing {
        async fn obtain(&self, _cancel: &CancellationToken) -> io::Result<TcpListener> {
            Err(io::Error::other("tunnel unavailable"))
        }
    }

    async fn prebound() -> (Prebound, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());
        (Prebound(Mutex::new(Some(listener))), addr)
    }

    /// Coordinator whose pipeline runs `true` three times
    fn coordinator(
        work_dir: &std::path::Path,
        extra: Router,
    ) -> (Coordinator, watch::Receiver<RunnerStatus>) {
        let config = PipelineConfig::new("true", "true", "true", work_dir);
        let runner = PipelineRunner::new(
            config.clone(),
            Arc::new(StaticSource(config)),
            Arc::new(ProcessExecutor::new()),
            Duration::from_secs(10),
        );
        let status = runner.subscribe();
        let (tx, rx) = queue::channel(queue::QUEUE_CAPACITY);
        let router = create_router(AppState::new(SECRET, tx, status.clone()), "/").merge(extra);
        (
            Coordinator::new(router, runner, rx, Duration::from_millis(300)),
            status,
        )
    }

    #[tokio::test]
    async fn test_clean_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, status) = coordinator(dir.path(), Router::new());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move { coordinator.run(&TcpBinder::new("127.0.0.1:0"), cancel).await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert_eq!(status.borrow().state, RunnerState::Stopped);
    }

    #[tokio::test]
    async fn test_shutdown_before_serving_is_clean() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, status) = coordinator(dir.path(), Router::new());
        let (provider, _url) = prebound().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let run = coordinator.run(&provider, cancel);
        let result = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .unwrap();

        assert!(result.is_ok(), "{:?}", result);
        assert_eq!(status.borrow().state, RunnerState::Stopped);
    }

    #[tokio::test]
    async fn test_push_runs_pipeline_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, mut status) = coordinator(dir.path(), Router::new());
        let (provider, url) = prebound().await;
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move { coordinator.run(&provider, cancel).await }
        });

        let body = "Hello, World!";
        let response = reqwest::Client::new()
            .post(&url)
            .header("x-github-event", "push")
            .header(
                "x-hub-signature-256",
                signature::sign(SECRET.as_bytes(), body.as_bytes()),
            )
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);

        let summary = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                if let Some(summary) = status.borrow_and_update().last_run.clone() {
                    return summary;
                }
                status.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
        assert_eq!(summary.outcome, RunOutcome::Succeeded);

        cancel.cancel();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_listener_failure_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, _status) = coordinator(dir.path(), Router::new());

        let result = coordinator.run(&Failing, CancellationToken::new()).await;

        assert!(matches!(result, Err(LifecycleError::Listener(_))));
    }

    #[tokio::test]
    async fn test_bind_conflict_is_terminal() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap().to_string();
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, _status) = coordinator(dir.path(), Router::new());

        let result = coordinator
            .run(&TcpBinder::new(addr), CancellationToken::new())
            .await;

        assert!(matches!(result, Err(LifecycleError::Listener(_))));
    }

    #[tokio::test]
    async fn test_shutdown_proceeds_after_grace_period() {
        let dir = tempfile::tempdir().unwrap();
        let hang = Router::new().route("/hang", get(std::future::pending::<()>));
        let (coordinator, _status) = coordinator(dir.path(), hang);
        let (provider, url) = prebound().await;
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move { coordinator.run(&provider, cancel).await }
        });

        // Keep one connection busy forever
        let _client = tokio::spawn(reqwest::get(format!("{}/hang", url)));
        tokio::time::sleep(Duration::from_millis(200)).await;

        let started = Instant::now();
        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        assert!(result.is_ok());
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
