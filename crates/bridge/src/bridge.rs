//! The public session facade over a spawned worker.

use std::process::ExitStatus;
use std::time::Duration;

use serde_json::Value;
use tokio::process::Child;
use tokio::sync::broadcast;
use tokio::time;
use tracing::{info, warn};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::events::{ErrorEvent, ErrorFeed};
use crate::launcher;
use crate::session::Session;
use crate::wire::CommandData;

/// A single logical session against a Go worker process.
///
/// The bridge is an owned value, not a singleton; share it behind an `Arc` if
/// several tasks need it. `execute` takes `&self`, while [`close`](Bridge::close)
/// consumes the bridge so no request can race the shutdown.
pub struct Bridge {
    config: BridgeConfig,
    feed: ErrorFeed,
    session: Option<Session>,
    child: Option<Child>,
}

impl Bridge {
    /// Create an unstarted bridge. Call [`init`](Bridge::init) before executing.
    pub fn new(config: BridgeConfig) -> Self {
        let feed = ErrorFeed::with_capacity(config.event_capacity);
        Self {
            config,
            feed,
            session: None,
            child: None,
        }
    }

    /// Create a bridge and initialize it at once.
    pub async fn connect(config: BridgeConfig) -> Result<Self> {
        let mut bridge = Self::new(config);
        bridge.init().await?;
        Ok(bridge)
    }

    /// Spawn the worker and start the session tasks.
    ///
    /// Completes exactly once per instance; a second call returns
    /// [`BridgeError::AlreadyInitialized`].
    pub async fn init(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Err(BridgeError::AlreadyInitialized);
        }

        let mut command = launcher::worker_command(&self.config)?;
        let mut child = command.spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::Io(std::io::Error::other("worker stdin not piped")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::Io(std::io::Error::other("worker stdout not piped")))?;
        let stderr = child.stderr.take();

        self.session = Some(Session::start(
            stdout,
            stdin,
            stderr,
            self.feed.clone(),
            self.config.max_in_flight,
        ));
        self.child = Some(child);

        info!(target = %self.config.target.display(), "worker started");
        Ok(())
    }

    /// Whether [`init`](Bridge::init) has completed.
    pub fn is_ready(&self) -> bool {
        self.session.is_some()
    }

    /// Submit a request and resolve with its correlated response data.
    ///
    /// Uses the configured default command timeout. Calling before `init`
    /// returns [`BridgeError::NotReady`]; requests are never queued ahead of
    /// readiness.
    pub async fn execute(&self, payload: CommandData) -> Result<Value> {
        self.execute_inner(payload, self.config.command_timeout)
            .await
    }

    /// Like [`execute`](Bridge::execute) with an explicit deadline.
    pub async fn execute_with_timeout(
        &self,
        payload: CommandData,
        timeout: Duration,
    ) -> Result<Value> {
        self.execute_inner(payload, Some(timeout)).await
    }

    async fn execute_inner(
        &self,
        payload: CommandData,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let session = self.session.as_ref().ok_or(BridgeError::NotReady)?;
        let response = session.submit(payload, timeout).await?;
        Ok(response.data)
    }

    /// Subscribe to asynchronous fault events.
    ///
    /// Each call returns an independent receiver; events published before the
    /// call are not replayed.
    pub fn subscribe_errors(&self) -> broadcast::Receiver<ErrorEvent> {
        self.feed.subscribe()
    }

    /// Send the termination signal and wait for the worker to exit, killing
    /// it after the configured grace period. Outstanding requests fail with
    /// [`BridgeError::WorkerExited`].
    pub async fn close(mut self) -> Result<ExitStatus> {
        let session = self.session.take().ok_or(BridgeError::NotReady)?;
        session.shutdown().await?;

        let mut child = self.child.take().ok_or(BridgeError::WorkerExited)?;
        match time::timeout(self.config.termination_grace, child.wait()).await {
            Ok(status) => {
                let status = status?;
                info!(%status, "worker exited");
                Ok(status)
            }
            Err(_) => {
                warn!(
                    grace = ?self.config.termination_grace,
                    "worker ignored termination signal, killing"
                );
                child.kill().await?;
                Ok(child.wait().await?)
            }
        }
    }
}
