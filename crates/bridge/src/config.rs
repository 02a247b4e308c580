use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::error::Result;

const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_IN_FLIGHT: usize = 100;
const DEFAULT_TERMINATION_GRACE_MS: u64 = 3000;
const DEFAULT_EVENT_CAPACITY: usize = 1000;

/// Configuration for a [`Bridge`](crate::Bridge).
///
/// Only `target` is required: the path to the worker binary, a `.go` source
/// file to launch through `go run`, or a bare name resolved on PATH.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Worker binary or `.go` source file
    pub target: PathBuf,
    /// Extra argv passed to the worker
    #[serde(default)]
    pub args: Vec<String>,
    /// Per-command deadline; `None` waits forever
    #[serde(default = "default_command_timeout")]
    pub command_timeout: Option<Duration>,
    /// Cap on concurrently outstanding commands
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// How long `close` waits after the termination signal before killing
    #[serde(default = "default_termination_grace")]
    pub termination_grace: Duration,
    /// Capacity of the error event broadcast channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_command_timeout() -> Option<Duration> {
    Some(Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS))
}

fn default_max_in_flight() -> usize {
    DEFAULT_MAX_IN_FLIGHT
}

fn default_termination_grace() -> Duration {
    Duration::from_millis(DEFAULT_TERMINATION_GRACE_MS)
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

impl BridgeConfig {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            args: Vec::new(),
            command_timeout: default_command_timeout(),
            max_in_flight: default_max_in_flight(),
            termination_grace: default_termination_grace(),
            event_capacity: default_event_capacity(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max.max(1);
        self
    }

    pub fn with_termination_grace(mut self, grace: Duration) -> Self {
        self.termination_grace = grace;
        self
    }

    /// Load a config from a JSON file.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        let config = serde_json::from_str(&content)?;
        debug!(path = %path.display(), "Config loaded successfully");
        Ok(config)
    }

    /// Write the config to a JSON file.
    pub async fn write(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        debug!(path = %path.display(), "Config saved successfully");
        Ok(())
    }
}
