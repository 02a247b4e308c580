use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bridge has not been initialized")]
    NotReady,

    #[error("bridge is already initialized")]
    AlreadyInitialized,

    #[error("bridge is closed")]
    Closed,

    #[error("worker exited before responding")]
    WorkerExited,

    #[error("command timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    #[error("go tool not found: {0}")]
    GoToolNotFound(#[from] which::Error),

    #[error("worker target not found: {0}")]
    TargetNotFound(PathBuf),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = BridgeError::TargetNotFound(PathBuf::from("devtest.go"));
        assert!(error.to_string().contains("devtest.go"));

        let error = BridgeError::Timeout {
            elapsed: Duration::from_secs(10),
        };
        assert!(error.to_string().contains("10s"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let error: BridgeError = io.into();
        assert!(matches!(error, BridgeError::Io(_)));
    }
}
