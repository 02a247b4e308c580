//! Turns a configured target into a spawnable worker command.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command as WorkerCommand;
use tracing::debug;

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};

/// Build the process command for the configured target.
///
/// `.go` sources are launched through `go run`; anything else runs directly,
/// falling back to PATH resolution for bare names. All three stdio streams
/// are piped and the worker is killed if the handle is dropped.
pub(crate) fn worker_command(config: &BridgeConfig) -> Result<WorkerCommand> {
    let mut command = if is_go_source(&config.target) {
        if !config.target.exists() {
            return Err(BridgeError::TargetNotFound(config.target.clone()));
        }
        let go = which::which("go")?;
        debug!(go = %go.display(), target = %config.target.display(), "Launching via go run");
        let mut command = WorkerCommand::new(go);
        command.arg("run").arg(&config.target);
        command
    } else {
        let binary = resolve_binary(&config.target)?;
        debug!(binary = %binary.display(), "Launching worker binary");
        WorkerCommand::new(binary)
    };

    command
        .args(&config.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    Ok(command)
}

fn is_go_source(target: &Path) -> bool {
    target.extension().is_some_and(|ext| ext == "go")
}

fn resolve_binary(target: &Path) -> Result<PathBuf> {
    if target.exists() {
        return Ok(target.to_path_buf());
    }
    which::which(target).map_err(|_| BridgeError::TargetNotFound(target.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_go_source_detection() {
        assert!(is_go_source(Path::new("devtest.go")));
        assert!(!is_go_source(Path::new("worker")));
        assert!(!is_go_source(Path::new("worker.sh")));
    }

    #[test]
    fn test_missing_go_source_errors() {
        let config = BridgeConfig::new("no/such/devtest.go");
        let result = worker_command(&config);
        assert!(matches!(result, Err(BridgeError::TargetNotFound(_))));
    }

    #[test]
    fn test_missing_binary_errors() {
        let config = BridgeConfig::new("definitely-not-a-real-worker-binary");
        let result = worker_command(&config);
        assert!(matches!(result, Err(BridgeError::TargetNotFound(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_bare_name_resolves_on_path() {
        let config = BridgeConfig::new("cat");
        assert!(worker_command(&config).is_ok());
    }
}
