//! End-to-end tests against real worker processes.
//!
//! A small `sh` read-loop stands in for a Go worker: it answers each command
//! line with a well-formed response frame. `cat` serves as a degenerate
//! worker whose echoes never parse as responses and therefore surface on the
//! error feed.

#![cfg(unix)]

use std::time::Duration;

use serde_json::json;
use tokio::time;

use gobridge::{Bridge, BridgeConfig, BridgeError, CommandData, Parser};

/// Answers the k-th command line with `{"id":k,"data":{"seq":k}}`.
///
/// Valid only for sequential submits, where command ids match line order.
const SEQ_WORKER: &str =
    r#"i=1; while read line; do echo "{\"id\":$i,\"data\":{\"seq\":$i}}"; i=$((i+1)); done"#;

fn sh_worker(script: &str) -> BridgeConfig {
    BridgeConfig::new("sh").with_args(["-c", script])
}

fn payload(value: &str) -> CommandData {
    let mut cmd = CommandData::new();
    cmd.insert("test".to_string(), json!(value));
    cmd
}

#[tokio::test]
async fn test_five_requests_none_dropped() {
    let bridge = Bridge::connect(sh_worker(SEQ_WORKER)).await.unwrap();

    // The dev scenario: five trivial payloads, each answered exactly once.
    for (i, value) in ["a", "b", "c", "d", "e"].iter().enumerate() {
        let data = bridge.execute(payload(value)).await.unwrap();
        assert_eq!(data, json!({"seq": i as u64 + 1}));
    }

    let status = bridge.close().await.unwrap();
    assert!(status.success());
}

#[tokio::test]
async fn test_init_completes_exactly_once() {
    let mut bridge = Bridge::connect(BridgeConfig::new("cat")).await.unwrap();
    assert!(bridge.is_ready());

    let result = bridge.init().await;
    assert!(matches!(result, Err(BridgeError::AlreadyInitialized)));

    // Still usable after the refused second init.
    assert!(bridge.is_ready());
    bridge.close().await.unwrap();
}

#[tokio::test]
async fn test_echoed_command_surfaces_as_parse_error() {
    let bridge = Bridge::connect(
        BridgeConfig::new("cat").with_command_timeout(Some(Duration::from_millis(200))),
    )
    .await
    .unwrap();
    let mut errors = bridge.subscribe_errors();

    // cat echoes the command frame, which is not a response: the request
    // times out and the echo comes back through the error feed.
    let result = bridge.execute(payload("a")).await;
    assert!(matches!(result, Err(BridgeError::Timeout { .. })));

    let event = time::timeout(Duration::from_secs(2), errors.recv())
        .await
        .expect("no error event")
        .unwrap();
    assert_eq!(event.parser, Parser::Response);
    assert!(event.data.contains("\"test\":\"a\""));

    bridge.close().await.unwrap();
}

#[tokio::test]
async fn test_stderr_surfaces_on_error_feed() {
    let mut bridge = Bridge::new(sh_worker(r#"echo "boom" >&2; cat > /dev/null"#));
    let mut errors = bridge.subscribe_errors();
    bridge.init().await.unwrap();

    let event = time::timeout(Duration::from_secs(2), errors.recv())
        .await
        .expect("no error event")
        .unwrap();
    assert_eq!(event.parser, Parser::Stderr);
    assert_eq!(event.data, "boom");

    bridge.close().await.unwrap();
}

#[tokio::test]
async fn test_close_kills_worker_that_ignores_termination() {
    // Worker never reads stdin and never exits on its own.
    let bridge = Bridge::connect(
        sh_worker("sleep 600").with_termination_grace(Duration::from_millis(100)),
    )
    .await
    .unwrap();

    let status = bridge.close().await.unwrap();
    assert!(!status.success());
}

#[tokio::test]
async fn test_worker_exit_fails_in_flight_request() {
    // Worker exits immediately after the first command arrives.
    let bridge = Bridge::connect(sh_worker("read line; exit 0").with_command_timeout(None))
        .await
        .unwrap();

    let result = bridge.execute(payload("a")).await;
    assert!(matches!(result, Err(BridgeError::WorkerExited)));
}
