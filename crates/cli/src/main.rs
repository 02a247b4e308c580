use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures_util::future::join_all;
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gobridge::{Bridge, BridgeConfig, CommandData};

const DEV_PAYLOADS: [&str; 5] = ["a", "b", "c", "d", "e"];

#[derive(Parser)]
#[command(name = "gobridge")]
#[command(about = "Run commands against a Go worker over a stdio bridge", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dev scenario: fire five trivial requests and print every response
    Run {
        /// Worker binary or .go source file
        #[arg(required_unless_present = "config")]
        target: Option<PathBuf>,

        /// Load the bridge config from a JSON file instead
        #[arg(long)]
        config: Option<PathBuf>,

        /// Per-command timeout in seconds (0 = wait forever)
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,

        /// Cap on concurrently outstanding commands
        #[arg(long)]
        max_in_flight: Option<usize>,
    },
    /// Send a single JSON object and print the response
    Exec {
        /// Worker binary or .go source file
        target: PathBuf,

        /// Request payload, e.g. '{"test":"a"}'
        payload: String,

        /// Per-command timeout in seconds (0 = wait forever)
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,

        /// Cap on concurrently outstanding commands
        #[arg(long)]
        max_in_flight: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gobridge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            target,
            config,
            timeout_secs,
            max_in_flight,
        } => run(build_config(target, config, timeout_secs, max_in_flight).await?).await,
        Commands::Exec {
            target,
            payload,
            timeout_secs,
            max_in_flight,
        } => {
            let config = build_config(Some(target), None, timeout_secs, max_in_flight).await?;
            exec(config, &payload).await
        }
    }
}

async fn build_config(
    target: Option<PathBuf>,
    config_path: Option<PathBuf>,
    timeout_secs: u64,
    max_in_flight: Option<usize>,
) -> Result<BridgeConfig> {
    let mut config = match config_path {
        Some(path) => BridgeConfig::load(&path)
            .await
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => {
            let Some(target) = target else {
                bail!("a worker target is required");
            };
            BridgeConfig::new(target)
        }
    };

    let timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));
    config = config.with_command_timeout(timeout);
    if let Some(max) = max_in_flight {
        config = config.with_max_in_flight(max);
    }
    Ok(config)
}

/// Reproduce the original dev harness: subscribe to the error feed, fire five
/// trivial requests concurrently, print each response, shut the worker down.
async fn run(config: BridgeConfig) -> Result<()> {
    let bridge = Bridge::connect(config).await?;
    print_errors(&bridge);

    let requests = DEV_PAYLOADS.iter().map(|value| {
        let bridge = &bridge;
        async move { (*value, bridge.execute(test_payload(value)).await) }
    });

    for (value, result) in join_all(requests).await {
        match result {
            Ok(data) => println!("{data}"),
            Err(err) => eprintln!("request {value:?} failed: {err}"),
        }
    }

    let status = bridge.close().await?;
    tracing::debug!(%status, "worker finished");
    Ok(())
}

async fn exec(config: BridgeConfig, payload: &str) -> Result<()> {
    let payload: CommandData =
        serde_json::from_str(payload).context("payload must be a JSON object")?;

    let bridge = Bridge::connect(config).await?;
    print_errors(&bridge);

    let data = bridge.execute(payload).await?;
    println!("{data}");

    bridge.close().await?;
    Ok(())
}

fn print_errors(bridge: &Bridge) {
    let mut errors = bridge.subscribe_errors();
    tokio::spawn(async move {
        while let Ok(event) = errors.recv().await {
            eprintln!("error: {} {}", event.parser, event.data);
        }
    });
}

fn test_payload(value: &str) -> CommandData {
    let mut cmd = CommandData::new();
    cmd.insert("test".to_string(), Value::String(value.to_string()));
    cmd
}
