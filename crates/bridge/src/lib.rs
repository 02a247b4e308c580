//! Run Go code from Rust.
//!
//! `gobridge` spawns a Go worker process (a compiled binary, or a `.go`
//! source file launched through `go run`) and exchanges line-delimited JSON
//! with it over the worker's stdin/stdout. Each request carries a monotonic
//! id; the worker answers with a response tagged with the same id, so any
//! number of requests can be in flight at once.
//!
//! Faults that are not tied to a single request, such as a stdout line that
//! fails to parse or anything the worker writes to stderr, are published on a
//! broadcast [`ErrorFeed`] that any number of consumers can subscribe to.
//!
//! ```no_run
//! use gobridge::{Bridge, BridgeConfig, CommandData};
//!
//! # async fn run() -> gobridge::Result<()> {
//! let bridge = Bridge::connect(BridgeConfig::new("devtest.go")).await?;
//!
//! let mut errors = bridge.subscribe_errors();
//! tokio::spawn(async move {
//!     while let Ok(event) = errors.recv().await {
//!         eprintln!("error: {} {}", event.parser, event.data);
//!     }
//! });
//!
//! let mut payload = CommandData::new();
//! payload.insert("test".into(), "a".into());
//! let data = bridge.execute(payload).await?;
//! println!("{data}");
//!
//! bridge.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod events;
mod launcher;
mod session;
pub mod wire;

pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use events::{ErrorEvent, ErrorFeed, Parser};
pub use wire::{Command, CommandData, Response};
