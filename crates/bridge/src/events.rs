//! Asynchronous fault events, published on a broadcast channel.
//!
//! Faults that belong to no single request (a stdout line that failed to
//! parse as a response, a line the worker wrote to stderr) are delivered here
//! instead of through a request's `Result`.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default capacity for the broadcast channel
const DEFAULT_CAPACITY: usize = 1000;

/// Which decoder raised the fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parser {
    /// A worker stdout line that did not parse as a response frame.
    Response,
    /// A line the worker wrote to stderr.
    Stderr,
}

impl fmt::Display for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parser::Response => write!(f, "response"),
            Parser::Stderr => write!(f, "stderr"),
        }
    }
}

/// A fault notification from the worker session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    /// Which parser raised the fault
    pub parser: Parser,
    /// The offending line, verbatim
    pub data: String,
    /// When the fault was observed
    pub timestamp: DateTime<Utc>,
}

impl ErrorEvent {
    pub fn new(parser: Parser, data: impl Into<String>) -> Self {
        Self {
            parser,
            data: data.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Publisher side of the error stream.
///
/// Cloneable; every [`subscribe`](ErrorFeed::subscribe) call returns an
/// independent receiver. Events published while nobody is subscribed are
/// dropped.
#[derive(Clone)]
pub struct ErrorFeed {
    sender: broadcast::Sender<ErrorEvent>,
    /// Number of events published (for monitoring)
    event_count: Arc<AtomicUsize>,
}

impl ErrorFeed {
    /// Create a new feed with default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new feed with specified channel capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            event_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Publish an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event; 0 means the
    /// event was dropped.
    pub fn publish(&self, event: ErrorEvent) -> usize {
        self.event_count.fetch_add(1, Ordering::Relaxed);
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ErrorEvent> {
        self.sender.subscribe()
    }

    /// Get the number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the total number of events published
    pub fn event_count(&self) -> usize {
        self.event_count.load(Ordering::Relaxed)
    }
}

impl Default for ErrorFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ErrorFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorFeed")
            .field("subscriber_count", &self.subscriber_count())
            .field("event_count", &self.event_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_display() {
        assert_eq!(Parser::Response.to_string(), "response");
        assert_eq!(Parser::Stderr.to_string(), "stderr");
    }

    #[test]
    fn test_event_fields_populated() {
        let event = ErrorEvent::new(Parser::Stderr, "panic: boom");
        assert_eq!(event.parser, Parser::Stderr);
        assert_eq!(event.data, "panic: boom");
        assert!(event.timestamp <= Utc::now());
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let feed = ErrorFeed::new();
        let mut rx = feed.subscribe();

        let event = ErrorEvent::new(Parser::Response, "not json");
        let sent = feed.publish(event.clone());
        assert_eq!(sent, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let feed = ErrorFeed::new();
        let mut rx1 = feed.subscribe();
        let mut rx2 = feed.subscribe();

        let sent = feed.publish(ErrorEvent::new(Parser::Stderr, "warn"));
        assert_eq!(sent, 2);

        assert_eq!(rx1.recv().await.unwrap().data, "warn");
        assert_eq!(rx2.recv().await.unwrap().data, "warn");
    }

    #[tokio::test]
    async fn test_no_subscribers() {
        let feed = ErrorFeed::new();

        // No subscribers, event is dropped
        let sent = feed.publish(ErrorEvent::new(Parser::Response, "dropped"));
        assert_eq!(sent, 0);
        assert_eq!(feed.event_count(), 1);
    }

    #[test]
    fn test_clone_shares_channel() {
        let feed1 = ErrorFeed::new();
        let feed2 = feed1.clone();

        let _rx = feed2.subscribe();
        assert_eq!(feed1.subscriber_count(), 1);
        assert_eq!(feed2.subscriber_count(), 1);
    }
}
