//! Transport-generic request/response correlation core.
//!
//! A session owns the command sink and two background tasks: a reader that
//! routes each stdout line to the pending request it answers, and an optional
//! stderr drain. It is generic over the underlying streams so tests can drive
//! it with in-memory pipes instead of a real child process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{oneshot, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, warn};

use crate::error::{BridgeError, Result};
use crate::events::{ErrorEvent, ErrorFeed, Parser};
use crate::wire::{Command, CommandData, Response};

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Response>>>>;

pub(crate) struct Session {
    writer: Mutex<Option<Box<dyn AsyncWrite + Send + Unpin>>>,
    pending: Pending,
    next_id: AtomicU64,
    in_flight: Arc<Semaphore>,
    reader_task: JoinHandle<()>,
    stderr_task: Option<JoinHandle<()>>,
}

impl Session {
    pub(crate) fn start<O, I, E>(
        stdout: O,
        stdin: I,
        stderr: Option<E>,
        feed: ErrorFeed,
        max_in_flight: usize,
    ) -> Self
    where
        O: AsyncRead + Send + Unpin + 'static,
        I: AsyncWrite + Send + Unpin + 'static,
        E: AsyncRead + Send + Unpin + 'static,
    {
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        let reader_task = tokio::spawn(read_responses(stdout, Arc::clone(&pending), feed.clone()));
        let stderr_task = stderr.map(|stderr| tokio::spawn(drain_stderr(stderr, feed)));

        Self {
            writer: Mutex::new(Some(Box::new(stdin))),
            pending,
            next_id: AtomicU64::new(0),
            in_flight: Arc::new(Semaphore::new(max_in_flight.max(1))),
            reader_task,
            stderr_task,
        }
    }

    /// Submit a command and wait for its correlated response.
    ///
    /// Resolves exactly once per call: with the worker's response, or with one
    /// error (timeout, write failure, worker exit). The in-flight permit is
    /// held until the response arrives.
    pub(crate) async fn submit(
        &self,
        cmd: CommandData,
        timeout: Option<Duration>,
    ) -> Result<Response> {
        let _permit = self
            .in_flight
            .acquire()
            .await
            .map_err(|_| BridgeError::Closed)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let frame = Command::request(id, cmd).to_frame()?;
        if let Err(err) = self.write_frame(&frame).await {
            self.pending.lock().await.remove(&id);
            return Err(err);
        }

        let outcome = match timeout {
            Some(limit) => match time::timeout(limit, rx).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.pending.lock().await.remove(&id);
                    debug!(id, "command timed out, discarding pending slot");
                    return Err(BridgeError::Timeout { elapsed: limit });
                }
            },
            None => rx.await,
        };

        outcome.map_err(|_| BridgeError::WorkerExited)
    }

    /// Send the termination frame, close the sink, and fail every pending
    /// request. Further submits are refused.
    pub(crate) async fn shutdown(&self) -> Result<()> {
        self.in_flight.close();

        let frame = Command::termination().to_frame()?;
        {
            let mut guard = self.writer.lock().await;
            if let Some(writer) = guard.as_mut() {
                // the worker may already be gone; a broken pipe here is fine
                let _ = writer.write_all(&frame).await;
                let _ = writer.flush().await;
            }
            // dropping the sink closes the worker's stdin
            *guard = None;
        }

        self.pending.lock().await.clear();
        Ok(())
    }

    async fn write_frame(&self, frame: &[u8]) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(BridgeError::Closed)?;
        writer.write_all(frame).await?;
        writer.flush().await?;
        Ok(())
    }

    #[cfg(test)]
    async fn pending_len(&self) -> usize {
        self.pending.lock().await.len()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.reader_task.abort();
        if let Some(task) = &self.stderr_task {
            task.abort();
        }
    }
}

/// Route each stdout line to the request it answers; unparseable lines go to
/// the error feed. On EOF every pending request fails.
async fn read_responses<O>(stdout: O, pending: Pending, feed: ErrorFeed)
where
    O: AsyncRead + Send + Unpin + 'static,
{
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<Response>(line) {
                    Ok(response) => {
                        let sender = pending.lock().await.remove(&response.id);
                        match sender {
                            Some(tx) => {
                                // caller may have timed out in the meantime
                                let _ = tx.send(response);
                            }
                            None => {
                                warn!(id = response.id, "response matches no pending command")
                            }
                        }
                    }
                    Err(err) => {
                        debug!(error = %err, line, "worker output failed to parse as response");
                        feed.publish(ErrorEvent::new(Parser::Response, line));
                    }
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "failed to read worker stdout");
                break;
            }
        }
    }

    // EOF: dropping the senders resolves every waiter with WorkerExited
    pending.lock().await.clear();
}

/// Every stderr line becomes an error event.
async fn drain_stderr<E>(stderr: E, feed: ErrorFeed)
where
    E: AsyncRead + Send + Unpin + 'static,
{
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.is_empty() {
            continue;
        }
        warn!(line, "worker stderr");
        feed.publish(ErrorEvent::new(Parser::Stderr, line));
    }
}
