//! Wire protocol shared with the Go worker.
//!
//! One JSON document per line, newline terminated. Field names are lowercase
//! on the wire; the Go side unmarshals case-insensitively, so lowercase is
//! canonical.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Signal value for an ordinary command.
pub const NO_SIGNAL: i32 = -1;
/// Signal value telling the worker to exit its read loop.
pub const TERMINATION: i32 = 1;

/// The opaque JSON object carried by a command.
pub type CommandData = Map<String, Value>;

/// A command frame sent to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: u64,
    pub cmd: CommandData,
    pub signal: i32,
}

impl Command {
    /// An ordinary request carrying `cmd`, to be answered with the same id.
    pub fn request(id: u64, cmd: CommandData) -> Self {
        Self {
            id,
            cmd,
            signal: NO_SIGNAL,
        }
    }

    /// The termination frame. The worker never answers it; id 0 is ignored.
    pub fn termination() -> Self {
        Self {
            id: 0,
            cmd: CommandData::new(),
            signal: TERMINATION,
        }
    }

    /// Encode as a newline-terminated wire frame.
    pub fn to_frame(&self) -> serde_json::Result<Vec<u8>> {
        let mut frame = serde_json::to_vec(self)?;
        frame.push(b'\n');
        Ok(frame)
    }
}

/// A response frame received from the worker.
///
/// `data` is required: a stdout line without it is treated as unparseable and
/// surfaced through the error feed rather than matched to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    pub data: Value,
}
