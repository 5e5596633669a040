//! Events emitted by an execution session.

use crate::{Diagnostic, ExitStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which pipe of the child process a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    /// Stable lowercase name, for log lines and labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

/// One fragment of child output, tagged with its source stream and
/// arrival order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputChunk {
    /// Session that produced the chunk.
    pub session_id: Uuid,
    /// Pipe the chunk was read from.
    pub stream: StreamKind,
    /// Arrival order across both streams, dense from 0 per session.
    pub seq: u64,
    /// Chunk bytes decoded as UTF-8 (lossy).
    pub text: String,
    /// Capture time in milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

/// Events delivered over a session's single event channel.
///
/// Chunks from one stream arrive in read order; no ordering is guaranteed
/// between stdout and stderr. Every session ends with exactly one
/// [`SessionEvent::Exited`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum SessionEvent {
    /// A chunk of child output.
    Output(OutputChunk),
    /// A structured record extracted from a stderr chunk.
    Diagnostic(Diagnostic),
    /// A pipe failed mid-stream; the stream is treated as closed.
    StreamError {
        session_id: Uuid,
        stream: StreamKind,
        message: String,
    },
    /// Terminal event: the session is over and resources are released.
    Exited {
        session_id: Uuid,
        status: ExitStatus,
    },
}
