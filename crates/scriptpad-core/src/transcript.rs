//! Session transcript: sequenced output chunks plus extracted diagnostics.
//!
//! Chunks keep their cross-stream arrival order via dense sequence
//! numbers. Retention is byte-capped with oldest-first eviction, so a
//! chatty script cannot grow memory without bound; sequence numbers stay
//! monotonic across evictions. Diagnostics belong to the session that
//! produced them and are discarded when a new session begins.

use scriptpad_types::{Diagnostic, OutputChunk, StreamKind};
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::trace;
use uuid::Uuid;

/// Default byte cap on retained output.
pub const DEFAULT_MAX_BYTES: usize = 512 * 1024;

/// Ordered store of one session's output and diagnostics.
#[derive(Debug)]
pub struct Transcript {
    /// Retained chunks, oldest at front.
    chunks: VecDeque<OutputChunk>,
    /// Diagnostics in extraction order.
    diagnostics: Vec<Diagnostic>,
    /// Sequence number of the oldest retained chunk (next_seq if empty).
    start_seq: u64,
    /// Next sequence number to assign.
    next_seq: u64,
    /// Total text bytes currently retained.
    total_bytes: usize,
    /// Maximum retained text bytes.
    max_bytes: usize,
}

impl Transcript {
    /// Create an empty transcript with the given byte cap.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            chunks: VecDeque::new(),
            diagnostics: Vec::new(),
            start_seq: 0,
            next_seq: 0,
            total_bytes: 0,
            max_bytes,
        }
    }

    /// Discard everything and restart sequence numbering for a new session.
    pub fn begin_session(&mut self) {
        self.chunks.clear();
        self.diagnostics.clear();
        self.start_seq = 0;
        self.next_seq = 0;
        self.total_bytes = 0;
    }

    /// Append output, assigning the next sequence number. Returns the
    /// completed chunk for delivery to subscribers.
    pub fn push_chunk(
        &mut self,
        session_id: Uuid,
        stream: StreamKind,
        text: String,
    ) -> OutputChunk {
        let chunk = OutputChunk {
            session_id,
            stream,
            seq: self.next_seq,
            text,
            timestamp_ms: now_ms(),
        };
        self.next_seq += 1;
        self.total_bytes += chunk.text.len();
        self.chunks.push_back(chunk.clone());

        // Evict oldest chunks if over capacity, always keeping the newest.
        while self.total_bytes > self.max_bytes && self.chunks.len() > 1 {
            if let Some(old) = self.chunks.pop_front() {
                self.total_bytes -= old.text.len();
                self.start_seq = self.chunks.front().map(|c| c.seq).unwrap_or(self.next_seq);
                trace!(
                    target: "scriptpad::transcript",
                    "Evicted chunk seq {} ({} bytes) over byte cap", old.seq, old.text.len()
                );
            }
        }

        chunk
    }

    /// Record extracted diagnostics in order.
    pub fn push_diagnostics(&mut self, diagnostics: &[Diagnostic]) {
        self.diagnostics.extend_from_slice(diagnostics);
    }

    /// Retained chunks, oldest first.
    pub fn chunks(&self) -> impl Iterator<Item = &OutputChunk> {
        self.chunks.iter()
    }

    /// All diagnostics extracted this session.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Concatenated retained text of both streams, in arrival order.
    pub fn text(&self) -> String {
        self.chunks.iter().map(|c| c.text.as_str()).collect()
    }

    /// Concatenated retained text of one stream, in that stream's order.
    pub fn stream_text(&self, stream: StreamKind) -> String {
        self.chunks
            .iter()
            .filter(|c| c.stream == stream)
            .map(|c| c.text.as_str())
            .collect()
    }

    /// Sequence number of the oldest retained chunk. Greater than zero
    /// once eviction has discarded early output.
    pub fn start_seq(&self) -> u64 {
        self.start_seq
    }

    /// Next sequence number to be assigned.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Retained text bytes.
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BYTES)
    }
}

/// Milliseconds since the Unix epoch.
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
