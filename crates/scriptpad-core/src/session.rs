//! Execution session orchestration.
//!
//! A [`ScriptRunner`] owns at most one live script session at a time and
//! feeds every observation through a single event pump task, so subscribers
//! see one ordered event stream: output chunks with dense sequence numbers,
//! diagnostics extracted from stderr, stream errors, and exactly one
//! `Exited` event per session. The terminal state is committed before the
//! terminal event is sent; a subscriber that sees `Exited` can rely on
//! `state()` already reporting `Terminated`.

use crate::config::RunnerConfig;
use crate::diagnostics::DiagnosticParser;
use crate::process::{self, PumpEvent};
use crate::transcript::Transcript;
use crate::{Result, ScriptpadError};
use chrono::{DateTime, Utc};
use scriptpad_types::{
    Diagnostic, ExitStatus, OutputChunk, SessionEvent, SessionSnapshot, SessionState, StreamKind,
};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex, RwLock};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Control handles for the currently live session.
struct ActiveSession {
    session_id: Uuid,
    stdin_tx: mpsc::Sender<String>,
    /// Consumed by the first stop request.
    kill_tx: Option<oneshot::Sender<()>>,
}

/// Lifecycle record guarded by one lock, so state and exit status are
/// never observed torn.
#[derive(Debug, Clone)]
struct Lifecycle {
    session_id: Option<Uuid>,
    state: SessionState,
    exit_status: Option<ExitStatus>,
    started_at: Option<DateTime<Utc>>,
}

/// Runs scratch scripts one session at a time.
///
/// Subscribers receive [`SessionEvent`]s over a broadcast channel; the
/// transcript retains recent output and all diagnostics for late readers
/// such as a UI attaching mid-run.
pub struct ScriptRunner {
    config: RunnerConfig,
    event_tx: broadcast::Sender<SessionEvent>,
    lifecycle: Arc<RwLock<Lifecycle>>,
    transcript: Arc<RwLock<Transcript>>,
    active: Arc<Mutex<Option<ActiveSession>>>,
}

impl ScriptRunner {
    pub fn new(config: RunnerConfig) -> Self {
        // broadcast::channel panics on zero capacity.
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            event_tx,
            lifecycle: Arc::new(RwLock::new(Lifecycle {
                session_id: None,
                state: SessionState::Idle,
                exit_status: None,
                started_at: None,
            })),
            transcript: Arc::new(RwLock::new(Transcript::new(config.transcript_max_bytes))),
            active: Arc::new(Mutex::new(None)),
            config,
        }
    }

    /// Subscribe to the session event feed.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// The event feed as a `Stream`, for `select!`-style UI loops.
    pub fn event_stream(&self) -> BroadcastStream<SessionEvent> {
        BroadcastStream::new(self.subscribe())
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub async fn state(&self) -> SessionState {
        self.lifecycle.read().await.state
    }

    /// Exit status of the most recent session, once terminated.
    pub async fn exit_status(&self) -> Option<ExitStatus> {
        self.lifecycle.read().await.exit_status
    }

    /// True while a session is running or being stopped.
    pub async fn is_active(&self) -> bool {
        matches!(
            self.lifecycle.read().await.state,
            SessionState::Running | SessionState::Terminating
        )
    }

    /// Point-in-time view of the runner.
    pub async fn snapshot(&self) -> SessionSnapshot {
        let lifecycle = self.lifecycle.read().await;
        SessionSnapshot {
            session_id: lifecycle.session_id,
            state: lifecycle.state,
            exit_status: lifecycle.exit_status,
            started_at: lifecycle.started_at,
        }
    }

    /// Retained transcript text of both streams, in arrival order.
    pub async fn transcript_text(&self) -> String {
        self.transcript.read().await.text()
    }

    /// Retained transcript text of one stream.
    pub async fn stream_text(&self, stream: StreamKind) -> String {
        self.transcript.read().await.stream_text(stream)
    }

    /// Retained transcript chunks, oldest first, for UIs attaching mid-run.
    pub async fn transcript_chunks(&self) -> Vec<OutputChunk> {
        self.transcript.read().await.chunks().cloned().collect()
    }

    /// Diagnostics extracted during the current session so far.
    pub async fn diagnostics(&self) -> Vec<Diagnostic> {
        self.transcript.read().await.diagnostics().to_vec()
    }

    /// Stage `script_text` and start a new session.
    ///
    /// Rejected with an invalid-state error while a session is running or
    /// terminating; a finished or never-started runner accepts. On spawn
    /// failure nothing changes: state stays as it was and no events are
    /// emitted. Starting a new session discards the previous transcript
    /// and diagnostics.
    pub async fn start(&self, script_text: &str) -> Result<Uuid> {
        // Hold the active lock across check-and-spawn so two concurrent
        // starts cannot both pass the state gate.
        let mut active = self.active.lock().await;
        {
            let lifecycle = self.lifecycle.read().await;
            if matches!(
                lifecycle.state,
                SessionState::Running | SessionState::Terminating
            ) {
                return Err(ScriptpadError::InvalidSessionState {
                    expected: "idle or terminated".to_string(),
                    actual: lifecycle.state.to_string(),
                });
            }
        }

        let session_id = Uuid::new_v4();
        info!(
            target: "scriptpad::session",
            "Starting session {} ({} script bytes)", session_id, script_text.len()
        );

        let spawned = process::spawn_session(&self.config, script_text, session_id).await?;

        self.transcript.write().await.begin_session();
        {
            let mut lifecycle = self.lifecycle.write().await;
            lifecycle.session_id = Some(session_id);
            lifecycle.state = SessionState::Running;
            lifecycle.exit_status = None;
            lifecycle.started_at = Some(Utc::now());
        }
        *active = Some(ActiveSession {
            session_id,
            stdin_tx: spawned.stdin_tx,
            kill_tx: Some(spawned.kill_tx),
        });

        spawn_event_pump(
            session_id,
            spawned.pump_rx,
            self.event_tx.clone(),
            self.lifecycle.clone(),
            self.transcript.clone(),
            self.active.clone(),
        );

        Ok(session_id)
    }

    /// Queue a line of input for the running script's stdin. A newline is
    /// appended before writing.
    ///
    /// Errors when no session is running. Write failures after queueing do
    /// not terminate the session; they close the input channel, so later
    /// sends report [`ScriptpadError::InputChannelClosed`].
    pub async fn send_input(&self, text: &str) -> Result<()> {
        let stdin_tx = {
            let active = self.active.lock().await;
            let lifecycle = self.lifecycle.read().await;
            if lifecycle.state != SessionState::Running {
                return Err(ScriptpadError::InvalidSessionState {
                    expected: "running".to_string(),
                    actual: lifecycle.state.to_string(),
                });
            }
            match active.as_ref() {
                Some(session) => session.stdin_tx.clone(),
                None => return Err(ScriptpadError::InputChannelClosed),
            }
        };

        // Await outside the locks: a full queue applies backpressure here.
        stdin_tx
            .send(text.to_string())
            .await
            .map_err(|_| ScriptpadError::InputChannelClosed)?;
        Ok(())
    }

    /// Request termination of the running session.
    ///
    /// Returns immediately; the session reports `Exited` with the
    /// [`ExitStatus::Terminated`] sentinel once the process is reaped and
    /// both streams are drained. A stop when nothing is running is a no-op.
    pub async fn stop(&self) -> Result<()> {
        let mut active = self.active.lock().await;
        let mut lifecycle = self.lifecycle.write().await;

        if lifecycle.state != SessionState::Running {
            debug!(target: "scriptpad::session", "Stop ignored: no running session");
            return Ok(());
        }
        lifecycle.state = SessionState::Terminating;

        if let Some(session) = active.as_mut() {
            info!(target: "scriptpad::session", "Stopping session {}", session.session_id);
            if let Some(kill_tx) = session.kill_tx.take() {
                // The watcher may already be reaping a racing natural exit;
                // the Terminating state still forces the sentinel status.
                let _ = kill_tx.send(());
            }
        }
        Ok(())
    }
}

/// Single consumer of the process-side events for one session: orders
/// chunks, extracts diagnostics, tracks stream closure, and commits the
/// terminal state exactly once.
fn spawn_event_pump(
    session_id: Uuid,
    mut pump_rx: mpsc::Receiver<PumpEvent>,
    event_tx: broadcast::Sender<SessionEvent>,
    lifecycle: Arc<RwLock<Lifecycle>>,
    transcript: Arc<RwLock<Transcript>>,
    active: Arc<Mutex<Option<ActiveSession>>>,
) {
    tokio::spawn(async move {
        let parser = DiagnosticParser::new();
        let mut stdout_closed = false;
        let mut stderr_closed = false;
        let mut exited = false;
        let mut exit_code: Option<i32> = None;

        loop {
            let Some(event) = pump_rx.recv().await else {
                // All producers vanished without reporting an exit.
                warn!(
                    target: "scriptpad::session",
                    "Event sources for session {} closed before exit was reported", session_id
                );
                break;
            };

            match event {
                PumpEvent::Chunk { stream, text } => {
                    let (chunk, diagnostics) = {
                        let mut transcript = transcript.write().await;
                        let chunk = transcript.push_chunk(session_id, stream, text);
                        let diagnostics = match stream {
                            StreamKind::Stderr => parser.parse(&chunk.text),
                            StreamKind::Stdout => Vec::new(),
                        };
                        if !diagnostics.is_empty() {
                            transcript.push_diagnostics(&diagnostics);
                        }
                        (chunk, diagnostics)
                    };

                    trace!(
                        target: "scriptpad::session",
                        "Chunk seq {} ({} bytes) on {} for session {}",
                        chunk.seq, chunk.text.len(), chunk.stream.as_str(), session_id
                    );
                    let _ = event_tx.send(SessionEvent::Output(chunk));
                    for diagnostic in diagnostics {
                        let _ = event_tx.send(SessionEvent::Diagnostic(diagnostic));
                    }
                }
                PumpEvent::StreamClosed { stream } => match stream {
                    StreamKind::Stdout => stdout_closed = true,
                    StreamKind::Stderr => stderr_closed = true,
                },
                PumpEvent::StreamFailed { stream, message } => {
                    let _ = event_tx.send(SessionEvent::StreamError {
                        session_id,
                        stream,
                        message,
                    });
                    match stream {
                        StreamKind::Stdout => stdout_closed = true,
                        StreamKind::Stderr => stderr_closed = true,
                    }
                }
                PumpEvent::ProcessExited { code } => {
                    exited = true;
                    exit_code = code;
                }
            }

            // Terminal only after the exit is known and both streams are
            // fully drained, so no output can arrive after Exited.
            if stdout_closed && stderr_closed && exited {
                break;
            }
        }

        let mut active_guard = active.lock().await;
        let mut lifecycle_guard = lifecycle.write().await;
        if lifecycle_guard.session_id != Some(session_id) {
            warn!(target: "scriptpad::session", "Stale pump for session {} ignored", session_id);
            return;
        }

        let stop_requested = lifecycle_guard.state == SessionState::Terminating;
        let status = match exit_code {
            // A stop request always yields the sentinel, even if the
            // process managed a normal exit in the race window.
            Some(code) if !stop_requested => ExitStatus::Exited(code),
            _ => ExitStatus::Terminated,
        };

        lifecycle_guard.state = SessionState::Terminated;
        lifecycle_guard.exit_status = Some(status);
        *active_guard = None;
        drop(lifecycle_guard);
        drop(active_guard);

        info!(
            target: "scriptpad::session",
            "Session {} terminated: {:?}", session_id, status
        );
        let _ = event_tx.send(SessionEvent::Exited { session_id, status });
    });
}
