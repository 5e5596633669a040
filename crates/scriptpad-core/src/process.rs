//! Child process plumbing: script staging, spawning, and pipe tasks.
//!
//! Everything here reports inward to the session event pump over one mpsc
//! channel; nothing below this layer touches subscriber-facing state. The
//! exit watcher owns the child and the staged script directory, so the
//! script file outlives the process and is removed exactly once.

use crate::config::RunnerConfig;
use crate::{Result, ScriptpadError};
use scriptpad_types::StreamKind;
use std::process::Stdio;
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Events flowing from the pipe tasks and exit watcher to the event pump.
#[derive(Debug)]
pub(crate) enum PumpEvent {
    /// Bytes arrived on a pipe, decoded as UTF-8 (lossy).
    Chunk { stream: StreamKind, text: String },
    /// A pipe reached end of stream.
    StreamClosed { stream: StreamKind },
    /// A pipe read failed; the stream is treated as closed.
    StreamFailed { stream: StreamKind, message: String },
    /// The child exited. `code` is `None` on signal death.
    ProcessExited { code: Option<i32> },
}

/// Handles returned by [`spawn_session`] for one freshly spawned script.
pub(crate) struct SpawnedSession {
    /// Queue feeding the stdin writer task.
    pub stdin_tx: mpsc::Sender<String>,
    /// One-shot kill signal consumed by the exit watcher.
    pub kill_tx: oneshot::Sender<()>,
    /// Event stream for the pump: chunks, closures, and the exit report.
    pub pump_rx: mpsc::Receiver<PumpEvent>,
}

/// Stage `script_text` in a fresh temp directory and spawn the configured
/// interpreter on it, with all three stdio pipes wired up.
pub(crate) async fn spawn_session(
    config: &RunnerConfig,
    script_text: &str,
    session_id: Uuid,
) -> Result<SpawnedSession> {
    // A bare program name is resolved through PATH by the OS; only
    // pre-check explicit paths.
    if config.interpreter.components().count() > 1 && !config.interpreter.exists() {
        error!(target: "scriptpad::process", "Interpreter not found at: {:?}", config.interpreter);
        return Err(ScriptpadError::SpawnFailed(format!(
            "Interpreter not found at: {:?}",
            config.interpreter
        )));
    }

    let script_dir = tempfile::Builder::new()
        .prefix("scriptpad-")
        .tempdir()
        .map_err(|e| ScriptpadError::ScriptStage(format!("Failed to create temp dir: {}", e)))?;
    let script_path = script_dir.path().join(config.script_file_name());
    tokio::fs::write(&script_path, script_text)
        .await
        .map_err(|e| ScriptpadError::ScriptStage(format!("Failed to write script: {}", e)))?;

    let mut cmd = Command::new(&config.interpreter);
    cmd.args(&config.interpreter_args);
    cmd.arg(&script_path);
    cmd.current_dir(script_dir.path());
    for (key, value) in &config.env {
        cmd.env(key, value);
    }
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    info!(
        target: "scriptpad::process",
        "Spawning {:?} on {:?} for session {}",
        config.interpreter, script_path, session_id
    );

    let mut child = cmd.spawn().map_err(|e| {
        error!(target: "scriptpad::process", "Failed to spawn interpreter: {}", e);
        ScriptpadError::SpawnFailed(format!("Failed to spawn: {}", e))
    })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ScriptpadError::SpawnFailed("stdout pipe unavailable".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ScriptpadError::SpawnFailed("stderr pipe unavailable".to_string()))?;
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| ScriptpadError::SpawnFailed("stdin pipe unavailable".to_string()))?;

    let (pump_tx, pump_rx) = mpsc::channel::<PumpEvent>(config.event_capacity.max(1));
    let (stdin_tx, stdin_rx) = mpsc::channel::<String>(config.input_capacity.max(1));
    let (kill_tx, kill_rx) = oneshot::channel::<()>();

    // A zero-size buffer would read Ok(0) and look like EOF.
    let read_buffer_bytes = config.read_buffer_bytes.max(1);
    spawn_stream_reader(session_id, StreamKind::Stdout, stdout, pump_tx.clone(), read_buffer_bytes);
    spawn_stream_reader(session_id, StreamKind::Stderr, stderr, pump_tx.clone(), read_buffer_bytes);
    spawn_stdin_writer(session_id, stdin, stdin_rx);
    spawn_exit_watcher(session_id, child, script_dir, kill_rx, pump_tx);

    info!(target: "scriptpad::process", "Interpreter spawned for session {}", session_id);

    Ok(SpawnedSession {
        stdin_tx,
        kill_tx,
        pump_rx,
    })
}

/// Read one pipe to exhaustion, forwarding chunks to the pump.
fn spawn_stream_reader<R>(
    session_id: Uuid,
    stream: StreamKind,
    mut pipe: R,
    tx: mpsc::Sender<PumpEvent>,
    buffer_bytes: usize,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; buffer_bytes];
        loop {
            match pipe.read(&mut buf).await {
                Ok(0) => {
                    debug!(
                        target: "scriptpad::process",
                        "{} closed for session {}", stream.as_str(), session_id
                    );
                    let _ = tx.send(PumpEvent::StreamClosed { stream }).await;
                    break;
                }
                Ok(n) => {
                    let text = String::from_utf8_lossy(&buf[..n]).into_owned();
                    if tx.send(PumpEvent::Chunk { stream, text }).await.is_err() {
                        // Pump is gone; the session is being torn down.
                        break;
                    }
                }
                Err(e) => {
                    warn!(
                        target: "scriptpad::process",
                        "{} read failed for session {}: {}", stream.as_str(), session_id, e
                    );
                    let _ = tx
                        .send(PumpEvent::StreamFailed {
                            stream,
                            message: e.to_string(),
                        })
                        .await;
                    break;
                }
            }
        }
    });
}

/// Forward queued input lines to the child's stdin, one per send, each
/// terminated with a newline. The first failed write ends the task; later
/// sends then surface as a closed input channel.
fn spawn_stdin_writer(session_id: Uuid, mut stdin: ChildStdin, mut input_rx: mpsc::Receiver<String>) {
    tokio::spawn(async move {
        while let Some(input) = input_rx.recv().await {
            if let Err(e) = stdin.write_all(input.as_bytes()).await {
                warn!(target: "scriptpad::process", "stdin write failed for session {}: {}", session_id, e);
                break;
            }
            if let Err(e) = stdin.write_all(b"\n").await {
                warn!(target: "scriptpad::process", "stdin write failed for session {}: {}", session_id, e);
                break;
            }
            if let Err(e) = stdin.flush().await {
                warn!(target: "scriptpad::process", "stdin flush failed for session {}: {}", session_id, e);
                break;
            }
        }
        // Dropping stdin here closes the child's input pipe.
    });
}

/// Wait for the child to exit, killing it first if the stop signal fires.
/// The staged script directory lives exactly as long as this task.
fn spawn_exit_watcher(
    session_id: Uuid,
    mut child: Child,
    script_dir: TempDir,
    kill_rx: oneshot::Receiver<()>,
    tx: mpsc::Sender<PumpEvent>,
) {
    tokio::spawn(async move {
        let _script_dir = script_dir;

        let status = tokio::select! {
            status = child.wait() => status,
            _ = kill_rx => {
                debug!(target: "scriptpad::process", "Kill signal received for session {}", session_id);
                if let Err(e) = child.start_kill() {
                    debug!(
                        target: "scriptpad::process",
                        "Kill failed for session {} (already exited?): {}", session_id, e
                    );
                }
                child.wait().await
            }
        };

        let code = match status {
            Ok(status) => status.code(),
            Err(e) => {
                warn!(target: "scriptpad::process", "Wait failed for session {}: {}", session_id, e);
                None
            }
        };

        info!(
            target: "scriptpad::process",
            "Process exited with code {:?} for session {}", code, session_id
        );
        let _ = tx.send(PumpEvent::ProcessExited { code }).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// Pipe that delivers one chunk and then fails mid-stream.
    struct FlakyPipe {
        first: Option<&'static [u8]>,
    }

    impl AsyncRead for FlakyPipe {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            match self.first.take() {
                Some(bytes) => {
                    buf.put_slice(bytes);
                    Poll::Ready(Ok(()))
                }
                None => Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "pipe burst",
                ))),
            }
        }
    }

    #[tokio::test]
    async fn test_read_failure_reports_stream_failed_and_ends_reader() {
        let (tx, mut rx) = mpsc::channel(8);
        spawn_stream_reader(
            Uuid::nil(),
            StreamKind::Stderr,
            FlakyPipe {
                first: Some(b"partial"),
            },
            tx,
            64,
        );

        match rx.recv().await.unwrap() {
            PumpEvent::Chunk { stream, text } => {
                assert_eq!(stream, StreamKind::Stderr);
                assert_eq!(text, "partial");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        match rx.recv().await.unwrap() {
            PumpEvent::StreamFailed { stream, message } => {
                assert_eq!(stream, StreamKind::Stderr);
                assert!(message.contains("pipe burst"));
            }
            other => panic!("unexpected event: {:?}", other),
        }

        // The reader task ended on the failure; its sender is gone, so the
        // channel closes instead of delivering anything further.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_end_of_stream_reports_closed() {
        let (tx, mut rx) = mpsc::channel(8);
        spawn_stream_reader(Uuid::nil(), StreamKind::Stdout, &b"done"[..], tx, 64);

        match rx.recv().await.unwrap() {
            PumpEvent::Chunk { stream, text } => {
                assert_eq!(stream, StreamKind::Stdout);
                assert_eq!(text, "done");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(
            rx.recv().await.unwrap(),
            PumpEvent::StreamClosed {
                stream: StreamKind::Stdout
            }
        ));
        assert!(rx.recv().await.is_none());
    }
}
