//! Integration tests for the script execution session.
//!
//! These run real child processes through `/bin/sh`, which is present on
//! every platform the suite targets, and drive the runner exactly the way
//! an editor front end would: subscribe, start, observe events, stop.

#![cfg(unix)]

use scriptpad_core::{RunnerConfig, ScriptRunner, ScriptpadError};
use scriptpad_types::{ExitStatus, SessionEvent, SessionState, StreamKind};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;

const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Runner configured for `/bin/sh` scripts.
fn sh_runner() -> ScriptRunner {
    ScriptRunner::new(RunnerConfig {
        interpreter: PathBuf::from("/bin/sh"),
        script_extension: "sh".to_string(),
        env: BTreeMap::new(),
        ..RunnerConfig::default()
    })
}

/// Drain events until the terminal event arrives, returning everything seen.
async fn collect_until_exit(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    loop {
        let event = timeout(EVENT_TIMEOUT, rx.recv())
            .await
            .expect("timed out waiting for session events")
            .expect("event channel closed before Exited");
        let done = matches!(event, SessionEvent::Exited { .. });
        events.push(event);
        if done {
            return events;
        }
    }
}

/// Concatenated chunk text of one stream, in delivery order.
fn stream_text(events: &[SessionEvent], stream: StreamKind) -> String {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::Output(chunk) if chunk.stream == stream => Some(chunk.text.as_str()),
            _ => None,
        })
        .collect()
}

fn exit_status(events: &[SessionEvent]) -> ExitStatus {
    events
        .iter()
        .find_map(|event| match event {
            SessionEvent::Exited { status, .. } => Some(*status),
            _ => None,
        })
        .expect("no Exited event seen")
}

#[tokio::test]
async fn test_script_output_reaches_subscribers() {
    let runner = sh_runner();
    let mut rx = runner.subscribe();

    let session_id = runner.start("echo hello").await.unwrap();
    let events = collect_until_exit(&mut rx).await;

    assert_eq!(stream_text(&events, StreamKind::Stdout), "hello\n");
    assert_eq!(exit_status(&events), ExitStatus::Exited(0));
    for event in &events {
        if let SessionEvent::Output(chunk) = event {
            assert_eq!(chunk.session_id, session_id);
        }
    }

    // The Exited event is last, and the terminal state was committed
    // before it was sent.
    assert!(matches!(events.last(), Some(SessionEvent::Exited { .. })));
    assert_eq!(runner.state().await, SessionState::Terminated);
    assert_eq!(runner.exit_status().await, Some(ExitStatus::Exited(0)));
}

#[tokio::test]
async fn test_chunks_are_densely_sequenced_and_stream_ordered() {
    let runner = sh_runner();
    let mut rx = runner.subscribe();

    runner.start("echo 1; echo mid 1>&2; echo 2; echo 3").await.unwrap();
    let events = collect_until_exit(&mut rx).await;

    // Per-stream order is read order.
    assert_eq!(stream_text(&events, StreamKind::Stdout), "1\n2\n3\n");
    assert_eq!(stream_text(&events, StreamKind::Stderr), "mid\n");

    // Sequence numbers are dense from 0 across both streams.
    let seqs: Vec<u64> = events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::Output(chunk) => Some(chunk.seq),
            _ => None,
        })
        .collect();
    let expected: Vec<u64> = (0..seqs.len() as u64).collect();
    assert_eq!(seqs, expected);
}

#[tokio::test]
async fn test_end_to_end_diagnostic_pipeline() {
    let runner = sh_runner();
    let mut rx = runner.subscribe();

    let script = r#"
echo hi
echo "main.swift:2:1: error: cannot find 'bad' in scope" 1>&2
exit 1
"#;
    runner.start(script).await.unwrap();
    let events = collect_until_exit(&mut rx).await;

    assert_eq!(stream_text(&events, StreamKind::Stdout), "hi\n");
    assert_eq!(exit_status(&events), ExitStatus::Exited(1));

    let diagnostics: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::Diagnostic(diag) => Some(diag.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].source_path, "main.swift");
    assert_eq!(diagnostics[0].position(), (2, 1));
    assert!(diagnostics[0].is_error());
    assert_eq!(diagnostics[0].message, "cannot find 'bad' in scope");

    // Extraction is additive: the raw line stays in the stderr transcript.
    assert!(runner
        .stream_text(StreamKind::Stderr)
        .await
        .contains("main.swift:2:1: error:"));
    assert_eq!(runner.diagnostics().await.len(), 1);
}

#[tokio::test]
async fn test_stop_reports_terminated_sentinel() {
    let runner = sh_runner();
    let mut rx = runner.subscribe();

    runner.start("sleep 30").await.unwrap();
    runner.stop().await.unwrap();

    let events = collect_until_exit(&mut rx).await;
    assert_eq!(exit_status(&events), ExitStatus::Terminated);

    let exits = events
        .iter()
        .filter(|event| matches!(event, SessionEvent::Exited { .. }))
        .count();
    assert_eq!(exits, 1);
    assert!(matches!(
        rx.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));

    assert_eq!(runner.state().await, SessionState::Terminated);
    assert_eq!(runner.exit_status().await, Some(ExitStatus::Terminated));
}

#[tokio::test]
async fn test_signal_death_reports_terminated_sentinel() {
    let runner = sh_runner();
    let mut rx = runner.subscribe();

    // The script kills its own shell; no stop request is in flight, and
    // the OS reports no exit code for signal death.
    runner.start("kill -9 $$").await.unwrap();
    let events = collect_until_exit(&mut rx).await;

    assert_eq!(exit_status(&events), ExitStatus::Terminated);
    assert_eq!(runner.state().await, SessionState::Terminated);
    assert_eq!(runner.exit_status().await, Some(ExitStatus::Terminated));
}

#[tokio::test]
async fn test_stop_when_idle_is_a_noop() {
    let runner = sh_runner();
    runner.stop().await.unwrap();
    assert_eq!(runner.state().await, SessionState::Idle);
    assert_eq!(runner.exit_status().await, None);
}

#[tokio::test]
async fn test_start_rejected_while_running_then_restartable() {
    let runner = sh_runner();
    let mut rx = runner.subscribe();

    runner.start("sleep 30").await.unwrap();
    let err = runner.start("echo nope").await.unwrap_err();
    assert!(matches!(err, ScriptpadError::InvalidSessionState { .. }));
    assert_eq!(runner.state().await, SessionState::Running);

    runner.stop().await.unwrap();
    collect_until_exit(&mut rx).await;

    // A terminated runner accepts a fresh script.
    runner.start("echo again").await.unwrap();
    let events = collect_until_exit(&mut rx).await;
    assert_eq!(stream_text(&events, StreamKind::Stdout), "again\n");
    assert_eq!(exit_status(&events), ExitStatus::Exited(0));
}

#[tokio::test]
async fn test_send_input_round_trip() {
    let runner = sh_runner();
    let mut rx = runner.subscribe();

    runner.start("read line\necho \"got $line\"").await.unwrap();
    runner.send_input("ping").await.unwrap();

    let events = collect_until_exit(&mut rx).await;
    assert_eq!(stream_text(&events, StreamKind::Stdout), "got ping\n");
    assert_eq!(exit_status(&events), ExitStatus::Exited(0));
}

#[tokio::test]
async fn test_send_input_requires_running_session() {
    let runner = sh_runner();
    let err = runner.send_input("hello").await.unwrap_err();
    assert!(matches!(err, ScriptpadError::InvalidSessionState { .. }));
}

#[tokio::test]
async fn test_spawn_failure_leaves_state_untouched() {
    let runner = ScriptRunner::new(RunnerConfig {
        interpreter: PathBuf::from("/nonexistent/scriptpad-missing-interpreter"),
        script_extension: "sh".to_string(),
        env: BTreeMap::new(),
        ..RunnerConfig::default()
    });
    let mut rx = runner.subscribe();

    let err = runner.start("echo hi").await.unwrap_err();
    assert!(matches!(err, ScriptpadError::SpawnFailed(_)));
    assert_eq!(runner.state().await, SessionState::Idle);
    assert!(matches!(
        rx.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));
}

#[tokio::test]
async fn test_plain_stderr_produces_no_diagnostics() {
    let runner = sh_runner();
    let mut rx = runner.subscribe();

    runner.start("echo \"plain noise\" 1>&2").await.unwrap();
    let events = collect_until_exit(&mut rx).await;

    assert_eq!(stream_text(&events, StreamKind::Stderr), "plain noise\n");
    assert!(events
        .iter()
        .all(|event| !matches!(event, SessionEvent::Diagnostic(_))));
    assert_eq!(exit_status(&events), ExitStatus::Exited(0));
}

#[tokio::test]
async fn test_new_session_resets_transcript_and_diagnostics() {
    let runner = sh_runner();
    let mut rx = runner.subscribe();

    runner
        .start("echo \"x.swift:1:1: error: first\" 1>&2")
        .await
        .unwrap();
    collect_until_exit(&mut rx).await;
    assert_eq!(runner.diagnostics().await.len(), 1);
    assert!(runner.stream_text(StreamKind::Stderr).await.contains("first"));

    runner.start("echo clean").await.unwrap();
    let events = collect_until_exit(&mut rx).await;

    assert!(runner.diagnostics().await.is_empty());
    assert_eq!(runner.transcript_text().await, "clean\n");

    // Sequence numbering restarts for the new session.
    let first_seq = events.iter().find_map(|event| match event {
        SessionEvent::Output(chunk) => Some(chunk.seq),
        _ => None,
    });
    assert_eq!(first_seq, Some(0));
}

#[tokio::test]
async fn test_snapshot_tracks_lifecycle() {
    let runner = sh_runner();

    let snap = runner.snapshot().await;
    assert_eq!(snap.state, SessionState::Idle);
    assert!(snap.session_id.is_none());
    assert!(snap.exit_status.is_none());
    assert!(snap.started_at.is_none());

    let mut rx = runner.subscribe();
    let session_id = runner.start("sleep 30").await.unwrap();

    let snap = runner.snapshot().await;
    assert_eq!(snap.state, SessionState::Running);
    assert_eq!(snap.session_id, Some(session_id));
    assert!(snap.started_at.is_some());
    assert!(runner.is_active().await);

    runner.stop().await.unwrap();
    collect_until_exit(&mut rx).await;

    let snap = runner.snapshot().await;
    assert_eq!(snap.state, SessionState::Terminated);
    assert_eq!(snap.exit_status, Some(ExitStatus::Terminated));
    assert!(!runner.is_active().await);
}

#[tokio::test]
async fn test_event_stream_yields_same_feed() {
    use tokio_stream::StreamExt;

    let runner = sh_runner();
    let mut stream = runner.event_stream();

    runner.start("echo streamed").await.unwrap();

    let mut stdout = String::new();
    let mut saw_exit = false;
    while let Some(item) = timeout(EVENT_TIMEOUT, stream.next())
        .await
        .expect("timed out waiting for stream item")
    {
        match item.expect("subscriber lagged") {
            SessionEvent::Output(chunk) if chunk.stream == StreamKind::Stdout => {
                stdout.push_str(&chunk.text);
            }
            SessionEvent::Exited { .. } => {
                saw_exit = true;
                break;
            }
            _ => {}
        }
    }

    assert!(saw_exit);
    assert_eq!(stdout, "streamed\n");
}
