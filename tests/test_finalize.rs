//! Completeness gating, abandonment, and submission retry.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    DeviceScript, RecordingSink, ScriptedDevice, expect_phase, full_section, independent_section,
    next_event, phases_until_task_completed, section, task,
};
use viva_session::config::schema::{TaskId, TaskKind};
use viva_session::phase::Phase;
use viva_session::session::{
    FinalizeOutcome, SessionBuilder, SessionEvent, SessionOutcome, UserAction,
};
use viva_session::stimulus::FixedDurationPlayer;

fn player() -> Arc<FixedDurationPlayer> {
    Arc::new(FixedDurationPlayer::new(Duration::from_secs(30)))
}

#[tokio::test(start_paused = true)]
async fn missing_response_blocks_submission_and_routes_back() {
    let sink = RecordingSink::accepting();
    let (orchestrator, handle) = SessionBuilder::new(
        full_section(),
        player(),
        ScriptedDevice::always_recording(),
        sink.clone(),
    )
    .build()
    .unwrap();
    let mut rx = handle.subscribe();
    let run = tokio::spawn(orchestrator.run());

    // Complete task 1, then skip task 2 the moment it loads.
    let _ = phases_until_task_completed(&mut rx).await;
    assert!(handle.act(UserAction::Advance));
    expect_phase(&mut rx, Phase::Orientation).await; // task 21 loads
    assert!(handle.act(UserAction::JumpToTask(2)));

    // Complete tasks 3 and 4.
    let _ = phases_until_task_completed(&mut rx).await;
    assert!(handle.act(UserAction::Advance));
    let _ = phases_until_task_completed(&mut rx).await;
    assert!(handle.act(UserAction::Advance));

    // Advancing past the last task attempts finalize: 3 of 4 responses.
    match next_event(&mut rx).await {
        SessionEvent::SessionFinalized {
            outcome: FinalizeOutcome::MissingResponses { tasks },
        } => assert_eq!(tasks, vec![TaskId(21)]),
        other => panic!("expected missing-responses, got {other:?}"),
    }
    assert_eq!(sink.attempts(), 0, "the sink must never see a partial session");

    // The session routed back to the missing task; complete it and finalize.
    let (phases, _) = phases_until_task_completed(&mut rx).await;
    assert_eq!(phases[0], Phase::Orientation);
    assert!(handle.act(UserAction::Finalize));
    match next_event(&mut rx).await {
        SessionEvent::SessionFinalized {
            outcome: FinalizeOutcome::Submitted { .. },
        } => {}
        other => panic!("expected submission, got {other:?}"),
    }

    let outcome = run.await.unwrap().unwrap();
    assert!(matches!(outcome, SessionOutcome::Submitted(_)));
    let sessions = sink.sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].responses.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn abandoning_mid_capture_discards_the_partial_recording() {
    let sink = RecordingSink::accepting();
    let device = ScriptedDevice::scripted(vec![
        DeviceScript::Chunks(vec![b"partial-take"]),
        DeviceScript::Chunks(vec![b"task-two"]),
        DeviceScript::Chunks(vec![b"task-one-redo"]),
    ]);
    let two_tasks = section(
        3,
        vec![
            task(30, 1, TaskKind::Independent),
            task(31, 2, TaskKind::Independent),
        ],
    );
    let (orchestrator, handle) = SessionBuilder::new(two_tasks, player(), device, sink.clone())
        .build()
        .unwrap();
    let mut rx = handle.subscribe();
    let run = tokio::spawn(orchestrator.run());

    // Let task 1 reach Capturing with data already flowing, then abandon it.
    expect_phase(&mut rx, Phase::Orientation).await;
    expect_phase(&mut rx, Phase::QuestionPreview).await;
    expect_phase(&mut rx, Phase::Preparation).await;
    expect_phase(&mut rx, Phase::Capturing).await;
    assert!(handle.act(UserAction::JumpToTask(1)));

    // Task 2 runs to completion; advancing past it attempts finalize.
    let _ = phases_until_task_completed(&mut rx).await;
    assert!(handle.act(UserAction::Advance));
    match next_event(&mut rx).await {
        SessionEvent::SessionFinalized {
            outcome: FinalizeOutcome::MissingResponses { tasks },
        } => assert_eq!(tasks, vec![TaskId(30)], "the partial take must not count"),
        other => panic!("expected missing-responses, got {other:?}"),
    }
    assert_eq!(sink.attempts(), 0);

    // Routed back to task 1; a fresh recording completes the session.
    let _ = phases_until_task_completed(&mut rx).await;
    assert!(handle.act(UserAction::Finalize));
    match next_event(&mut rx).await {
        SessionEvent::SessionFinalized {
            outcome: FinalizeOutcome::Submitted { .. },
        } => {}
        other => panic!("expected submission, got {other:?}"),
    }
    let _ = run.await.unwrap().unwrap();

    let sessions = sink.sessions();
    assert_eq!(sessions.len(), 1);
    let mut responses = sessions[0].responses.clone();
    responses.sort_by_key(|(t, _)| *t);
    assert_eq!(
        responses,
        vec![
            (TaskId(30), b"task-one-redo".len()),
            (TaskId(31), b"task-two".len()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn failed_submission_retains_the_store_for_retry() {
    let sink = RecordingSink::failing_first(1);
    // Exactly one recording script: a retry that re-recorded would fail.
    let device = ScriptedDevice::scripted(vec![DeviceScript::Chunks(vec![b"only-take"])]);
    let (orchestrator, handle) =
        SessionBuilder::new(independent_section(), player(), device, sink.clone())
            .build()
            .unwrap();
    let mut rx = handle.subscribe();
    let run = tokio::spawn(orchestrator.run());

    let _ = phases_until_task_completed(&mut rx).await;
    assert!(handle.act(UserAction::Advance));
    match next_event(&mut rx).await {
        SessionEvent::SessionFinalized {
            outcome: FinalizeOutcome::SubmissionFailed { reason },
        } => assert!(reason.contains("backend unavailable")),
        other => panic!("expected submission failure, got {other:?}"),
    }

    // Retrying finalize submits the same stored responses.
    assert!(handle.act(UserAction::Finalize));
    match next_event(&mut rx).await {
        SessionEvent::SessionFinalized {
            outcome: FinalizeOutcome::Submitted { .. },
        } => {}
        other => panic!("expected submission, got {other:?}"),
    }
    let outcome = run.await.unwrap().unwrap();
    assert!(matches!(outcome, SessionOutcome::Submitted(_)));

    assert_eq!(sink.attempts(), 2);
    let sessions = sink.sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(
        sessions[0].responses,
        vec![(TaskId(10), b"only-take".len())]
    );
}

#[tokio::test(start_paused = true)]
async fn finalize_with_nothing_recorded_names_every_task() {
    let sink = RecordingSink::accepting();
    let two_tasks = section(
        4,
        vec![
            task(40, 1, TaskKind::Independent),
            task(41, 2, TaskKind::Independent),
        ],
    );
    let (orchestrator, handle) = SessionBuilder::new(
        two_tasks,
        player(),
        ScriptedDevice::always_recording(),
        sink.clone(),
    )
    .build()
    .unwrap();
    let mut rx = handle.subscribe();
    let run = tokio::spawn(orchestrator.run());

    expect_phase(&mut rx, Phase::Orientation).await;
    assert!(handle.act(UserAction::Finalize));

    match next_event(&mut rx).await {
        SessionEvent::SessionFinalized {
            outcome: FinalizeOutcome::MissingResponses { tasks },
        } => assert_eq!(tasks, vec![TaskId(40), TaskId(41)]),
        other => panic!("expected missing-responses, got {other:?}"),
    }
    assert_eq!(sink.attempts(), 0);

    // The route-back restarts the first task.
    expect_phase(&mut rx, Phase::Orientation).await;

    assert!(handle.act(UserAction::EndSession));
    let outcome = run.await.unwrap().unwrap();
    assert!(matches!(outcome, SessionOutcome::Abandoned));
}
