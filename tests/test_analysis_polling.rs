mod support;

use crate::support::{tracing_init, MockAnalysisService};
use pickperfect::analysis::{AnalysisMode, AnalysisOrchestrator, JobState, JobStatus, PollUpdate};
use pickperfect::config::PollingConfig;
use pickperfect::upload::DurableSessionId;
use pickperfect::SessionError;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn polling(max_attempts: u32) -> PollingConfig {
    PollingConfig {
        interval: Duration::from_secs(5),
        max_attempts,
        not_found_backoff_factor: 2,
        submit_settle: Duration::from_secs(1),
    }
}

fn setup(max_attempts: u32) -> (Arc<MockAnalysisService>, AnalysisOrchestrator) {
    tracing_init();
    let service = Arc::new(MockAnalysisService::new());
    let orchestrator = AnalysisOrchestrator::new(service.clone(), polling(max_attempts));
    (service, orchestrator)
}

#[tokio::test(start_paused = true)]
async fn test_processing_forever_times_out() {
    let (service, orchestrator) = setup(5);
    service.set_fallback(JobStatus::Processing);

    let session_id = DurableSessionId::mint();
    let mut job = orchestrator
        .submit(&session_id, "owner", AnalysisMode::ExactDuplicate, 3)
        .await
        .unwrap();

    let started = Instant::now();
    let result = orchestrator
        .await_completion(&mut job, &CancellationToken::new(), |_| {})
        .await;

    assert!(matches!(
        result,
        Err(SessionError::AnalysisTimedOut { attempts: 5 })
    ));
    assert_eq!(job.state, JobState::TimedOut);
    assert_eq!(service.status_count(), 5);

    // settle, then four waits between five polls; no wait after the last one
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(21), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(26), "elapsed {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_not_found_waits_longer_than_processing() {
    let (service, orchestrator) = setup(10);
    service.script(vec![JobStatus::NotFound, JobStatus::NotFound]);
    service.set_fallback(JobStatus::Completed);

    let session_id = DurableSessionId::mint();
    let mut job = orchestrator
        .submit(&session_id, "owner", AnalysisMode::SimilarContent, 2)
        .await
        .unwrap();

    let started = Instant::now();
    let result = orchestrator
        .await_completion(&mut job, &CancellationToken::new(), |_| {})
        .await
        .unwrap();

    assert_eq!(result.session_id, session_id.as_str());
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.attempts, 3);
    // 1s settle + two 10s back-offs
    assert!(started.elapsed() >= Duration::from_secs(21));
}

#[tokio::test(start_paused = true)]
async fn test_remote_failure_surfaces_message() {
    let (service, orchestrator) = setup(10);
    service.script(vec![
        JobStatus::Processing,
        JobStatus::Failed {
            message: "image decoder crashed".to_string(),
        },
    ]);

    let mut job = orchestrator
        .submit(&DurableSessionId::mint(), "owner", AnalysisMode::default(), 4)
        .await
        .unwrap();

    let updates: Arc<Mutex<Vec<PollUpdate>>> = Arc::new(Mutex::new(Vec::new()));
    let seen = updates.clone();
    let result = orchestrator
        .await_completion(&mut job, &CancellationToken::new(), move |update| {
            seen.lock().unwrap().push(update.clone())
        })
        .await;

    match result {
        Err(SessionError::AnalysisFailed(message)) => {
            assert_eq!(message, "image decoder crashed")
        }
        other => panic!("expected AnalysisFailed, got {:?}", other),
    }
    assert_eq!(job.state, JobState::Failed);

    let updates = updates.lock().unwrap();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].percent, 50);
    assert_eq!(updates[1].attempt, 2);
}

#[tokio::test(start_paused = true)]
async fn test_status_errors_exhaust_attempts() {
    let (service, orchestrator) = setup(3);
    service.fail_status_queries(true);

    let mut job = orchestrator
        .submit(&DurableSessionId::mint(), "owner", AnalysisMode::default(), 2)
        .await
        .unwrap();

    let result = orchestrator
        .await_completion(&mut job, &CancellationToken::new(), |_| {})
        .await;

    assert!(matches!(result, Err(SessionError::AnalysisService(_))));
    assert_eq!(service.status_count(), 3);
}

#[tokio::test]
async fn test_single_photo_is_rejected_before_submission() {
    let (service, orchestrator) = setup(5);

    let result = orchestrator
        .submit(&DurableSessionId::mint(), "owner", AnalysisMode::default(), 1)
        .await;

    assert!(matches!(
        result,
        Err(SessionError::InsufficientInput { found: 1 })
    ));
    assert_eq!(service.submit_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_polling() {
    let (service, orchestrator) = setup(60);
    service.set_fallback(JobStatus::Processing);

    let mut job = orchestrator
        .submit(&DurableSessionId::mint(), "owner", AnalysisMode::default(), 2)
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();
    let task = tokio::spawn(async move {
        let result = orchestrator
            .await_completion(&mut job, &task_cancel, |_| {})
            .await;
        (result, job)
    });

    tokio::time::sleep(Duration::from_secs(12)).await;
    cancel.cancel();

    let (result, job) = task.await.unwrap();
    assert!(matches!(result, Err(SessionError::Stale)));
    assert_eq!(job.state, JobState::Cancelled);

    let polls = service.status_count();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(service.status_count(), polls);
}
