//! Status poller against scripted provider responses.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{http_error, FakeSynthesizer};
use tokio::sync::watch;
use vgen_models::{
    GenerationParams, Job, JobInput, JobStatus, JobUpdate, NewJob, TextToVideoParams,
};
use vgen_providers::{ProviderState, ProviderStatus};
use vgen_store::{JobStore, MemoryJobStore};
use vgen_worker::poller::{MISSING_VIDEO_URL_DETAIL, UNKNOWN_PROVIDER_ERROR};
use vgen_worker::{PollOutcome, PollerConfig, StatusPoller};

struct Harness {
    synth: Arc<FakeSynthesizer>,
    store: Arc<MemoryJobStore>,
    poller: StatusPoller,
}

fn harness(max_attempts: u32, interval: Duration) -> Harness {
    let synth = Arc::new(FakeSynthesizer::new());
    let store = Arc::new(MemoryJobStore::new());
    let poller = StatusPoller::new(
        synth.clone(),
        store.clone(),
        PollerConfig {
            max_attempts,
            interval,
        },
    );
    Harness {
        synth,
        store,
        poller,
    }
}

async fn in_flight_job(store: &MemoryJobStore) -> Job {
    let input = JobInput {
        original_prompt: Some("a cat on a skateboard".into()),
        enhanced_prompt: Some("a cat on a skateboard, cinematic lighting".into()),
        image_path: None,
        image_analysis: None,
        analysis_degraded: false,
        params: GenerationParams::Text(TextToVideoParams::default()),
    };
    let job = store
        .create(NewJob::new("user-1", input, JobStatus::Processing))
        .await
        .unwrap();
    store
        .update(&job.id, JobUpdate::provider_job_id("kling-1"))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_completes_after_three_polls() {
    let h = harness(60, Duration::from_millis(1));
    let job = in_flight_job(&h.store).await;
    h.synth.script_poll(Ok(ProviderStatus::processing(30)));
    h.synth.script_poll(Ok(ProviderStatus::processing(70)));
    h.synth.script_poll(Ok(ProviderStatus::completed(
        "https://x/video.mp4",
        Some(5.2),
    )));

    let (_stop_tx, stop_rx) = watch::channel(false);
    let outcome = h.poller.poll_until_terminal(&job.id, "kling-1", stop_rx).await;

    assert_eq!(outcome, PollOutcome::Completed);
    assert_eq!(h.synth.poll_count(), 3);

    let stored = h.store.get(&job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.progress, 100);
    let output = stored.output.unwrap();
    assert_eq!(output.video_url, "https://x/video.mp4");
    assert_eq!(output.duration_secs, Some(5.2));
    assert!(stored.error_detail.is_none());
}

#[tokio::test]
async fn test_progress_is_recorded_while_processing() {
    let h = harness(3, Duration::from_millis(1));
    let job = in_flight_job(&h.store).await;
    h.synth.script_poll(Ok(ProviderStatus::processing(45)));
    h.synth.script_poll(Ok(ProviderStatus::processing(20)));
    h.synth.script_poll(Ok(ProviderStatus::failed(Some("content policy".into()))));

    let (_stop_tx, stop_rx) = watch::channel(false);
    h.poller.poll_until_terminal(&job.id, "kling-1", stop_rx).await;

    let stored = h.store.get(&job.id).await.unwrap();
    assert_eq!(stored.progress, 45);
    assert_eq!(stored.error_detail.as_deref(), Some("content policy"));
}

#[tokio::test]
async fn test_times_out_after_attempt_budget() {
    let h = harness(60, Duration::from_millis(1));
    let job = in_flight_job(&h.store).await;

    let (_stop_tx, stop_rx) = watch::channel(false);
    let outcome = h.poller.poll_until_terminal(&job.id, "kling-1", stop_rx).await;

    assert_eq!(outcome, PollOutcome::TimedOut);
    assert_eq!(h.synth.poll_count(), 60);

    let stored = h.store.get(&job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert!(stored.error_detail.unwrap().contains("timed out after 60"));
    assert!(stored.output.is_none());
}

#[tokio::test]
async fn test_provider_failure_without_message() {
    let h = harness(10, Duration::from_millis(1));
    let job = in_flight_job(&h.store).await;
    h.synth.script_poll(Ok(ProviderStatus::failed(None)));

    let (_stop_tx, stop_rx) = watch::channel(false);
    let outcome = h.poller.poll_until_terminal(&job.id, "kling-1", stop_rx).await;

    assert_eq!(outcome, PollOutcome::Failed);
    let stored = h.store.get(&job.id).await.unwrap();
    assert_eq!(stored.error_detail.as_deref(), Some(UNKNOWN_PROVIDER_ERROR));
}

#[tokio::test]
async fn test_completion_without_url_fails_job() {
    let h = harness(10, Duration::from_millis(1));
    let job = in_flight_job(&h.store).await;
    h.synth.script_poll(Ok(ProviderStatus {
        state: ProviderState::Completed,
        progress_pct: 100,
        result_ref: None,
        duration_secs: Some(5.0),
        error_msg: None,
    }));

    let (_stop_tx, stop_rx) = watch::channel(false);
    let outcome = h.poller.poll_until_terminal(&job.id, "kling-1", stop_rx).await;

    assert_eq!(outcome, PollOutcome::Failed);
    let stored = h.store.get(&job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.error_detail.as_deref(), Some(MISSING_VIDEO_URL_DETAIL));
    assert!(stored.output.is_none());
}

#[tokio::test]
async fn test_poll_errors_are_absorbed_until_last_attempt() {
    let h = harness(5, Duration::from_millis(1));
    let job = in_flight_job(&h.store).await;
    h.synth.script_poll(Err(http_error(503, "upstream busy")));
    h.synth.script_poll(Err(http_error(503, "upstream busy")));
    h.synth.script_poll(Ok(ProviderStatus::completed("https://x/v.mp4", None)));

    let (_stop_tx, stop_rx) = watch::channel(false);
    let outcome = h.poller.poll_until_terminal(&job.id, "kling-1", stop_rx).await;

    assert_eq!(outcome, PollOutcome::Completed);
    assert_eq!(h.synth.poll_count(), 3);
}

#[tokio::test]
async fn test_error_on_last_attempt_fails_job() {
    let h = harness(4, Duration::from_millis(1));
    let job = in_flight_job(&h.store).await;
    for _ in 0..4 {
        h.synth.script_poll(Err(http_error(502, "bad gateway")));
    }

    let (_stop_tx, stop_rx) = watch::channel(false);
    let outcome = h.poller.poll_until_terminal(&job.id, "kling-1", stop_rx).await;

    assert_eq!(outcome, PollOutcome::Failed);
    assert_eq!(h.synth.poll_count(), 4);
    let stored = h.store.get(&job.id).await.unwrap();
    assert_eq!(
        stored.error_detail.as_deref(),
        Some("Polling failed after 4 attempts: bad gateway")
    );
}

#[tokio::test]
async fn test_cancelled_job_is_not_polled() {
    let h = harness(10, Duration::from_millis(1));
    let job = in_flight_job(&h.store).await;
    h.store.update(&job.id, JobUpdate::cancelled()).await.unwrap();

    let (_stop_tx, stop_rx) = watch::channel(false);
    let outcome = h.poller.poll_until_terminal(&job.id, "kling-1", stop_rx).await;

    assert_eq!(outcome, PollOutcome::Cancelled);
    assert_eq!(h.synth.poll_count(), 0);
    assert_eq!(
        h.store.get(&job.id).await.unwrap().status,
        JobStatus::Cancelled
    );
}

#[tokio::test]
async fn test_deleted_job_vanishes() {
    let h = harness(10, Duration::from_millis(1));
    let job = in_flight_job(&h.store).await;
    h.store.delete(&job.id).await.unwrap();

    let (_stop_tx, stop_rx) = watch::channel(false);
    let outcome = h.poller.poll_until_terminal(&job.id, "kling-1", stop_rx).await;
    assert_eq!(outcome, PollOutcome::Vanished);
}

#[tokio::test]
async fn test_stop_signal_interrupts_wait() {
    let h = harness(60, Duration::from_secs(30));
    let job = in_flight_job(&h.store).await;

    let (stop_tx, stop_rx) = watch::channel(false);
    let poll = h.poller.poll_until_terminal(&job.id, "kling-1", stop_rx);
    let stop = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        stop_tx.send(true).unwrap();
    };

    let (outcome, _) = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(poll, stop)
    })
    .await
    .expect("poller did not stop promptly");

    assert_eq!(outcome, PollOutcome::Stopped);
    assert_eq!(h.synth.poll_count(), 1);
    assert_eq!(
        h.store.get(&job.id).await.unwrap().status,
        JobStatus::Processing
    );
}

#[tokio::test]
async fn test_registry_runs_one_poller_per_job() {
    let h = harness(60, Duration::from_secs(30));
    let job = in_flight_job(&h.store).await;

    assert!(h.poller.spawn(&job.id, "kling-1"));
    assert!(!h.poller.spawn(&job.id, "kling-1"));
    assert!(h.poller.is_active(&job.id));
    assert_eq!(h.poller.active_count(), 1);

    assert_eq!(h.poller.shutdown(Duration::from_secs(5)).await, 1);
    assert!(!h.poller.is_active(&job.id));
    assert_eq!(
        h.store.get(&job.id).await.unwrap().status,
        JobStatus::Processing
    );
}

#[tokio::test]
async fn test_stop_after_cancel_ends_background_poller() {
    let h = harness(60, Duration::from_secs(30));
    let job = in_flight_job(&h.store).await;

    assert!(h.poller.spawn(&job.id, "kling-1"));
    while h.store.get(&job.id).await.unwrap().progress == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    h.store.update(&job.id, JobUpdate::cancelled()).await.unwrap();
    assert!(h.poller.stop(&job.id));
    assert!(!h.poller.is_active(&job.id));
    assert!(!h.poller.stop(&job.id));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.synth.poll_count(), 1);
    assert_eq!(
        h.store.get(&job.id).await.unwrap().status,
        JobStatus::Cancelled
    );
}
