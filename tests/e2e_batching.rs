//! Mirror emitter to batch listener: batching by time and by size.

mod common;

use common::{start_emitter, start_listener, test_config, wait_for};
use event_hub::client::{BatchListenerClient, MirrorEmitterClient};
use event_hub::hub::codec::encoded_size;
use event_hub::services::MirrorEvent;
use event_hub::{EventPayload, Identity, ServiceRole};

const EVENTS: u64 = 10;
const PAYLOAD: usize = 100;

async fn run_mirror_scenario(batch_window_ms: u64, batch_max_bytes: usize) -> (u64, u64, u64) {
    let config = test_config(batch_window_ms, batch_max_bytes);
    let emitter = start_emitter(ServiceRole::MirrorEmitter, &config).await;
    let listener = start_listener(ServiceRole::BatchListener, &config, &emitter).await;

    let user = Identity::generate();
    let mirror = MirrorEmitterClient::new(emitter.url(), user.clone());
    let batches = BatchListenerClient::new(listener.url(), user);

    batches.start_listening().await.unwrap();

    for _ in 0..EVENTS {
        mirror.mirror(vec![7u8; PAYLOAD]).await.unwrap();
    }
    assert_eq!(mirror.get_requests_count().await.unwrap(), EVENTS);

    let events = wait_for(EVENTS, || async { batches.get_events_received().await.unwrap() }).await;
    let batch_count = batches.get_batches_received().await.unwrap();
    let triggered = batches.get_times_events_callback_triggered().await.unwrap();

    listener.shutdown().await;
    emitter.shutdown().await;
    (events, batch_count, triggered)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn events_within_one_window_arrive_as_one_batch() {
    // Window far longer than the ten calls take; size limit never reached
    let (events, batches, triggered) = run_mirror_scenario(2_000, 500 * 1024).await;

    assert_eq!(events, EVENTS);
    assert_eq!(batches, 1);
    assert_eq!(triggered, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn size_threshold_splits_batches() {
    const MAX_BYTES: usize = 1024;

    let event_size = encoded_size(&MirrorEvent { data: vec![7u8; PAYLOAD] }.to_event().unwrap()).unwrap();
    let per_batch = (MAX_BYTES / event_size) as u64;
    assert!(per_batch > 0 && per_batch < EVENTS, "scenario needs a split");
    let expected_batches = EVENTS.div_ceil(per_batch);

    let (events, batches, _) = run_mirror_scenario(2_000, MAX_BYTES).await;

    assert_eq!(events, EVENTS);
    assert_eq!(batches, expected_batches);
}

#[tokio::test]
async fn oversized_event_is_rejected() {
    let config = test_config(200, 256);
    let emitter = start_emitter(ServiceRole::MirrorEmitter, &config).await;
    let listener = start_listener(ServiceRole::BatchListener, &config, &emitter).await;

    let user = Identity::generate();
    BatchListenerClient::new(listener.url(), user.clone())
        .start_listening()
        .await
        .unwrap();

    let err = MirrorEmitterClient::new(emitter.url(), user)
        .mirror(vec![0u8; 1024])
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(3002));

    listener.shutdown().await;
    emitter.shutdown().await;
}
