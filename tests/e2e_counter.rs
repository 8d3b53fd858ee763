//! Two users, one counter emitter and two counter listeners.
//!
//! The "all" listener follows every increment. The "caller" listener is
//! subscribed by user2 and only follows user2's increments.

mod common;

use std::sync::atomic::Ordering;

use common::{start_emitter, start_listener, test_config, wait_for};
use event_hub::client::{CounterEmitterClient, CounterListenerClient, EventHubClient};
use event_hub::hub::{BecomeEventListenerRequest, EventListener};
use event_hub::services::EVENTS_CALLBACK;
use event_hub::{EventFilter, Identity, ServiceRole};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn counter_flow_works_fine() {
    let config = test_config(200, 100 * 1024);

    let emitter = start_emitter(ServiceRole::CounterEmitter, &config).await;
    let listener_all = start_listener(ServiceRole::CounterListenerAll, &config, &emitter).await;
    let listener_caller =
        start_listener(ServiceRole::CounterListenerCaller, &config, &emitter).await;

    let user1 = Identity::generate();
    let user2 = Identity::generate();

    let emitter_u1 = CounterEmitterClient::new(emitter.url(), user1.clone());
    let emitter_u2 = emitter_u1.connect(user2.clone());
    let all_u1 = CounterListenerClient::new(listener_all.url(), user1.clone());
    let caller_u1 = CounterListenerClient::new(listener_caller.url(), user1.clone());

    // user2 subscribes both listeners
    all_u1.connect(user2.clone()).start_listening().await.unwrap();
    caller_u1.connect(user2.clone()).start_listening().await.unwrap();

    assert_eq!(all_u1.get_counter_value().await.unwrap(), 0, "listener-all starts clean");
    assert_eq!(caller_u1.get_counter_value().await.unwrap(), 0, "listener-caller starts clean");

    // user1 increments
    assert_eq!(emitter_u1.inc().await.unwrap(), 1);

    let seen = wait_for(1, || async { all_u1.get_counter_value().await.unwrap() }).await;
    assert_eq!(seen, 1, "listener-all should follow user1's increment");
    assert_eq!(
        caller_u1.get_counter_value().await.unwrap(),
        0,
        "listener-caller ignores user1"
    );

    // user2 increments
    assert_eq!(emitter_u2.inc().await.unwrap(), 2);

    let seen = wait_for(2, || async { all_u1.get_counter_value().await.unwrap() }).await;
    assert_eq!(seen, 2);
    let seen = wait_for(2, || async { caller_u1.get_counter_value().await.unwrap() }).await;
    assert_eq!(seen, 2, "listener-caller follows user2's increment");

    assert_eq!(emitter_u1.get_counter_value().await.unwrap(), 2);

    listener_caller.shutdown().await;
    listener_all.shutdown().await;
    emitter.shutdown().await;
}

#[tokio::test]
async fn forged_callback_is_rejected() {
    let config = test_config(200, 100 * 1024);
    let emitter = start_emitter(ServiceRole::CounterEmitter, &config).await;
    let listener = start_listener(ServiceRole::CounterListenerAll, &config, &emitter).await;

    let user = Identity::generate();
    let client = CounterListenerClient::new(listener.url(), user.clone());
    client.start_listening().await.unwrap();

    // Signed by an ordinary user, not by the emitter the listener subscribed to
    let err = client
        .service()
        .call::<_, ()>("events_callback", &())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(2003));
    assert_eq!(client.get_counter_value().await.unwrap(), 0);

    listener.shutdown().await;
    emitter.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn subscription_on_foreign_url_is_not_delivered() {
    let config = test_config(50, 100 * 1024);
    let emitter = start_emitter(ServiceRole::CounterEmitter, &config).await;
    let listener_caller =
        start_listener(ServiceRole::CounterListenerCaller, &config, &emitter).await;

    let user1 = Identity::generate();
    let user2 = Identity::generate();
    let mallory = Identity::generate();

    let caller_u2 = CounterListenerClient::new(listener_caller.url(), user2.clone());
    caller_u2.start_listening().await.unwrap();

    // mallory points an unfiltered subscription at the caller listener
    EventHubClient::new(emitter.url(), mallory)
        .become_event_listener(&BecomeEventListenerRequest {
            listeners: vec![EventListener {
                filter: EventFilter::empty(),
                callback_method_name: EVENTS_CALLBACK.to_string(),
            }],
            callback_url: listener_caller.url().to_string(),
        })
        .await
        .unwrap();

    let emitter_u1 = CounterEmitterClient::new(emitter.url(), user1);
    assert_eq!(emitter_u1.inc().await.unwrap(), 1);

    let hub = emitter.emitter().unwrap();
    let failures = wait_for(1, || async {
        hub.stats().delivery_failures.load(Ordering::SeqCst)
    })
    .await;
    assert_eq!(failures, 1, "batch for mallory's subscription is refused");
    assert_eq!(
        caller_u2.get_counter_value().await.unwrap(),
        0,
        "listener-caller still ignores user1"
    );

    // user2's own subscription keeps working
    assert_eq!(emitter_u1.connect(user2).inc().await.unwrap(), 2);
    let seen = wait_for(2, || async { caller_u2.get_counter_value().await.unwrap() }).await;
    assert_eq!(seen, 2);

    listener_caller.shutdown().await;
    emitter.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn caller_listener_follows_every_caller_that_started_it() {
    let config = test_config(50, 100 * 1024);
    let emitter = start_emitter(ServiceRole::CounterEmitter, &config).await;
    let listener_caller =
        start_listener(ServiceRole::CounterListenerCaller, &config, &emitter).await;

    let user1 = Identity::generate();
    let user2 = Identity::generate();
    let user3 = Identity::generate();

    let caller_u1 = CounterListenerClient::new(listener_caller.url(), user1.clone());
    caller_u1.start_listening().await.unwrap();
    caller_u1.connect(user2.clone()).start_listening().await.unwrap();

    let emitter_u3 = CounterEmitterClient::new(emitter.url(), user3);
    assert_eq!(emitter_u3.inc().await.unwrap(), 1);

    assert_eq!(emitter_u3.connect(user1).inc().await.unwrap(), 2);
    let seen = wait_for(2, || async { caller_u1.get_counter_value().await.unwrap() }).await;
    assert_eq!(seen, 2, "user1 started the listener");

    assert_eq!(emitter_u3.connect(user2).inc().await.unwrap(), 3);
    let seen = wait_for(3, || async { caller_u1.get_counter_value().await.unwrap() }).await;
    assert_eq!(seen, 3, "user2 started it too");

    listener_caller.shutdown().await;
    emitter.shutdown().await;
}
