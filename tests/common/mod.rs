//! Shared helpers for node-level scenarios.

#![allow(dead_code)]

use std::future::Future;
use std::time::Duration;

use event_hub::config::AppConfig;
use event_hub::{Identity, ServiceNode, ServiceRole};

pub const WAIT_DEADLINE: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Loopback config on an ephemeral port with a short batching window.
pub fn test_config(batch_window_ms: u64, batch_max_bytes: usize) -> AppConfig {
    let mut config = AppConfig::default();
    config.hub.batch_making_duration_ms = batch_window_ms;
    config.hub.batch_max_size_bytes = batch_max_bytes;
    config.hub.heartbeat_interval_ms = 20;
    config
}

pub async fn start_emitter(role: ServiceRole, config: &AppConfig) -> ServiceNode {
    ServiceNode::start(role, config, Identity::generate())
        .await
        .expect("emitter node should start")
}

pub async fn start_listener(role: ServiceRole, config: &AppConfig, emitter: &ServiceNode) -> ServiceNode {
    let mut config = config.clone();
    config.service.emitter_url = Some(emitter.url().to_string());
    ServiceNode::start(role, &config, Identity::generate())
        .await
        .expect("listener node should start")
}

/// Poll `read` until it yields `expected` or the deadline passes.
///
/// Returns the last observed value.
pub async fn wait_for<T, F, Fut>(expected: T, mut read: F) -> T
where
    T: PartialEq + Copy,
    F: FnMut() -> Fut,
    Fut: Future<Output = T>,
{
    let deadline = tokio::time::Instant::now() + WAIT_DEADLINE;
    loop {
        let value = read().await;
        if value == expected || tokio::time::Instant::now() >= deadline {
            return value;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
