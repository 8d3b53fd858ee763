//! Batch delivery
//!
//! The emitter hands every sealed batch to an [`EventDelivery`]. The HTTP
//! implementation posts the batch message to the listener's callback and signs
//! the request with the emitter's identity, so the listener can tell genuine
//! deliveries from forged ones. The subscriber's principal travels in the signed
//! query (`?to=<principal>`), so a listener can also refuse batches that were
//! subscribed on its URL by somebody else.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use super::types::RemoteCallEndpoint;
use crate::api_auth::sign_request;
use crate::core_types::{Identity, Principal};
use crate::gateway::types::ApiResponse;

/// Query parameter naming the principal a batch is addressed to.
pub const RECIPIENT_PARAM: &str = "to";

/// Query of a delivery callback, as seen by the listener.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryTarget {
    #[serde(default)]
    pub to: Option<Principal>,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid callback url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("listener rejected batch: code={code} msg={msg}")]
    Rejected { code: i32, msg: String },
}

/// Sends one encoded batch message to one listener endpoint.
#[async_trait]
pub trait EventDelivery: Send + Sync {
    async fn deliver(
        &self,
        endpoint: &RemoteCallEndpoint,
        payload: Vec<u8>,
    ) -> Result<(), DeliveryError>;
}

/// Signed HTTP callback delivery.
pub struct HttpDelivery {
    client: reqwest::Client,
    identity: Identity,
}

impl HttpDelivery {
    pub fn new(identity: Identity, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        Ok(Self { client, identity })
    }
}

#[async_trait]
impl EventDelivery for HttpDelivery {
    async fn deliver(
        &self,
        endpoint: &RemoteCallEndpoint,
        payload: Vec<u8>,
    ) -> Result<(), DeliveryError> {
        let url = endpoint.callback_url();
        let mut parsed = reqwest::Url::parse(&url).map_err(|e| DeliveryError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        parsed
            .query_pairs_mut()
            .append_pair(RECIPIENT_PARAM, &endpoint.principal.to_hex());

        let signed_path = match parsed.query() {
            Some(query) => format!("{}?{}", parsed.path(), query),
            None => parsed.path().to_string(),
        };
        let auth = sign_request(&self.identity, "POST", &signed_path, &payload);

        let resp = self
            .client
            .post(parsed)
            .header("Authorization", auth)
            .header("Content-Type", "application/octet-stream")
            .body(payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = resp.status();
        let body: ApiResponse<serde_json::Value> = resp.json().await.map_err(|e| {
            DeliveryError::Transport(format!("status {}: unreadable response: {}", status, e))
        })?;

        if body.code != 0 {
            return Err(DeliveryError::Rejected {
                code: body.code,
                msg: body.msg,
            });
        }
        Ok(())
    }
}

/// Recording delivery for testing
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    pub struct RecordingDelivery {
        delivered: Mutex<Vec<(RemoteCallEndpoint, Vec<u8>)>>,
        fail: AtomicBool,
    }

    impl RecordingDelivery {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_fail(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        pub fn delivered(&self) -> Vec<(RemoteCallEndpoint, Vec<u8>)> {
            self.delivered.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventDelivery for RecordingDelivery {
        async fn deliver(
            &self,
            endpoint: &RemoteCallEndpoint,
            payload: Vec<u8>,
        ) -> Result<(), DeliveryError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(DeliveryError::Transport("connection refused".into()));
            }
            self.delivered
                .lock()
                .unwrap()
                .push((endpoint.clone(), payload));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_auth::{AuthState, Caller};
    use crate::gateway::build_app;
    use crate::gateway::handlers::NodeInfo;
    use axum::extract::{Query, State};
    use axum::routing::post;
    use axum::{Extension, Json, Router};
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<(Principal, Option<Principal>)>>>;

    async fn record_callback(
        State(seen): State<Seen>,
        Extension(Caller(from)): Extension<Caller>,
        Query(target): Query<DeliveryTarget>,
    ) -> Json<ApiResponse<()>> {
        seen.lock().unwrap().push((from, target.to));
        Json(ApiResponse::success(()))
    }

    /// Authenticated listener stub recording who delivered and to whom.
    async fn spawn_listener() -> (String, Seen) {
        let seen: Seen = Arc::default();
        let rpc = Router::new()
            .route("/events_callback", post(record_callback))
            .with_state(Arc::clone(&seen));
        let info = Arc::new(NodeInfo {
            principal: Identity::generate().principal(),
            role: "test".into(),
        });
        let app = build_app(rpc, Arc::new(AuthState::default()), info);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), seen)
    }

    #[tokio::test]
    async fn test_delivery_is_signed_and_addressed() {
        let (url, seen) = spawn_listener().await;
        let emitter = Identity::generate();
        let subscriber = Identity::generate().principal();
        let delivery = HttpDelivery::new(emitter.clone(), Duration::from_secs(5)).unwrap();
        let endpoint = RemoteCallEndpoint {
            principal: subscriber,
            url,
            method_name: "events_callback".into(),
        };

        delivery.deliver(&endpoint, vec![0; 8]).await.unwrap();

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen, vec![(emitter.principal(), Some(subscriber))]);
    }

    #[tokio::test]
    async fn test_unreachable_listener_is_transport_error() {
        let id = Identity::generate();
        let delivery = HttpDelivery::new(id.clone(), Duration::from_millis(500)).unwrap();
        // Bind then drop to get a port nobody listens on
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let endpoint = RemoteCallEndpoint {
            principal: id.principal(),
            url: format!("http://127.0.0.1:{}", port),
            method_name: "events_callback".into(),
        };

        let err = delivery.deliver(&endpoint, vec![0; 8]).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Transport(_)));
    }

    #[tokio::test]
    async fn test_malformed_url_rejected() {
        let id = Identity::generate();
        let delivery = HttpDelivery::new(id.clone(), Duration::from_millis(500)).unwrap();
        let endpoint = RemoteCallEndpoint {
            principal: id.principal(),
            url: "not a url".into(),
            method_name: "events_callback".into(),
        };

        let err = delivery.deliver(&endpoint, vec![]).await.unwrap_err();
        assert!(matches!(err, DeliveryError::InvalidUrl { .. }));
    }
}
