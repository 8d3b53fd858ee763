//! RPC clients
//!
//! [`ServiceClient`] signs every call with its [`Identity`] and unwraps the
//! `ApiResponse` envelope. The typed clients below are thin method tables over it.
//! [`ServiceClient::connect`] gives the same service under another caller,
//! which is how multi-user scenarios are driven.

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::api_auth::sign_request;
use crate::core_types::{Identity, Principal};
use crate::gateway::handlers::HealthResponse;
use crate::gateway::types::ApiResponse;
use crate::hub::{
    AddEventListenersRequest, BecomeEventListenerRequest, GetEventListenersRequest,
    GetEventListenersResponse, RemoveEventListenersRequest, RemoveEventListenersResponse,
    StopBeingEventListenerRequest, StopBeingEventListenerResponse,
};
use crate::services::MirrorRequest;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected http response {status}: {body}")]
    Http { status: u16, body: String },

    #[error("rejected: code={code} msg={msg}")]
    Rejected { code: i32, msg: String },

    #[error("decode error: {0}")]
    Decode(String),
}

impl ClientError {
    /// Error code reported by the service, if it answered with one.
    pub fn code(&self) -> Option<i32> {
        match self {
            ClientError::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Signed JSON-RPC client for one service node.
#[derive(Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    base_url: String,
    identity: Identity,
}

impl ServiceClient {
    pub fn new(base_url: impl Into<String>, identity: Identity) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            identity,
        }
    }

    /// Same service, calls signed by `identity`.
    pub fn connect(&self, identity: Identity) -> Self {
        Self {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            identity,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn principal(&self) -> Principal {
        self.identity.principal()
    }

    /// `POST /rpc/{method}` with `req` as the JSON body.
    pub async fn call<Req, Resp>(&self, method: &str, req: &Req) -> Result<Resp, ClientError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let path = format!("/rpc/{}", method);
        let body = serde_json::to_vec(req).map_err(|e| ClientError::Decode(e.to_string()))?;
        let auth = sign_request(&self.identity, "POST", &path, &body);

        let resp = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .header("Authorization", auth)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Self::unwrap_response(resp).await
    }

    /// `GET /api/v1/health`.
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let resp = self
            .http
            .get(format!("{}/api/v1/health", self.base_url))
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Self::unwrap_response(resp).await
    }

    async fn unwrap_response<Resp: DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<Resp, ClientError> {
        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let envelope: ApiResponse<serde_json::Value> =
            serde_json::from_slice(&bytes).map_err(|_| ClientError::Http {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            })?;

        if envelope.code != 0 {
            return Err(ClientError::Rejected {
                code: envelope.code,
                msg: envelope.msg,
            });
        }

        // Unit results arrive as `null`
        let data = envelope.data.unwrap_or(serde_json::Value::Null);
        serde_json::from_value(data).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

// ============================================================================
// Typed clients
// ============================================================================

macro_rules! typed_client {
    ($name:ident) => {
        #[derive(Clone)]
        pub struct $name {
            inner: ServiceClient,
        }

        impl $name {
            pub fn new(base_url: impl Into<String>, identity: Identity) -> Self {
                Self {
                    inner: ServiceClient::new(base_url, identity),
                }
            }

            pub fn connect(&self, identity: Identity) -> Self {
                Self {
                    inner: self.inner.connect(identity),
                }
            }

            pub fn service(&self) -> &ServiceClient {
                &self.inner
            }
        }
    };
}

typed_client!(EventHubClient);
typed_client!(CounterEmitterClient);
typed_client!(CounterListenerClient);
typed_client!(MirrorEmitterClient);
typed_client!(BatchListenerClient);

impl EventHubClient {
    pub async fn become_event_listener(
        &self,
        req: &BecomeEventListenerRequest,
    ) -> Result<(), ClientError> {
        self.inner.call("_become_event_listener", req).await
    }

    pub async fn stop_being_event_listener(
        &self,
        req: &StopBeingEventListenerRequest,
    ) -> Result<StopBeingEventListenerResponse, ClientError> {
        self.inner.call("_stop_being_event_listener", req).await
    }

    pub async fn add_event_listeners(
        &self,
        req: &AddEventListenersRequest,
    ) -> Result<(), ClientError> {
        self.inner.call("_add_event_listeners", req).await
    }

    pub async fn remove_event_listeners(
        &self,
        req: &RemoveEventListenersRequest,
    ) -> Result<RemoveEventListenersResponse, ClientError> {
        self.inner.call("_remove_event_listeners", req).await
    }

    pub async fn get_event_listeners(
        &self,
        req: &GetEventListenersRequest,
    ) -> Result<GetEventListenersResponse, ClientError> {
        self.inner.call("_get_event_listeners", req).await
    }
}

impl CounterEmitterClient {
    pub async fn inc(&self) -> Result<u64, ClientError> {
        self.inner.call("inc", &()).await
    }

    pub async fn get_counter_value(&self) -> Result<u64, ClientError> {
        self.inner.call("get_counter_value", &()).await
    }
}

impl CounterListenerClient {
    pub async fn start_listening(&self) -> Result<(), ClientError> {
        self.inner.call("start_listening", &()).await
    }

    pub async fn get_counter_value(&self) -> Result<u64, ClientError> {
        self.inner.call("get_counter_value", &()).await
    }
}

impl MirrorEmitterClient {
    pub async fn mirror(&self, data: Vec<u8>) -> Result<(), ClientError> {
        self.inner.call("mirror", &MirrorRequest { data }).await
    }

    pub async fn get_requests_count(&self) -> Result<u64, ClientError> {
        self.inner.call("get_requests_count", &()).await
    }
}

impl BatchListenerClient {
    pub async fn start_listening(&self) -> Result<(), ClientError> {
        self.inner.call("start_listening", &()).await
    }

    pub async fn get_events_received(&self) -> Result<u64, ClientError> {
        self.inner.call("get_events_received", &()).await
    }

    pub async fn get_batches_received(&self) -> Result<u64, ClientError> {
        self.inner.call("get_batches_received", &()).await
    }

    pub async fn get_times_events_callback_triggered(&self) -> Result<u64, ClientError> {
        self.inner.call("get_times_events_callback_triggered", &()).await
    }
}
