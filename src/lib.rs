//! event_hub - emitter/listener pub/sub over signed HTTP RPC
//!
//! Emitters publish typed events into an [`hub::EventHub`]; listeners subscribe
//! with topic filters and receive batched callbacks. Batches are sealed when
//! they reach a byte threshold or when they get old enough.
//!
//! # Modules
//!
//! - [`core_types`] - Principals and signing identities
//! - [`hub`] - Event model, batching state machine, emitter runtime
//! - [`api_auth`] - Signed request authentication
//! - [`gateway`] - HTTP surface, response envelope, health
//! - [`client`] - Typed RPC clients
//! - [`services`] - Counter and mirror demo services
//! - [`node`] - Start and stop a service node

// Core types - must be first!
pub mod core_types;

pub mod api_auth;
pub mod client;
pub mod config;
pub mod gateway;
pub mod hub;
pub mod logging;
pub mod node;
pub mod services;
pub mod shutdown;

// Convenient re-exports at crate root
pub use core_types::{Identity, Principal};
pub use hub::{Event, EventEmitter, EventFilter, EventHub, EventPayload, TopicFilter};
pub use node::{NodeError, ServiceNode};
pub use services::ServiceRole;
pub use shutdown::ShutdownSignal;
