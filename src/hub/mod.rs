//! Event hub - topic-filtered pub/sub with batched delivery
//!
//! - `types`: events, filters, endpoints and listener-management requests
//! - `codec`: bincode wire format for events and batch messages
//! - `macros`: `define_event!` for typed events and filters
//! - `event_hub`: listener index and batching state machine
//! - `delivery`: how sealed batches reach listeners
//! - `emitter`: runtime wrapper driving the hub from services

pub mod codec;
pub mod delivery;
pub mod emitter;
pub mod event_hub;
mod macros;
pub mod types;

pub use codec::CodecError;
pub use delivery::{DeliveryError, DeliveryTarget, EventDelivery, HttpDelivery, RECIPIENT_PARAM};
pub use emitter::{DeliveryReport, EmitterStats, EventEmitter};
pub use event_hub::{EventHub, HubError, HubStats};
pub use types::{
    AddEventListenersRequest, BecomeEventListenerRequest, EVENT_NAME_FIELD, EncodedEventBatch,
    Event, EventField, EventFilter, EventListener, EventListenerExt, EventPayload,
    GetEventListenersRequest, GetEventListenersResponse, RemoteCallEndpoint,
    RemoveEventListenersRequest, RemoveEventListenersResponse, StopBeingEventListenerRequest,
    StopBeingEventListenerResponse, TopicFilter,
};
