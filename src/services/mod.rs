//! Demo services
//!
//! Two emitters (counter, mirror) host an event hub; three listeners subscribe
//! to them and expose what they received through query RPCs.

pub mod batch_listener;
pub mod counter_emitter;
pub mod counter_listener;
pub mod events;
pub mod mirror_emitter;
pub mod upstream;

use std::fmt;
use std::str::FromStr;

pub use batch_listener::BatchListener;
pub use counter_emitter::CounterEmitter;
pub use counter_listener::{CounterListener, ListenMode};
pub use events::{IncrementEvent, IncrementEventFilter, MirrorEvent, MirrorEventFilter};
pub use mirror_emitter::{MirrorEmitter, MirrorRequest};
pub use upstream::{EVENTS_CALLBACK, EmitterLink};

/// Which service a node runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceRole {
    CounterEmitter,
    CounterListenerAll,
    CounterListenerCaller,
    MirrorEmitter,
    BatchListener,
}

impl ServiceRole {
    pub const ALL: [ServiceRole; 5] = [
        ServiceRole::CounterEmitter,
        ServiceRole::CounterListenerAll,
        ServiceRole::CounterListenerCaller,
        ServiceRole::MirrorEmitter,
        ServiceRole::BatchListener,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceRole::CounterEmitter => "counter-emitter",
            ServiceRole::CounterListenerAll => "counter-listener-all",
            ServiceRole::CounterListenerCaller => "counter-listener-caller",
            ServiceRole::MirrorEmitter => "mirror-emitter",
            ServiceRole::BatchListener => "batch-listener",
        }
    }

    /// Hosts an event hub.
    pub fn is_emitter(self) -> bool {
        matches!(self, ServiceRole::CounterEmitter | ServiceRole::MirrorEmitter)
    }
}

impl fmt::Display for ServiceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceRole::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = ServiceRole::ALL.iter().map(|r| r.as_str()).collect();
                format!("unknown role '{}', expected one of: {}", s, known.join(", "))
            })
    }
}
