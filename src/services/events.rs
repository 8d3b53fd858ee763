//! Events published by the demo services

use crate::core_types::Principal;

crate::define_event! {
    /// Emitted on every `inc`; `by` is the caller that incremented.
    #[derive(Debug, Clone, PartialEq)]
    pub struct IncrementEvent / IncrementEventFilter {
        topics { pub by: Principal }
        values { pub current_value: u64 }
    }
}

crate::define_event! {
    /// Echo of the payload passed to `mirror`.
    #[derive(Debug, Clone, PartialEq)]
    pub struct MirrorEvent / MirrorEventFilter {
        topics {}
        values { pub data: Vec<u8> }
    }
}
