//! Timestamp nonce store for replay attack prevention.
//!
//! Remembers every ts_nonce a principal used inside the validity window and
//! rejects repeats. Nonces may arrive out of order (concurrent requests from
//! one identity), so only exact reuse is rejected; anything older than the
//! window is already refused by the time check and is pruned here.

use std::collections::BTreeSet;

use dashmap::DashMap;

use crate::core_types::Principal;

/// Thread-safe timestamp nonce store.
pub struct TsStore {
    /// Principal -> nonces seen inside the window
    store: DashMap<Principal, BTreeSet<i64>>,
}

impl TsStore {
    /// Create a new empty TsStore.
    pub fn new() -> Self {
        Self {
            store: DashMap::new(),
        }
    }

    /// Record `ts_nonce` for `principal`.
    ///
    /// Returns `false` if the nonce was already used (replay).
    /// Nonces older than `floor` are forgotten.
    pub fn check_and_record(&self, principal: &Principal, ts_nonce: i64, floor: i64) -> bool {
        let mut seen = self.store.entry(*principal).or_default();

        if seen.contains(&ts_nonce) {
            return false;
        }

        seen.insert(ts_nonce);
        let keep = seen.split_off(&floor);
        *seen = keep;
        true
    }

    /// Number of remembered nonces for a principal.
    pub fn nonce_count(&self, principal: &Principal) -> usize {
        self.store.get(principal).map(|s| s.len()).unwrap_or(0)
    }

    /// Forget a principal entirely.
    pub fn remove(&self, principal: &Principal) {
        self.store.remove(principal);
    }

    /// Get the number of tracked principals.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl Default for TsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::Identity;
    use std::sync::Arc;
    use std::thread;

    fn principal() -> Principal {
        Identity::generate().principal()
    }

    #[test]
    fn test_new_principal() {
        let store = TsStore::new();
        let p = principal();
        assert!(store.check_and_record(&p, 1000, 0));
        assert_eq!(store.nonce_count(&p), 1);
    }

    #[test]
    fn test_out_of_order_nonces_accepted() {
        let store = TsStore::new();
        let p = principal();
        assert!(store.check_and_record(&p, 2000, 0));
        assert!(store.check_and_record(&p, 1000, 0));
        assert!(store.check_and_record(&p, 3000, 0));
    }

    #[test]
    fn test_reject_reused_nonce() {
        let store = TsStore::new();
        let p = principal();
        assert!(store.check_and_record(&p, 2000, 0));
        assert!(!store.check_and_record(&p, 2000, 0));
    }

    #[test]
    fn test_old_nonces_pruned() {
        let store = TsStore::new();
        let p = principal();
        for ts in 1..=10 {
            assert!(store.check_and_record(&p, ts, 0));
        }
        assert!(store.check_and_record(&p, 11, 8));
        assert_eq!(store.nonce_count(&p), 4, "8, 9, 10, 11 remain");
    }

    #[test]
    fn test_principals_are_independent() {
        let store = TsStore::new();
        let (a, b) = (principal(), principal());
        assert!(store.check_and_record(&a, 1000, 0));
        assert!(store.check_and_record(&b, 1000, 0));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_concurrent_access() {
        let store = Arc::new(TsStore::new());
        let p = principal();

        // Every thread races the same ten nonces; each nonce is accepted once
        let mut handles = vec![];
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                (1..=10).filter(|ts| store.check_and_record(&p, *ts, 0)).count()
            }));
        }

        let accepted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(accepted, 10);
    }

    #[test]
    fn test_remove() {
        let store = TsStore::new();
        let p = principal();
        assert!(store.check_and_record(&p, 1000, 0));
        assert_eq!(store.len(), 1);

        store.remove(&p);
        assert!(store.is_empty());
        assert_eq!(store.nonce_count(&p), 0);
    }
}
