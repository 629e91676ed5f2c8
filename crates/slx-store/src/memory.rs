//! # In-Memory Ledger Store
//!
//! `BTreeMap`-backed implementation of [`LedgerStore`] with full version
//! history. Used by tests and by the simulation harness; a production
//! deployment substitutes the real distributed substrate behind the same
//! trait.

use std::collections::BTreeMap;

use crate::{KeyVersion, LedgerStore, Space, TxStamp};

/// In-memory two-tier key-value store with version history.
#[derive(Debug, Default)]
pub struct MemStore {
    /// Current state per (space, key). `BTreeMap` keeps prefix scans in
    /// key order.
    state: BTreeMap<(Space, String), Vec<u8>>,
    /// Append-only history per (space, key), oldest first.
    history: BTreeMap<(Space, String), Vec<KeyVersion>>,
}

impl MemStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, space: &Space, key: &str, value: Option<Vec<u8>>, stamp: &TxStamp) {
        self.history
            .entry((space.clone(), key.to_string()))
            .or_default()
            .push(KeyVersion {
                tx_id: stamp.tx_id.clone(),
                timestamp: stamp.timestamp,
                value,
            });
    }
}

impl LedgerStore for MemStore {
    fn get(&self, space: &Space, key: &str) -> Option<Vec<u8>> {
        self.state.get(&(space.clone(), key.to_string())).cloned()
    }

    fn put(&mut self, space: &Space, key: &str, value: &[u8], stamp: &TxStamp) {
        self.state
            .insert((space.clone(), key.to_string()), value.to_vec());
        self.record(space, key, Some(value.to_vec()), stamp);
    }

    fn delete(&mut self, space: &Space, key: &str, stamp: &TxStamp) {
        if self
            .state
            .remove(&(space.clone(), key.to_string()))
            .is_some()
        {
            self.record(space, key, None, stamp);
        }
    }

    fn scan_prefix(&self, space: &Space, prefix: &str) -> Vec<(String, Vec<u8>)> {
        self.state
            .range((space.clone(), prefix.to_string())..)
            .take_while(|((s, k), _)| s == space && k.starts_with(prefix))
            .map(|((_, k), v)| (k.clone(), v.clone()))
            .collect()
    }

    fn history(&self, space: &Space, key: &str) -> Vec<KeyVersion> {
        self.history
            .get(&(space.clone(), key.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}
