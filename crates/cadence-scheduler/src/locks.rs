//! Per-entity locks: one async mutex per (kind, id).
//!
//! Schedule and cancel for the same entity run one at a time; different
//! entities never wait on each other. Idle entries are pruned on the next
//! acquire, so the table only holds entities with work in flight.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::request::EntityKey;

#[derive(Default)]
pub struct EntityLocks {
    table: Mutex<HashMap<EntityKey, Arc<Mutex<()>>>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`. Released when the guard drops.
    pub async fn acquire(&self, key: &EntityKey) -> OwnedMutexGuard<()> {
        let slot = {
            let mut table = self.table.lock().await;
            // Nobody holds or waits on a slot whose only owner is the table.
            table.retain(|k, slot| k == key || Arc::strong_count(slot) > 1);
            Arc::clone(table.entry(key.clone()).or_default())
        };
        slot.lock_owned().await
    }

    /// Number of entities currently tracked.
    pub async fn len(&self) -> usize {
        self.table.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
