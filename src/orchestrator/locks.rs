//! Per-(user, scenario) mutual exclusion
//!
//! Launch and teardown for the same pair are serialized; different pairs
//! never contend. Holding a guard does not hold any database connection.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type PairKey = (String, i64);

#[derive(Default)]
pub(crate) struct PairLocks {
    slots: Mutex<HashMap<PairKey, Arc<Mutex<()>>>>,
}

/// Held for the whole critical section; released on drop
pub(crate) struct PairGuard {
    _guard: OwnedMutexGuard<()>,
}

impl PairLocks {
    pub(crate) async fn acquire(&self, user_id: &str, scenario_id: i64) -> PairGuard {
        let slot = {
            let mut slots = self.slots.lock().await;
            // A slot referenced only by the map has no holder and no waiter
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            slots
                .entry((user_id.to_string(), scenario_id))
                .or_default()
                .clone()
        };
        PairGuard {
            _guard: slot.lock_owned().await,
        }
    }

    #[cfg(test)]
    async fn slot_count(&self) -> usize {
        self.slots.lock().await.len()
    }
}
