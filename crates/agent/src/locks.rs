//! Per-session exclusivity shared by the session services.
//!
//! Every read-modify-persist cycle on a session holds that session's guard, so
//! state updates, interaction counts and history appends are linearizable per
//! session id while different sessions proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use alexandra_core::SessionId;

pub type SessionGuard = OwnedMutexGuard<()>;

struct Slot {
    lock: Arc<AsyncMutex<()>>,
    last_used: Instant,
}

#[derive(Default)]
pub struct SessionLocks {
    slots: Mutex<HashMap<String, Slot>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, session_id: &SessionId) -> SessionGuard {
        let lock = {
            let mut slots = self.slots();
            let slot = slots.entry(session_id.as_str().to_owned()).or_insert_with(|| Slot {
                lock: Arc::new(AsyncMutex::new(())),
                last_used: Instant::now(),
            });
            slot.last_used = Instant::now();
            Arc::clone(&slot.lock)
        };

        lock.lock_owned().await
    }

    /// Drops slots idle for at least `idle`. Slots that are held or awaited are kept.
    pub fn evict_idle(&self, idle: Duration) -> usize {
        let mut slots = self.slots();
        let before = slots.len();
        slots.retain(|_, slot| Arc::strong_count(&slot.lock) > 1 || slot.last_used.elapsed() < idle);
        before - slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
