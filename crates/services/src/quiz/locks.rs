use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use quiz_core::model::SessionToken;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per session token.
///
/// Holding the guard covers a whole load, mutate and save cycle, so two
/// requests for the same token never interleave while requests for
/// different tokens run independently.
#[derive(Clone, Default)]
pub struct TokenLocks {
    slots: Arc<Mutex<HashMap<SessionToken, Arc<AsyncMutex<()>>>>>,
}

impl TokenLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `token`.
    pub async fn acquire(&self, token: &SessionToken) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            // Only the map holds an idle slot.
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(slots.entry(token.clone()).or_default())
        };
        slot.lock_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
