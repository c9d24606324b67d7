//! Process-scoped secret cache with per-name single-flight coalescing.
//!
//! Concurrent cold-start requests for the same secret share one fetch
//! instead of stampeding the store. A failed resolution is never memoized,
//! so a transient store outage self-heals on the next request.

use crate::secrets::{SecretError, SecretStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

type Slot = Arc<tokio::sync::Mutex<Option<String>>>;

pub struct SecretCache {
    store: Arc<dyn SecretStore>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl SecretCache {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self {
            store,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, name: &str) -> Slot {
        let mut slots = self
            .slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        slots
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(None)))
            .clone()
    }

    /// Resolve a secret, fetching from the store at most once per name while
    /// the cached value is warm. Concurrent callers for a cold name wait on
    /// the in-flight fetch rather than issuing their own.
    pub async fn get(&self, name: &str) -> Result<String, SecretError> {
        let slot = self.slot(name);
        let mut guard = slot.lock().await;
        if let Some(value) = guard.as_ref() {
            return Ok(value.clone());
        }
        debug!(secret = %name, "resolving secret from store");
        match self.store.get_secret(name).await {
            Ok(value) => {
                *guard = Some(value.clone());
                Ok(value)
            }
            Err(e) => {
                // Leave the slot empty: the next call retries resolution.
                warn!(secret = %name, error = %e, "secret resolution failed");
                Err(e)
            }
        }
    }

    /// Drop the cached value for a name so the next `get` refetches.
    pub fn invalidate(&self, name: &str) {
        let mut slots = self
            .slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        slots.remove(name);
    }
}
