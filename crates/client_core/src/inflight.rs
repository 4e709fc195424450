use std::{
    collections::HashSet,
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::{error::StoreError, StoreAction};

type InflightKey = (StoreAction, String);

/// Tracks store actions that have a request outstanding, keyed by action and record.
#[derive(Default)]
pub(crate) struct InflightRequests {
    keys: Mutex<HashSet<InflightKey>>,
}

impl InflightRequests {
    pub(crate) fn begin(
        &self,
        action: StoreAction,
        key: String,
    ) -> Result<InflightGuard<'_>, StoreError> {
        let entry = (action, key);
        if !self.keys().insert(entry.clone()) {
            return Err(StoreError::DuplicateRequest {
                action,
                key: entry.1,
            });
        }
        Ok(InflightGuard {
            owner: self,
            entry: Some(entry),
        })
    }

    pub(crate) fn is_pending(&self, action: StoreAction, key: &str) -> bool {
        self.keys().contains(&(action, key.to_string()))
    }

    fn keys(&self) -> MutexGuard<'_, HashSet<InflightKey>> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases its key when dropped, including when the owning future is cancelled.
pub(crate) struct InflightGuard<'a> {
    owner: &'a InflightRequests,
    entry: Option<InflightKey>,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            self.owner.keys().remove(&entry);
        }
    }
}
