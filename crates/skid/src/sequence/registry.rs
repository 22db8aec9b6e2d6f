use core::{hash::Hash, time::Duration};
use std::sync::Arc;

use dashmap::DashMap;

use crate::{IdGenStatus, Result, SequenceManager, TimeScopedId, TimeSource};

/// Per-entity-type [`SequenceManager`]s, created on first use.
///
/// The key is whatever the caller uses to tell entity types apart, typically
/// the `u16` entity type id or a name. Managers of different keys share
/// nothing but the time source, so generation for distinct entity types never
/// contends.
pub struct SequenceRegistry<K, T> {
    managers: DashMap<K, Arc<SequenceManager<T>>>,
    time: T,
    backoff: Duration,
}

impl<K, T> SequenceRegistry<K, T>
where
    K: Eq + Hash + Clone,
    T: TimeSource + Clone,
{
    pub fn new(time: T, backoff: Duration) -> Self {
        Self {
            managers: DashMap::new(),
            time,
            backoff,
        }
    }

    /// The manager for `key`, creating it if needed.
    pub fn manager(&self, key: &K) -> Arc<SequenceManager<T>> {
        if let Some(manager) = self.managers.get(key) {
            return Arc::clone(manager.value());
        }
        let entry = self
            .managers
            .entry(key.clone())
            .or_insert_with(|| Arc::new(SequenceManager::new(self.time.clone(), self.backoff)));
        Arc::clone(entry.value())
    }

    /// See [`SequenceManager::try_time_scoped_id`].
    ///
    /// # Errors
    ///
    /// Fails when the time source is outside the representable range.
    pub fn try_time_scoped_id(&self, key: &K) -> Result<IdGenStatus<TimeScopedId>> {
        self.manager(key).try_time_scoped_id()
    }

    /// See [`SequenceManager::get_time_scoped_id`].
    ///
    /// # Errors
    ///
    /// Fails when the time source is outside the representable range.
    pub fn get_time_scoped_id(&self, key: &K) -> Result<TimeScopedId> {
        self.manager(key).get_time_scoped_id()
    }

    /// See [`SequenceManager::time_scoped_id_async`].
    ///
    /// # Errors
    ///
    /// Fails when the time source is outside the representable range.
    pub async fn time_scoped_id_async(&self, key: &K) -> Result<TimeScopedId> {
        let manager = self.manager(key);
        manager.time_scoped_id_async().await
    }

    /// Number of entity types seen so far.
    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }

    pub fn time(&self) -> &T {
        &self.time
    }
}

impl<K, T> core::fmt::Debug for SequenceRegistry<K, T>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SequenceRegistry")
            .field("entity_types", &self.managers.len())
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}
