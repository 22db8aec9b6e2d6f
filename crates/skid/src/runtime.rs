use tokio::sync::broadcast;
use uuid::Uuid;

#[cfg(feature = "instrument")]
use tracing::instrument;

use crate::{
    DriftInfo, EntityIdCodec, HybridClock, IdConfig, Result, SourceKnownEntityId, SourceKnownId,
    SourceKnownIdGenerator, TimestampCache,
};

/// The identifier core wired up from one [`IdConfig`].
///
/// Owns a [`HybridClock`] with drift checks, a [`TimestampCache`] refreshing
/// from it, a [`SourceKnownIdGenerator`] keyed by entity type id, and an
/// [`EntityIdCodec`] using the default MAC key. Background tasks run on the
/// tokio runtime current at [`IdRuntime::start`] and stop on
/// [`IdRuntime::stop`] or when the runtime is dropped.
///
/// The host should poll [`IdRuntime::shutdown_requested`] and restart the
/// process once it turns `true`; IDs issued after a catastrophic clock drift
/// may collide with earlier ones.
pub struct IdRuntime {
    config: IdConfig,
    clock: HybridClock,
    cache: TimestampCache,
    generator: SourceKnownIdGenerator<u16, TimestampCache>,
    entities: EntityIdCodec,
}

impl IdRuntime {
    /// Validates `config` and starts the background clock maintenance.
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration (see [`IdConfig::validate`]) and
    /// with [`Error::RuntimeUnavailable`](crate::Error::RuntimeUnavailable)
    /// outside a tokio runtime.
    #[cfg_attr(feature = "instrument", instrument(level = "debug", skip(config)))]
    pub fn start(config: IdConfig) -> Result<Self> {
        config.validate()?;
        let entities = EntityIdCodec::from_config(&config)?;
        let clock = HybridClock::system(config.clock)?;
        let cache = TimestampCache::start(clock.clone(), config.cache_refresh)?;
        let generator = SourceKnownIdGenerator::new(
            cache.clone(),
            config.cache_refresh,
            config.application_id,
            config.application_instance_id,
            config.epoch,
        )?;

        tracing::info!(
            application_id = config.application_id,
            application_instance_id = config.application_instance_id,
            epoch_seconds = config.epoch.as_secs(),
            "id runtime started"
        );
        Ok(Self {
            config,
            clock,
            cache,
            generator,
            entities,
        })
    }

    /// Issues the next 64-bit ID for `entity_type_id`.
    ///
    /// # Errors
    ///
    /// Fails when the clock can no longer be encoded against the epoch.
    pub fn next_id(&self, entity_type_id: u16) -> Result<SourceKnownId> {
        self.generator.next_id(&entity_type_id)
    }

    /// Async version of [`Self::next_id`].
    ///
    /// # Errors
    ///
    /// See [`Self::next_id`].
    pub async fn next_id_async(&self, entity_type_id: u16) -> Result<SourceKnownId> {
        self.generator.next_id_async(&entity_type_id).await
    }

    /// Issues the next 64-bit ID for `entity_type_id` and wraps it in an
    /// Entity ID of that type.
    ///
    /// # Errors
    ///
    /// See [`Self::next_id`].
    pub fn next_entity_id(&self, entity_type_id: u16) -> Result<SourceKnownEntityId> {
        let id = self.next_id(entity_type_id)?;
        Ok(self.entities.generate(id, entity_type_id))
    }

    /// Decodes a 64-bit ID against the configured epoch.
    ///
    /// # Errors
    ///
    /// See [`SourceKnownId::parse`].
    pub fn parse(&self, id: i64) -> Result<SourceKnownId> {
        self.generator.parse(id)
    }

    /// See [`EntityIdCodec::parse`].
    pub fn parse_entity(&self, entity_id: Uuid) -> SourceKnownEntityId {
        self.entities.parse(entity_id)
    }

    /// See [`EntityIdCodec::parse_str`].
    pub fn parse_entity_str(&self, text: &str) -> Option<SourceKnownEntityId> {
        self.entities.parse_str(text)
    }

    /// `true` once the clock has seen a catastrophic drift. Never resets.
    pub fn shutdown_requested(&self) -> bool {
        self.clock.shutdown_requested()
    }

    pub fn subscribe_drift(&self) -> broadcast::Receiver<DriftInfo> {
        self.clock.subscribe()
    }

    pub fn config(&self) -> &IdConfig {
        &self.config
    }

    pub fn clock(&self) -> &HybridClock {
        &self.clock
    }

    pub fn cache(&self) -> &TimestampCache {
        &self.cache
    }

    pub fn generator(&self) -> &SourceKnownIdGenerator<u16, TimestampCache> {
        &self.generator
    }

    pub fn entities(&self) -> &EntityIdCodec {
        &self.entities
    }

    /// Stops the background tasks. IDs can still be issued, but the cached
    /// time no longer advances.
    pub fn stop(&self) {
        self.cache.stop();
        self.clock.stop();
        tracing::info!("id runtime stopped");
    }
}

impl core::fmt::Debug for IdRuntime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IdRuntime")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("generator", &self.generator)
            .finish_non_exhaustive()
    }
}
