//! Strategy catalog: persisted configs plus the active pointer

use std::sync::Arc;
use syncstream_api::StrategyConfig;
use syncstream_store::{AuditEvent, AuditEventType, Store, StoreError};
use syncstream_util::StrategyId;
use tracing::{debug, info, warn};

use crate::{CoreError, CoreResult};

/// Hash holding every config, keyed by strategy id
pub const CATALOG_KEY: &str = "strategies:catalog";

/// Scalar holding the active strategy id
pub const ACTIVE_STRATEGY_KEY: &str = "strategies:active_id";

/// Catalog of strategy configurations.
///
/// Configs are never deleted, only replaced whole by `upsert`. The active
/// pointer is validated when written but may go stale afterwards (an upsert
/// can disable the referenced config), so readers must tolerate that.
#[derive(Clone)]
pub struct StrategyCatalog {
    store: Arc<dyn Store>,
}

impl StrategyCatalog {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    fn decode(id: &str, raw: &str) -> CoreResult<StrategyConfig> {
        serde_json::from_str(raw).map_err(|e| {
            CoreError::Store(StoreError::Serialization(format!(
                "catalog entry '{}': {}",
                id, e
            )))
        })
    }

    /// All configs, or only enabled ones, in storage order.
    ///
    /// Entries that fail to decode are skipped.
    pub fn list(&self, only_active: bool) -> CoreResult<Vec<StrategyConfig>> {
        let entries = self.store.hgetall(CATALOG_KEY)?;
        let mut configs = Vec::with_capacity(entries.len());

        for (id, raw) in entries {
            match Self::decode(&id, &raw) {
                Ok(config) if only_active && !config.is_active => {}
                Ok(config) => configs.push(config),
                Err(e) => warn!(strategy = %id, error = %e, "Skipping corrupt catalog entry"),
            }
        }

        Ok(configs)
    }

    pub fn get(&self, id: &StrategyId) -> CoreResult<Option<StrategyConfig>> {
        match self.store.hget(CATALOG_KEY, id.as_str())? {
            Some(raw) => Self::decode(id.as_str(), &raw).map(Some),
            None => Ok(None),
        }
    }

    /// The raw active pointer, without resolving it
    pub fn active_id(&self) -> CoreResult<Option<StrategyId>> {
        Ok(self
            .store
            .get(ACTIVE_STRATEGY_KEY)?
            .filter(|id| !id.is_empty())
            .map(StrategyId::from))
    }

    /// Resolve the active pointer.
    ///
    /// Fails with `NotFound` when no pointer is set or it names a missing
    /// config. A config disabled after activation is still returned.
    pub fn get_active(&self) -> CoreResult<StrategyConfig> {
        let id = self
            .active_id()?
            .ok_or_else(|| CoreError::NotFound("no active strategy is set".into()))?;

        self.get(&id)?.ok_or_else(|| {
            CoreError::NotFound(format!("active strategy '{}' is not in the catalog", id))
        })
    }

    /// Point the engine at another config.
    ///
    /// The existence and enablement checks are not atomic with the write.
    pub fn set_active(&self, id: &StrategyId) -> CoreResult<()> {
        let config = self.get(id)?.ok_or_else(|| {
            CoreError::InvalidArgument(format!("Strategy id '{}' does not exist", id))
        })?;

        if !config.is_active {
            return Err(CoreError::InvalidArgument(format!(
                "Strategy id '{}' is disabled",
                id
            )));
        }

        self.store.set(ACTIVE_STRATEGY_KEY, id.as_str())?;
        self.audit(AuditEventType::ActiveStrategyChanged {
            strategy_id: id.clone(),
        });
        info!(strategy = %id, "Active strategy changed");
        Ok(())
    }

    /// Insert a config or replace the existing one with the same id
    pub fn upsert(&self, config: &StrategyConfig) -> CoreResult<()> {
        if config.id.as_str().trim().is_empty() {
            return Err(CoreError::InvalidArgument("strategy id cannot be empty".into()));
        }

        let raw = serde_json::to_string(config).map_err(StoreError::from)?;
        self.store.hset(CATALOG_KEY, config.id.as_str(), &raw)?;
        self.audit(AuditEventType::StrategyUpserted {
            strategy_id: config.id.clone(),
        });
        info!(strategy = %config.id, is_active = config.is_active, "Strategy upserted");
        Ok(())
    }

    /// Insert seed configs whose ids are not stored yet.
    ///
    /// Existing entries are left alone so user edits survive restarts.
    /// Returns how many were inserted.
    pub fn seed(&self, configs: &[StrategyConfig]) -> CoreResult<usize> {
        let mut inserted = 0;

        for config in configs {
            if self.store.hget(CATALOG_KEY, config.id.as_str())?.is_some() {
                debug!(strategy = %config.id, "Seed already present");
                continue;
            }
            let raw = serde_json::to_string(config).map_err(StoreError::from)?;
            self.store.hset(CATALOG_KEY, config.id.as_str(), &raw)?;
            inserted += 1;
        }

        if inserted > 0 {
            self.audit(AuditEventType::CatalogSeeded { inserted });
            info!(inserted, "Strategy catalog seeded");
        }

        Ok(inserted)
    }

    /// Set the pointer to `id` unless one is already stored.
    ///
    /// Returns whether the pointer was written.
    pub fn ensure_default_active(&self, id: &StrategyId) -> CoreResult<bool> {
        if let Some(current) = self.active_id()? {
            debug!(strategy = %current, "Active strategy already set");
            return Ok(false);
        }

        match self.set_active(id) {
            Ok(()) => Ok(true),
            Err(e) if e.is_configuration() => {
                warn!(strategy = %id, error = %e, "Default active strategy not applied");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.store.is_healthy()
    }

    fn audit(&self, event: AuditEventType) {
        if let Err(e) = self.store.append_audit(AuditEvent::new(event)) {
            warn!(error = %e, "Failed to write audit event");
        }
    }
}
