//! Audit event types

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use syncstream_util::StrategyId;

/// Types of audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Service started
    ServiceStarted,

    /// Service stopped
    ServiceStopped,

    /// Catalog seeded at startup
    CatalogSeeded { inserted: usize },

    /// Strategy inserted or replaced
    StrategyUpserted { strategy_id: StrategyId },

    /// Active pointer changed
    ActiveStrategyChanged { strategy_id: StrategyId },

    /// Provider access token replaced
    TokenRefreshed,

    /// A track was skipped by policy
    TrackSkipped {
        track_id: String,
        track_name: String,
        strategy_id: StrategyId,
    },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: syncstream_util::now(),
            event,
        }
    }
}
