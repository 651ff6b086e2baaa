//! Engine status and service-level types

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use syncstream_util::StrategyId;

use crate::TrackSummary;

/// Lifecycle of the playback engine loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineLifecycle {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// What one evaluation cycle concluded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EvaluationOutcome {
    /// No playback, no current track, or paused
    NothingPlaying,

    /// No usable active strategy (unset, dangling, disabled, or unknown id)
    NoActiveStrategy { reason: String },

    /// Features could not be obtained for the current track
    MissingFeatures { track: TrackSummary },

    Kept {
        track: TrackSummary,
        strategy_id: StrategyId,
    },

    Skipped {
        track: TrackSummary,
        strategy_id: StrategyId,
        /// Whether the provider acknowledged the skip command
        acknowledged: bool,
    },

    /// The cycle raised an error that was caught at the loop boundary
    Failed { error: String },
}

impl EvaluationOutcome {
    pub fn track(&self) -> Option<&TrackSummary> {
        match self {
            Self::MissingFeatures { track }
            | Self::Kept { track, .. }
            | Self::Skipped { track, .. } => Some(track),
            _ => None,
        }
    }
}

/// Timestamped evaluation outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub at: DateTime<Local>,
    pub outcome: EvaluationOutcome,
}

/// Snapshot of the engine for status queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub active_strategy_id: Option<StrategyId>,
    pub is_running: bool,
    pub lifecycle: EngineLifecycle,
    pub last_evaluation: Option<EvaluationRecord>,
    pub current_track: Option<TrackSummary>,
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub live: bool,
    pub store_ok: bool,
    pub engine: EngineLifecycle,
    pub provider: String,
}

/// Role of a control client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    /// Same user as the service (or root): may change the catalog
    Admin,
    /// Read-only access
    Observer,
}

impl ClientRole {
    pub fn can_mutate(&self) -> bool {
        matches!(self, ClientRole::Admin)
    }
}
