//! Event types for syncstream -> client streaming

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use syncstream_util::StrategyId;

use crate::{API_VERSION, EngineLifecycle, EvaluationRecord};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: syncstream_util::now(),
            payload,
        }
    }
}

/// All possible events from the service to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// An evaluation cycle finished (loop or manual)
    Evaluated(EvaluationRecord),

    /// Engine loop changed lifecycle state
    LifecycleChanged { lifecycle: EngineLifecycle },

    /// The active pointer moved
    StrategyActivated { id: StrategyId },

    /// A catalog entry was inserted or replaced
    StrategyUpserted { id: StrategyId },

    /// Service is shutting down
    Shutdown,
}
