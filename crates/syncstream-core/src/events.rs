//! Core events emitted by the engine

use syncstream_api::{EngineLifecycle, EvaluationRecord};

/// Events emitted by the playback engine
#[derive(Debug, Clone)]
pub enum CoreEvent {
    /// An evaluation cycle finished, from the loop or a manual trigger
    Evaluated(EvaluationRecord),

    /// The loop moved to a new lifecycle state
    LifecycleChanged(EngineLifecycle),
}
