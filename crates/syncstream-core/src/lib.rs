//! Core of syncstream
//!
//! This crate contains:
//! - The strategy set (Focus, EnergyFloor, VibeShift) behind one trait
//! - The strategy factory mapping stored configs to executable strategies
//! - The strategy catalog (persisted configs and the active pointer)
//! - The playback engine loop (Idle -> Running -> Stopping -> Stopped)

mod catalog;
mod engine;
mod events;
mod factory;
mod strategies;

pub use catalog::*;
pub use engine::*;
pub use events::*;
pub use factory::*;
pub use strategies::*;

use syncstream_provider::ProviderError;
use syncstream_store::StoreError;
use thiserror::Error;

/// Core errors
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl CoreError {
    /// Missing or unusable strategy configuration; a cycle hitting this
    /// no-ops instead of failing
    pub fn is_configuration(&self) -> bool {
        matches!(self, CoreError::NotFound(_) | CoreError::InvalidArgument(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
