//! Shared utilities for syncstream
//!
//! This crate provides:
//! - ID types (StrategyId, ClientId)
//! - Wall-clock time helper
//! - Default paths for config, socket, and data directories

mod ids;
mod paths;
mod time;

pub use ids::*;
pub use paths::*;
pub use time::*;
