//! Shared types for syncstream
//!
//! This crate defines the types passed between the provider client, the
//! core engine, and control clients:
//! - Playback model (tracks, audio features, playback state)
//! - Strategy configurations and decisions
//! - Engine status
//! - IPC commands, responses, and events

mod commands;
mod events;
mod playback;
mod strategy;
mod types;

pub use commands::*;
pub use events::*;
pub use playback::*;
pub use strategy::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
