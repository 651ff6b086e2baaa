//! Remote playback provider client for syncstream
//!
//! This crate defines the interface between the engine and the remote
//! playback service, together with its implementations:
//! - `SpotifyClient`: HTTP client with token refresh and rate-limit backoff
//! - `MockProvider`: deterministic stand-in for local runs and tests

mod error;
mod mock;
mod retry;
mod spotify;
mod token;
mod traits;

pub use error::*;
pub use mock::*;
pub use retry::*;
pub use spotify::*;
pub use token::*;
pub use traits::*;
