//! Stream session handshake and renewal orchestration.
//!
//! Provides:
//! - `StreamSession` - Negotiate a stream and keep it alive
//! - `RenewalSchedule` - When to extend a session ahead of expiry
//! - `RenewalState` - Observable state of the renewal loop

pub mod error;
pub mod manager;
pub mod renewal;
pub mod schedule;

pub use error::StreamError;
pub use manager::{SessionOptions, StreamSession};
pub use renewal::RenewalState;
pub use schedule::{DEFAULT_SAFETY_MARGIN, RenewalSchedule};
