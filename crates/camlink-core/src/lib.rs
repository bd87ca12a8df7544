//! Core abstractions for renewable live-stream sessions.
//!
//! This crate provides the building blocks shared by the session manager:
//! - `SessionApi` / `ApiConnector` - Remote control plane (offer exchange, extension)
//! - `MediaConnection` / `MediaEngine` - Underlying real-time media connection
//! - `StreamConfig` - Validated connection configuration
//! - `EventLog` - Broadcast + history sink for renewal events
//! - `Clock` - Wall-clock source used to schedule renewals

pub mod clock;
pub mod config;
pub mod events;
pub mod media;
pub mod session;
pub mod traits;

#[cfg(feature = "test-util")]
pub mod testing;

pub use clock::{Clock, SystemClock, TokioClock};
pub use config::{ConfigError, Credentials, StreamConfig};
pub use events::{EventLog, NoopSink, RenewalEvent, RenewalSink};
pub use media::{Codec, Direction, Media, MediaKind, default_medias};
pub use session::{OfferAnswer, Session, SessionGrant};
pub use traits::{ApiConnector, ApiError, MediaConnection, MediaEngine, MediaError, SessionApi};
