//! Traits for the remote session API and the media connection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Codec, Credentials, Media, OfferAnswer, SessionGrant};

/// Session API error.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ApiError {
    /// Credentials were rejected.
    #[error("Authorization failed: {0}")]
    Auth(String),
    /// Unknown project or device.
    #[error("Not found: {0}")]
    NotFound(String),
    /// The remote service could not be reached or answered garbage.
    #[error("Transport error: {0}")]
    Transport(String),
    /// The remote service reports the session as invalid or expired.
    #[error("Remote session error: {0}")]
    RemoteSession(String),
}

/// Remote control plane for stream sessions.
#[async_trait]
pub trait SessionApi: Send + Sync + 'static {
    /// Exchange a complete local offer for an answer and a new session.
    async fn exchange_offer(
        &self,
        scope: &str,
        target: &str,
        offer: &str,
    ) -> Result<OfferAnswer, ApiError>;

    /// Extend an existing session, returning its replacement identifier
    /// and expiry.
    async fn extend_session(
        &self,
        scope: &str,
        target: &str,
        session_id: &str,
    ) -> Result<SessionGrant, ApiError>;
}

/// Builds a [`SessionApi`] client from credentials.
#[async_trait]
pub trait ApiConnector: Send + Sync {
    type Api: SessionApi;

    /// Initialize a client.
    async fn connect(&self, credentials: &Credentials) -> Result<Self::Api, ApiError>;
}

/// Media connection error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("Local transport setup failed: {0}")]
    Transport(String),
    #[error("Invalid answer: {0}")]
    InvalidAnswer(String),
    #[error("Track not found: {0}")]
    TrackNotFound(String),
    #[error("Media error: {0}")]
    Internal(String),
}

/// Real-time connection carrying the negotiated audio, video and app
/// channels.
#[async_trait]
pub trait MediaConnection: Send + Sync {
    /// Handle to an individual track.
    type Track: Send + Sync;

    /// Build an offer for `medias` with all local candidates gathered.
    async fn create_complete_offer(&self, medias: &[Media]) -> Result<String, MediaError>;

    /// Apply the remote answer.
    async fn set_answer(&self, answer: &str) -> Result<(), MediaError>;

    /// Begin media flow.
    async fn start(&self) -> Result<(), MediaError>;

    /// Stop media flow and release transport resources.
    async fn stop(&self) -> Result<(), MediaError>;

    /// Negotiated media sections.
    fn medias(&self) -> Vec<Media>;

    /// Obtain the track for a media section and codec.
    fn get_track(&self, media: &Media, codec: &Codec) -> Result<Self::Track, MediaError>;

    /// Attach a track to a media section and codec.
    fn add_track(&self, media: &Media, codec: &Codec, track: Self::Track)
    -> Result<(), MediaError>;

    /// Diagnostic view of the connection state.
    fn snapshot(&self) -> serde_json::Value;
}

/// Creates fresh [`MediaConnection`]s.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    type Connection: MediaConnection;

    /// Create an unconnected media connection.
    async fn new_connection(&self) -> Result<Self::Connection, MediaError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_serializes_kind_and_message() {
        let json = serde_json::to_value(ApiError::Transport("reset".into())).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "kind": "transport", "message": "reset" })
        );
    }
}
