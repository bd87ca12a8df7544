//! Session manager error.

use camlink_core::{ApiError, ConfigError, MediaError};

/// Stream session error.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
    #[error("Authorization failed: {0}")]
    Auth(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Negotiation failed: {0}")]
    Negotiation(#[source] MediaError),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Remote session error: {0}")]
    RemoteSession(String),
    #[error("Media error: {0}")]
    Media(#[source] MediaError),
    #[error("Session already started")]
    AlreadyStarted,
    #[error("Session stopped")]
    Stopped,
}

impl StreamError {
    /// Whether the local configuration is at fault.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Whether the remote service refused or failed the request.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Auth(_) | Self::NotFound(_) | Self::Transport(_) | Self::RemoteSession(_)
        )
    }
}

impl From<ApiError> for StreamError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Auth(msg) => Self::Auth(msg),
            ApiError::NotFound(msg) => Self::NotFound(msg),
            ApiError::Transport(msg) => Self::Transport(msg),
            ApiError::RemoteSession(msg) => Self::RemoteSession(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_errors() {
        let config = StreamError::from(ConfigError::Missing("device_id"));
        assert!(config.is_configuration());
        assert!(!config.is_remote());

        let remote = StreamError::from(ApiError::NotFound("device d1".into()));
        assert!(matches!(remote, StreamError::NotFound(_)));
        assert!(remote.is_remote());

        let negotiation = StreamError::Negotiation(MediaError::InvalidAnswer("x".into()));
        assert!(!negotiation.is_configuration());
        assert!(!negotiation.is_remote());
    }
}
