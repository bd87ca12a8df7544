//! Live session state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session identifier and expiry issued by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionGrant {
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionGrant {
    #[must_use]
    pub fn new(session_id: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            expires_at,
        }
    }
}

/// Result of exchanging a local offer with the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferAnswer {
    /// Remote answer description.
    pub answer: String,
    #[serde(flatten)]
    pub grant: SessionGrant,
}

impl OfferAnswer {
    #[must_use]
    pub fn new(answer: impl Into<String>, grant: SessionGrant) -> Self {
        Self {
            answer: answer.into(),
            grant,
        }
    }
}

/// The live streaming session held by a session manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Project the device belongs to.
    pub scope: String,
    /// Device being streamed.
    pub target: String,
    /// Current remote session identifier. Replaced on every renewal.
    pub session_id: String,
    /// When the remote service tears the stream down unless renewed.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    #[must_use]
    pub fn new(scope: impl Into<String>, target: impl Into<String>, grant: SessionGrant) -> Self {
        Self {
            scope: scope.into(),
            target: target.into(),
            session_id: grant.session_id,
            expires_at: grant.expires_at,
        }
    }

    /// Replace the identifier and expiry with a renewed grant.
    pub fn apply(&mut self, grant: SessionGrant) {
        self.session_id = grant.session_id;
        self.expires_at = grant.expires_at;
    }
}
