//! Stream connection configuration.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    Missing(&'static str),
    #[error("Malformed field {field}: {reason}")]
    Malformed {
        field: &'static str,
        reason: &'static str,
    },
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Everything needed to open a stream session.
///
/// `client_id` and `client_secret` authorize the session API client,
/// `refresh_token` lets it mint access tokens, `project_id` scopes the
/// request and `device_id` names the camera being streamed.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub project_id: String,
    pub device_id: String,
}

impl StreamConfig {
    /// Parse a configuration from URL query parameters.
    ///
    /// Accepts URLs like
    /// `nest:?client_id=..&client_secret=..&refresh_token=..&project_id=..&device_id=..`.
    /// Unknown parameters are ignored. The result is validated.
    ///
    /// # Errors
    /// Returns error if the URL does not parse or a field is missing or malformed.
    pub fn from_url(raw: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(raw)?;
        let mut config = Self::default();

        for (key, value) in url.query_pairs() {
            let slot = match &*key {
                "client_id" => &mut config.client_id,
                "client_secret" => &mut config.client_secret,
                "refresh_token" => &mut config.refresh_token,
                "project_id" => &mut config.project_id,
                "device_id" => &mut config.device_id,
                _ => continue,
            };
            *slot = value.into_owned();
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that every required field is present and well formed.
    ///
    /// # Errors
    /// Returns the first missing or malformed field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require("client_id", &self.client_id)?;
        require("client_secret", &self.client_secret)?;
        require("refresh_token", &self.refresh_token)?;
        identifier("project_id", &self.project_id)?;
        identifier("device_id", &self.device_id)?;
        Ok(())
    }

    /// Credentials for the session API client.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

impl fmt::Debug for StreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("project_id", &self.project_id)
            .field("device_id", &self.device_id)
            .finish()
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing(field));
    }
    Ok(())
}

// Identifiers are spliced into resource paths on the remote side.
fn identifier(field: &'static str, value: &str) -> Result<(), ConfigError> {
    require(field, value)?;
    if value.chars().any(char::is_whitespace) {
        return Err(ConfigError::Malformed {
            field,
            reason: "contains whitespace",
        });
    }
    if value.contains('/') {
        return Err(ConfigError::Malformed {
            field,
            reason: "contains '/'",
        });
    }
    Ok(())
}

/// Credentials handed to an [`ApiConnector`](crate::ApiConnector).
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> StreamConfig {
        StreamConfig {
            client_id: "client".into(),
            client_secret: "secret".into(),
            refresh_token: "refresh".into(),
            project_id: "p1".into(),
            device_id: "d1".into(),
        }
    }

    #[test]
    fn accepts_complete_config() {
        assert_eq!(valid().validate(), Ok(()));
    }

    #[test]
    fn reports_each_missing_field() {
        let cases: [(&str, fn(&mut StreamConfig)); 5] = [
            ("client_id", |c| c.client_id.clear()),
            ("client_secret", |c| c.client_secret.clear()),
            ("refresh_token", |c| c.refresh_token = "  ".into()),
            ("project_id", |c| c.project_id.clear()),
            ("device_id", |c| c.device_id.clear()),
        ];

        for (field, blank) in cases {
            let mut config = valid();
            blank(&mut config);
            assert_eq!(config.validate(), Err(ConfigError::Missing(field)));
        }
    }

    #[test]
    fn rejects_malformed_identifiers() {
        let mut config = valid();
        config.device_id = "d1/../d2".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Malformed {
                field: "device_id",
                ..
            })
        ));

        let mut config = valid();
        config.project_id = "p 1".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Malformed {
                field: "project_id",
                ..
            })
        ));
    }

    #[test]
    fn parses_query_parameters() {
        let config = StreamConfig::from_url(
            "nest:?client_id=client&client_secret=secret&refresh_token=refresh&project_id=p1&device_id=d1&extra=1",
        )
        .unwrap();
        assert_eq!(config, valid());
    }

    #[test]
    fn from_url_requires_all_parameters() {
        let err = StreamConfig::from_url("nest:?client_id=client&client_secret=secret")
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing("refresh_token"));
    }

    #[test]
    fn from_url_rejects_garbage() {
        assert!(matches!(
            StreamConfig::from_url("not a url"),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn deserializes_with_missing_fields_as_blank() {
        let config: StreamConfig =
            serde_json::from_str(r#"{"client_id":"client","project_id":"p1"}"#).unwrap();
        assert_eq!(config.validate(), Err(ConfigError::Missing("client_secret")));
    }

    #[test]
    fn debug_redacts_secrets() {
        let rendered = format!("{:?} {:?}", valid(), valid().credentials());
        assert!(!rendered.contains("secret\""));
        assert!(!rendered.contains("refresh\""));
        assert!(rendered.contains("<redacted>"));
    }
}
