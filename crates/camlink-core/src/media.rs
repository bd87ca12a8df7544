//! Media descriptors negotiated with the remote camera.

use serde::{Deserialize, Serialize};

/// Kind of a negotiated media section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
    /// Data/control channel. Carries no media but the remote service
    /// rejects offers without it.
    App,
}

/// Direction of a media section, from the local point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Recvonly,
    Sendonly,
    Sendrecv,
}

/// Codec offered or accepted for a media section.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Codec {
    /// Encoding name, e.g. `H264` or `opus`.
    pub name: String,
    pub clock_rate: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub channels: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fmtp_line: Option<String>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(n: &u16) -> bool {
    *n == 0
}

impl Codec {
    #[must_use]
    pub fn new(name: impl Into<String>, clock_rate: u32) -> Self {
        Self {
            name: name.into(),
            clock_rate,
            channels: 0,
            fmtp_line: None,
        }
    }

    #[must_use]
    pub const fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    /// Whether two codecs describe the same encoding. Names compare
    /// case-insensitively; fmtp parameters are ignored.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
            && self.clock_rate == other.clock_rate
            && (self.channels == 0 || other.channels == 0 || self.channels == other.channels)
    }
}

/// A media section of the session description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub kind: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub codecs: Vec<Codec>,
}

impl Media {
    /// Media section with no codecs yet.
    #[must_use]
    pub const fn new(kind: MediaKind, direction: Option<Direction>) -> Self {
        Self {
            kind,
            direction,
            codecs: Vec::new(),
        }
    }

    /// First codec in this section matching `codec`.
    #[must_use]
    pub fn find_codec(&self, codec: &Codec) -> Option<&Codec> {
        self.codecs.iter().find(|c| c.matches(codec))
    }
}

/// Media sections requested from the camera: receive-only audio and
/// video plus the mandatory application channel.
#[must_use]
pub fn default_medias() -> Vec<Media> {
    vec![
        Media::new(MediaKind::Audio, Some(Direction::Recvonly)),
        Media::new(MediaKind::Video, Some(Direction::Recvonly)),
        Media::new(MediaKind::App, None),
    ]
}
