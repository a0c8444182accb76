//! Telephony media-stream message types.
//!
//! JSON messages tagged on `"event"`, matching the Twilio Media Streams
//! wire format. Inbound events are processed strictly in arrival order;
//! any event type this relay does not recognize deserializes to
//! [`TelephonyInbound::Unknown`] and is logged and ignored, never fatal.

use serde::{Deserialize, Deserializer, Serialize};

/// Inbound events from the telephony provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelephonyInbound {
    /// WebSocket handshake acknowledgment, sent before `start`.
    Connected,

    /// New stream epoch: carries the stream identifier for the call.
    Start {
        start: StartMeta,
    },

    /// One inbound audio frame with its playback timestamp.
    Media {
        media: MediaMeta,
    },

    /// Acknowledgment that one previously sent outbound playback unit
    /// has finished playing.
    Mark {
        mark: MarkMeta,
    },

    /// The telephony side is terminating the stream.
    Stop,

    /// Any event type not in this relay's vocabulary.
    #[serde(other)]
    Unknown,
}

/// Metadata carried by a `start` event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartMeta {
    /// Opaque session identifier, immutable for the call's lifetime.
    pub stream_sid: String,
    /// Originating call identifier, logged for correlation.
    #[serde(default)]
    pub call_sid: Option<String>,
}

/// Metadata carried by a `media` event.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaMeta {
    /// Milliseconds of media elapsed on the stream. The wire encodes this
    /// as a decimal string.
    #[serde(deserialize_with = "millis_from_string")]
    pub timestamp: u64,
    /// Opaque base64 audio payload.
    pub payload: String,
}

/// Metadata carried by a `mark` acknowledgment.
#[derive(Debug, Clone, Deserialize)]
pub struct MarkMeta {
    pub name: String,
}

/// Outbound events to the telephony provider.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelephonyOutbound {
    /// One outbound audio frame for playback.
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: OutboundMedia,
    },

    /// Playback checkpoint; the provider echoes it back as a `mark`
    /// acknowledgment once the preceding audio has played out.
    Mark {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        mark: OutboundMark,
    },

    /// Discard all buffered, not-yet-played outbound audio immediately.
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundMedia {
    /// Opaque base64 audio payload.
    pub payload: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundMark {
    pub name: String,
}

impl TelephonyOutbound {
    pub fn media(stream_sid: &str, payload: String) -> Self {
        Self::Media {
            stream_sid: stream_sid.to_string(),
            media: OutboundMedia { payload },
        }
    }

    pub fn mark(stream_sid: &str, name: &str) -> Self {
        Self::Mark {
            stream_sid: stream_sid.to_string(),
            mark: OutboundMark { name: name.to_string() },
        }
    }

    pub fn clear(stream_sid: &str) -> Self {
        Self::Clear { stream_sid: stream_sid.to_string() }
    }
}

/// The wire carries timestamps as strings ("1450"); accept a bare number too.
fn millis_from_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(u64),
    }

    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Number(n) => Ok(n),
        StringOrNumber::String(s) => s.parse().map_err(serde::de::Error::custom),
    }
}
