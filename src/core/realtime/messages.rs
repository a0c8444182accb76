//! Realtime API WebSocket message types.
//!
//! Client and server event types for the model session, JSON-encoded over
//! WebSocket and tagged on `"type"`.
//!
//! Client events used by this relay:
//! - session.update - Configure formats, voice, instructions, tools
//! - input_audio_buffer.append - Append caller audio
//! - conversation.item.create - Seed the greeting turn / relay tool results
//! - conversation.item.truncate - Cut an interrupted assistant utterance
//! - response.create - Ask the model to produce (or continue) a turn
//!
//! Server events acted on:
//! - session.created, response.audio.delta, response.done,
//!   input_audio_buffer.speech_started, error
//!
//! Everything else the server sends is diagnostic and only logged.

use base64::prelude::*;
use serde::{Deserialize, Serialize};

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration sent in `session.update`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Response modalities (text, audio)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,

    /// System instructions for the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Voice for audio output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// Input audio format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_format: Option<String>,

    /// Output audio format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<String>,

    /// Turn detection configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<TurnDetection>,

    /// Tool definitions advertised to the model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDef>>,

    /// Tool choice strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,

    /// Temperature for response generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Turn detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    /// Server-side VAD
    #[serde(rename = "server_vad")]
    ServerVad {
        /// Activation threshold
        #[serde(skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        /// Audio prefix padding in ms
        #[serde(skip_serializing_if = "Option::is_none")]
        prefix_padding_ms: Option<u32>,
        /// Silence duration in ms
        #[serde(skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
    },
}

/// Tool definition advertised in the session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    /// Tool type (always "function")
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function name
    pub name: String,
    /// Function description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Function parameters JSON schema
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

// =============================================================================
// Conversation Items
// =============================================================================

/// Conversation item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationItem {
    /// Item ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Item type (message, function_call, function_call_output)
    #[serde(rename = "type", default)]
    pub item_type: String,
    /// Item status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Item role (user, assistant, system)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Content parts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ContentPart>>,
    /// Call ID for function call items
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    /// Function name for function call items
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Function arguments for function call items
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    /// Function output for function call result items
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ConversationItem {
    /// A user text message item.
    pub fn user_text(text: &str) -> Self {
        Self {
            item_type: "message".to_string(),
            role: Some("user".to_string()),
            content: Some(vec![ContentPart {
                content_type: "input_text".to_string(),
                text: Some(text.to_string()),
            }]),
            ..Default::default()
        }
    }

    /// A function call output item correlated by `call_id`.
    pub fn function_output(call_id: &str, output: String) -> Self {
        Self {
            item_type: "function_call_output".to_string(),
            call_id: Some(call_id.to_string()),
            output: Some(output),
            ..Default::default()
        }
    }
}

/// Content part within a conversation item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPart {
    /// Content type (input_text, input_audio, text, audio)
    #[serde(rename = "type")]
    pub content_type: String,
    /// Text content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

// =============================================================================
// Client Events (sent to server)
// =============================================================================

/// Client events sent to the model session.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Update session configuration
    #[serde(rename = "session.update")]
    SessionUpdate {
        /// Session configuration
        session: SessionConfig,
    },

    /// Append audio to the input buffer (base64 payload, passed through
    /// opaque from the telephony side)
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64-encoded audio data
        audio: String,
    },

    /// Create a conversation item
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate {
        /// Item to create
        item: ConversationItem,
    },

    /// Truncate an assistant utterance at the heard playback offset
    #[serde(rename = "conversation.item.truncate")]
    ConversationItemTruncate {
        /// Item ID
        item_id: String,
        /// Content index
        content_index: u32,
        /// Milliseconds of audio the caller actually heard
        audio_end_ms: u64,
    },

    /// Create (or continue) a response
    #[serde(rename = "response.create")]
    ResponseCreate,
}

impl ClientEvent {
    /// Create an audio append event from raw bytes.
    pub fn audio_append(data: &[u8]) -> Self {
        ClientEvent::InputAudioBufferAppend {
            audio: BASE64_STANDARD.encode(data),
        }
    }
}

// =============================================================================
// Server Events (received from server)
// =============================================================================

/// Server events received from the model session.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Error occurred
    #[serde(rename = "error")]
    Error {
        /// Error details
        error: ApiError,
    },

    /// Session created
    #[serde(rename = "session.created")]
    SessionCreated {
        /// Session information
        session: Session,
    },

    /// Session configuration updated
    #[serde(rename = "session.updated")]
    SessionUpdated {},

    /// Caller speech detected (VAD)
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        /// Audio start timestamp in ms
        #[serde(default)]
        audio_start_ms: u64,
        /// Item the speech will be attached to
        #[serde(default)]
        item_id: Option<String>,
    },

    /// Caller speech ended (VAD)
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {
        #[serde(default)]
        audio_end_ms: u64,
    },

    /// Audio delta (assistant audio chunk, base64)
    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        /// Item ID
        item_id: String,
        /// Base64-encoded audio delta
        delta: String,
    },

    /// Assistant audio transcript delta (diagnostic)
    #[serde(rename = "response.audio_transcript.delta")]
    AudioTranscriptDelta {
        #[serde(default)]
        delta: String,
    },

    /// Assistant audio transcript complete (diagnostic)
    #[serde(rename = "response.audio_transcript.done")]
    AudioTranscriptDone {
        #[serde(default)]
        transcript: String,
    },

    /// Response generation started
    #[serde(rename = "response.created")]
    ResponseCreated {},

    /// Response complete; output may contain function calls
    #[serde(rename = "response.done")]
    ResponseDone {
        /// Response information
        response: Response,
    },

    /// Assistant utterance truncated (acknowledgment)
    #[serde(rename = "conversation.item.truncated")]
    ConversationItemTruncated {
        /// Item ID
        item_id: String,
        /// Milliseconds kept
        audio_end_ms: u64,
    },

    /// Rate limits updated (diagnostic)
    #[serde(rename = "rate_limits.updated")]
    RateLimitsUpdated {
        /// Rate limit information
        #[serde(default)]
        rate_limits: Vec<RateLimit>,
    },
}

impl ServerEvent {
    /// Decode base64 audio from an AudioDelta event.
    pub fn decode_audio_delta(delta: &str) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64_STANDARD.decode(delta)
    }
}

// =============================================================================
// Supporting Types
// =============================================================================

/// API error information.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    /// Error type
    #[serde(rename = "type", default)]
    pub error_type: String,
    /// Error code
    #[serde(default)]
    pub code: Option<String>,
    /// Error message
    #[serde(default)]
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_type, self.message)
    }
}

/// Session information.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    /// Session ID
    pub id: String,
    /// Model in use
    #[serde(default)]
    pub model: String,
}

/// Response information.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// Response ID
    #[serde(default)]
    pub id: String,
    /// Response status (completed, cancelled, failed)
    #[serde(default)]
    pub status: String,
    /// Output items
    #[serde(default)]
    pub output: Vec<ConversationItem>,
}

/// Rate limit information.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimit {
    /// Rate limit name
    pub name: String,
    /// Limit value
    #[serde(default)]
    pub limit: u64,
    /// Remaining value
    #[serde(default)]
    pub remaining: u64,
}

// =============================================================================
// Tests
// =============================================================================
