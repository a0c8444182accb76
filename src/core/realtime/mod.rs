//! Model session client
//!
//! Owns the persistent streaming connection to the hosted conversational
//! speech model (OpenAI Realtime API over WebSocket). The client translates
//! session lifecycle, audio append, conversation-item and tool-result
//! messages to and from the wire protocol, and surfaces inbound events to
//! the session coordinator as a single serialized [`RealtimeEvent`] stream.

mod client;
mod config;
pub mod messages;

pub use client::{RealtimeClient, RealtimeError, RealtimeEvent, ToolCallRequest};
pub use config::{
    OPENAI_REALTIME_URL, RealtimeAudioFormat, RealtimeModel, RealtimeVoice,
};
