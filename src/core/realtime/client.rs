//! Realtime model session client.
//!
//! Opens the WebSocket to the model, performs session initialization
//! (audio formats, instructions, voice, advertised tools), then pumps
//! events in both directions. Inbound server events are mapped to a single
//! [`RealtimeEvent`] stream consumed by the session coordinator; outbound
//! operations go through an internal command channel so callers never touch
//! the socket directly.
//!
//! The client makes no reconnection attempts: a dropped model connection
//! surfaces as [`RealtimeEvent::Closed`] and ends the paired call.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};

use super::config::{OPENAI_REALTIME_URL, RealtimeAudioFormat};
use super::messages::{
    ApiError, ClientEvent, ConversationItem, ServerEvent, SessionConfig, ToolDef, TurnDetection,
};
use crate::config::{DEFAULT_GREETING, RelayConfig};

/// Channel capacity for WebSocket message sending.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Channel capacity for events surfaced to the coordinator.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Errors from the model session client.
#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("not connected")]
    NotConnected,
}

/// A completed tool invocation request extracted from a `response.done`.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    /// Opaque correlation token
    pub call_id: String,
    /// Capability name
    pub name: String,
    /// Raw JSON argument payload; the dispatcher parses it
    pub arguments: String,
}

/// Events surfaced to the session coordinator.
///
/// Exactly one consumer per session; delivery order matches wire arrival
/// order, which is what makes the coordinator's state mutation serial.
#[derive(Debug)]
pub enum RealtimeEvent {
    /// One assistant audio fragment (base64, passed through opaque).
    Audio {
        /// Assistant conversation item the fragment belongs to
        item_id: String,
        /// Base64 audio payload
        payload: String,
    },

    /// The caller started talking over the assistant.
    SpeechStarted,

    /// The model finished a turn; any completed function calls ride along.
    ResponseDone {
        /// Response status as reported by the model
        status: String,
        /// Tool invocations requested by this turn
        tool_calls: Vec<ToolCallRequest>,
    },

    /// The model reported an error. Not fatal by itself; the session ends
    /// only if the underlying connection closes too.
    ServerError(ApiError),

    /// The connection to the model ended.
    Closed,
}

/// Handle to one model session.
///
/// Owned exclusively by the session coordinator, which is the only entity
/// allowed to close it. `close` is idempotent.
pub struct RealtimeClient {
    commands: mpsc::Sender<ClientEvent>,
    pump: Option<JoinHandle<()>>,
    closed: Arc<AtomicBool>,
}

impl RealtimeClient {
    /// Connect to the model and perform session initialization.
    ///
    /// Returns the command handle and the serialized event stream. Any
    /// failure here aborts session creation; the caller reports it to the
    /// telephony transport rather than swallowing it.
    pub async fn connect(
        config: &RelayConfig,
        tools: Vec<ToolDef>,
    ) -> Result<(Self, mpsc::Receiver<RealtimeEvent>), RealtimeError> {
        let url = format!("{}?model={}", OPENAI_REALTIME_URL, config.model.as_str());

        let request = http::Request::builder()
            .uri(&url)
            .header("Authorization", format!("Bearer {}", config.openai_api_key))
            .header("OpenAI-Beta", "realtime=v1")
            .header(
                "Sec-WebSocket-Key",
                tungstenite::handshake::client::generate_key(),
            )
            .header("Sec-WebSocket-Version", "13")
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Host", "api.openai.com")
            .body(())
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        let connect_timeout = Duration::from_secs(config.connect_timeout_secs);
        let (ws_stream, _response) =
            tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(request))
                .await
                .map_err(|_| RealtimeError::ConnectTimeout(connect_timeout))?
                .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        tracing::info!(model = %config.model, "connected to realtime model");

        let (mut ws_sink, mut ws_source) = ws_stream.split();
        let (command_tx, mut command_rx) = mpsc::channel::<ClientEvent>(WS_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel::<RealtimeEvent>(EVENT_CHANNEL_CAPACITY);

        let pump = tokio::spawn(async move {
            loop {
                tokio::select! {
                    // Outbound commands from the coordinator
                    command = command_rx.recv() => {
                        let Some(event) = command else { break };
                        let json = match serde_json::to_string(&event) {
                            Ok(j) => j,
                            Err(e) => {
                                tracing::error!("failed to serialize client event: {e}");
                                continue;
                            }
                        };
                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            tracing::error!("failed to send to model session: {e}");
                            break;
                        }
                    }

                    // Inbound server events
                    msg = ws_source.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                match serde_json::from_str::<ServerEvent>(&text) {
                                    Ok(event) => {
                                        if !forward_server_event(event, &event_tx).await {
                                            break;
                                        }
                                    }
                                    // Diagnostic event types outside our
                                    // vocabulary land here; log and move on.
                                    Err(_) => {
                                        tracing::trace!("unhandled model event: {text}");
                                    }
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    tracing::error!("failed to send pong: {e}");
                                    break;
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                tracing::info!("model session closed");
                                break;
                            }
                            Some(Err(e)) => {
                                tracing::error!("model session websocket error: {e}");
                                break;
                            }
                            Some(Ok(_)) => {}
                        }
                    }
                }
            }

            // The coordinator treats Closed as a teardown signal; if it is
            // already gone the send result does not matter.
            let _ = event_tx.send(RealtimeEvent::Closed).await;
        });

        let client = Self {
            commands: command_tx,
            pump: Some(pump),
            closed: Arc::new(AtomicBool::new(false)),
        };

        // Session initialization: configuration first, then the greeting
        // turn so the assistant speaks before the caller does.
        client.send(build_session_update(config, tools)).await?;
        client
            .send(ClientEvent::ConversationItemCreate {
                item: ConversationItem::user_text(DEFAULT_GREETING),
            })
            .await?;
        client.send(ClientEvent::ResponseCreate).await?;

        Ok((client, event_rx))
    }

    /// Forward one opaque base64 audio payload from the telephony side.
    pub async fn append_audio(&self, payload: &str) -> Result<(), RealtimeError> {
        self.send(ClientEvent::InputAudioBufferAppend {
            audio: payload.to_string(),
        })
        .await
    }

    /// Tell the model only `audio_end_ms` milliseconds of `item_id` were
    /// actually heard, keeping conversation history consistent after an
    /// interruption.
    pub async fn truncate(&self, item_id: &str, audio_end_ms: u64) -> Result<(), RealtimeError> {
        self.send(ClientEvent::ConversationItemTruncate {
            item_id: item_id.to_string(),
            content_index: 0,
            audio_end_ms,
        })
        .await
    }

    /// Relay a tool result back into the conversation.
    pub async fn submit_tool_result(
        &self,
        call_id: &str,
        output: String,
    ) -> Result<(), RealtimeError> {
        self.send(ClientEvent::ConversationItemCreate {
            item: ConversationItem::function_output(call_id, output),
        })
        .await
    }

    /// Ask the model to continue generating its next turn.
    pub async fn create_response(&self) -> Result<(), RealtimeError> {
        self.send(ClientEvent::ResponseCreate).await
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close the model session. Idempotent; a second call is a no-op.
    pub fn close(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        tracing::info!("model session client closed");
    }

    async fn send(&self, event: ClientEvent) -> Result<(), RealtimeError> {
        if self.is_closed() {
            return Err(RealtimeError::NotConnected);
        }
        self.commands
            .send(event)
            .await
            .map_err(|_| RealtimeError::NotConnected)
    }

    /// Test constructor: a client whose commands land in the given channel.
    #[cfg(test)]
    pub fn for_testing(commands: mpsc::Sender<ClientEvent>) -> Self {
        Self {
            commands,
            pump: None,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// Map one server event onto the coordinator's event stream.
///
/// Returns false when pumping should stop (the coordinator went away).
async fn forward_server_event(
    event: ServerEvent,
    event_tx: &mpsc::Sender<RealtimeEvent>,
) -> bool {
    let forwarded = match event {
        ServerEvent::SessionCreated { session } => {
            tracing::info!(session_id = %session.id, "realtime session created");
            return true;
        }
        ServerEvent::SessionUpdated {} => {
            tracing::debug!("realtime session updated");
            return true;
        }
        ServerEvent::Error { error } => {
            tracing::error!(error = %error, "model session reported an error");
            RealtimeEvent::ServerError(error)
        }
        ServerEvent::SpeechStarted { audio_start_ms, .. } => {
            tracing::debug!(audio_start_ms, "caller speech detected");
            RealtimeEvent::SpeechStarted
        }
        ServerEvent::SpeechStopped { audio_end_ms } => {
            tracing::debug!(audio_end_ms, "caller speech ended");
            return true;
        }
        ServerEvent::AudioDelta { item_id, delta } => RealtimeEvent::Audio {
            item_id,
            payload: delta,
        },
        ServerEvent::AudioTranscriptDelta { .. } => return true,
        ServerEvent::AudioTranscriptDone { transcript } => {
            tracing::debug!(%transcript, "assistant said");
            return true;
        }
        ServerEvent::ResponseCreated {} => {
            tracing::debug!("response generation started");
            return true;
        }
        ServerEvent::ResponseDone { response } => {
            let tool_calls: Vec<ToolCallRequest> = response
                .output
                .iter()
                .filter(|item| item.item_type == "function_call")
                .filter_map(|item| {
                    let (Some(call_id), Some(name)) = (&item.call_id, &item.name) else {
                        tracing::warn!("function_call output item missing call_id or name");
                        return None;
                    };
                    Some(ToolCallRequest {
                        call_id: call_id.clone(),
                        name: name.clone(),
                        arguments: item.arguments.clone().unwrap_or_default(),
                    })
                })
                .collect();
            RealtimeEvent::ResponseDone {
                status: response.status,
                tool_calls,
            }
        }
        ServerEvent::ConversationItemTruncated { item_id, audio_end_ms } => {
            tracing::debug!(%item_id, audio_end_ms, "assistant utterance truncated");
            return true;
        }
        ServerEvent::RateLimitsUpdated { rate_limits } => {
            for limit in &rate_limits {
                tracing::debug!(name = %limit.name, remaining = limit.remaining, "rate limit update");
            }
            return true;
        }
    };

    event_tx.send(forwarded).await.is_ok()
}

/// Build the initial `session.update` from relay configuration and the
/// advertised capability registry.
fn build_session_update(config: &RelayConfig, tools: Vec<ToolDef>) -> ClientEvent {
    // Both legs speak the telephony wire format; no transcoding anywhere.
    let audio_format = RealtimeAudioFormat::default().as_str().to_string();
    ClientEvent::SessionUpdate {
        session: SessionConfig {
            modalities: Some(vec!["text".to_string(), "audio".to_string()]),
            instructions: Some(config.instructions.clone()),
            voice: Some(config.voice.as_str().to_string()),
            input_audio_format: Some(audio_format.clone()),
            output_audio_format: Some(audio_format),
            turn_detection: Some(TurnDetection::ServerVad {
                threshold: config.vad_threshold,
                prefix_padding_ms: None,
                silence_duration_ms: None,
            }),
            tools: Some(tools),
            tool_choice: Some("auto".to_string()),
            temperature: config.temperature,
        },
    }
}

// =============================================================================
// Tests
// =============================================================================
