//! Session coordinator.
//!
//! Owns both halves of a call: the telephony WebSocket and the model
//! session client. All events from either side, plus locally produced tool
//! results, are funneled through one `select!` loop, so every mutation of
//! the call state happens on a single task in arrival order. Closing
//! either connection tears down the other; teardown runs exactly once.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::realtime::{RealtimeClient, RealtimeEvent, ToolCallRequest};
use crate::errors::SessionError;
use crate::session::interrupt::on_caller_speech;
use crate::session::state::{AckOutcome, CallState};
use crate::state::AppState;
use crate::telephony::{TelephonyInbound, TelephonyOutbound};
use crate::tools::{self, ToolRegistry};

/// Capacity for outbound telephony frames awaiting the socket writer.
const OUTBOUND_CHANNEL_CAPACITY: usize = 256;

/// Capacity for tool results waiting to re-enter the loop.
const LOCAL_CHANNEL_CAPACITY: usize = 32;

/// Events produced by the session's own spawned work.
#[derive(Debug)]
enum LocalEvent {
    ToolResult { call_id: String, output: String },
}

/// One live call: the state record plus the handles the event loop drives.
pub struct CallSession {
    state: CallState,
    /// Item id whose remaining audio fragments must be dropped after an
    /// interruption. Cleared when a different item starts streaming.
    suppressed_item: Option<String>,
    model: RealtimeClient,
    outbound_tx: mpsc::Sender<TelephonyOutbound>,
    local_tx: mpsc::Sender<LocalEvent>,
    tools: Arc<ToolRegistry>,
    tool_timeout: Duration,
}

impl CallSession {
    fn new(
        model: RealtimeClient,
        outbound_tx: mpsc::Sender<TelephonyOutbound>,
        local_tx: mpsc::Sender<LocalEvent>,
        tools: Arc<ToolRegistry>,
        tool_timeout: Duration,
    ) -> Self {
        Self {
            state: CallState::new(),
            suppressed_item: None,
            model,
            outbound_tx,
            local_tx,
            tools,
            tool_timeout,
        }
    }

    /// Handle one inbound telephony event. Returns false when the session
    /// should end.
    async fn handle_telephony(&mut self, event: TelephonyInbound) -> bool {
        match event {
            TelephonyInbound::Connected => {
                tracing::debug!("telephony transport connected");
            }
            TelephonyInbound::Start { start } => {
                tracing::info!(
                    stream_sid = %start.stream_sid,
                    call_sid = start.call_sid.as_deref().unwrap_or("-"),
                    "media stream started"
                );
                self.state.begin_stream(start.stream_sid);
            }
            TelephonyInbound::Media { media } => {
                self.state.observe_media(media.timestamp);
                if !self.model.is_closed()
                    && let Err(e) = self.model.append_audio(&media.payload).await
                {
                    tracing::warn!("dropping caller audio frame: {e}");
                }
            }
            TelephonyInbound::Mark { mark } => {
                match self.state.ack_mark() {
                    AckOutcome::Acked => {}
                    AckOutcome::SegmentDrained => {
                        tracing::debug!("assistant response finished playing");
                    }
                    AckOutcome::Unexpected => {
                        tracing::warn!(name = %mark.name, "playback ack with nothing outstanding");
                    }
                }
            }
            TelephonyInbound::Stop => {
                tracing::info!("telephony side ended the stream");
                return false;
            }
            TelephonyInbound::Unknown => {
                tracing::debug!("ignoring unrecognized telephony event");
            }
        }
        true
    }

    /// Handle one event from the model session. Returns false when the
    /// session should end.
    async fn handle_model(&mut self, event: RealtimeEvent) -> bool {
        match event {
            RealtimeEvent::Audio { item_id, payload } => {
                self.relay_audio(item_id, payload).await;
            }
            RealtimeEvent::SpeechStarted => {
                self.handle_interruption().await;
            }
            RealtimeEvent::ResponseDone { status, tool_calls } => {
                tracing::debug!(%status, tool_calls = tool_calls.len(), "model turn complete");
                for call in tool_calls {
                    self.spawn_tool_dispatch(call);
                }
            }
            RealtimeEvent::ServerError(error) => {
                tracing::warn!(%error, "model session error, continuing");
            }
            RealtimeEvent::Closed => {
                tracing::info!("model session ended");
                return false;
            }
        }
        true
    }

    /// Handle a locally produced event (a finished tool dispatch).
    async fn handle_local(&mut self, event: LocalEvent) {
        match event {
            LocalEvent::ToolResult { call_id, output } => {
                if let Err(e) = self.model.submit_tool_result(&call_id, output).await {
                    tracing::warn!(%call_id, "could not relay tool result: {e}");
                    return;
                }
                if let Err(e) = self.model.create_response().await {
                    tracing::warn!("could not request follow-up response: {e}");
                }
            }
        }
    }

    /// Forward one assistant audio fragment to the caller, followed by its
    /// playback checkpoint.
    async fn relay_audio(&mut self, item_id: String, payload: String) {
        if self.suppressed_item.as_deref() == Some(item_id.as_str()) {
            tracing::trace!(%item_id, "dropping audio for truncated response");
            return;
        }
        self.suppressed_item = None;

        let Some(stream_sid) = self.state.stream_sid.clone() else {
            tracing::warn!("assistant audio before the media stream started, dropping");
            return;
        };

        let mark_name = Uuid::new_v4().to_string();
        self.state.on_outbound_audio(&item_id, mark_name.clone());

        let media = TelephonyOutbound::media(&stream_sid, payload);
        let mark = TelephonyOutbound::mark(&stream_sid, &mark_name);
        if self.outbound_tx.send(media).await.is_err() || self.outbound_tx.send(mark).await.is_err()
        {
            tracing::debug!("telephony writer gone, audio fragment dropped");
        }
    }

    /// The caller talked over the assistant. If a response is mid-playback,
    /// truncate it upstream at the heard offset and flush the downstream
    /// playback buffer. Both actions happen at most once per response.
    async fn handle_interruption(&mut self) {
        let Some(truncation) = on_caller_speech(&mut self.state) else {
            tracing::debug!("caller speech with no response in flight");
            return;
        };

        tracing::info!(
            item_id = %truncation.item_id,
            audio_end_ms = truncation.audio_end_ms,
            "caller barge-in, truncating response"
        );

        if let Err(e) = self
            .model
            .truncate(&truncation.item_id, truncation.audio_end_ms)
            .await
        {
            tracing::warn!("could not truncate model response: {e}");
        }

        if let Some(stream_sid) = self.state.stream_sid.as_deref() {
            let clear = TelephonyOutbound::clear(stream_sid);
            if self.outbound_tx.send(clear).await.is_err() {
                tracing::debug!("telephony writer gone, clear not sent");
            }
        }

        self.suppressed_item = Some(truncation.item_id);
    }

    /// Run one tool call off the loop so audio keeps flowing while the
    /// provider works. The result re-enters the loop as a local event.
    fn spawn_tool_dispatch(&self, call: ToolCallRequest) {
        let registry = Arc::clone(&self.tools);
        let local_tx = self.local_tx.clone();
        let timeout = self.tool_timeout;
        tokio::spawn(async move {
            let output = tools::dispatch(&registry, &call, timeout).await;
            let result = LocalEvent::ToolResult {
                call_id: call.call_id,
                output,
            };
            if local_tx.send(result).await.is_err() {
                tracing::debug!("session ended before tool result could be delivered");
            }
        });
    }
}

/// Serve one call over an accepted telephony WebSocket.
///
/// Connects the model session first; if that fails the socket is closed and
/// the error is returned so the handler can log it. Otherwise runs the
/// event loop until either side disconnects, then tears down both halves.
pub async fn run_call_session(socket: WebSocket, app: Arc<AppState>) -> Result<(), SessionError> {
    let (mut ws_sink, ws_source) = socket.split();

    let client = RealtimeClient::connect(&app.config, app.tools.definitions()).await;
    let (model, model_rx) = match client {
        Ok(pair) => pair,
        Err(e) => {
            tracing::error!("model session setup failed: {e}");
            let _ = ws_sink.send(Message::Close(None)).await;
            return Err(e.into());
        }
    };

    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
    let (local_tx, local_rx) = mpsc::channel(LOCAL_CHANNEL_CAPACITY);

    let writer = tokio::spawn(write_outbound(ws_sink, outbound_rx));

    let session = CallSession::new(
        model,
        outbound_tx,
        local_tx,
        Arc::clone(&app.tools),
        Duration::from_secs(app.config.tool_timeout_secs),
    );

    event_loop(session, ws_source, model_rx, local_rx).await;
    writer.abort();

    tracing::info!("call session ended");
    Ok(())
}

/// The single serialized loop. Each arm fully updates state before the
/// next event is pulled, which is the whole concurrency story of a call.
async fn event_loop(
    mut session: CallSession,
    mut ws_source: SplitStream<WebSocket>,
    mut model_rx: mpsc::Receiver<RealtimeEvent>,
    mut local_rx: mpsc::Receiver<LocalEvent>,
) {
    loop {
        tokio::select! {
            inbound = ws_source.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<TelephonyInbound>(&text) {
                            Ok(event) => {
                                if !session.handle_telephony(event).await {
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::warn!("unparseable telephony frame, ignoring: {e}");
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!("telephony socket closed");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!("telephony socket error: {e}");
                        break;
                    }
                }
            }

            event = model_rx.recv() => {
                let Some(event) = event else { break };
                if !session.handle_model(event).await {
                    break;
                }
            }

            event = local_rx.recv() => {
                // The session holds a sender, so this arm never sees None
                // while the loop runs.
                if let Some(event) = event {
                    session.handle_local(event).await;
                }
            }
        }
    }

    // Dropping the session drops the client, which closes the model side.
    // Close is idempotent, so it does not matter which side ended first.
}

/// Writer task: serializes outbound frames onto the telephony socket in
/// the order the coordinator produced them.
async fn write_outbound(
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<TelephonyOutbound>,
) {
    while let Some(frame) = outbound_rx.recv().await {
        let json = match serde_json::to_string(&frame) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!("failed to serialize telephony frame: {e}");
                continue;
            }
        };
        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
            tracing::debug!("telephony socket write failed: {e}");
            break;
        }
    }
    let _ = ws_sink.send(Message::Close(None)).await;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::realtime::messages::ClientEvent;
    use crate::telephony::{MarkMeta, MediaMeta, StartMeta};

    struct Harness {
        session: CallSession,
        commands_rx: mpsc::Receiver<ClientEvent>,
        outbound_rx: mpsc::Receiver<TelephonyOutbound>,
        local_rx: mpsc::Receiver<LocalEvent>,
    }

    fn harness() -> Harness {
        let (commands_tx, commands_rx) = mpsc::channel(64);
        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        let (local_tx, local_rx) = mpsc::channel(8);
        let session = CallSession::new(
            RealtimeClient::for_testing(commands_tx),
            outbound_tx,
            local_tx,
            Arc::new(ToolRegistry::new()),
            Duration::from_secs(1),
        );
        Harness {
            session,
            commands_rx,
            outbound_rx,
            local_rx,
        }
    }

    fn start_event(sid: &str) -> TelephonyInbound {
        TelephonyInbound::Start {
            start: StartMeta {
                stream_sid: sid.to_string(),
                call_sid: None,
            },
        }
    }

    fn media_event(timestamp: u64) -> TelephonyInbound {
        TelephonyInbound::Media {
            media: MediaMeta {
                timestamp,
                payload: "AAAA".to_string(),
            },
        }
    }

    fn audio(item: &str) -> RealtimeEvent {
        RealtimeEvent::Audio {
            item_id: item.to_string(),
            payload: "UExBWQ==".to_string(),
        }
    }

    #[tokio::test]
    async fn every_fragment_gets_media_then_mark() {
        let mut h = harness();
        assert!(h.session.handle_telephony(start_event("MZ1")).await);

        for _ in 0..3 {
            assert!(h.session.handle_model(audio("item_1")).await);
        }

        let mut media = 0;
        let mut marks = 0;
        while let Ok(frame) = h.outbound_rx.try_recv() {
            match frame {
                TelephonyOutbound::Media { stream_sid, .. } => {
                    assert_eq!(stream_sid, "MZ1");
                    // Marks never outrun their fragment.
                    assert_eq!(media, marks);
                    media += 1;
                }
                TelephonyOutbound::Mark { .. } => marks += 1,
                TelephonyOutbound::Clear { .. } => panic!("unexpected clear"),
            }
        }
        assert_eq!(media, 3);
        assert_eq!(marks, 3);
        assert_eq!(h.session.state.mark_queue.len(), 3);
    }

    #[tokio::test]
    async fn barge_in_truncates_and_clears_once() {
        let mut h = harness();
        h.session.handle_telephony(start_event("MZ1")).await;
        h.session.handle_telephony(media_event(1000)).await;
        h.session.handle_model(audio("item_7")).await;
        h.session.handle_telephony(media_event(1450)).await;

        h.session.handle_model(RealtimeEvent::SpeechStarted).await;

        // Upstream: audio appends, then the truncate at the heard offset.
        let mut truncates = Vec::new();
        while let Ok(cmd) = h.commands_rx.try_recv() {
            if let ClientEvent::ConversationItemTruncate {
                item_id,
                audio_end_ms,
                ..
            } = cmd
            {
                truncates.push((item_id, audio_end_ms));
            }
        }
        assert_eq!(truncates, vec![("item_7".to_string(), 450)]);

        // Downstream: exactly one clear.
        let mut clears = 0;
        while let Ok(frame) = h.outbound_rx.try_recv() {
            if matches!(frame, TelephonyOutbound::Clear { .. }) {
                clears += 1;
            }
        }
        assert_eq!(clears, 1);

        // A duplicate speech-start is a no-op.
        h.session.handle_model(RealtimeEvent::SpeechStarted).await;
        assert!(h.commands_rx.try_recv().is_err());
        assert!(h.outbound_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stale_audio_after_truncation_is_suppressed() {
        let mut h = harness();
        h.session.handle_telephony(start_event("MZ1")).await;
        h.session.handle_telephony(media_event(1000)).await;
        h.session.handle_model(audio("item_7")).await;
        h.session.handle_model(RealtimeEvent::SpeechStarted).await;
        while h.outbound_rx.try_recv().is_ok() {}

        // Late fragments of the cut response never reach the caller.
        h.session.handle_model(audio("item_7")).await;
        assert!(h.outbound_rx.try_recv().is_err());

        // The next response streams normally again.
        h.session.handle_model(audio("item_8")).await;
        assert!(matches!(
            h.outbound_rx.try_recv(),
            Ok(TelephonyOutbound::Media { .. })
        ));
    }

    #[tokio::test]
    async fn speech_start_while_idle_changes_nothing() {
        let mut h = harness();
        h.session.handle_telephony(start_event("MZ1")).await;
        h.session.handle_telephony(media_event(500)).await;

        h.session.handle_model(RealtimeEvent::SpeechStarted).await;

        assert!(h.outbound_rx.try_recv().is_err());
        assert_eq!(h.session.state.latest_media_timestamp, 500);
    }

    #[tokio::test]
    async fn mark_acks_retire_playback() {
        let mut h = harness();
        h.session.handle_telephony(start_event("MZ1")).await;
        h.session.handle_model(audio("item_1")).await;
        h.session.handle_model(audio("item_1")).await;

        let ack = TelephonyInbound::Mark {
            mark: MarkMeta {
                name: "whatever".to_string(),
            },
        };
        h.session.handle_telephony(ack.clone()).await;
        assert_eq!(h.session.state.mark_queue.len(), 1);
        h.session.handle_telephony(ack.clone()).await;
        assert!(h.session.state.mark_queue.is_empty());

        // Fully drained playback is no longer interruptible.
        h.session.handle_model(RealtimeEvent::SpeechStarted).await;
        while let Ok(frame) = h.outbound_rx.try_recv() {
            assert!(!matches!(frame, TelephonyOutbound::Clear { .. }));
        }
    }

    #[tokio::test]
    async fn tool_calls_round_trip_through_local_events() {
        let mut h = harness();
        h.session.handle_telephony(start_event("MZ1")).await;

        let done = RealtimeEvent::ResponseDone {
            status: "completed".to_string(),
            tool_calls: vec![ToolCallRequest {
                call_id: "call_9".to_string(),
                name: "nonexistent".to_string(),
                arguments: "{}".to_string(),
            }],
        };
        h.session.handle_model(done).await;

        // The registry is empty, so dispatch yields a structured error
        // result rather than failing the session.
        let result = h.local_rx.recv().await.unwrap();
        let LocalEvent::ToolResult { call_id, output } = result;
        assert_eq!(call_id, "call_9");
        assert!(output.contains("capability_not_available"));

        h.session
            .handle_local(LocalEvent::ToolResult {
                call_id,
                output,
            })
            .await;

        let item = h.commands_rx.try_recv().unwrap();
        assert!(matches!(item, ClientEvent::ConversationItemCreate { .. }));
        let follow_up = h.commands_rx.try_recv().unwrap();
        assert!(matches!(follow_up, ClientEvent::ResponseCreate));
    }

    #[tokio::test]
    async fn stop_event_ends_the_session() {
        let mut h = harness();
        h.session.handle_telephony(start_event("MZ1")).await;
        assert!(!h.session.handle_telephony(TelephonyInbound::Stop).await);
    }

    #[tokio::test]
    async fn audio_before_start_is_dropped() {
        let mut h = harness();
        h.session.handle_model(audio("item_1")).await;
        assert!(h.outbound_rx.try_recv().is_err());
        assert!(h.session.state.mark_queue.is_empty());
    }
}
