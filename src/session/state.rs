//! Per-call playback state.
//!
//! Everything here is plain data mutated from the session's single event
//! loop, so no locking is needed. Timestamps are the millisecond clock the
//! telephony provider stamps on inbound media frames; they are the only
//! clock the interruption math ever uses.

use std::collections::VecDeque;

/// Whether an assistant response is currently being streamed to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No assistant audio in flight.
    #[default]
    Idle,
    /// Assistant audio is being (or was just) streamed out and has not
    /// finished playing.
    Responding,
}

/// What happened when a playback acknowledgement came in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// One outstanding fragment was acknowledged.
    Acked,
    /// The final outstanding fragment was acknowledged; the response
    /// segment has finished playing and the state returned to idle.
    SegmentDrained,
    /// An acknowledgement arrived with nothing outstanding. Logged and
    /// otherwise ignored.
    Unexpected,
}

/// Mutable record tracking one call's media stream and playback position.
#[derive(Debug, Default)]
pub struct CallState {
    /// Stream identifier from the provider's start event. `None` until the
    /// stream has formally started.
    pub stream_sid: Option<String>,
    /// Highest media timestamp seen from the caller, in milliseconds.
    pub latest_media_timestamp: u64,
    /// Model item id of the assistant response currently playing out.
    pub last_assistant_item: Option<String>,
    /// Caller-clock timestamp at which the current response segment began.
    pub response_start_timestamp: Option<u64>,
    /// Playback acknowledgement tokens, one per outbound audio fragment,
    /// in send order.
    pub mark_queue: VecDeque<String>,
    /// Current position in the response lifecycle.
    pub phase: Phase,
}

impl CallState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new media stream has started. Resets the timestamp epoch and all
    /// playback bookkeeping; the provider clock starts over per stream.
    pub fn begin_stream(&mut self, stream_sid: String) {
        self.stream_sid = Some(stream_sid);
        self.latest_media_timestamp = 0;
        self.last_assistant_item = None;
        self.response_start_timestamp = None;
        self.mark_queue.clear();
        self.phase = Phase::Idle;
    }

    /// Record the timestamp of an inbound media frame. The clock only
    /// moves forward; a frame arriving late never rewinds it.
    pub fn observe_media(&mut self, timestamp: u64) {
        self.latest_media_timestamp = self.latest_media_timestamp.max(timestamp);
    }

    /// Record one outbound audio fragment for `item_id`, queueing its
    /// acknowledgement token. The first fragment of a response pins the
    /// segment's start to the current caller clock.
    pub fn on_outbound_audio(&mut self, item_id: &str, mark_name: String) {
        if self.response_start_timestamp.is_none() {
            self.response_start_timestamp = Some(self.latest_media_timestamp);
            self.last_assistant_item = Some(item_id.to_string());
            self.phase = Phase::Responding;
        }
        self.mark_queue.push_back(mark_name);
    }

    /// Handle a playback acknowledgement from the telephony provider.
    ///
    /// Acknowledgements are consumed strictly in FIFO order; the provider
    /// echoes them back in the order the fragments were sent. Draining the
    /// queue means the whole segment has reached the caller's ear, so the
    /// segment bookkeeping is retired.
    pub fn ack_mark(&mut self) -> AckOutcome {
        if self.mark_queue.pop_front().is_none() {
            return AckOutcome::Unexpected;
        }
        if self.mark_queue.is_empty() && self.phase == Phase::Responding {
            self.end_segment();
            return AckOutcome::SegmentDrained;
        }
        AckOutcome::Acked
    }

    /// Retire the current response segment and return to idle.
    pub fn end_segment(&mut self) {
        self.response_start_timestamp = None;
        self.last_assistant_item = None;
        self.phase = Phase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_clock_is_monotonic() {
        let mut state = CallState::new();
        state.observe_media(100);
        state.observe_media(250);
        state.observe_media(180);
        assert_eq!(state.latest_media_timestamp, 250);
    }

    #[test]
    fn begin_stream_resets_epoch() {
        let mut state = CallState::new();
        state.observe_media(5000);
        state.on_outbound_audio("item_1", "m1".to_string());
        state.begin_stream("MZabc".to_string());
        assert_eq!(state.latest_media_timestamp, 0);
        assert!(state.response_start_timestamp.is_none());
        assert!(state.mark_queue.is_empty());
        assert_eq!(state.phase, Phase::Idle);
    }

    #[test]
    fn first_fragment_pins_segment_start() {
        let mut state = CallState::new();
        state.observe_media(1000);
        state.on_outbound_audio("item_1", "m1".to_string());
        state.observe_media(1200);
        state.on_outbound_audio("item_1", "m2".to_string());
        assert_eq!(state.response_start_timestamp, Some(1000));
        assert_eq!(state.last_assistant_item.as_deref(), Some("item_1"));
        assert_eq!(state.phase, Phase::Responding);
        assert_eq!(state.mark_queue.len(), 2);
    }

    #[test]
    fn acks_drain_in_fifo_order() {
        let mut state = CallState::new();
        state.on_outbound_audio("item_1", "m1".to_string());
        state.on_outbound_audio("item_1", "m2".to_string());
        state.on_outbound_audio("item_1", "m3".to_string());

        assert_eq!(state.ack_mark(), AckOutcome::Acked);
        assert_eq!(state.mark_queue.front().map(String::as_str), Some("m2"));
        assert_eq!(state.ack_mark(), AckOutcome::Acked);
        assert_eq!(state.ack_mark(), AckOutcome::SegmentDrained);
        assert_eq!(state.phase, Phase::Idle);
        assert!(state.response_start_timestamp.is_none());
    }

    #[test]
    fn unexpected_ack_changes_nothing() {
        let mut state = CallState::new();
        state.observe_media(700);
        assert_eq!(state.ack_mark(), AckOutcome::Unexpected);
        assert_eq!(state.latest_media_timestamp, 700);
        assert_eq!(state.phase, Phase::Idle);
    }
}
