//! Barge-in interruption control.
//!
//! Pure transition over the call state: given that the caller started
//! speaking, decide whether the in-flight assistant response must be cut,
//! and at what playback offset. The coordinator turns the returned
//! truncation into the two wire actions (truncate upstream, clear
//! downstream).

use super::state::{CallState, Phase};

/// The decision to cut an in-flight response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Truncation {
    /// Model item id of the response to truncate.
    pub item_id: String,
    /// How much of it the caller actually heard, in milliseconds.
    pub audio_end_ms: u64,
}

/// Apply a caller speech-start signal to the call state.
///
/// Returns `Some` exactly when a response is mid-playback: the phase is
/// responding, at least one fragment is still unacknowledged, and the
/// segment start is known. The heard duration is the caller clock elapsed
/// since the segment began, saturating at zero so a frame race can never
/// produce an underflowed offset.
///
/// When there is nothing to cut (idle, or playback already drained) this
/// is a no-op and the state is untouched, so duplicate speech-start
/// signals are harmless.
pub fn on_caller_speech(state: &mut CallState) -> Option<Truncation> {
    if state.phase != Phase::Responding || state.mark_queue.is_empty() {
        return None;
    }
    let start = state.response_start_timestamp?;
    let item_id = state.last_assistant_item.clone()?;

    let audio_end_ms = state.latest_media_timestamp.saturating_sub(start);
    state.mark_queue.clear();
    state.end_segment();

    Some(Truncation { item_id, audio_end_ms })
}
