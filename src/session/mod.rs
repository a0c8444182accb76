//! Per-call session machinery
//!
//! One session per phone call: the call state record, the interruption
//! controller, and the coordinator that owns both connection handles and
//! serializes every event through a single loop.

mod coordinator;
mod interrupt;
mod state;

pub use coordinator::{CallSession, run_call_session};
pub use interrupt::{Truncation, on_caller_speech};
pub use state::{AckOutcome, CallState, Phase};
