//! Telephony adapter
//!
//! Wire vocabulary for the phone-network side of a call: the media-stream
//! events the telephony provider delivers over its WebSocket, and the
//! events the relay sends back. Audio payloads are opaque base64 and pass
//! through without transcoding.

mod messages;

pub use messages::{
    MarkMeta, MediaMeta, StartMeta, TelephonyInbound, TelephonyOutbound,
};
