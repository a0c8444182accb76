//! HTTP and WebSocket request handlers

pub mod call;
pub mod media_stream;

pub use call::incoming_call_handler;
pub use media_stream::media_stream_handler;
