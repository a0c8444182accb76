//! Core modules: the model-session side of the relay.

pub mod realtime;
