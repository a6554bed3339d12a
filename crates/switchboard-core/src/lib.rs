//! switchboard-core — signaling envelopes, identifiers, and configuration.
//! All other Switchboard crates depend on this one.

pub mod config;
pub mod message;

pub use message::{ClientFrame, CorrelationKey, PeerConnectionState, PeerId, SignalingMessage};
