//! switchboard-services — the relay core.
//!
//! Correlation of forwarded offers with their answers, the per-peer session
//! registry, and the relay that drives both from a resource-server link.
//! Transport adapters live in `switchboard-api`.

pub mod correlation;
pub mod error;
pub mod link;
pub mod peer;
pub mod relay;

pub use correlation::{CorrelationRegistry, Waiter};
pub use error::{LinkClosed, PeerError, RegistryError, RelayError};
pub use link::{DownstreamLink, LinkId};
pub use peer::{ClientSink, PeerRegistry, PeerSession, PeerState};
pub use relay::{OfferRequest, RelaySnapshot, Reply, SignalingRelay};
