//! talkpair-relay: stranger matchmaking and WebRTC signaling over WebSocket.
//!
//! Clients register a display name, ask for a partner, and exchange offers,
//! answers and ICE candidates through the relay until their peer connection
//! is up. Signal payloads are forwarded without inspection.

pub mod connection;
pub mod coordinator;
pub mod hub;
pub mod protocol;
pub mod server;

pub use coordinator::{Coordinator, CoordinatorStats, Phase};
pub use hub::{HubCommand, HubHandle};
pub use protocol::{ClientCommand, ServerNotice};
pub use server::serve;
