//! Boundary with the transport layer: wire messages and the arena handle

pub mod gateway;
pub mod protocol;

pub use gateway::{ArenaHandle, GatewayError, MatchCommand};
pub use protocol::{Audience, ClientMsg, Outbound, ServerMsg};
