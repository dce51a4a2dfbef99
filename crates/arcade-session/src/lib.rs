//! Connection-side state for Arcade.
//!
//! Connections are unauthenticated: a client names itself with a
//! `userId` on each request and the server takes its word. What the
//! engine does need to know about a connection is:
//!
//! 1. **How to reach it**: a [`Peer`] wraps the connection's outbound
//!    channel and liveness.
//! 2. **Where it is**: the [`SessionRegistry`] remembers which room (if
//!    any) a connection is in and in what role.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)     ← broadcasts to Peers, consults the registry
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Transport / Protocol (below)  ← ConnectionId, ServerMessage
//! ```

mod error;
mod peer;
mod registry;

pub use error::SessionError;
pub use peer::Peer;
pub use registry::{Membership, Role, SessionRegistry};
