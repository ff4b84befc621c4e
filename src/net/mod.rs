//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming upgrade request
//!     → connection.rs (session ID, fork slot)
//!     → tls.rs (optional TLS on the HTTP listener)
//!     → Hand off to session layer
//!
//! Rendezvous mode:
//!     rendezvous.rs (shared Unix socket)
//!     → spawned child connects back
//!     → accepted stream becomes the process side of the session
//! ```
//!
//! # Design Decisions
//! - Fork slots are claimed before the handshake, released when the session ends
//! - The rendezvous socket is serialized: one spawn-and-accept at a time
//! - TLS is optional and handled transparently

pub mod connection;
pub mod rendezvous;
pub mod tls;

pub use connection::{ForkLimiter, ForkPermit, SessionId};
pub use rendezvous::RendezvousListener;
