//! Session orchestration subsystem.
//!
//! # Data Flow
//! ```text
//! Upgrade request
//!     → remote.rs (caller address, port, optional reverse lookup)
//!     → url.rs (static command, or script + PATH_INFO)
//!     → env.rs (CGI-style process environment)
//!     → handler.rs (SessionHandler: acquire process, pump, cleanup)
//! ```
//!
//! # Design Decisions
//! - Construction failures are ordinary outcomes returned to the HTTP layer
//! - After the handshake nothing is returned; outcomes are logged
//! - One session owns one process and one WebSocket, never shared

pub mod env;
pub mod error;
pub mod handler;
pub mod remote;
pub mod url;

pub use env::ServerContext;
pub use error::SessionError;
pub use handler::{Session, SessionHandler};
pub use remote::{DnsReverseLookup, RemoteInfo, ReverseLookup};
pub use url::UrlInfo;
