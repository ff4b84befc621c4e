//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, upgrade detection, fork limit)
//!     → [session layer resolves caller, script, env]
//!     → WebSocket handshake
//!     → websocket.rs (WebSocketEndpoint) pumped against the process
//! ```

pub mod server;
pub mod websocket;

pub use server::{AppState, GatewayServer, ServerError};
pub use websocket::WebSocketEndpoint;
