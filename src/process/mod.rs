//! Process subsystem.
//!
//! # Data Flow
//! ```text
//! LaunchSpec (command, args, env)
//!     → acquisition.rs (direct pipes | rendezvous socket)
//!     → endpoint.rs (ProcessEndpoint: framing, stderr logging, teardown)
//!     → handed to the pump
//! ```

pub mod acquisition;
pub mod endpoint;

pub use acquisition::{AcquireError, LaunchSpec, ProcessAcquisition, RENDEZVOUS_ACCEPT_TIMEOUT};
pub use endpoint::ProcessEndpoint;
