//! Bidirectional forwarding between two endpoints.
//!
//! # Data Flow
//! ```text
//! WebSocket ──frames──▶ Endpoint A ──▶ pipe_endpoints ──▶ Endpoint B ──lines──▶ process stdin
//! WebSocket ◀──frames── Endpoint A ◀── pipe_endpoints ◀── Endpoint B ◀──lines── process stdout
//! ```
//!
//! # Design Decisions
//! - Each endpoint reads on its own task and delivers frames over a channel
//! - Whichever side ends first (EOF, error, failed send) ends the session
//! - Both endpoints are closed when the pump returns; `close` is idempotent

use std::future::Future;

use bytes::Bytes;
use tokio::sync::mpsc;

/// Capacity of each endpoint's inbound frame channel.
pub const FRAME_BUFFER: usize = 64;

/// One side of a bridged session.
pub trait Endpoint: Send {
    /// Start reading and return the channel of frames read from this side.
    ///
    /// The channel closes when the side reaches end-of-stream or fails.
    /// Called once per endpoint.
    fn start_reading(&mut self) -> mpsc::Receiver<Bytes>;

    /// Deliver one frame to this side. Returns `false` if it could not be written.
    fn send(&mut self, frame: Bytes) -> impl Future<Output = bool> + Send;

    /// Tear this side down. Calling it again has no effect.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Forward frames between `a` and `b` until either side ends, then close both.
pub async fn pipe_endpoints<A: Endpoint, B: Endpoint>(a: &mut A, b: &mut B) {
    let mut from_a = a.start_reading();
    let mut from_b = b.start_reading();

    loop {
        tokio::select! {
            frame = from_a.recv() => {
                let Some(frame) = frame else { break };
                if !b.send(frame).await {
                    break;
                }
            }
            frame = from_b.recv() => {
                let Some(frame) = frame else { break };
                if !a.send(frame).await {
                    break;
                }
            }
        }
    }

    b.close().await;
    a.close().await;
}
