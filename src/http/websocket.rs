//! WebSocket side of a session.
//!
//! # Responsibilities
//! - Turn inbound text/binary messages into frames for the process
//! - Send process frames back as text (line mode) or binary messages
//! - Close the connection with a normal close frame, once
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket messages ────→ WebSocketEndpoint ←──── frames ────→ pump
//! ```
//!
//! Ping/pong is answered by the codec; close frames end the session.

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::pump::{Endpoint, FRAME_BUFFER};

pub struct WebSocketEndpoint {
    sink: SplitSink<WebSocket, Message>,
    stream: Option<SplitStream<WebSocket>>,
    binary: bool,
    reader: Option<JoinHandle<()>>,
    closed: bool,
}

impl WebSocketEndpoint {
    pub fn new(socket: WebSocket, binary: bool) -> Self {
        let (sink, stream) = socket.split();
        Self {
            sink,
            stream: Some(stream),
            binary,
            reader: None,
            closed: false,
        }
    }
}

impl Endpoint for WebSocketEndpoint {
    fn start_reading(&mut self) -> mpsc::Receiver<Bytes> {
        let (tx, rx) = mpsc::channel(FRAME_BUFFER);
        if let Some(stream) = self.stream.take() {
            let task = tokio::spawn(read_messages(stream, tx).instrument(tracing::Span::current()));
            self.reader = Some(task);
        }
        rx
    }

    async fn send(&mut self, frame: Bytes) -> bool {
        if self.closed {
            return false;
        }
        let message = if self.binary {
            Message::Binary(frame)
        } else {
            Message::Text(String::from_utf8_lossy(&frame).into_owned().into())
        };
        match self.sink.send(message).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "WebSocket send failed");
                false
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let frame = CloseFrame {
            code: close_code::NORMAL,
            reason: "".into(),
        };
        // The client may already be gone.
        let _ = self.sink.send(Message::Close(Some(frame))).await;
        let _ = self.sink.close().await;

        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

async fn read_messages(mut stream: SplitStream<WebSocket>, tx: mpsc::Sender<Bytes>) {
    while let Some(message) = stream.next().await {
        let frame = match message {
            Ok(Message::Text(text)) => Bytes::copy_from_slice(text.as_str().as_bytes()),
            Ok(Message::Binary(data)) => data,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(error = %e, "WebSocket receive failed");
                break;
            }
        };
        if tx.send(frame).await.is_err() {
            break;
        }
    }
    tracing::debug!("WebSocket input ended");
}
