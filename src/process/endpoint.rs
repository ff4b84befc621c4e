//! Process side of a session.
//!
//! # Responsibilities
//! - Frame process output as messages (lines, or raw chunks in binary mode)
//! - Write inbound messages to the process input
//! - Log the process's stderr
//! - Tear the process down: close input, linger, then escalate signals
//!
//! The same endpoint serves both acquisition strategies; only the streams
//! differ (child pipes, or the halves of the rendezvous connection).

use std::time::Duration;

use bytes::Bytes;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, Span};

use crate::observability::metrics;
use crate::pump::{Endpoint, FRAME_BUFFER};

/// Read size in binary mode.
const BINARY_CHUNK: usize = 16 * 1024;

/// How long a process gets to exit after its input closes, before signals.
const BASE_CLOSE_TIME: Duration = Duration::from_millis(100);

/// Escalation after the linger: each signal and how long to wait for exit.
const SIGNAL_LADDER: [(Signal, Duration); 2] = [
    (Signal::SIGINT, Duration::from_millis(250)),
    (Signal::SIGTERM, Duration::from_millis(500)),
];

pub type ProcessInput = Box<dyn AsyncWrite + Send + Unpin>;
pub type ProcessOutput = Box<dyn AsyncRead + Send + Unpin>;

/// A running process and the streams its messages travel over.
pub struct ProcessEndpoint {
    child: Child,
    pid: Option<u32>,
    input: Option<ProcessInput>,
    output: Option<ProcessOutput>,
    binary: bool,
    close_time: Duration,
    reader: Option<JoinHandle<()>>,
    closed: bool,
    span: Span,
}

impl ProcessEndpoint {
    /// Wrap `child`. Its stderr, if piped, is logged for the life of the process.
    pub fn new(mut child: Child, input: ProcessInput, output: ProcessOutput, binary: bool) -> Self {
        let span = Span::current();
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(log_stderr(stderr).instrument(span.clone()));
        }
        metrics::process_started();

        Self {
            pid: child.id(),
            child,
            input: Some(input),
            output: Some(output),
            binary,
            close_time: BASE_CLOSE_TIME,
            reader: None,
            closed: false,
            span,
        }
    }

    /// OS process ID, if the process had not already been reaped.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Extend the post-EOF linger before signals are sent.
    pub fn add_close_time(&mut self, extra: Duration) {
        self.close_time += extra;
    }

    pub fn close_time(&self) -> Duration {
        self.close_time
    }

    /// Wait up to `limit` for the process to exit.
    async fn exited_within(&mut self, limit: Duration) -> bool {
        match tokio::time::timeout(limit, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(%status, "Process exited");
                true
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Could not wait for process");
                true
            }
            Err(_) => false,
        }
    }

    async fn terminate(&mut self) {
        if let Some(mut input) = self.input.take() {
            let _ = input.shutdown().await;
        }

        if self.exited_within(self.close_time).await {
            return;
        }

        if let Some(pid) = self.pid {
            let pid = Pid::from_raw(pid as i32);
            for (signal, grace) in SIGNAL_LADDER {
                tracing::debug!(?signal, "Process still running, signalling");
                if let Err(e) = kill(pid, signal) {
                    tracing::debug!(?signal, error = %e, "Signal failed");
                }
                if self.exited_within(grace).await {
                    return;
                }
            }
        }

        tracing::warn!("Process ignored SIGINT and SIGTERM, killing");
        if let Err(e) = self.child.kill().await {
            tracing::error!(error = %e, "Could not kill process");
        }
    }
}

impl Endpoint for ProcessEndpoint {
    fn start_reading(&mut self) -> mpsc::Receiver<Bytes> {
        let (tx, rx) = mpsc::channel(FRAME_BUFFER);
        if let Some(output) = self.output.take() {
            let task = if self.binary {
                tokio::spawn(read_chunks(output, tx).instrument(self.span.clone()))
            } else {
                tokio::spawn(read_lines(output, tx).instrument(self.span.clone()))
            };
            self.reader = Some(task);
        }
        rx
    }

    async fn send(&mut self, frame: Bytes) -> bool {
        let binary = self.binary;
        let Some(input) = self.input.as_mut() else {
            return false;
        };

        let written = async {
            input.write_all(&frame).await?;
            if !binary {
                input.write_all(b"\n").await?;
            }
            input.flush().await
        }
        .await;

        match written {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Process input closed");
                false
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let span = self.span.clone();
        self.terminate().instrument(span).await;

        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        metrics::process_finished();
    }
}

/// One message per output line, end-of-line trimmed.
async fn read_lines(output: ProcessOutput, tx: mpsc::Sender<Bytes>) {
    let mut reader = BufReader::new(output);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                if tx.send(Bytes::copy_from_slice(trim_eol(&line))).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "Process output failed");
                break;
            }
        }
    }
    tracing::debug!("Process output ended");
}

/// One message per read, as received.
async fn read_chunks(mut output: ProcessOutput, tx: mpsc::Sender<Bytes>) {
    let mut buf = vec![0u8; BINARY_CHUNK];
    loop {
        match output.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(Bytes::copy_from_slice(&buf[..n])).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "Process output failed");
                break;
            }
        }
    }
    tracing::debug!("Process output ended");
}

async fn log_stderr(stderr: impl AsyncRead + Unpin) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::warn!(target: "stderr", "{}", line);
    }
}

fn trim_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
