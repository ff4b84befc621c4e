//! How a session gets its process.
//!
//! Two strategies, chosen once at startup:
//! - [`ProcessAcquisition::DirectSpawn`] launches the command with piped
//!   stdin/stdout.
//! - [`ProcessAcquisition::RendezvousAccept`] launches the command with no
//!   stdio and waits for it to connect back on the shared Unix socket.
//!
//! Either way the result is a [`ProcessEndpoint`]; everything around it
//! (logging, linger, pumping) is shared by the session handler.

use std::fmt;
use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, Command};

use crate::net::RendezvousListener;
use crate::process::endpoint::ProcessEndpoint;

/// How long a rendezvous-mode child has to connect back.
pub const RENDEZVOUS_ACCEPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Why no process endpoint could be produced.
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[error("could not launch process {command} ({source})")]
    Launch {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("process did not connect to the rendezvous socket within {0:?}")]
    AcceptTimeout(Duration),
    #[error("accept error: {0}")]
    Accept(#[source] io::Error),
}

/// What to run for one session.
#[derive(Debug, Clone, Copy)]
pub struct LaunchSpec<'a> {
    pub command: &'a str,
    pub args: &'a [String],
    /// Complete environment as `KEY=VALUE`; nothing is inherited.
    pub env: &'a [String],
}

impl LaunchSpec<'_> {
    fn spawn(&self, stdin: Stdio, stdout: Stdio) -> Result<Child, AcquireError> {
        Command::new(self.command)
            .args(self.args)
            .env_clear()
            .envs(self.env.iter().filter_map(|kv| kv.split_once('=')))
            .stdin(stdin)
            .stdout(stdout)
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| self.launch_error(source))
    }

    fn launch_error(&self, source: io::Error) -> AcquireError {
        AcquireError::Launch {
            command: self.to_string(),
            source,
        }
    }
}

impl fmt::Display for LaunchSpec<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        for arg in self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Process acquisition strategy for every session of a server.
#[derive(Debug, Clone)]
pub enum ProcessAcquisition {
    DirectSpawn,
    RendezvousAccept(Arc<RendezvousListener>),
}

impl ProcessAcquisition {
    /// Pick the strategy: rendezvous when a listener was bound, direct otherwise.
    pub fn new(rendezvous: Option<Arc<RendezvousListener>>) -> Self {
        match rendezvous {
            Some(listener) => ProcessAcquisition::RendezvousAccept(listener),
            None => ProcessAcquisition::DirectSpawn,
        }
    }

    /// Launch exactly one process for `launch` and connect to it.
    pub async fn acquire(&self, launch: &LaunchSpec<'_>, binary: bool) -> Result<ProcessEndpoint, AcquireError> {
        match self {
            ProcessAcquisition::DirectSpawn => {
                let mut child = launch.spawn(Stdio::piped(), Stdio::piped())?;
                let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
                    return Err(launch.launch_error(io::Error::other("process pipes unavailable")));
                };
                Ok(ProcessEndpoint::new(child, Box::new(stdin), Box::new(stdout), binary))
            }
            ProcessAcquisition::RendezvousAccept(rendezvous) => {
                // Held until the child connects so no other session can take its stream.
                let listener = rendezvous.lock().await;
                let child = launch.spawn(Stdio::null(), Stdio::null())?;

                let stream = match tokio::time::timeout(RENDEZVOUS_ACCEPT_TIMEOUT, listener.accept()).await {
                    Ok(Ok((stream, _))) => stream,
                    // The child is left to exit on its own.
                    Ok(Err(e)) => return Err(AcquireError::Accept(e)),
                    Err(_) => return Err(AcquireError::AcceptTimeout(RENDEZVOUS_ACCEPT_TIMEOUT)),
                };
                drop(listener);

                let (read, write) = stream.into_split();
                Ok(ProcessEndpoint::new(child, Box::new(write), Box::new(read), binary))
            }
        }
    }
}
