//! Shared Unix socket that spawned processes connect back to.
//!
//! # Responsibilities
//! - Bind the socket once at startup, replacing a stale socket file
//! - Refuse to touch anything at the path that is not a socket
//! - Hand out exclusive access for one spawn-then-accept cycle at a time
//! - Remove the socket file on shutdown

use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

use tokio::net::UnixListener;
use tokio::sync::{Mutex, MutexGuard};

/// The rendezvous listener shared by all sessions.
///
/// Sessions take the lock before spawning and keep it until their child
/// has connected (or the deadline passed), so an accepted stream always
/// belongs to the process that was just launched.
#[derive(Debug)]
pub struct RendezvousListener {
    path: PathBuf,
    inner: Mutex<UnixListener>,
}

impl RendezvousListener {
    /// Bind at `path`, removing any socket left behind by a previous run.
    ///
    /// Any other kind of file at `path` is an `AlreadyExists` error and is
    /// left in place.
    pub fn bind(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        match std::fs::symlink_metadata(&path) {
            Ok(metadata) if metadata.file_type().is_socket() => {
                std::fs::remove_file(&path)?;
                tracing::debug!(path = %path.display(), "Removed stale rendezvous socket");
            }
            Ok(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} exists and is not a socket", path.display()),
                ));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        let listener = UnixListener::bind(&path)?;
        tracing::info!(path = %path.display(), "Rendezvous socket bound");

        Ok(Self {
            path,
            inner: Mutex::new(listener),
        })
    }

    /// Path children should connect to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for exclusive use of the listener.
    pub async fn lock(&self) -> MutexGuard<'_, UnixListener> {
        self.inner.lock().await
    }
}

impl Drop for RendezvousListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
