//! Per-connection session orchestration.
//!
//! # Responsibilities
//! - Build a session from an upgrade request (identity, caller, script, env)
//! - After the handshake, acquire exactly one process for it
//! - Pump the process against the WebSocket until either side ends
//! - Close the WebSocket on every path out
//!
//! # Data Flow
//! ```text
//! SessionHandler::new (before handshake)
//!     SessionId → RemoteInfo → UrlInfo → command → env
//! SessionHandler::accept (after handshake)
//!     acquire process → add linger → pipe_endpoints → close WebSocket
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::http::request::Parts;
use tracing::{field, Instrument, Span};

use crate::config::GatewayConfig;
use crate::net::SessionId;
use crate::observability::metrics;
use crate::process::{LaunchSpec, ProcessAcquisition};
use crate::pump::{pipe_endpoints, Endpoint};
use crate::session::env::{build_env, ServerContext};
use crate::session::error::SessionError;
use crate::session::remote::{resolve_remote_info, RemoteInfo, ReverseLookup};
use crate::session::url::{resolve_url, UrlInfo};

/// Everything known about a session before its process starts.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub remote_info: RemoteInfo,
    pub url_info: UrlInfo,
    /// Full child environment as `KEY=VALUE`.
    pub env: Vec<String>,
    /// Executable to launch.
    pub command: String,
}

/// Drives one session from upgrade request to disconnect.
pub struct SessionHandler {
    session: Session,
    config: Arc<GatewayConfig>,
    span: Span,
}

impl SessionHandler {
    /// Resolve everything the session needs.
    ///
    /// On error no handshake should take place; the error maps onto the
    /// HTTP response to send instead.
    pub async fn new<L: ReverseLookup>(
        config: Arc<GatewayConfig>,
        request: &Parts,
        peer_addr: &str,
        server: &ServerContext,
        lookup: &L,
    ) -> Result<Self, SessionError> {
        let id = SessionId::generate();
        let span = tracing::info_span!(
            "session",
            id = %id,
            remote = field::Empty,
            command = field::Empty,
            pid = field::Empty,
        );

        let session = Self::build(id, &config, request, peer_addr, server, lookup)
            .instrument(span.clone())
            .await?;

        Ok(Self {
            session,
            config,
            span,
        })
    }

    async fn build<L: ReverseLookup>(
        id: SessionId,
        config: &GatewayConfig,
        request: &Parts,
        peer_addr: &str,
        server: &ServerContext,
        lookup: &L,
    ) -> Result<Session, SessionError> {
        let remote_info = match resolve_remote_info(peer_addr, &request.headers, config, lookup).await {
            Ok(info) => info,
            Err(e) => {
                tracing::error!(peer = %peer_addr, error = %e, "Could not understand remote address");
                metrics::record_session("bad_address");
                return Err(e);
            }
        };
        Span::current().record("remote", remote_info.host.as_str());

        let url_info = match resolve_url(request.uri.path(), config) {
            Ok(info) => info,
            Err(e @ SessionError::ScriptNotFound { .. }) => {
                tracing::info!(target: "access", error = %e, "NOT FOUND");
                metrics::record_session("not_found");
                return Err(e);
            }
            Err(e) => {
                tracing::info!(target: "access", error = %e, "BAD REQUEST");
                metrics::record_session("bad_request");
                return Err(e);
            }
        };

        let command = if config.using_script_dir() {
            url_info.file_path.display().to_string()
        } else {
            config.command.name.clone()
        };
        Span::current().record("command", command.as_str());

        let mut session = Session {
            id,
            remote_info,
            url_info,
            env: Vec::new(),
            command,
        };
        session.env = build_env(&session, request, server, config);
        Ok(session)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn id(&self) -> SessionId {
        self.session.id
    }

    /// Run the session over an upgraded WebSocket until it ends.
    ///
    /// `ws` is closed exactly once before this returns, whatever happened.
    pub async fn accept<W: Endpoint>(self, acquisition: &ProcessAcquisition, mut ws: W) {
        let span = self.span.clone();
        async move {
            tracing::info!(target: "access", "CONNECT");
            self.run(acquisition, &mut ws).await;
            ws.close().await;
            tracing::info!(target: "access", "DISCONNECT");
        }
        .instrument(span)
        .await
    }

    async fn run<W: Endpoint>(&self, acquisition: &ProcessAcquisition, ws: &mut W) {
        let launch = LaunchSpec {
            command: &self.session.command,
            args: &self.config.command.args,
            env: &self.session.env,
        };

        let mut process = match acquisition.acquire(&launch, self.config.binary).await {
            Ok(process) => process,
            Err(e) => {
                tracing::error!(error = %e, "Could not start process");
                metrics::record_acquire_failure(&e);
                metrics::record_session("launch_failed");
                return;
            }
        };

        if let Some(pid) = process.pid() {
            Span::current().record("pid", pid);
        }
        if self.config.close_ms != 0 {
            process.add_close_time(Duration::from_millis(self.config.close_ms));
        }
        metrics::record_session("connected");

        pipe_endpoints(&mut process, ws).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::RendezvousListener;
    use crate::process::RENDEZVOUS_ACCEPT_TIMEOUT;
    use crate::pump::testing::channel_endpoint;
    use crate::session::env::SOCKET_ENV_VAR;
    use crate::session::remote::ReverseLookup;
    use axum::http::Request;
    use bytes::Bytes;
    use std::fs;
    use std::sync::atomic::Ordering;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::UnixStream;

    struct NoLookup;

    impl ReverseLookup for NoLookup {
        async fn lookup(&self, _addr: &str) -> Option<String> {
            None
        }
    }

    fn parts(uri: &str) -> Parts {
        Request::builder().uri(uri).body(()).unwrap().into_parts().0
    }

    fn server() -> ServerContext {
        ServerContext {
            local_addr: "127.0.0.1:8080".parse().unwrap(),
            tls: false,
        }
    }

    fn command_config(name: &str, args: &[&str]) -> Arc<GatewayConfig> {
        let mut config = GatewayConfig::default();
        config.command.name = name.into();
        config.command.args = args.iter().map(|a| a.to_string()).collect();
        Arc::new(config)
    }

    async fn handler(config: Arc<GatewayConfig>, uri: &str) -> Result<SessionHandler, SessionError> {
        SessionHandler::new(config, &parts(uri), "127.0.0.1:50000", &server(), &NoLookup).await
    }

    #[tokio::test]
    async fn static_command_session() {
        let handler = handler(command_config("cat", &[]), "/any/path").await.unwrap();
        let session = handler.session();

        assert_eq!(session.command, "cat");
        assert_eq!(session.url_info.path_info, "/any/path");
        assert_eq!(session.remote_info.addr, "127.0.0.1");
        assert_eq!(session.remote_info.port, "50000");
        assert!(session.env.contains(&format!("UNIQUE_ID={}", session.id)));
    }

    #[tokio::test]
    async fn script_dir_session_runs_the_script() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("greet"), "#!/bin/sh\n").unwrap();
        let mut config = GatewayConfig::default();
        config.script_dir = Some(dir.path().to_path_buf());

        let greet = handler(Arc::new(config.clone()), "/greet/extra").await.unwrap();
        assert_eq!(greet.session().command, dir.path().join("greet").display().to_string());
        assert_eq!(greet.session().url_info.path_info, "/extra");

        let err = handler_err(Arc::new(config.clone()), "/missing").await;
        assert!(matches!(err, SessionError::ScriptNotFound { .. }));

        fs::write(dir.path().join("hi there"), "#!/bin/sh\n").unwrap();
        let handler = handler(Arc::new(config), "/hi%20there/p%20q").await.unwrap();
        let session = handler.session();
        assert_eq!(session.command, dir.path().join("hi there").display().to_string());
        assert!(session.env.contains(&"SCRIPT_NAME=/hi there".to_string()));
        assert!(session.env.contains(&"PATH_INFO=/p q".to_string()));
    }

    async fn handler_err(config: Arc<GatewayConfig>, uri: &str) -> SessionError {
        match handler(config, uri).await {
            Ok(_) => panic!("expected {uri} to be rejected"),
            Err(e) => e,
        }
    }

    #[tokio::test]
    async fn unparseable_peer_is_rejected() {
        let result = SessionHandler::new(command_config("cat", &[]), &parts("/"), "no-port", &server(), &NoLookup).await;
        assert!(matches!(result, Err(SessionError::AddressFormat { .. })));
    }

    #[tokio::test]
    async fn sessions_get_distinct_ids() {
        let config = command_config("cat", &[]);
        let a = handler(config.clone(), "/").await.unwrap();
        let b = handler(config, "/").await.unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn launch_failure_still_closes_websocket_once() {
        let handler = handler(command_config("/definitely/not/a/program", &[]), "/").await.unwrap();
        let (ws, peer) = channel_endpoint();

        handler.accept(&ProcessAcquisition::DirectSpawn, ws).await;
        assert_eq!(peer.close_count(), 1);
    }

    #[tokio::test]
    async fn bridges_messages_until_client_leaves() {
        let handler = handler(command_config("cat", &[]), "/").await.unwrap();
        let (ws, mut peer) = channel_endpoint();
        let closes = peer.closes.clone();

        let session = tokio::spawn(async move {
            handler.accept(&ProcessAcquisition::DirectSpawn, ws).await;
        });

        peer.inject.send(Bytes::from_static(b"ping")).await.unwrap();
        assert_eq!(peer.received.recv().await.unwrap(), "ping");

        drop(peer.inject);
        session.await.unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    fn rendezvous_config(socket: &std::path::Path, name: &str, args: &[&str]) -> Arc<GatewayConfig> {
        let mut config = (*command_config(name, args)).clone();
        config.unix_socket = Some(socket.to_path_buf());
        Arc::new(config)
    }

    #[tokio::test(start_paused = true)]
    async fn rendezvous_timeout_still_closes_websocket_once() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("s.sock");
        let listener = Arc::new(RendezvousListener::bind(&socket).unwrap());
        let acquisition = ProcessAcquisition::RendezvousAccept(listener);

        // Exits without ever connecting back.
        let handler = handler(rendezvous_config(&socket, "true", &[]), "/").await.unwrap();
        let (ws, peer) = channel_endpoint();

        let started = tokio::time::Instant::now();
        handler.accept(&acquisition, ws).await;
        assert!(started.elapsed() >= RENDEZVOUS_ACCEPT_TIMEOUT);
        assert_eq!(peer.close_count(), 1);
    }

    #[tokio::test]
    async fn rendezvous_session_bridges_child_connection() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("s.sock");
        let listener = Arc::new(RendezvousListener::bind(&socket).unwrap());
        let acquisition = ProcessAcquisition::RendezvousAccept(listener);

        let handler = handler(rendezvous_config(&socket, "sleep", &["30"]), "/").await.unwrap();
        let advertised = handler
            .session()
            .env
            .iter()
            .find_map(|kv| kv.strip_prefix(&format!("{SOCKET_ENV_VAR}=")))
            .map(std::path::PathBuf::from)
            .unwrap();
        assert_eq!(advertised, socket);

        let (ws, mut peer) = channel_endpoint();
        let closes = peer.closes.clone();
        let session = tokio::spawn(async move {
            handler.accept(&acquisition, ws).await;
        });

        // Plays the child's part: dial the advertised socket.
        let mut child = UnixStream::connect(&advertised).await.unwrap();
        child.write_all(b"from child\n").await.unwrap();
        assert_eq!(peer.received.recv().await.unwrap(), "from child");

        peer.inject.send(Bytes::from_static(b"to child")).await.unwrap();
        let mut line = String::new();
        BufReader::new(&mut child).read_line(&mut line).await.unwrap();
        assert_eq!(line, "to child\n");

        // The connection closing ends the session; `sleep` is then signalled away.
        drop(child);
        session.await.unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn process_exit_ends_session() {
        let handler = handler(command_config("sh", &["-c", "echo bye"]), "/").await.unwrap();
        let (ws, mut peer) = channel_endpoint();

        handler.accept(&ProcessAcquisition::DirectSpawn, ws).await;

        assert_eq!(peer.received.recv().await.unwrap(), "bye");
        assert_eq!(peer.close_count(), 1);
    }
}
