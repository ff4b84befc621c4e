//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the upgrade handler
//! - Wire up middleware (tracing)
//! - Bind the rendezvous socket when configured
//! - Serve plain or TLS, with graceful shutdown
//! - Turn each upgrade request into a session

use axum::{
    extract::{ws::WebSocketUpgrade, ConnectInfo, FromRequestParts, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::http::websocket::WebSocketEndpoint;
use crate::net::tls::load_tls_config;
use crate::net::{ForkLimiter, RendezvousListener};
use crate::observability::metrics;
use crate::process::ProcessAcquisition;
use crate::session::{DnsReverseLookup, ServerContext, SessionHandler};

/// How long in-flight TLS connections get to finish on shutdown.
const TLS_DRAIN: Duration = Duration::from_secs(10);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub acquisition: Arc<ProcessAcquisition>,
    pub forks: ForkLimiter,
    pub lookup: Arc<DnsReverseLookup>,
    pub server: ServerContext,
}

/// Startup failures.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("could not bind rendezvous socket {path:?}: {source}")]
    Rendezvous {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TLS setup failed: {0}")]
    Tls(#[source] std::io::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The WebSocket gateway.
pub struct GatewayServer {
    config: Arc<GatewayConfig>,
}

impl GatewayServer {
    /// Create a new server with the given configuration.
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(session_handler))
            .route("/", any(session_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server on `listener` until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;

        let rendezvous = match &self.config.unix_socket {
            Some(path) => Some(Arc::new(RendezvousListener::bind(path).map_err(|source| {
                ServerError::Rendezvous {
                    path: path.clone(),
                    source,
                }
            })?)),
            None => None,
        };

        let state = AppState {
            config: self.config.clone(),
            acquisition: Arc::new(ProcessAcquisition::new(rendezvous)),
            forks: ForkLimiter::new(self.config.max_forks),
            lookup: Arc::new(DnsReverseLookup::from_system()),
            server: ServerContext {
                local_addr,
                tls: self.config.listener.tls.is_some(),
            },
        };

        tracing::info!(
            address = %local_addr,
            command = %self.config.command.name,
            script_dir = ?self.config.script_dir,
            rendezvous = self.config.unix_socket_mode(),
            max_forks = self.config.max_forks,
            "Gateway starting"
        );

        let app = Self::build_router(state).into_make_service_with_connect_info::<SocketAddr>();

        match &self.config.listener.tls {
            None => {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = shutdown.recv().await;
                    })
                    .await?;
            }
            Some(tls) => {
                let rustls = load_tls_config(tls).await.map_err(ServerError::Tls)?;
                let handle = axum_server::Handle::new();
                tokio::spawn({
                    let handle = handle.clone();
                    async move {
                        let _ = shutdown.recv().await;
                        handle.graceful_shutdown(Some(TLS_DRAIN));
                    }
                });
                axum_server::from_tcp_rustls(listener.into_std()?, rustls)
                    .handle(handle)
                    .serve(app)
                    .await?;
            }
        }

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

/// Upgrade handler: resolve the session, then bridge it after the handshake.
async fn session_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let (mut parts, _body) = request.into_parts();

    let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            tracing::debug!(path = %parts.uri.path(), %rejection, "Not a WebSocket upgrade");
            return (StatusCode::UPGRADE_REQUIRED, "426 Upgrade Required").into_response();
        }
    };

    let Some(permit) = state.forks.try_acquire() else {
        tracing::warn!(peer = %peer, max_forks = state.forks.max_forks(), "Process limit reached");
        metrics::record_session("max_forks");
        return (StatusCode::TOO_MANY_REQUESTS, "429 Too Many Requests").into_response();
    };
    tracing::debug!(peer = %peer, free_slots = ?state.forks.available(), "Process slot claimed");

    let handler = match SessionHandler::new(
        state.config.clone(),
        &parts,
        &peer.to_string(),
        &state.server,
        state.lookup.as_ref(),
    )
    .await
    {
        Ok(handler) => handler,
        Err(e) => return e.into_response(),
    };

    let acquisition = state.acquisition.clone();
    let binary = state.config.binary;
    upgrade
        .on_failed_upgrade(|e| tracing::warn!(error = %e, "WebSocket handshake failed"))
        .on_upgrade(move |socket| async move {
            handler.accept(&acquisition, WebSocketEndpoint::new(socket, binary)).await;
            drop(permit);
        })
}
