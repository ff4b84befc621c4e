//! Session construction errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Why a session could not be created for an upgrade request.
///
/// These are ordinary per-request outcomes: the HTTP layer answers with the
/// matching status and no WebSocket handshake takes place.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The transport peer address is not `host:port`.
    ///
    /// The address comes from our own listener, not the client, so this is a
    /// server-side failure (500).
    #[error("could not understand remote address {addr:?}: {reason}")]
    AddressFormat { addr: String, reason: &'static str },

    /// The URL does not name a script under the script directory.
    #[error("script not found for {path:?}")]
    ScriptNotFound { path: String },

    /// The request carries something the session can't be built from.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl SessionError {
    pub fn status(&self) -> StatusCode {
        match self {
            SessionError::AddressFormat { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            SessionError::ScriptNotFound { .. } => StatusCode::NOT_FOUND,
            SessionError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match status {
            StatusCode::NOT_FOUND => "404 Not Found",
            StatusCode::BAD_REQUEST => "400 Bad Request",
            _ => "500 Internal Server Error",
        };
        (status, body).into_response()
    }
}
