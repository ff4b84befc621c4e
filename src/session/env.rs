//! Process environment for a session.
//!
//! Children see a CGI-style environment describing the request, the
//! caller and the matched script. Nothing else from the gateway's own
//! environment leaks through except the `pass_env` names.

use std::net::SocketAddr;

use axum::http::request::Parts;
use axum::http::header::HOST;

use crate::config::GatewayConfig;
use crate::session::handler::Session;
use crate::session::remote::split_host_port;

/// Variable telling rendezvous-mode children where to connect.
pub const SOCKET_ENV_VAR: &str = "WS_GATEWAY_SOCKET";

const SERVER_SOFTWARE: &str = concat!("ws-gateway/", env!("CARGO_PKG_VERSION"));
const GATEWAY_INTERFACE: &str = "websocket-CGI/0.1";

/// Facts about the listener a request arrived on.
#[derive(Debug, Clone, Copy)]
pub struct ServerContext {
    pub local_addr: SocketAddr,
    pub tls: bool,
}

/// Assemble the full environment for `session`, as `KEY=VALUE` strings.
pub fn build_env(
    session: &Session,
    request: &Parts,
    server: &ServerContext,
    config: &GatewayConfig,
) -> Vec<String> {
    let mut env = Vec::new();
    let mut set = |key: &str, value: &str| env.push(format!("{key}={value}"));

    for name in &config.pass_env {
        if let Ok(value) = std::env::var(name) {
            set(name, &value);
        }
    }
    for (key, value) in &config.env {
        set(key, value);
    }

    let server_name = request
        .headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .map(|host| match split_host_port(host) {
            Ok((name, _)) => name.to_string(),
            Err(_) => host.to_string(),
        })
        .unwrap_or_else(|| server.local_addr.ip().to_string());

    let uri = &request.uri;
    let request_uri = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());

    set("SERVER_SOFTWARE", SERVER_SOFTWARE);
    set("GATEWAY_INTERFACE", GATEWAY_INTERFACE);
    set("SERVER_NAME", &server_name);
    set("SERVER_PORT", &server.local_addr.port().to_string());
    set("SERVER_PROTOCOL", &format!("{:?}", request.version));
    set("REQUEST_METHOD", request.method.as_str());
    set("REQUEST_URI", request_uri);
    set("QUERY_STRING", uri.query().unwrap_or(""));
    set("SCRIPT_NAME", &session.url_info.script_path);
    set("PATH_INFO", &session.url_info.path_info);
    if let Some(root) = &config.script_dir {
        if !session.url_info.path_info.is_empty() {
            let translated = root.join(session.url_info.path_info.trim_start_matches('/'));
            set("PATH_TRANSLATED", &translated.display().to_string());
        }
    }
    set("REMOTE_ADDR", &session.remote_info.addr);
    set("REMOTE_HOST", &session.remote_info.host);
    set("REMOTE_PORT", &session.remote_info.port);
    set("UNIQUE_ID", &session.id.to_string());
    if server.tls {
        set("HTTPS", "on");
    }
    if let Some(path) = &config.unix_socket {
        set(SOCKET_ENV_VAR, &path.display().to_string());
    }

    for name in request.headers.keys() {
        let values: Vec<String> = request
            .headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect();
        let key = format!("HTTP_{}", name.as_str().to_ascii_uppercase().replace('-', "_"));
        set(&key, &values.join(", "));
    }

    env
}
