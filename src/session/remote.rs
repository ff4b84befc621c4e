//! Caller identity for a session.
//!
//! # Responsibilities
//! - Split the transport peer address into address and port
//! - Apply the trusted remote-address header, when configured
//! - Optionally resolve the address to a host name
//!
//! # Design Decisions
//! - Reverse lookup failures fall back to the address and are never fatal
//! - The port always comes from the transport, never from a header
//! - No caching or retries; each session resolves once

use std::future::Future;
use std::net::IpAddr;

use axum::http::HeaderMap;
use hickory_resolver::TokioResolver;

use crate::config::GatewayConfig;
use crate::session::error::SessionError;

/// Who is on the other end of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteInfo {
    /// Caller address, possibly taken from the trusted header.
    pub addr: String,
    /// Reverse-resolved name, or `addr` when lookup is off or fails.
    pub host: String,
    /// Caller source port as reported by the transport.
    pub port: String,
}

/// Resolves an address to a host name.
pub trait ReverseLookup: Send + Sync {
    /// First name for `addr`, or `None` if there is none or lookup failed.
    fn lookup(&self, addr: &str) -> impl Future<Output = Option<String>> + Send;
}

/// Reverse lookup through the system's DNS configuration.
#[derive(Clone)]
pub struct DnsReverseLookup {
    resolver: Option<TokioResolver>,
}

impl DnsReverseLookup {
    /// Build a resolver from the system configuration.
    ///
    /// If that configuration can't be read, every lookup yields `None`.
    pub fn from_system() -> Self {
        let resolver = match TokioResolver::builder_tokio() {
            Ok(builder) => Some(builder.build()),
            Err(e) => {
                tracing::warn!(error = %e, "DNS resolver unavailable, reverse lookups disabled");
                None
            }
        };
        Self { resolver }
    }
}

impl ReverseLookup for DnsReverseLookup {
    async fn lookup(&self, addr: &str) -> Option<String> {
        let resolver = self.resolver.as_ref()?;
        let ip: IpAddr = addr.parse().ok()?;
        match resolver.reverse_lookup(ip).await {
            Ok(names) => names
                .iter()
                .next()
                .map(|name| name.to_string().trim_end_matches('.').to_string())
                .filter(|name| !name.is_empty()),
            Err(e) => {
                tracing::debug!(addr = %addr, error = %e, "Reverse lookup failed");
                None
            }
        }
    }
}

/// Split `host:port`, accepting bracketed IPv6 hosts.
pub fn split_host_port(addr: &str) -> Result<(&str, &str), &'static str> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, after) = rest.split_once(']').ok_or("missing ']' in address")?;
        let port = after.strip_prefix(':').ok_or("missing port in address")?;
        return Ok((host, port));
    }

    let (host, port) = addr.rsplit_once(':').ok_or("missing port in address")?;
    if host.contains(':') {
        return Err("too many colons in address");
    }
    Ok((host, port))
}

/// Build the [`RemoteInfo`] for a request arriving from `peer_addr`.
pub async fn resolve_remote_info<L: ReverseLookup>(
    peer_addr: &str,
    headers: &HeaderMap,
    config: &GatewayConfig,
    lookup: &L,
) -> Result<RemoteInfo, SessionError> {
    let (addr, port) = split_host_port(peer_addr).map_err(|reason| SessionError::AddressFormat {
        addr: peer_addr.to_string(),
        reason,
    })?;
    let mut addr = addr.to_string();

    if let Some(name) = &config.remote_header {
        if let Some(value) = headers.get(name.as_str()) {
            let value = value.to_str().map_err(|_| {
                SessionError::InvalidRequest(format!("{name} header is not valid text"))
            })?;
            if !value.is_empty() {
                addr = value.to_string();
            }
        }
    }

    let host = if config.reverse_lookup {
        lookup.lookup(&addr).await.unwrap_or_else(|| addr.clone())
    } else {
        addr.clone()
    };

    Ok(RemoteInfo {
        addr,
        host,
        port: port.to_string(),
    })
}
