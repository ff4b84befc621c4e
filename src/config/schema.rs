//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Static command run for every session. Ignored when `script_dir` is set.
    pub command: CommandConfig,

    /// Directory of scripts selected by URL path.
    pub script_dir: Option<PathBuf>,

    /// Trusted header whose value replaces the transport address.
    ///
    /// Only set this behind a reverse proxy that overwrites the header;
    /// any client can send it otherwise.
    pub remote_header: Option<String>,

    /// Resolve the client address to a host name.
    pub reverse_lookup: bool,

    /// Path of the rendezvous socket. Children connect back here instead of
    /// inheriting pipes.
    pub unix_socket: Option<PathBuf>,

    /// Extra linger after end-of-stream before a process is torn down.
    pub close_ms: u64,

    /// Exchange raw binary frames instead of text lines.
    pub binary: bool,

    /// Maximum concurrently running processes (0 = unlimited).
    pub max_forks: usize,

    /// Variables copied from the gateway's own environment into children.
    pub pass_env: Vec<String>,

    /// Extra variables set on every child.
    pub env: BTreeMap<String, String>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            command: CommandConfig::default(),
            script_dir: None,
            remote_header: None,
            reverse_lookup: false,
            unix_socket: None,
            close_ms: 0,
            binary: false,
            max_forks: 0,
            pass_env: default_pass_env(),
            env: BTreeMap::new(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// True when sessions are routed to scripts under `script_dir`.
    pub fn using_script_dir(&self) -> bool {
        self.script_dir.is_some()
    }

    /// True when processes are acquired through the rendezvous socket.
    pub fn unix_socket_mode(&self) -> bool {
        self.unix_socket.is_some()
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// The static command and its arguments.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CommandConfig {
    /// Program to execute.
    pub name: String,

    /// Arguments passed to every launch, also in script-dir mode.
    pub args: Vec<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Parent variables forwarded to children unless overridden.
pub fn default_pass_env() -> Vec<String> {
    ["PATH", "DYLD_LIBRARY_PATH", "LD_LIBRARY_PATH"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
