//! Command-line flags, merged over the config file.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

use crate::config::loader::{read_config, ConfigError};
use crate::config::schema::{GatewayConfig, TlsConfig};
use crate::config::validation::validate_config;

#[derive(Debug, Parser)]
#[command(name = "ws-gateway", version)]
#[command(about = "Expose a command-line program as a WebSocket endpoint", long_about = None)]
pub struct Cli {
    /// TOML configuration file; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Interface to bind to
    #[arg(long)]
    pub address: Option<IpAddr>,

    /// Port to listen on
    #[arg(long)]
    pub port: Option<u16>,

    /// Serve scripts from this directory, selected by URL path
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Exchange binary frames instead of text lines
    #[arg(long)]
    pub binary: bool,

    /// Extra milliseconds to let a process drain after end-of-stream
    #[arg(long = "closems")]
    pub close_ms: Option<u64>,

    /// Resolve client addresses to host names
    #[arg(long = "reverselookup")]
    pub reverse_lookup: bool,

    /// Maximum number of concurrently running processes
    #[arg(long = "maxforks")]
    pub max_forks: Option<usize>,

    /// Trusted header carrying the real client address
    #[arg(long = "remote-header")]
    pub remote_header: Option<String>,

    /// Rendezvous socket children connect back to instead of using pipes
    #[arg(long = "unix-socket")]
    pub unix_socket: Option<PathBuf>,

    /// Comma-separated variables passed through from this environment
    #[arg(long = "passenv", value_delimiter = ',')]
    pub pass_env: Option<Vec<String>>,

    /// Serve over TLS
    #[arg(long, requires_all = ["ssl_cert", "ssl_key"])]
    pub ssl: bool,

    /// TLS certificate (PEM)
    #[arg(long = "sslcert")]
    pub ssl_cert: Option<String>,

    /// TLS private key (PEM)
    #[arg(long = "sslkey")]
    pub ssl_key: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long = "loglevel")]
    pub log_level: Option<String>,

    /// Expose Prometheus metrics on this address
    #[arg(long = "metrics-address")]
    pub metrics_address: Option<String>,

    /// Program to run and its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl Cli {
    /// Build the effective configuration: file (or defaults), then flags, then validation.
    pub fn load(self) -> Result<GatewayConfig, ConfigError> {
        let base = match &self.config {
            Some(path) => read_config(path)?,
            None => GatewayConfig::default(),
        };
        let config = self.apply(base);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    /// Overlay the flags that were given onto `config`.
    pub fn apply(self, mut config: GatewayConfig) -> GatewayConfig {
        if self.address.is_some() || self.port.is_some() {
            let mut bind: SocketAddr = config
                .listener
                .bind_address
                .parse()
                .unwrap_or_else(|_| SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080));
            if let Some(ip) = self.address {
                bind.set_ip(ip);
            }
            if let Some(port) = self.port {
                bind.set_port(port);
            }
            config.listener.bind_address = bind.to_string();
        }

        if let Some(dir) = self.dir {
            config.script_dir = Some(dir);
        }
        if let Some((name, args)) = self.command.split_first() {
            config.command.name = name.clone();
            config.command.args = args.to_vec();
        }

        config.binary |= self.binary;
        config.reverse_lookup |= self.reverse_lookup;
        if let Some(ms) = self.close_ms {
            config.close_ms = ms;
        }
        if let Some(max) = self.max_forks {
            config.max_forks = max;
        }
        if let Some(header) = self.remote_header {
            config.remote_header = Some(header);
        }
        if let Some(path) = self.unix_socket {
            config.unix_socket = Some(path);
        }
        if let Some(vars) = self.pass_env {
            config.pass_env = vars;
        }

        if self.ssl {
            if let (Some(cert_path), Some(key_path)) = (self.ssl_cert, self.ssl_key) {
                config.listener.tls = Some(TlsConfig { cert_path, key_path });
            }
        }

        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
        if let Some(addr) = self.metrics_address {
            config.observability.metrics_enabled = true;
            config.observability.metrics_address = addr;
        }

        config
    }
}
