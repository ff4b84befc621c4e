//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → cli.rs (flags override file values)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to every session
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; nothing reads process-wide globals
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

pub use cli::Cli;
pub use loader::{load_config, ConfigError};
pub use schema::GatewayConfig;
pub use schema::{CommandConfig, ListenerConfig, ObservabilityConfig, TlsConfig};
pub use validation::{validate_config, ValidationError};
