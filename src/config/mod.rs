//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → CLI / environment overrides (main.rs)
//!     → ServiceConfig (validated, immutable)
//!     → handed to startup, which builds every subsystem from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_str, ConfigError};
pub use schema::ServiceConfig;
pub use schema::{
    GameConfig, InstrumentNames, ListenerConfig, LoggingConfig, SecurityConfig, TelemetryConfig,
    TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
