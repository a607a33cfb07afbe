//! Domain-driven configuration for the Talawa admin plugin system
//!
//! Configuration is split by functional domain, each with its own defaults
//! and validation, and can be loaded from YAML with `TALAWA_*` environment
//! overrides.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

// Re-export domain configurations
pub use domains::{logging::LoggingConfig, plugins::PluginConfig, TalawaConfig};
