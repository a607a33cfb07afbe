//! Structured logging setup for the Talawa admin plugin system
//!
//! All crates in the workspace log through `tracing` with per-component
//! targets (`plugin_manager`, `plugin_registry`, `plugin_loader`, ...).
//! This crate installs the global subscriber from [`LoggingConfig`].

pub mod init;

pub use init::{build_env_filter, build_layers, init_logging_from_config, init_simple_tracing, LoggingGuard};
pub use talawa_config::LoggingConfig;
