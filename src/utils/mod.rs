//! Configuration and process-level utilities.

/// Tracing subscriber initialisation.
pub mod logging;
/// TOML configuration with environment overrides.
pub mod toml_config;
