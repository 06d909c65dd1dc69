//! Drone Configuration Module
//!
//! Startup parameters loaded from TOML, with every value defaulted.
//!
//! ## Loading Order
//!
//! 1. `--config <path>` on the command line
//! 2. `DRONE_CONFIG` environment variable (path to TOML file)
//! 3. `drone_config.toml` in the current working directory
//! 4. Built-in defaults
//!
//! Command-line overrides are applied on top, then the result is validated.
//!
//! ## Usage
//!
//! ```ignore
//! // In main():
//! config::init(DroneConfig::load(args.config.as_deref())?);
//!
//! // Anywhere else:
//! let capacity = config::get().aggregation.window_capacity;
//! ```

mod drone_config;
pub mod defaults;
pub mod validation;

pub use drone_config::*;

use std::sync::OnceLock;

/// Global drone configuration, initialized once at startup.
static DRONE_CONFIG: OnceLock<DroneConfig> = OnceLock::new();

/// Install the global configuration. Later calls are ignored with a warning.
pub fn init(config: DroneConfig) {
    if DRONE_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Global configuration.
///
/// Falls back to the built-in defaults if [`init`] was never called, which
/// only happens in tests and embedding code.
pub fn get() -> &'static DroneConfig {
    static FALLBACK: OnceLock<DroneConfig> = OnceLock::new();
    DRONE_CONFIG
        .get()
        .unwrap_or_else(|| FALLBACK.get_or_init(DroneConfig::default))
}
