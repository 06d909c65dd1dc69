//! Drone Configuration - startup parameters as TOML values
//!
//! Every section and key has a serde default, so an empty file (or no file)
//! yields the built-in defaults from [`super::defaults`].

use super::defaults;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "DRONE_CONFIG";

/// Config file picked up from the working directory.
pub const LOCAL_CONFIG_FILE: &str = "drone_config.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one edge aggregator.
///
/// Load with `DroneConfig::load()` which searches:
/// 1. an explicit path (`--config`)
/// 2. `$DRONE_CONFIG`
/// 3. `./drone_config.toml`
/// 4. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DroneConfig {
    #[serde(default)]
    pub drone: DroneInfo,

    /// Sensor ingestion endpoint
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Central collector endpoint
    #[serde(default)]
    pub collector: CollectorConfig,

    #[serde(default)]
    pub battery: BatteryConfig,

    #[serde(default)]
    pub forwarding: ForwardingConfig,

    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// HTTP control surface
    #[serde(default)]
    pub control: ControlConfig,
}

impl DroneConfig {
    /// Load configuration using the standard search order.
    ///
    /// A file that was named explicitly (argument or env var) must exist and
    /// be valid. The local file is optional but must be valid if present.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        // 1. Explicit path
        if let Some(path) = explicit {
            let config = Self::load_from_file(path)?;
            info!(path = %path.display(), drone = %config.drone.name, "Loaded drone config");
            return Ok(config);
        }

        // 2. Env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(path);
            let config = Self::load_from_file(&path)?;
            info!(path = %path.display(), drone = %config.drone.name, "Loaded drone config from DRONE_CONFIG");
            return Ok(config);
        }

        // 3. ./drone_config.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            let config = Self::load_from_file(&local)?;
            info!(drone = %config.drone.name, "Loaded drone config from ./drone_config.toml");
            return Ok(config);
        }

        // 4. Defaults
        info!("No drone_config.toml found, using built-in defaults");
        Ok(Self::default())
    }

    /// Load and validate a specific TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate TOML text. Unknown keys are logged, not rejected.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Apply command-line overrides on top of file values.
    ///
    /// The result is not validated here; call [`validate`](Self::validate)
    /// afterwards.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(port) = overrides.drone_port {
            self.listener.addr = replace_port(&self.listener.addr, port);
        }
        if let Some(ref ip) = overrides.central_ip {
            self.collector.addr = replace_host(&self.collector.addr, ip);
        }
        if let Some(port) = overrides.central_port {
            self.collector.addr = replace_port(&self.collector.addr, port);
        }
        if let Some(threshold) = overrides.battery_threshold {
            self.battery.threshold = threshold;
        }
        if let Some(interval) = overrides.forward_interval_secs {
            self.forwarding.interval_secs = interval;
        }
        if let Some(capacity) = overrides.rolling_window {
            self.aggregation.window_capacity = capacity;
        }
    }

    /// Validate all values. Any error here is fatal at startup.
    ///
    /// Rules:
    /// - Window capacity must be > 0
    /// - Battery threshold must be finite and within [0, 100]
    /// - Drain must be finite and >= 0
    /// - Periods and timeouts must be finite and > 0
    /// - Socket addresses must parse
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.aggregation.window_capacity == 0 {
            errors.push("aggregation.window_capacity: must be > 0".to_string());
        }

        let threshold = self.battery.threshold;
        if !threshold.is_finite() || !(0.0..=100.0).contains(&threshold) {
            errors.push(format!(
                "battery.threshold: must be within [0, 100] (got {threshold})"
            ));
        }

        let drain = self.battery.drain_per_tick;
        if !drain.is_finite() || drain <= 0.0 {
            errors.push(format!(
                "battery.drain_per_tick: must be finite and > 0 (got {drain})"
            ));
        }

        Self::check_period(self.battery.tick_secs, "battery.tick_secs", &mut errors);
        Self::check_period(
            self.forwarding.interval_secs,
            "forwarding.interval_secs",
            &mut errors,
        );
        Self::check_period(
            self.collector.timeout_secs,
            "collector.timeout_secs",
            &mut errors,
        );

        if self.forwarding.queue_warn_len == 0 {
            errors.push("forwarding.queue_warn_len: must be > 0".to_string());
        }

        Self::check_addr(&self.listener.addr, "listener.addr", &mut errors);
        Self::check_addr(&self.collector.addr, "collector.addr", &mut errors);
        if self.control.enabled {
            Self::check_addr(&self.control.addr, "control.addr", &mut errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_period(secs: f64, name: &str, errors: &mut Vec<String>) {
        let max = defaults::MAX_PERIOD_SECS;
        match Duration::try_from_secs_f64(secs) {
            Ok(period) if period >= defaults::MIN_PERIOD && secs <= max => {}
            _ => errors.push(format!(
                "{name}: must be between {}ms and {max}s (got {secs})",
                defaults::MIN_PERIOD.as_millis()
            )),
        }
    }

    fn check_addr(addr: &str, name: &str, errors: &mut Vec<String>) {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(format!("{name}: '{addr}' is not a valid socket address"));
        }
    }

    /// Sensor listener address. Valid after [`validate`](Self::validate).
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_addr(&self.listener.addr, "listener.addr")
    }

    pub fn collector_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_addr(&self.collector.addr, "collector.addr")
    }

    pub fn control_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_addr(&self.control.addr, "control.addr")
    }
}

fn parse_addr(addr: &str, name: &str) -> Result<SocketAddr, ConfigError> {
    addr.parse().map_err(|_| {
        ConfigError::Validation(vec![format!(
            "{name}: '{addr}' is not a valid socket address"
        )])
    })
}

/// Seconds as a `Duration`, or `fallback` when out of the range `validate`
/// accepts. Keeps an unvalidated config from panicking the timers.
fn period_or(secs: f64, fallback: f64) -> Duration {
    match Duration::try_from_secs_f64(secs) {
        Ok(period) if period >= defaults::MIN_PERIOD && secs <= defaults::MAX_PERIOD_SECS => {
            period
        }
        _ => Duration::from_secs_f64(fallback),
    }
}

/// Replace the port of a `host:port` string, keeping the host.
fn replace_port(addr: &str, port: u16) -> String {
    match addr.rsplit_once(':') {
        Some((host, _)) => format!("{host}:{port}"),
        None => format!("{addr}:{port}"),
    }
}

/// Replace the host of a `host:port` string, keeping the port.
fn replace_host(addr: &str, host: &str) -> String {
    let port = addr.rsplit_once(':').map(|(_, p)| p).unwrap_or("0");
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Values supplied on the command line, applied over the file config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub drone_port: Option<u16>,
    pub central_ip: Option<String>,
    pub central_port: Option<u16>,
    pub battery_threshold: Option<f64>,
    pub forward_interval_secs: Option<f64>,
    pub rolling_window: Option<usize>,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config parse error ({}): {1}", .0.display())]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(#[source] toml::ser::Error),

    #[error("Config validation failed:{}", bullet_list(.0))]
    Validation(Vec<String>),
}

fn bullet_list(errors: &[String]) -> String {
    errors.iter().map(|e| format!("\n  - {e}")).collect()
}

// ============================================================================
// Sections
// ============================================================================

/// Identification only; not used for logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroneInfo {
    #[serde(default = "default_drone_name")]
    pub name: String,
}

fn default_drone_name() -> String {
    defaults::DRONE_NAME.to_string()
}

impl Default for DroneInfo {
    fn default() -> Self {
        Self {
            name: default_drone_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerConfig {
    #[serde(default = "default_listen_addr")]
    pub addr: String,
}

fn default_listen_addr() -> String {
    defaults::LISTEN_ADDR.to_string()
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            addr: default_listen_addr(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    #[serde(default = "default_collector_addr")]
    pub addr: String,

    /// Bound on connect + write of one batch (seconds)
    #[serde(default = "default_collector_timeout")]
    pub timeout_secs: f64,
}

fn default_collector_addr() -> String {
    defaults::COLLECTOR_ADDR.to_string()
}
fn default_collector_timeout() -> f64 { defaults::COLLECTOR_TIMEOUT_SECS }

impl CollectorConfig {
    pub fn timeout(&self) -> Duration {
        period_or(self.timeout_secs, defaults::COLLECTOR_TIMEOUT_SECS)
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            addr: default_collector_addr(),
            timeout_secs: default_collector_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryConfig {
    /// Initial return-to-base threshold (percent)
    #[serde(default = "default_battery_threshold")]
    pub threshold: f64,

    /// Level lost per tick (percent)
    #[serde(default = "default_drain_per_tick")]
    pub drain_per_tick: f64,

    #[serde(default = "default_battery_tick")]
    pub tick_secs: f64,
}

fn default_battery_threshold() -> f64 { defaults::BATTERY_THRESHOLD }
fn default_drain_per_tick() -> f64 { defaults::BATTERY_DRAIN_PER_TICK }
fn default_battery_tick() -> f64 { defaults::BATTERY_TICK_SECS }

impl BatteryConfig {
    pub fn tick(&self) -> Duration {
        period_or(self.tick_secs, defaults::BATTERY_TICK_SECS)
    }
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            threshold: default_battery_threshold(),
            drain_per_tick: default_drain_per_tick(),
            tick_secs: default_battery_tick(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardingConfig {
    #[serde(default = "default_forward_interval")]
    pub interval_secs: f64,

    /// Forward anomalies in the batch alongside summaries
    #[serde(default = "default_true")]
    pub include_anomalies: bool,

    /// Warn each time the forward queue grows by this many entries
    #[serde(default = "default_queue_warn_len")]
    pub queue_warn_len: usize,
}

fn default_forward_interval() -> f64 { defaults::FORWARD_INTERVAL_SECS }
fn default_queue_warn_len() -> usize { defaults::QUEUE_WARN_LEN }
fn default_true() -> bool { true }

impl ForwardingConfig {
    pub fn interval(&self) -> Duration {
        period_or(self.interval_secs, defaults::FORWARD_INTERVAL_SECS)
    }
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_forward_interval(),
            include_anomalies: true,
            queue_warn_len: default_queue_warn_len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationConfig {
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,
}

fn default_window_capacity() -> usize { defaults::WINDOW_CAPACITY }

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            window_capacity: default_window_capacity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_control_addr")]
    pub addr: String,
}

fn default_control_addr() -> String {
    defaults::CONTROL_ADDR.to_string()
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: default_control_addr(),
        }
    }
}
