//! Config Validation Tests
//!
//! Loading from disk, typo detection, fatal validation errors and
//! command-line overrides, exercised through the public config API.

use drone_edge::config::validation::{known_config_keys, suggest_correction, validate_unknown_keys};
use drone_edge::config::{ConfigError, ConfigOverrides, DroneConfig};
use std::io::Write;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn explicit_file_is_loaded() {
    let file = write_config(
        r#"
[drone]
name = "ridge-survey"

[listener]
addr = "127.0.0.1:5100"

[forwarding]
interval_secs = 2.0
"#,
    );
    let config = DroneConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.drone.name, "ridge-survey");
    assert_eq!(config.listen_addr().unwrap().port(), 5100);
    assert_eq!(config.forwarding.interval_secs, 2.0);
    assert_eq!(config.collector.addr, "127.0.0.1:6000");
}

#[test]
fn missing_explicit_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let err = DroneConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
    assert!(matches!(err, ConfigError::Io(..)));
}

#[test]
fn malformed_toml_reports_path() {
    let file = write_config("[battery\nthreshold = 20");
    let err = DroneConfig::load_from_file(file.path()).unwrap_err();
    match err {
        ConfigError::Parse(path, _) => assert_eq!(path, file.path()),
        other => panic!("expected parse error, got {other}"),
    }
}

#[test]
fn negative_capacity_is_rejected_at_parse() {
    let file = write_config("[aggregation]\nwindow_capacity = -5\n");
    assert!(matches!(
        DroneConfig::load_from_file(file.path()),
        Err(ConfigError::Parse(..))
    ));
}

#[test]
fn zero_capacity_is_fatal_validation_error() {
    let file = write_config("[aggregation]\nwindow_capacity = 0\n");
    match DroneConfig::load_from_file(file.path()) {
        Err(ConfigError::Validation(errors)) => {
            assert!(errors[0].contains("window_capacity"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn out_of_range_threshold_is_fatal() {
    let file = write_config("[battery]\nthreshold = 101.0\n");
    assert!(matches!(
        DroneConfig::load_from_file(file.path()),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn zero_battery_drain_is_fatal() {
    let file = write_config("[battery]\ndrain_per_tick = 0.0\n");
    match DroneConfig::load_from_file(file.path()) {
        Err(ConfigError::Validation(errors)) => {
            assert!(errors[0].contains("battery.drain_per_tick"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn huge_forward_interval_is_fatal() {
    let file = write_config("[forwarding]\ninterval_secs = 1e30\n");
    assert!(matches!(
        DroneConfig::load_from_file(file.path()),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn sub_nanosecond_battery_tick_is_fatal() {
    let file = write_config("[battery]\ntick_secs = 1e-12\n");
    assert!(matches!(
        DroneConfig::load_from_file(file.path()),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn unknown_keys_do_not_break_loading() {
    let file = write_config("[battery]\ntreshold = 30.0\n");
    let config = DroneConfig::load_from_file(file.path()).unwrap();
    // The typo is ignored; the default stays
    assert_eq!(config.battery.threshold, 20.0);
}

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_forwarding_section_warns_with_suggestion() {
    let warnings = validate_unknown_keys("[forwarding]\ninterval_sec = 5.0\n");
    assert_eq!(warnings.len(), 1);
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("forwarding.interval_secs")
    );
}

#[test]
fn misspelled_section_suggests_section() {
    let known = known_config_keys();
    assert_eq!(
        suggest_correction("colector", &known).as_deref(),
        Some("collector")
    );
}

// ============================================================================
// Command-line Overrides
// ============================================================================

#[test]
fn overrides_win_over_file_values() {
    let file = write_config("[battery]\nthreshold = 35.0\n[aggregation]\nwindow_capacity = 20\n");
    let mut config = DroneConfig::load(Some(file.path())).unwrap();
    config.apply_overrides(&ConfigOverrides {
        battery_threshold: Some(15.0),
        rolling_window: Some(5),
        ..ConfigOverrides::default()
    });
    config.validate().unwrap();
    assert_eq!(config.battery.threshold, 15.0);
    assert_eq!(config.aggregation.window_capacity, 5);
}

#[test]
fn invalid_override_fails_validation() {
    let mut config = DroneConfig::default();
    config.apply_overrides(&ConfigOverrides {
        rolling_window: Some(0),
        forward_interval_secs: Some(-1.0),
        ..ConfigOverrides::default()
    });
    match config.validate() {
        Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 2),
        other => panic!("expected validation error, got {other:?}"),
    }
}
