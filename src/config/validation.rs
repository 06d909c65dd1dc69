//! Config validation: unknown-key detection with Levenshtein suggestions
//! and warnings for legal but suspicious values.
//!
//! Unknown keys are found by parsing the raw TOML into a `toml::Value` tree
//! before serde sees it. Nothing here ever rejects a config.

use super::DroneConfig;
use std::collections::HashSet;

/// Largest edit distance for which a "did you mean" suggestion is offered.
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Every valid dotted key path of [`DroneConfig`].
///
/// Kept by hand; a new field in drone_config.rs needs an entry here.
pub fn known_config_keys() -> HashSet<&'static str> {
    [
        "drone",
        "drone.name",
        "listener",
        "listener.addr",
        "collector",
        "collector.addr",
        "collector.timeout_secs",
        "battery",
        "battery.threshold",
        "battery.drain_per_tick",
        "battery.tick_secs",
        "forwarding",
        "forwarding.interval_secs",
        "forwarding.include_anomalies",
        "forwarding.queue_warn_len",
        "aggregation",
        "aggregation.window_capacity",
        "control",
        "control.enabled",
        "control.addr",
    ]
    .into_iter()
    .collect()
}

// ============================================================================
// Key Walking and Suggestions
// ============================================================================

/// Collect the dotted path of every key in a TOML tree, tables included.
///
/// `{ a = { b = 1 } }` yields `["a", "a.b"]`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let Some(table) = value.as_table() else {
        return Vec::new();
    };

    let mut keys = Vec::with_capacity(table.len());
    for (key, child) in table {
        let path = match prefix {
            "" => key.clone(),
            _ => format!("{prefix}.{key}"),
        };
        if child.is_table() {
            let nested = walk_toml_keys(child, &path);
            keys.push(path);
            keys.extend(nested);
        } else {
            keys.push(path);
        }
    }
    keys
}

/// Edit distance between two strings, counted in chars.
fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = diagonal + usize::from(ca != cb);
            diagonal = row[j + 1];
            row[j + 1] = substitution.min(row[j] + 1).min(row[j + 1] + 1);
        }
    }
    row[b.len()]
}

/// Closest known key within [`MAX_SUGGESTION_DISTANCE`] edits, if any.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|k| (levenshtein(unknown, k), *k))
        .filter(|(dist, _)| *dist <= MAX_SUGGESTION_DISTANCE)
        // Tie-break on the key so the answer does not depend on hash order
        .min()
        .map(|(_, k)| k.to_string())
}

// ============================================================================
// Entry Points
// ============================================================================

/// Warnings for every key in `raw_toml` that the config does not know.
///
/// Unparseable input yields no warnings; serde reports the parse error.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        return Vec::new();
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

/// Values that pass validation but probably are not what the operator meant.
pub fn suspicious_values(config: &DroneConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let mut push = |field: &str, message: String| {
        warnings.push(ValidationWarning {
            field: field.to_string(),
            message,
            suggestion: None,
        })
    };

    if config.battery.threshold >= 100.0 {
        push(
            "battery.threshold",
            "battery.threshold is 100: forwarding stops on the first battery tick".to_string(),
        );
    }
    if config.collector.timeout_secs > config.forwarding.interval_secs {
        push(
            "collector.timeout_secs",
            format!(
                "collector.timeout_secs ({}) exceeds forwarding.interval_secs ({}): a slow collector delays later ticks",
                config.collector.timeout_secs, config.forwarding.interval_secs
            ),
        );
    }
    if !config.forwarding.include_anomalies {
        push(
            "forwarding.include_anomalies",
            "forwarding.include_anomalies is false: the collector receives summaries only"
                .to_string(),
        );
    }

    warnings
}
