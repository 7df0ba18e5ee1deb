//! Immutable runtime settings.
//!
//! Settings are assembled once at startup: built-in defaults, then an optional
//! JSON override file merged on top with [`deep_merge`], then command-line
//! flags. The result is never mutated afterwards.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys that are never accepted from an override, at any depth.
const FORBIDDEN_KEYS: &[&str] = &["__proto__", "constructor", "prototype"];

/// Default upcoming window: four hours.
pub const DEFAULT_UPCOMING_THRESHOLD: i64 = 14_400;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Settings {
    /// Campaign endpoint: an `http(s)://` URL, a `file://` URL or a local path.
    pub url: String,
    /// Inactive campaigns starting within this many seconds are "upcoming".
    pub upcoming_threshold: i64,
    pub translations: Translations,
    /// `chrono` format string for start times (always shown in UTC).
    pub datetime_format: String,
    pub tick_interval_ms: u64,
    pub refresh_interval_ms: u64,
    /// `None` waits for the endpoint indefinitely.
    pub fetch_timeout_secs: Option<u64>,
    pub table: TableOptions,
}

/// Localized tokens used by the `active_campaign` field.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Translations {
    pub yes: String,
    pub no: String,
}

/// Column layout options.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TableOptions {
    /// Column key the table is ordered by.
    pub sort_column: String,
    pub sort_descending: bool,
    /// Column keys that are not shown.
    pub hidden_columns: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8000/sovereignty-timer/dashboard_data/".to_string(),
            upcoming_threshold: DEFAULT_UPCOMING_THRESHOLD,
            translations: Translations {
                yes: "Yes".to_string(),
                no: "No".to_string(),
            },
            datetime_format: "%Y-%m-%d %H:%M".to_string(),
            tick_interval_ms: 1_000,
            refresh_interval_ms: 30_000,
            fetch_timeout_secs: None,
            table: TableOptions {
                sort_column: "start_time".to_string(),
                sort_descending: false,
                hidden_columns: Vec::new(),
            },
        }
    }
}

impl Settings {
    /// Defaults merged with `overrides`.
    pub fn with_overrides(overrides: &Value) -> Result<Self> {
        let defaults = serde_json::to_value(Self::default())?;
        let merged = deep_merge(&defaults, overrides);
        let settings: Self =
            serde_json::from_value(merged).context("Invalid settings override")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that would only fail later, mid-render.
    pub fn validate(&self) -> Result<()> {
        use chrono::format::{Item, StrftimeItems};

        if StrftimeItems::new(&self.datetime_format).any(|item| matches!(item, Item::Error)) {
            anyhow::bail!("Invalid date format: {:?}", self.datetime_format);
        }
        if self.upcoming_threshold < 0 {
            anyhow::bail!("Upcoming threshold must not be negative");
        }
        Ok(())
    }

    /// Defaults merged with the JSON object stored at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let overrides: Value = serde_json::from_str(&raw)
            .with_context(|| format!("Config file {} is not valid JSON", path.display()))?;
        Self::with_overrides(&overrides)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(1))
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Merge `overrides` into `defaults`, returning a new value.
///
/// Objects merge key by key, recursively. Only keys already present in
/// `defaults` are accepted, and the keys in [`FORBIDDEN_KEYS`] are always
/// rejected. `null` overrides are ignored. Any other override value replaces
/// the default wholesale (arrays are not concatenated).
pub fn deep_merge(defaults: &Value, overrides: &Value) -> Value {
    match (defaults, overrides) {
        (_, Value::Null) => defaults.clone(),
        (Value::Object(base), Value::Object(patch)) => Value::Object(merge_objects(base, patch)),
        (Value::Object(_), other) => {
            tracing::warn!(value = %other, "Ignoring non-object override for a settings section");
            defaults.clone()
        }
        (_, other) => other.clone(),
    }
}

fn merge_objects(base: &Map<String, Value>, patch: &Map<String, Value>) -> Map<String, Value> {
    let mut out = base.clone();

    for (key, value) in patch {
        if FORBIDDEN_KEYS.contains(&key.as_str()) {
            tracing::warn!(key = %key, "Rejected forbidden settings key");
            continue;
        }
        let Some(current) = base.get(key) else {
            tracing::warn!(key = %key, "Ignoring unknown settings key");
            continue;
        };
        out.insert(key.clone(), deep_merge(current, value));
    }

    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
