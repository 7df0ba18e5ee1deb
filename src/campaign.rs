use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::config::Translations;
use crate::countdown::{coerce_seconds, truncate_seconds, CountdownDisplay};
use crate::markup;

// ---------------------------------------------------------------------------
// Campaign
// ---------------------------------------------------------------------------

/// One campaign row as delivered by the endpoint.
///
/// Decoding is deliberately lenient: missing or oddly typed fields fall back
/// to empty values instead of rejecting the whole payload.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Campaign {
    #[serde(default, deserialize_with = "text")]
    pub event_type: String,
    #[serde(default, deserialize_with = "text")]
    pub solar_system_name: String,
    #[serde(default, deserialize_with = "text")]
    pub solar_system_name_html: String,
    #[serde(default, deserialize_with = "text")]
    pub constellation_name: String,
    #[serde(default, deserialize_with = "text")]
    pub constellation_name_html: String,
    #[serde(default, deserialize_with = "text")]
    pub region_name: String,
    #[serde(default, deserialize_with = "text")]
    pub region_name_html: String,
    #[serde(default, deserialize_with = "text")]
    pub defender_name: String,
    #[serde(default, deserialize_with = "text")]
    pub defender_name_html: String,
    /// Activity defense multiplier.
    #[serde(default, deserialize_with = "number")]
    pub adm: Option<f64>,
    #[serde(default, deserialize_with = "timestamp")]
    pub start_time: Option<DateTime<Utc>>,
    /// Seconds until start at the moment the endpoint answered.
    #[serde(default, deserialize_with = "seconds")]
    pub remaining_time_in_seconds: i64,
    #[serde(default, deserialize_with = "text")]
    pub campaign_progress: String,
    /// Localized yes/no token.
    #[serde(default, deserialize_with = "text")]
    pub active_campaign: String,
    /// Explicit status token (`upcoming`, `active`, `inactive`) sent by newer
    /// endpoints. Takes precedence over `active_campaign` when present.
    #[serde(default, deserialize_with = "optional_text")]
    pub campaign_status: Option<String>,
}

impl Campaign {
    /// Whether the endpoint flagged this campaign as running.
    pub fn is_active(&self, translations: &Translations) -> bool {
        match self.campaign_status.as_deref() {
            Some(status) => status.trim().eq_ignore_ascii_case("active"),
            None => self.active_campaign.trim() == translations.yes.trim(),
        }
    }

    pub fn system(&self) -> String {
        plain_or_stripped(&self.solar_system_name, &self.solar_system_name_html)
    }

    pub fn constellation(&self) -> String {
        plain_or_stripped(&self.constellation_name, &self.constellation_name_html)
    }

    pub fn region(&self) -> String {
        plain_or_stripped(&self.region_name, &self.region_name_html)
    }

    pub fn defender(&self) -> String {
        plain_or_stripped(&self.defender_name, &self.defender_name_html)
    }

    /// Map link for the campaign system, falling back to the defender link.
    pub fn link(&self) -> Option<String> {
        markup::first_href(&self.solar_system_name_html)
            .or_else(|| markup::first_href(&self.region_name_html))
            .or_else(|| markup::first_href(&self.defender_name_html))
    }

    /// Hover text attached to the progress trend icon, if any.
    pub fn tooltip(&self) -> Option<String> {
        markup::attribute(&self.campaign_progress, "title")
    }
}

fn plain_or_stripped(plain: &str, html: &str) -> String {
    if plain.is_empty() {
        markup::strip_tags(html)
    } else {
        plain.to_string()
    }
}

/// Decode an endpoint response body.
///
/// Falsy payloads (`null`, `false`, `0`, `""` or an empty body) decode to
/// `None`. Anything else must be an array of campaign objects.
pub fn decode_payload(body: &str) -> Result<Option<Vec<Campaign>>, serde_json::Error> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(body)?;
    let falsy = match &value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        _ => false,
    };
    if falsy {
        return Ok(None);
    }
    serde_json::from_value(value).map(Some)
}

// ---------------------------------------------------------------------------
// Lenient field decoders
// ---------------------------------------------------------------------------

fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(value_to_text(&Value::deserialize(deserializer)?))
}

fn optional_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(Some(value_to_text(&value)).filter(|s| !s.is_empty()))
}

fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(truncate_seconds))
            .unwrap_or(0),
        Value::String(s) => coerce_seconds(&s),
        _ => 0,
    })
}

fn timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => parse_timestamp(&s),
        _ => None,
    })
}

/// Parse an ISO-8601 timestamp. Values without an offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

/// Key of the column holding the live countdown.
pub const COUNTDOWN_KEY: &str = "remaining_time";
/// Position of the countdown column in [`COLUMNS`].
pub const COUNTDOWN_COLUMN: usize = 7;

/// Ordering key produced by a column. `Missing` sorts after everything else.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortKey {
    Int(i64),
    Text(String),
    Missing,
}

/// Options a column needs to render its display text.
#[derive(Clone, Debug)]
pub struct DisplayOptions {
    pub datetime_format: String,
}

/// Accessors for one table column: what is shown, how rows order, and what
/// text free-text search matches against.
pub struct Column {
    pub key: &'static str,
    pub title: &'static str,
    pub width: u16,
    pub display: fn(&Campaign, &DisplayOptions) -> String,
    pub sort_key: fn(&Campaign) -> SortKey,
    pub filter_key: fn(&Campaign) -> String,
}

fn text_key(value: String) -> SortKey {
    if value.is_empty() {
        SortKey::Missing
    } else {
        SortKey::Text(value.to_lowercase())
    }
}

pub const COLUMNS: &[Column] = &[
    Column {
        key: "event_type",
        title: "Type",
        width: 14,
        display: |c, _| c.event_type.clone(),
        sort_key: |c| text_key(c.event_type.clone()),
        filter_key: |c| c.event_type.clone(),
    },
    Column {
        key: "solar_system_name",
        title: "System",
        width: 12,
        display: |c, _| c.system(),
        sort_key: |c| text_key(c.system()),
        filter_key: |c| c.system(),
    },
    Column {
        key: "constellation_name",
        title: "Constellation",
        width: 14,
        display: |c, _| c.constellation(),
        sort_key: |c| text_key(c.constellation()),
        filter_key: |c| c.constellation(),
    },
    Column {
        key: "region_name",
        title: "Region",
        width: 14,
        display: |c, _| c.region(),
        sort_key: |c| text_key(c.region()),
        filter_key: |c| c.region(),
    },
    Column {
        key: "defender_name",
        title: "Defender",
        width: 24,
        display: |c, _| c.defender(),
        sort_key: |c| text_key(c.defender()),
        filter_key: |c| c.defender(),
    },
    Column {
        key: "adm",
        title: "ADM",
        width: 5,
        display: |c, _| c.adm.map(|adm| format!("{:.1}", adm)).unwrap_or_default(),
        sort_key: |c| {
            c.adm
                .map(|adm| SortKey::Int((adm * 1000.0).round() as i64))
                .unwrap_or(SortKey::Missing)
        },
        filter_key: |c| c.adm.map(|adm| format!("{:.1}", adm)).unwrap_or_default(),
    },
    Column {
        key: "start_time",
        title: "Start (UTC)",
        width: 17,
        display: |c, opts| {
            c.start_time
                .map(|t| t.format(&opts.datetime_format).to_string())
                .unwrap_or_default()
        },
        sort_key: |c| {
            c.start_time
                .map(|t| SortKey::Int(t.timestamp()))
                .unwrap_or(SortKey::Missing)
        },
        filter_key: |c| {
            c.start_time
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default()
        },
    },
    Column {
        key: COUNTDOWN_KEY,
        title: "Remaining",
        width: 16,
        display: |c, _| CountdownDisplay::of(c.remaining_time_in_seconds).to_string(),
        sort_key: |c| SortKey::Int(c.remaining_time_in_seconds),
        filter_key: |_| String::new(),
    },
    Column {
        key: "campaign_progress",
        title: "Progress",
        width: 20,
        display: |c, _| markup::progress_text(&c.campaign_progress),
        sort_key: |c| text_key(markup::progress_text(&c.campaign_progress)),
        filter_key: |c| markup::progress_text(&c.campaign_progress),
    },
];

/// Index of the column with `key`.
pub fn column_index(key: &str) -> Option<usize> {
    COLUMNS.iter().position(|column| column.key == key)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
