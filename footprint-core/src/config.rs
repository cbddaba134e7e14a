//! Engine configuration — raw serde config and the validated aggregation policy.
//!
//! `FootprintConfig` is what users write (TOML or JSON). It is loosely typed:
//! `aggregation_value` can be a duration string or a number depending on the
//! aggregation type. `FootprintConfig::validate()` turns it into an
//! `AggregationPolicy`, whose `Aggregation` variant carries a typed payload,
//! so an engine can never be built from a mismatched combination.

use crate::domain::ZeroRatioHandling;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while building an aggregation policy.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("tick_size must be a positive finite number, got {0}")]
    InvalidTickSize(f64),

    #[error("value_area_percentage must be in (0, 1], got {0}")]
    InvalidValueAreaPercentage(f64),

    #[error("aggregation_value for {aggregation_type} must be {expected}, got {found}")]
    MismatchedAggregationValue {
        aggregation_type: AggregationType,
        expected: &'static str,
        found: String,
    },

    #[error("invalid bar interval '{0}' (expected e.g. \"30s\", \"1min\", \"5H\", \"1 minute\")")]
    InvalidInterval(String),

    #[error("{aggregation_type} threshold must be a positive finite number, got {value}")]
    NonPositiveThreshold {
        aggregation_type: AggregationType,
        value: f64,
    },

    #[error("max_bars_in_memory must be at least 1")]
    InvalidRetention,

    #[error("parse config TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("parse config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Bar boundary rule selector, as written in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregationType {
    Time,
    Tick,
    Volume,
    Range,
    Reversal,
}

impl fmt::Display for AggregationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregationType::Time => "TIME",
            AggregationType::Tick => "TICK",
            AggregationType::Volume => "VOLUME",
            AggregationType::Range => "RANGE",
            AggregationType::Reversal => "REVERSAL",
        };
        f.write_str(name)
    }
}

/// Raw `aggregation_value`: whatever shape the config file contained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregationValue {
    Count(u64),
    Amount(f64),
    Text(String),
}

impl fmt::Display for AggregationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationValue::Count(n) => write!(f, "{n}"),
            AggregationValue::Amount(x) => write!(f, "{x}"),
            AggregationValue::Text(s) => write!(f, "\"{s}\""),
        }
    }
}

/// Fixed-length time bucket for TIME bars, stored in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct BarInterval {
    micros: i64,
}

impl BarInterval {
    pub fn from_micros(micros: i64) -> Option<Self> {
        (micros > 0).then_some(Self { micros })
    }

    pub fn from_secs(secs: i64) -> Option<Self> {
        secs.checked_mul(1_000_000).and_then(Self::from_micros)
    }

    pub fn as_micros(&self) -> i64 {
        self.micros
    }

    /// Parse a pandas-style offset ("30s", "1min", "5H", "250ms") or a
    /// spelled-out duration ("1 minute", "2 hours"). A missing count means 1.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidInterval(text.to_string());
        let trimmed = text.trim();
        let split = trimmed
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(split);

        let count: f64 = if number.is_empty() {
            1.0
        } else {
            number.parse().map_err(|_| invalid())?
        };

        let unit_micros: i64 = match unit.trim() {
            "us" | "U" | "micro" | "micros" => 1,
            "ms" | "L" | "milli" | "millis" => 1_000,
            "s" | "S" | "sec" | "secs" | "second" | "seconds" => 1_000_000,
            "T" | "min" | "mins" | "minute" | "minutes" => 60_000_000,
            "h" | "H" | "hour" | "hours" => 3_600_000_000,
            "d" | "D" | "day" | "days" => 86_400_000_000,
            _ => return Err(invalid()),
        };

        let micros = (count * unit_micros as f64).round();
        if !micros.is_finite() || micros < 1.0 || micros > i64::MAX as f64 {
            return Err(invalid());
        }
        Self::from_micros(micros as i64).ok_or_else(invalid)
    }

    /// Index of the bucket containing `timestamp` (floor division, so
    /// pre-epoch timestamps land in negative buckets).
    pub fn bucket(&self, timestamp: DateTime<Utc>) -> i64 {
        timestamp.timestamp_micros().div_euclid(self.micros)
    }

    /// Start of the bucket containing `timestamp`.
    pub fn floor(&self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        self.bucket(timestamp)
            .checked_mul(self.micros)
            .and_then(DateTime::from_timestamp_micros)
            .unwrap_or(timestamp)
    }
}

impl TryFrom<i64> for BarInterval {
    type Error = String;

    fn try_from(micros: i64) -> Result<Self, Self::Error> {
        Self::from_micros(micros).ok_or_else(|| format!("bar interval must be positive, got {micros}us"))
    }
}

impl From<BarInterval> for i64 {
    fn from(interval: BarInterval) -> Self {
        interval.micros
    }
}

impl fmt::Display for BarInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [(i64, &str); 5] = [
            (86_400_000_000, "d"),
            (3_600_000_000, "h"),
            (60_000_000, "min"),
            (1_000_000, "s"),
            (1_000, "ms"),
        ];
        for (size, suffix) in UNITS {
            if self.micros % size == 0 {
                return write!(f, "{}{suffix}", self.micros / size);
            }
        }
        write!(f, "{}us", self.micros)
    }
}

/// Typed boundary rule. Each variant carries the payload its rule needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Aggregation {
    /// Close when a tick falls into a later time bucket.
    Time(BarInterval),
    /// Close after this many ticks.
    Tick(NonZeroU64),
    /// Close once cumulative volume reaches this amount.
    Volume(f64),
    /// Close once high − low reaches this price span.
    Range(f64),
    /// Close once price retraces this far from the bar's extreme.
    Reversal(f64),
}

impl Aggregation {
    pub fn aggregation_type(&self) -> AggregationType {
        match self {
            Aggregation::Time(_) => AggregationType::Time,
            Aggregation::Tick(_) => AggregationType::Tick,
            Aggregation::Volume(_) => AggregationType::Volume,
            Aggregation::Range(_) => AggregationType::Range,
            Aggregation::Reversal(_) => AggregationType::Reversal,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Aggregation::Time(_) | Aggregation::Tick(_) => Ok(()),
            Aggregation::Volume(value) | Aggregation::Range(value) | Aggregation::Reversal(value) => {
                if value.is_finite() && value > 0.0 {
                    Ok(())
                } else {
                    Err(ConfigError::NonPositiveThreshold {
                        aggregation_type: self.aggregation_type(),
                        value,
                    })
                }
            }
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Time(interval) => write!(f, "TIME({interval})"),
            Aggregation::Tick(count) => write!(f, "TICK({count})"),
            Aggregation::Volume(amount) => write!(f, "VOLUME({amount})"),
            Aggregation::Range(span) => write!(f, "RANGE({span})"),
            Aggregation::Reversal(amount) => write!(f, "REVERSAL({amount})"),
        }
    }
}

/// Deterministic policy hash, stamped on every bar the policy produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyFingerprint(pub String);

impl fmt::Display for PolicyFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated engine policy. Only constructible through `new` (or
/// `FootprintConfig::validate`), so every field satisfies its invariant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationPolicy {
    tick_size: f64,
    aggregation: Aggregation,
    value_area_percentage: f64,
    zero_ratio_handling: ZeroRatioHandling,
    max_bars_in_memory: Option<usize>,
}

impl AggregationPolicy {
    pub fn new(
        tick_size: f64,
        aggregation: Aggregation,
        value_area_percentage: f64,
        zero_ratio_handling: ZeroRatioHandling,
    ) -> Result<Self, ConfigError> {
        if !tick_size.is_finite() || tick_size <= 0.0 {
            return Err(ConfigError::InvalidTickSize(tick_size));
        }
        if !(value_area_percentage > 0.0 && value_area_percentage <= 1.0) {
            return Err(ConfigError::InvalidValueAreaPercentage(value_area_percentage));
        }
        aggregation.validate()?;

        Ok(Self {
            tick_size,
            aggregation,
            value_area_percentage,
            zero_ratio_handling,
            max_bars_in_memory: None,
        })
    }

    /// Cap the number of finalized bars kept in memory (oldest evicted first).
    pub fn with_max_bars_in_memory(mut self, cap: Option<usize>) -> Result<Self, ConfigError> {
        if cap == Some(0) {
            return Err(ConfigError::InvalidRetention);
        }
        self.max_bars_in_memory = cap;
        Ok(self)
    }

    pub fn tick_size(&self) -> f64 {
        self.tick_size
    }

    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    pub fn value_area_percentage(&self) -> f64 {
        self.value_area_percentage
    }

    pub fn zero_ratio_handling(&self) -> ZeroRatioHandling {
        self.zero_ratio_handling
    }

    pub fn max_bars_in_memory(&self) -> Option<usize> {
        self.max_bars_in_memory
    }

    /// BLAKE3 over a canonical rendering of every field.
    pub fn fingerprint(&self) -> PolicyFingerprint {
        let canonical = format!(
            "tick_size={}|aggregation={}|value_area={}|zero_ratio={:?}|max_bars={:?}",
            self.tick_size,
            self.aggregation,
            self.value_area_percentage,
            self.zero_ratio_handling,
            self.max_bars_in_memory,
        );
        PolicyFingerprint(blake3::hash(canonical.as_bytes()).to_hex().to_string())
    }
}

fn default_value_area_percentage() -> f64 {
    0.70
}

fn default_zeros_as_ones() -> bool {
    true
}

/// User-facing configuration, mirroring the fields of a config file.
///
/// ```toml
/// tick_size = 0.25
/// aggregation_type = "TIME"
/// aggregation_value = "1min"
/// value_area_percentage = 0.70
/// enable_bid_ask_ratios_with_zeros_as_ones = true
/// max_bars_in_memory = 10000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FootprintConfig {
    pub tick_size: f64,
    pub aggregation_type: AggregationType,
    pub aggregation_value: AggregationValue,
    #[serde(default = "default_value_area_percentage")]
    pub value_area_percentage: f64,
    #[serde(default = "default_zeros_as_ones")]
    pub enable_bid_ask_ratios_with_zeros_as_ones: bool,
    #[serde(default)]
    pub max_bars_in_memory: Option<usize>,
}

impl Default for FootprintConfig {
    fn default() -> Self {
        Self {
            tick_size: 0.25,
            aggregation_type: AggregationType::Time,
            aggregation_value: AggregationValue::Text("1min".into()),
            value_area_percentage: default_value_area_percentage(),
            enable_bid_ask_ratios_with_zeros_as_ones: true,
            max_bars_in_memory: Some(10_000),
        }
    }
}

impl FootprintConfig {
    /// Load a config file. `.json` files are read as JSON, anything else as TOML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_toml(&content),
        }
    }

    /// Parse a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn zero_ratio_handling(&self) -> ZeroRatioHandling {
        if self.enable_bid_ask_ratios_with_zeros_as_ones {
            ZeroRatioHandling::SetToOne
        } else {
            ZeroRatioHandling::Infinite
        }
    }

    /// Check every field and resolve `aggregation_value` against `aggregation_type`.
    pub fn validate(&self) -> Result<AggregationPolicy, ConfigError> {
        let aggregation = self.resolve_aggregation()?;
        AggregationPolicy::new(
            self.tick_size,
            aggregation,
            self.value_area_percentage,
            self.zero_ratio_handling(),
        )?
        .with_max_bars_in_memory(self.max_bars_in_memory)
    }

    fn resolve_aggregation(&self) -> Result<Aggregation, ConfigError> {
        let kind = self.aggregation_type;
        let mismatch = |expected: &'static str| ConfigError::MismatchedAggregationValue {
            aggregation_type: kind,
            expected,
            found: self.aggregation_value.to_string(),
        };

        match (kind, &self.aggregation_value) {
            (AggregationType::Time, AggregationValue::Text(text)) => {
                Ok(Aggregation::Time(BarInterval::parse(text)?))
            }
            (AggregationType::Time, _) => Err(mismatch("a duration string such as \"1min\"")),

            (AggregationType::Tick, AggregationValue::Count(count)) => NonZeroU64::new(*count)
                .map(Aggregation::Tick)
                .ok_or(ConfigError::NonPositiveThreshold {
                    aggregation_type: kind,
                    value: 0.0,
                }),
            (AggregationType::Tick, _) => Err(mismatch("a positive integer tick count")),

            (_, AggregationValue::Text(_)) => Err(mismatch("a number")),
            (_, AggregationValue::Count(n)) => Ok(threshold(kind, *n as f64)),
            (_, AggregationValue::Amount(x)) => Ok(threshold(kind, *x)),
        }
    }
}

fn threshold(kind: AggregationType, value: f64) -> Aggregation {
    match kind {
        AggregationType::Volume => Aggregation::Volume(value),
        AggregationType::Range => Aggregation::Range(value),
        // TIME and TICK are resolved before this point
        _ => Aggregation::Reversal(value),
    }
}
