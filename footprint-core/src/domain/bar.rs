//! Bar — a finalized footprint bar.

use crate::config::{Aggregation, PolicyFingerprint};
use crate::domain::price_level::{dominance_ratio, LevelKey, PriceLevel, ZeroRatioHandling};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An immutable footprint bar: OHLC, the per-price volume profile, and the
/// statistics derived from it.
///
/// `levels` is keyed by position on the tick grid, so iteration is ascending
/// by price. For TIME bars `open_time` is the start of the bar's time bucket;
/// otherwise it is the first tick's timestamp. `close_time` is always the
/// last tick's timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub levels: BTreeMap<LevelKey, PriceLevel>,

    pub total_volume: f64,
    pub total_bid_volume: f64,
    pub total_ask_volume: f64,
    /// Ask volume minus bid volume over the whole bar.
    pub delta: f64,
    pub total_trades: u64,
    pub tick_count: u64,

    pub point_of_control: f64,
    pub value_area_high: f64,
    pub value_area_low: f64,
    pub is_up_bar: bool,

    pub tick_size: f64,
    pub aggregation: Aggregation,
    pub policy_fingerprint: PolicyFingerprint,
    pub zero_ratio_handling: ZeroRatioHandling,
}

impl Bar {
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Level at `price`, after snapping it to this bar's tick grid.
    pub fn level(&self, price: f64) -> Option<&PriceLevel> {
        let key = (price / self.tick_size).round();
        if !key.is_finite() {
            return None;
        }
        self.levels.get(&(key as LevelKey))
    }

    /// Bar-level dominance ratio, using the zero handling of the policy that
    /// produced the bar.
    pub fn dominance_ratio(&self) -> f64 {
        dominance_ratio(self.total_bid_volume, self.total_ask_volume, self.zero_ratio_handling)
    }

    /// Volume traded inside [value_area_low, value_area_high].
    pub fn value_area_volume(&self) -> f64 {
        self.levels
            .values()
            .filter(|l| l.price >= self.value_area_low && l.price <= self.value_area_high)
            .map(PriceLevel::total_volume)
            .sum()
    }

    /// Sum of bid + ask volume over every level.
    pub fn profiled_volume(&self) -> f64 {
        self.levels.values().map(PriceLevel::total_volume).sum()
    }

    /// OHLC sanity plus the POC/value-area ordering.
    pub fn is_sane(&self) -> bool {
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.value_area_low <= self.point_of_control
            && self.point_of_control <= self.value_area_high
    }
}
