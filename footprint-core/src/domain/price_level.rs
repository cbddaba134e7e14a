//! PriceLevel — bid/ask volume traded at one quantized price.

use serde::{Deserialize, Serialize};

/// A price level's position on the tick grid: `price = key * tick_size`.
pub type LevelKey = i64;

/// How bid/ask ratios treat a zero denominator.
///
/// Only consulted where a ratio is computed; volume and delta sums are never
/// affected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZeroRatioHandling {
    /// A zero side counts as one; a level with no volume at all is 1:1.
    SetToOne,
    /// A zero denominator yields infinity (or 0.0 when both sides are empty).
    Infinite,
}

/// Volume and trade counts at a single price level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    pub bid_volume: f64,
    pub ask_volume: f64,
    pub bid_trades: u64,
    pub ask_trades: u64,
}

impl PriceLevel {
    pub fn new(price: f64) -> Self {
        Self {
            price,
            bid_volume: 0.0,
            ask_volume: 0.0,
            bid_trades: 0,
            ask_trades: 0,
        }
    }

    pub fn total_volume(&self) -> f64 {
        self.bid_volume + self.ask_volume
    }

    pub fn total_trades(&self) -> u64 {
        self.bid_trades + self.ask_trades
    }

    /// Ask volume minus bid volume.
    pub fn delta(&self) -> f64 {
        self.ask_volume - self.bid_volume
    }

    pub fn is_ask_dominant(&self) -> bool {
        self.ask_volume >= self.bid_volume
    }

    /// Dominant side's volume over the other side's.
    pub fn dominance_ratio(&self, handling: ZeroRatioHandling) -> f64 {
        dominance_ratio(self.bid_volume, self.ask_volume, handling)
    }
}

/// Ratio of the larger of `bid`/`ask` to the smaller.
pub(crate) fn dominance_ratio(bid: f64, ask: f64, handling: ZeroRatioHandling) -> f64 {
    let (numerator, denominator) = if ask >= bid { (ask, bid) } else { (bid, ask) };
    if denominator > 0.0 {
        return numerator / denominator;
    }
    match handling {
        ZeroRatioHandling::SetToOne if numerator > 0.0 => numerator,
        ZeroRatioHandling::SetToOne => 1.0,
        ZeroRatioHandling::Infinite if numerator > 0.0 => f64::INFINITY,
        ZeroRatioHandling::Infinite => 0.0,
    }
}
