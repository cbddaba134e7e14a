//! Price quantization onto the tick grid.
//!
//! Prices are mapped to integer `LevelKey`s (`round(price / tick_size)`), so
//! profile lookups and range comparisons never depend on float equality.
//! Converting back multiplies by `tick_size` and rounds to the tick size's
//! own decimal precision, keeping e.g. `1001 * 0.1` at `100.1`.

use crate::domain::LevelKey;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum QuantizeError {
    #[error("price {0} is not finite")]
    NonFinite(f64),

    #[error("price {price} is outside the representable tick grid for tick_size {tick_size}")]
    OutOfRange { price: f64, tick_size: f64 },
}

/// Largest number of decimals looked for in a tick size.
const MAX_TICK_DECIMALS: i32 = 12;

/// Tolerance when converting a price span into whole levels.
const SPAN_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceQuantizer {
    tick_size: f64,
    /// 10^(decimals of tick_size), used to clean up `key * tick_size`.
    scale: f64,
}

impl PriceQuantizer {
    /// `tick_size` must be positive and finite (checked by `AggregationPolicy`).
    pub fn new(tick_size: f64) -> Self {
        let decimals = (0..=MAX_TICK_DECIMALS)
            .find(|&d| {
                let scaled = tick_size * 10f64.powi(d);
                (scaled - scaled.round()).abs() < 1e-9 * scaled.max(1.0)
            })
            .unwrap_or(MAX_TICK_DECIMALS);
        Self { tick_size, scale: 10f64.powi(decimals) }
    }

    pub fn tick_size(&self) -> f64 {
        self.tick_size
    }

    /// Grid position of `price`.
    pub fn level_key(&self, price: f64) -> Result<LevelKey, QuantizeError> {
        if !price.is_finite() {
            return Err(QuantizeError::NonFinite(price));
        }
        let ticks = (price / self.tick_size).round();
        // i64::MAX as f64 rounds up to 2^63, so the bound is exclusive
        if !ticks.is_finite() || ticks >= i64::MAX as f64 || ticks < i64::MIN as f64 {
            return Err(QuantizeError::OutOfRange { price, tick_size: self.tick_size });
        }
        Ok(ticks as LevelKey)
    }

    /// Price of a grid position.
    pub fn price_of(&self, key: LevelKey) -> f64 {
        let raw = key as f64 * self.tick_size;
        let cleaned = (raw * self.scale).round() / self.scale;
        if cleaned.is_finite() {
            cleaned
        } else {
            raw
        }
    }

    /// `round(price / tick_size) * tick_size`.
    pub fn quantize(&self, price: f64) -> Result<f64, QuantizeError> {
        self.level_key(price).map(|key| self.price_of(key))
    }

    /// Smallest whole number of levels covering `span` (at least 1).
    pub fn span_in_levels(&self, span: f64) -> i64 {
        let levels = (span / self.tick_size - SPAN_EPSILON).ceil();
        if levels >= i64::MAX as f64 {
            i64::MAX
        } else {
            (levels as i64).max(1)
        }
    }
}

/// Free-standing form of `PriceQuantizer::quantize`.
pub fn quantize(price: f64, tick_size: f64) -> Result<f64, QuantizeError> {
    PriceQuantizer::new(tick_size).quantize(price)
}
