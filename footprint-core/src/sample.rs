//! Synthetic tick stream for demos, tests and benchmarks.
//!
//! A seeded random walk on the tick grid: each tick moves price by −1, 0 or
//! +1 level, trades 1..50 units on a random side, and arrives roughly every
//! 500 ms (±100 ms jitter, so timestamps stay strictly increasing).

use crate::domain::{Side, Tick};
use crate::engine::PriceQuantizer;
use chrono::{DateTime, TimeDelta, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SPACING_MS: i64 = 500;
const JITTER_MS: i64 = 100;

#[derive(Debug, Clone)]
pub struct TickGenerator {
    rng: StdRng,
    quantizer: PriceQuantizer,
    level: i64,
    start: DateTime<Utc>,
    index: i64,
}

impl TickGenerator {
    /// `start_price` is snapped to the grid; a price that cannot be snapped
    /// starts the walk at one tick.
    pub fn new(seed: u64, start_price: f64, tick_size: f64, start: DateTime<Utc>) -> Self {
        let quantizer = PriceQuantizer::new(tick_size);
        let level = quantizer.level_key(start_price).unwrap_or(1).max(1);
        Self { rng: StdRng::seed_from_u64(seed), quantizer, level, start, index: 0 }
    }
}

impl Iterator for TickGenerator {
    type Item = Tick;

    fn next(&mut self) -> Option<Tick> {
        let step: i64 = self.rng.gen_range(-1..=1);
        // keep the walk strictly above zero
        self.level = (self.level + step).max(1);

        let jitter = self.rng.gen_range(-JITTER_MS..=JITTER_MS);
        let offset = TimeDelta::try_milliseconds(self.index * SPACING_MS + jitter)?;
        let timestamp = self.start.checked_add_signed(offset)?;
        self.index += 1;

        let volume = f64::from(self.rng.gen_range(1u32..50));
        let side = if self.rng.gen_bool(0.5) { Side::Bid } else { Side::Ask };

        Some(Tick::new(timestamp, self.quantizer.price_of(self.level), volume, side))
    }
}
