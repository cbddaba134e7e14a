//! Open-bar state: the per-price volume profile plus the running counters
//! the boundary detector reads.

use crate::domain::{LevelKey, PriceLevel, Side, Tick};
use crate::engine::quantizer::{PriceQuantizer, QuantizeError};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Direction a bar has committed to, for reversal detection.
///
/// Set by the first tick that trades away from the open; never changes for
/// the rest of the bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarDirection {
    Undetermined,
    Up,
    Down,
}

/// Running OHLC on the tick grid, plus open/close times.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningOhlc {
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub open: LevelKey,
    pub high: LevelKey,
    pub low: LevelKey,
    pub close: LevelKey,
}

/// Neumaier-compensated running sum. Keeps small volumes from vanishing
/// into a large total over long bars.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompensatedSum {
    sum: f64,
    compensation: f64,
}

impl CompensatedSum {
    pub fn add(&mut self, value: f64) {
        let t = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - t) + value;
        } else {
            self.compensation += (value - t) + self.sum;
        }
        self.sum = t;
    }

    pub fn value(&self) -> f64 {
        self.sum + self.compensation
    }
}

impl FromIterator<f64> for CompensatedSum {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut total = Self::default();
        for value in iter {
            total.add(value);
        }
        total
    }
}

/// Everything absorbed into one bar, detached from the accumulator.
#[derive(Debug, Clone)]
pub struct BarProfile {
    pub levels: BTreeMap<LevelKey, PriceLevel>,
    pub ohlc: RunningOhlc,
    pub tick_count: u64,
    pub cumulative_volume: f64,
}

#[derive(Debug, Clone)]
pub struct VolumeProfileAccumulator {
    quantizer: PriceQuantizer,
    levels: BTreeMap<LevelKey, PriceLevel>,
    ohlc: Option<RunningOhlc>,
    tick_count: u64,
    cumulative_volume: CompensatedSum,
    direction: BarDirection,
    /// Most extreme level in `direction` since the bar opened.
    extreme: Option<LevelKey>,
}

impl VolumeProfileAccumulator {
    pub fn new(quantizer: PriceQuantizer) -> Self {
        Self {
            quantizer,
            levels: BTreeMap::new(),
            ohlc: None,
            tick_count: 0,
            cumulative_volume: CompensatedSum::default(),
            direction: BarDirection::Undetermined,
            extreme: None,
        }
    }

    /// Add a validated tick to the open bar. Opens the bar if it is empty.
    ///
    /// Quantization happens before any mutation, so an error leaves the
    /// accumulator untouched.
    pub fn absorb(&mut self, tick: &Tick) -> Result<LevelKey, QuantizeError> {
        let key = self.quantizer.level_key(tick.price)?;
        let quantizer = self.quantizer;

        let level = self.levels.entry(key).or_insert_with(|| PriceLevel::new(quantizer.price_of(key)));
        match tick.side {
            Side::Bid => {
                level.bid_volume += tick.volume;
                level.bid_trades += 1;
            }
            Side::Ask => {
                level.ask_volume += tick.volume;
                level.ask_trades += 1;
            }
        }

        match self.ohlc.as_mut() {
            None => {
                self.ohlc = Some(RunningOhlc {
                    open_time: tick.timestamp,
                    close_time: tick.timestamp,
                    open: key,
                    high: key,
                    low: key,
                    close: key,
                });
                self.extreme = Some(key);
            }
            Some(ohlc) => {
                ohlc.high = ohlc.high.max(key);
                ohlc.low = ohlc.low.min(key);
                ohlc.close = key;
                ohlc.close_time = tick.timestamp;
                self.direction = match self.direction {
                    BarDirection::Undetermined if key > ohlc.open => BarDirection::Up,
                    BarDirection::Undetermined if key < ohlc.open => BarDirection::Down,
                    other => other,
                };
                self.extreme = match (self.direction, self.extreme) {
                    (BarDirection::Up, Some(extreme)) => Some(extreme.max(key)),
                    (BarDirection::Down, Some(extreme)) => Some(extreme.min(key)),
                    (_, extreme) => extreme.or(Some(key)),
                };
            }
        }

        self.tick_count += 1;
        self.cumulative_volume.add(tick.volume);
        Ok(key)
    }

    /// Return to the initial empty state. Nothing carries over into the next bar.
    pub fn reset(&mut self) {
        *self = Self::new(self.quantizer);
    }

    /// Move the absorbed profile out and reset. `None` if nothing was absorbed.
    pub fn take(&mut self) -> Option<BarProfile> {
        let profile = self.snapshot_parts()?;
        let levels = std::mem::take(&mut self.levels);
        self.reset();
        Some(BarProfile { levels, ..profile })
    }

    /// Copy of the absorbed profile, leaving the accumulator as is.
    pub fn snapshot(&self) -> Option<BarProfile> {
        let mut profile = self.snapshot_parts()?;
        profile.levels = self.levels.clone();
        Some(profile)
    }

    fn snapshot_parts(&self) -> Option<BarProfile> {
        self.ohlc.map(|ohlc| BarProfile {
            levels: BTreeMap::new(),
            ohlc,
            tick_count: self.tick_count,
            cumulative_volume: self.cumulative_volume.value(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.ohlc.is_none()
    }

    pub fn quantizer(&self) -> &PriceQuantizer {
        &self.quantizer
    }

    pub fn levels(&self) -> &BTreeMap<LevelKey, PriceLevel> {
        &self.levels
    }

    #[cfg(test)]
    pub(crate) fn levels_mut(&mut self) -> &mut BTreeMap<LevelKey, PriceLevel> {
        &mut self.levels
    }

    pub fn ohlc(&self) -> Option<&RunningOhlc> {
        self.ohlc.as_ref()
    }

    pub fn open_time(&self) -> Option<DateTime<Utc>> {
        self.ohlc.map(|o| o.open_time)
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn cumulative_volume(&self) -> f64 {
        self.cumulative_volume.value()
    }

    pub fn direction(&self) -> BarDirection {
        self.direction
    }

    pub fn extreme(&self) -> Option<LevelKey> {
        self.extreme
    }

    /// high − low in levels (0 when empty).
    pub fn range_in_levels(&self) -> i64 {
        self.ohlc.map_or(0, |o| o.high.saturating_sub(o.low))
    }

    /// Distance the close has come back from the extreme, against the bar's
    /// direction. 0 while the direction is undetermined.
    pub fn retrace_in_levels(&self) -> i64 {
        match (self.direction, self.extreme, self.ohlc) {
            (BarDirection::Up, Some(extreme), Some(ohlc)) => extreme.saturating_sub(ohlc.close),
            (BarDirection::Down, Some(extreme), Some(ohlc)) => ohlc.close.saturating_sub(extreme),
            _ => 0,
        }
    }
}
