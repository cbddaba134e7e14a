//! Bar finalization: OHLC, totals, point of control and value area.

use crate::config::{Aggregation, AggregationPolicy, PolicyFingerprint};
use crate::domain::{Bar, LevelKey, PriceLevel, ZeroRatioHandling};
use crate::engine::accumulator::{BarProfile, CompensatedSum, VolumeProfileAccumulator};
use crate::engine::quantizer::PriceQuantizer;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use thiserror::Error;

/// Internal invariant violations. Any of these is a defect in orchestration.
#[derive(Debug, Error, PartialEq)]
pub enum FinalizeError {
    #[error("cannot finalize an empty bar: no ticks absorbed since the last reset")]
    EmptyAccumulator,

    #[error("profiled volume {profiled} does not match running volume {running}")]
    VolumeMismatch { profiled: f64, running: f64 },
}

/// Floor on the relative tolerance between the profile sum and the running
/// volume total.
const VOLUME_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct BarFinalizer {
    quantizer: PriceQuantizer,
    aggregation: Aggregation,
    value_area_percentage: f64,
    zero_ratio_handling: ZeroRatioHandling,
    fingerprint: PolicyFingerprint,
}

impl BarFinalizer {
    pub fn new(policy: &AggregationPolicy) -> Self {
        Self {
            quantizer: PriceQuantizer::new(policy.tick_size()),
            aggregation: policy.aggregation(),
            value_area_percentage: policy.value_area_percentage(),
            zero_ratio_handling: policy.zero_ratio_handling(),
            fingerprint: policy.fingerprint(),
        }
    }

    /// Close the open bar: build it from the accumulator's profile and reset
    /// the accumulator for the next bar.
    ///
    /// The volume check runs against the borrowed state first, so on error
    /// the bar stays open and nothing is lost.
    pub fn finalize(&self, accumulator: &mut VolumeProfileAccumulator) -> Result<Bar, FinalizeError> {
        if accumulator.is_empty() {
            return Err(FinalizeError::EmptyAccumulator);
        }
        check_volume(accumulator.levels(), accumulator.cumulative_volume(), accumulator.tick_count())?;
        let profile = accumulator.take().ok_or(FinalizeError::EmptyAccumulator)?;
        Ok(self.build(profile))
    }

    /// Provisional bar from the open profile. The accumulator is not touched.
    pub fn preview(&self, accumulator: &VolumeProfileAccumulator) -> Result<Bar, FinalizeError> {
        let profile = accumulator.snapshot().ok_or(FinalizeError::EmptyAccumulator)?;
        check_volume(&profile.levels, profile.cumulative_volume, profile.tick_count)?;
        Ok(self.build(profile))
    }

    fn build(&self, profile: BarProfile) -> Bar {
        let BarProfile { levels, ohlc, tick_count, .. } = profile;

        let total_bid_volume = levels.values().map(|l| l.bid_volume).collect::<CompensatedSum>().value();
        let total_ask_volume = levels.values().map(|l| l.ask_volume).collect::<CompensatedSum>().value();
        let total_volume = total_bid_volume + total_ask_volume;
        let total_trades = levels.values().map(PriceLevel::total_trades).sum();

        // the open level always exists, so the profile is never empty here
        let poc = point_of_control(&levels, ohlc.close).unwrap_or(ohlc.close);
        let (val, vah) = value_area(&levels, poc, self.value_area_percentage, total_volume);
        debug_assert!(val <= poc && poc <= vah);

        let open_time = match self.aggregation {
            Aggregation::Time(interval) => interval.floor(ohlc.open_time),
            _ => ohlc.open_time,
        };
        let q = &self.quantizer;

        Bar {
            open_time,
            close_time: ohlc.close_time,
            open: q.price_of(ohlc.open),
            high: q.price_of(ohlc.high),
            low: q.price_of(ohlc.low),
            close: q.price_of(ohlc.close),
            levels,
            total_volume,
            total_bid_volume,
            total_ask_volume,
            delta: total_ask_volume - total_bid_volume,
            total_trades,
            tick_count,
            point_of_control: q.price_of(poc),
            value_area_high: q.price_of(vah),
            value_area_low: q.price_of(val),
            is_up_bar: ohlc.close >= ohlc.open,
            tick_size: q.tick_size(),
            aggregation: self.aggregation,
            policy_fingerprint: self.fingerprint.clone(),
            zero_ratio_handling: self.zero_ratio_handling,
        }
    }
}

/// Compare the profile's volume with the running total.
///
/// Each level is a plain f64 sum, so the allowed drift grows with the number
/// of additions: (ticks + levels) ulps of the total, and never less than
/// `VOLUME_TOLERANCE` relative.
fn check_volume(
    levels: &BTreeMap<LevelKey, PriceLevel>,
    running: f64,
    tick_count: u64,
) -> Result<(), FinalizeError> {
    let profiled = levels.values().map(PriceLevel::total_volume).collect::<CompensatedSum>().value();
    let additions = tick_count as f64 + levels.len() as f64;
    let relative = (additions * f64::EPSILON).max(VOLUME_TOLERANCE);
    let tolerance = relative * running.abs().max(profiled.abs()).max(1.0);
    if (profiled - running).abs() > tolerance {
        return Err(FinalizeError::VolumeMismatch { profiled, running });
    }
    Ok(())
}

/// Level with the most volume. Ties go to the level nearest `close`, then to
/// the lowest price.
pub fn point_of_control(levels: &BTreeMap<LevelKey, PriceLevel>, close: LevelKey) -> Option<LevelKey> {
    let mut best: Option<(LevelKey, f64)> = None;
    // ascending iteration + strict comparisons keep the lowest price on a full tie
    for (&key, level) in levels {
        let volume = level.total_volume();
        let better = match best {
            None => true,
            Some((best_key, best_volume)) => match volume.total_cmp(&best_volume) {
                Ordering::Greater => true,
                Ordering::Less => false,
                Ordering::Equal => key.abs_diff(close) < best_key.abs_diff(close),
            },
        };
        if better {
            best = Some((key, volume));
        }
    }
    best.map(|(key, _)| key)
}

/// Grow a contiguous range out from `poc` until it holds `percentage` of
/// `total_volume`. Each step takes whichever neighbouring level (above or
/// below) has more volume; ties go below. Returns `(low, high)`.
pub fn value_area(
    levels: &BTreeMap<LevelKey, PriceLevel>,
    poc: LevelKey,
    percentage: f64,
    total_volume: f64,
) -> (LevelKey, LevelKey) {
    if total_volume <= 0.0 {
        return (poc, poc);
    }
    let keys: Vec<LevelKey> = levels.keys().copied().collect();
    let volumes: Vec<f64> = levels.values().map(PriceLevel::total_volume).collect();
    let Ok(start) = keys.binary_search(&poc) else {
        return (poc, poc);
    };

    let target = total_volume * percentage;
    let (mut low, mut high) = (start, start);
    let mut accumulated = volumes[start];

    while accumulated < target {
        let below = low.checked_sub(1).map(|i| volumes[i]);
        let above = volumes.get(high + 1).copied();
        match (below, above) {
            (None, None) => break,
            (Some(b), Some(a)) if a > b => {
                high += 1;
                accumulated += a;
            }
            (Some(b), _) => {
                low -= 1;
                accumulated += b;
            }
            (None, Some(a)) => {
                high += 1;
                accumulated += a;
            }
        }
    }

    (keys[low], keys[high])
}
