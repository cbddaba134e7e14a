//! Bar boundary detection.
//!
//! TIME bars close *before* absorbing the first tick of a later bucket, so
//! that tick opens the next bar. Every other rule closes *after* absorbing
//! the tick that meets its threshold, so that tick belongs to the closing bar.

use crate::config::{Aggregation, AggregationPolicy, BarInterval};
use crate::domain::Tick;
use crate::engine::accumulator::VolumeProfileAccumulator;
use crate::engine::quantizer::PriceQuantizer;

/// When a rule is evaluated relative to absorbing the incoming tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryTiming {
    BeforeAbsorb,
    AfterAbsorb,
}

/// A boundary rule with its threshold pre-converted to the units the
/// accumulator counts in.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Rule {
    TimeBucket(BarInterval),
    TickCount(u64),
    Volume(f64),
    RangeLevels(i64),
    ReversalLevels(i64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryDetector {
    rule: Rule,
}

impl BoundaryDetector {
    pub fn new(policy: &AggregationPolicy) -> Self {
        let quantizer = PriceQuantizer::new(policy.tick_size());
        let rule = match policy.aggregation() {
            Aggregation::Time(interval) => Rule::TimeBucket(interval),
            Aggregation::Tick(count) => Rule::TickCount(count.get()),
            Aggregation::Volume(amount) => Rule::Volume(amount),
            Aggregation::Range(span) => Rule::RangeLevels(quantizer.span_in_levels(span)),
            Aggregation::Reversal(amount) => Rule::ReversalLevels(quantizer.span_in_levels(amount)),
        };
        Self { rule }
    }

    pub fn timing(&self) -> BoundaryTiming {
        match self.rule {
            Rule::TimeBucket(_) => BoundaryTiming::BeforeAbsorb,
            _ => BoundaryTiming::AfterAbsorb,
        }
    }

    /// True when the open bar must be finalized before `tick` is absorbed.
    ///
    /// Always false for an empty accumulator: the first tick ever (or the
    /// first after a close) just opens a bar.
    pub fn should_close_before(&self, tick: &Tick, accumulator: &VolumeProfileAccumulator) -> bool {
        let Rule::TimeBucket(interval) = self.rule else {
            return false;
        };
        accumulator
            .open_time()
            .is_some_and(|open| interval.bucket(tick.timestamp) > interval.bucket(open))
    }

    /// True when the tick just absorbed completed the open bar.
    pub fn should_close_after(&self, accumulator: &VolumeProfileAccumulator) -> bool {
        if accumulator.is_empty() {
            return false;
        }
        match self.rule {
            Rule::TimeBucket(_) => false,
            Rule::TickCount(count) => accumulator.tick_count() >= count,
            Rule::Volume(amount) => accumulator.cumulative_volume() >= amount,
            Rule::RangeLevels(levels) => accumulator.range_in_levels() >= levels,
            Rule::ReversalLevels(levels) => accumulator.retrace_in_levels() >= levels,
        }
    }
}
