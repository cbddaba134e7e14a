//! `FootprintEngine` — wires quantizer, boundary detector, accumulator and
//! finalizer together per incoming tick.
//!
//! Per tick:
//! 1. Validate (price, volume, ordering, grid). Rejections change nothing.
//! 2. Before-absorb boundary check (TIME): finalize the open bar if the tick
//!    belongs to a later bucket.
//! 3. Absorb the tick (opening a bar if none is open).
//! 4. After-absorb boundary check (TICK/VOLUME/RANGE/REVERSAL): finalize if
//!    the tick met the threshold. The next bar opens lazily on the next tick.
//!
//! Not thread-safe for concurrent `process_tick` calls; wrap in a lock if the
//! engine is shared.

use crate::config::{AggregationPolicy, ConfigError, FootprintConfig};
use crate::domain::{Bar, Side, Tick};
use crate::engine::accumulator::VolumeProfileAccumulator;
use crate::engine::boundary::{BoundaryDetector, BoundaryTiming};
use crate::engine::error::{EngineError, TickError};
use crate::engine::finalizer::{BarFinalizer, FinalizeError};
use crate::engine::quantizer::PriceQuantizer;
use crate::engine::store::BarStore;
use chrono::{DateTime, Utc};
use tracing::{debug, info, trace, warn};

pub struct FootprintEngine {
    policy: AggregationPolicy,
    quantizer: PriceQuantizer,
    detector: BoundaryDetector,
    finalizer: BarFinalizer,
    accumulator: VolumeProfileAccumulator,
    store: BarStore,
    /// Timestamp of the last accepted tick, for ordering checks.
    last_timestamp: Option<DateTime<Utc>>,
    ticks_processed: u64,
    ticks_rejected: u64,
}

impl FootprintEngine {
    pub fn new(policy: AggregationPolicy) -> Self {
        let quantizer = PriceQuantizer::new(policy.tick_size());
        info!(
            aggregation = %policy.aggregation(),
            tick_size = policy.tick_size(),
            value_area = policy.value_area_percentage(),
            fingerprint = %policy.fingerprint(),
            "footprint engine initialized"
        );
        Self {
            detector: BoundaryDetector::new(&policy),
            finalizer: BarFinalizer::new(&policy),
            accumulator: VolumeProfileAccumulator::new(quantizer),
            store: BarStore::new(policy.max_bars_in_memory()),
            quantizer,
            policy,
            last_timestamp: None,
            ticks_processed: 0,
            ticks_rejected: 0,
        }
    }

    /// Validate `config` and build an engine from it.
    pub fn from_config(config: &FootprintConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.validate()?))
    }

    /// Process one trade. `is_bid_trade` means the seller was the aggressor.
    pub fn process_tick(
        &mut self,
        timestamp: DateTime<Utc>,
        price: f64,
        volume: f64,
        is_bid_trade: bool,
    ) -> Result<(), EngineError> {
        self.process(Tick::new(timestamp, price, volume, Side::from_is_bid_trade(is_bid_trade)))
    }

    pub fn process(&mut self, tick: Tick) -> Result<(), EngineError> {
        if let Err(err) = self.validate(&tick) {
            self.ticks_rejected += 1;
            warn!(timestamp = %tick.timestamp, price = tick.price, volume = tick.volume, error = %err, "tick rejected");
            return Err(err.into());
        }

        if self.detector.should_close_before(&tick, &self.accumulator) {
            self.close_bar()?;
        }

        let key = self.accumulator.absorb(&tick).map_err(TickError::from)?;
        self.last_timestamp = Some(tick.timestamp);
        self.ticks_processed += 1;
        trace!(timestamp = %tick.timestamp, level = key, volume = tick.volume, side = ?tick.side, "tick absorbed");

        if self.detector.timing() == BoundaryTiming::AfterAbsorb
            && self.detector.should_close_after(&self.accumulator)
        {
            self.close_bar()?;
        }
        Ok(())
    }

    /// Process ticks in order, stopping at the first failure. Ticks before
    /// the failing one stay applied.
    pub fn process_batch(&mut self, ticks: &[Tick]) -> Result<(), EngineError> {
        debug!(count = ticks.len(), "processing tick batch");
        for (index, tick) in ticks.iter().enumerate() {
            self.process(*tick).map_err(|source| EngineError::Batch {
                index,
                source: Box::new(source),
            })?;
        }
        Ok(())
    }

    /// Finalize the open bar at end of stream. Returns whether a bar closed.
    pub fn flush(&mut self) -> Result<bool, EngineError> {
        if self.accumulator.is_empty() {
            return Ok(false);
        }
        self.close_bar()?;
        Ok(true)
    }

    /// Finalized bars, in close order. Never includes the open bar.
    pub fn get_bars(&self) -> &[Bar] {
        self.store.bars()
    }

    /// Provisional view of the open bar, or `None` if no bar is open.
    pub fn open_bar(&self) -> Result<Option<Bar>, FinalizeError> {
        if self.accumulator.is_empty() {
            return Ok(None);
        }
        self.finalizer.preview(&self.accumulator).map(Some)
    }

    pub fn policy(&self) -> &AggregationPolicy {
        &self.policy
    }

    pub fn ticks_processed(&self) -> u64 {
        self.ticks_processed
    }

    pub fn ticks_rejected(&self) -> u64 {
        self.ticks_rejected
    }

    /// Bars closed over the engine's lifetime, including any evicted by the
    /// retention cap.
    pub fn total_bars_closed(&self) -> u64 {
        self.store.total_appended()
    }

    fn validate(&self, tick: &Tick) -> Result<(), TickError> {
        if !tick.price.is_finite() || tick.price <= 0.0 {
            return Err(TickError::InvalidPrice(tick.price));
        }
        if !tick.volume.is_finite() || tick.volume < 0.0 {
            return Err(TickError::InvalidVolume(tick.volume));
        }
        if let Some(last) = self.last_timestamp {
            if tick.timestamp < last {
                return Err(TickError::OutOfOrder { timestamp: tick.timestamp, last });
            }
        }
        self.quantizer.level_key(tick.price)?;
        Ok(())
    }

    fn close_bar(&mut self) -> Result<(), FinalizeError> {
        let bar = self.finalizer.finalize(&mut self.accumulator)?;
        debug!(
            open_time = %bar.open_time,
            close_time = %bar.close_time,
            volume = bar.total_volume,
            delta = bar.delta,
            poc = bar.point_of_control,
            levels = bar.level_count(),
            "bar finalized"
        );
        self.store.append(bar);
        Ok(())
    }
}
