//! Footprint Core — tick aggregation into footprint bars.
//!
//! This crate contains the aggregation engine:
//! - Domain types (ticks, price levels, bars)
//! - Configuration and the validated aggregation policy
//! - Boundary detection for TIME, TICK, VOLUME, RANGE and REVERSAL bars
//! - Per-price bid/ask volume profiles with point of control and value area
//! - A seeded synthetic tick generator for demos, tests and benchmarks

pub mod config;
pub mod domain;
pub mod engine;
pub mod sample;

pub use config::{
    Aggregation, AggregationPolicy, AggregationType, AggregationValue, BarInterval, ConfigError,
    FootprintConfig, PolicyFingerprint,
};
pub use domain::{Bar, LevelKey, PriceLevel, Side, Tick, ZeroRatioHandling};
pub use engine::{EngineError, FootprintEngine, TickError};
