//! Aggregation core — turns a tick stream into finalized footprint bars.
//!
//! Components, leaves first:
//! - `quantizer`: price → tick-grid level
//! - `accumulator`: the open bar's profile and running counters
//! - `boundary`: when the open bar closes, before or after absorbing a tick
//! - `finalizer`: profile → immutable `Bar` (POC, value area, totals)
//! - `footprint`: the `FootprintEngine` orchestrator and its `BarStore`

pub mod accumulator;
pub mod boundary;
pub mod error;
pub mod finalizer;
pub mod footprint;
pub mod quantizer;
pub mod store;

pub use accumulator::{BarDirection, BarProfile, RunningOhlc, VolumeProfileAccumulator};
pub use boundary::{BoundaryDetector, BoundaryTiming};
pub use error::{EngineError, TickError};
pub use finalizer::{point_of_control, value_area, BarFinalizer, FinalizeError};
pub use footprint::FootprintEngine;
pub use quantizer::{quantize, PriceQuantizer, QuantizeError};
pub use store::BarStore;
