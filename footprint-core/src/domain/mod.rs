//! Domain types for the footprint engine

pub mod bar;
pub mod price_level;
pub mod tick;

pub use bar::Bar;
pub use price_level::{LevelKey, PriceLevel, ZeroRatioHandling};
pub use tick::{Side, Tick};
