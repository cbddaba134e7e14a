//! Engine-level error types.

use crate::engine::finalizer::FinalizeError;
use crate::engine::quantizer::QuantizeError;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// A single tick rejected by input validation. The engine state is unchanged
/// and the stream can continue with the next tick.
#[derive(Debug, Error, PartialEq)]
pub enum TickError {
    #[error("price must be finite and positive, got {0}")]
    InvalidPrice(f64),

    #[error("volume must be finite and non-negative, got {0}")]
    InvalidVolume(f64),

    #[error("tick at {timestamp} is earlier than the last accepted tick at {last}")]
    OutOfOrder {
        timestamp: DateTime<Utc>,
        last: DateTime<Utc>,
    },

    #[error("price cannot be placed on the tick grid: {0}")]
    Unquantizable(#[from] QuantizeError),
}

/// Errors from `FootprintEngine` operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("rejected tick: {0}")]
    Tick(#[from] TickError),

    #[error("internal invariant violated: {0}")]
    Invariant(#[from] FinalizeError),

    #[error("tick {index} of batch: {source}")]
    Batch {
        index: usize,
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    /// True for input validation failures (the caller may fix and resubmit).
    pub fn is_rejection(&self) -> bool {
        match self {
            EngineError::Tick(_) => true,
            EngineError::Invariant(_) => false,
            EngineError::Batch { source, .. } => source.is_rejection(),
        }
    }
}
