//! Tick — one executed trade.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggressor side of a trade.
///
/// `Bid` means the seller hit the bid; `Ask` means the buyer lifted the offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    pub fn from_is_bid_trade(is_bid_trade: bool) -> Self {
        if is_bid_trade {
            Side::Bid
        } else {
            Side::Ask
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub volume: f64,
    pub side: Side,
}

impl Tick {
    pub fn new(timestamp: DateTime<Utc>, price: f64, volume: f64, side: Side) -> Self {
        Self { timestamp, price, volume, side }
    }

    pub fn is_bid_trade(&self) -> bool {
        self.side == Side::Bid
    }
}
