//! Tick CSV loading.
//!
//! Expected header: `timestamp,price,volume,is_bid_trade`. Timestamps are
//! RFC 3339 strings or integer epoch milliseconds; `is_bid_trade` accepts
//! `true`/`false` in any case, or `1`/`0`.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use footprint_core::{Side, Tick};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct TickRecord {
    timestamp: String,
    price: f64,
    volume: f64,
    is_bid_trade: String,
}

impl TickRecord {
    fn into_tick(self) -> Result<Tick> {
        let timestamp = parse_timestamp(&self.timestamp)?;
        let is_bid = parse_flag(&self.is_bid_trade)?;
        Ok(Tick::new(timestamp, self.price, self.volume, Side::from_is_bid_trade(is_bid)))
    }
}

pub fn read_ticks_file(path: &Path) -> Result<Vec<Tick>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("open tick file {}", path.display()))?;
    read_ticks(file).with_context(|| format!("read tick file {}", path.display()))
}

pub fn read_ticks<R: Read>(reader: R) -> Result<Vec<Tick>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut ticks = Vec::new();
    for (index, record) in rdr.deserialize::<TickRecord>().enumerate() {
        // +2: one for the header, one for 1-based line numbers
        let line = index + 2;
        let tick = record
            .map_err(anyhow::Error::from)
            .and_then(TickRecord::into_tick)
            .with_context(|| format!("line {line}"))?;
        ticks.push(tick);
    }
    Ok(ticks)
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    if let Ok(millis) = text.parse::<i64>() {
        return DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| anyhow!("timestamp {millis}ms is out of range"));
    }
    DateTime::parse_from_rfc3339(text)
        .map(|ts| ts.with_timezone(&Utc))
        .with_context(|| format!("invalid timestamp '{text}'"))
}

fn parse_flag(text: &str) -> Result<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(anyhow!("invalid is_bid_trade value '{other}'")),
    }
}
