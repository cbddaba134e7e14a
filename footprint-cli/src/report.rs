//! Run reports: a JSON document per config and the human-readable bar ladder.

use anyhow::{Context, Result};
use footprint_core::{Bar, FootprintEngine, PolicyFingerprint, ZeroRatioHandling};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Outcome of running one config over a tick stream.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub config: Option<PathBuf>,
    pub aggregation: String,
    pub fingerprint: PolicyFingerprint,
    pub ticks_processed: u64,
    pub ticks_rejected: u64,
    pub bars_closed: u64,
    pub bars: Vec<Bar>,
}

impl RunReport {
    pub fn from_engine(config: Option<PathBuf>, engine: &FootprintEngine) -> Self {
        Self {
            config,
            aggregation: engine.policy().aggregation().to_string(),
            fingerprint: engine.policy().fingerprint(),
            ticks_processed: engine.ticks_processed(),
            ticks_rejected: engine.ticks_rejected(),
            bars_closed: engine.total_bars_closed(),
            bars: engine.get_bars().to_vec(),
        }
    }

    pub fn headline(&self) -> String {
        let source = self
            .config
            .as_ref()
            .map_or_else(|| "built-in".to_string(), |p| p.display().to_string());
        format!(
            "{} [{}] {} ticks ({} rejected) -> {} bars",
            self.aggregation, source, self.ticks_processed, self.ticks_rejected, self.bars_closed
        )
    }
}

/// Write `reports` as one pretty-printed JSON array.
pub fn write_reports(path: &Path, reports: &[RunReport]) -> Result<()> {
    let json = serde_json::to_string_pretty(reports)?;
    std::fs::write(path, json).with_context(|| format!("write report {}", path.display()))
}

/// One-bar summary followed by its price ladder, highest price first.
///
/// ```text
/// 2024-01-02 14:30:00 -> 14:30:59  O 4500.25 H 4501.00 L 4499.75 C 4500.75  UP
///   volume 412  delta +38  trades 57  POC 4500.50  VA 4500.00..4500.75
///     4501.00      12 x 20     +8   1.67
///   > 4500.50      40 x 61    +21   1.52  *
/// ```
/// `>` marks the point of control, `*` the value area.
pub fn bar_summary(bar: &Bar) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} -> {}  O {:.2} H {:.2} L {:.2} C {:.2}  {}",
        bar.open_time.format("%Y-%m-%d %H:%M:%S"),
        bar.close_time.format("%H:%M:%S"),
        bar.open,
        bar.high,
        bar.low,
        bar.close,
        if bar.is_up_bar { "UP" } else { "DOWN" },
    );
    let _ = writeln!(
        out,
        "  volume {}  delta {:+}  trades {}  POC {:.2}  VA {:.2}..{:.2}  ratio {}",
        bar.total_volume,
        bar.delta,
        bar.total_trades,
        bar.point_of_control,
        bar.value_area_low,
        bar.value_area_high,
        format_ratio(bar.dominance_ratio(), bar.zero_ratio_handling),
    );
    for level in bar.levels.values().rev() {
        let poc = if level.price == bar.point_of_control { '>' } else { ' ' };
        let in_va = level.price >= bar.value_area_low && level.price <= bar.value_area_high;
        let _ = writeln!(
            out,
            "  {poc} {:>9.2}  {:>6} x {:<6} {:>+6}  {:>5}  {}",
            level.price,
            level.bid_volume,
            level.ask_volume,
            level.delta(),
            format_ratio(level.dominance_ratio(bar.zero_ratio_handling), bar.zero_ratio_handling),
            if in_va { "*" } else { "" },
        );
    }
    out
}

fn format_ratio(ratio: f64, handling: ZeroRatioHandling) -> String {
    match handling {
        ZeroRatioHandling::Infinite if ratio.is_infinite() => "inf".to_string(),
        _ => format!("{ratio:.2}"),
    }
}
