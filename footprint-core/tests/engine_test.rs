//! Integration tests for the footprint engine.
//!
//! Tests:
//! 1. TIME and TICK boundaries on the worked tick sequences
//! 2. VOLUME, RANGE and REVERSAL bars include the breaching tick
//! 3. Rejections (bad volume, bad price, late ticks) leave the engine untouched
//! 4. Value area on a hand-built profile, end to end
//! 5. flush, open_bar, batches and bar retention

use chrono::{DateTime, Utc};
use footprint_core::sample::TickGenerator;
use footprint_core::{
    Aggregation, AggregationPolicy, BarInterval, EngineError, FootprintConfig, FootprintEngine,
    Side, Tick, TickError, ZeroRatioHandling,
};
use std::num::NonZeroU64;

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_040 + secs, 0).unwrap()
}

fn engine(aggregation: Aggregation) -> FootprintEngine {
    let policy = AggregationPolicy::new(0.25, aggregation, 0.70, ZeroRatioHandling::SetToOne).unwrap();
    FootprintEngine::new(policy)
}

fn tick_bars(count: u64) -> FootprintEngine {
    engine(Aggregation::Tick(NonZeroU64::new(count).unwrap()))
}

// ── 1. TIME and TICK ─────────────────────────────────────────────────

#[test]
fn time_bar_closes_on_first_tick_of_next_minute() {
    // at(0) is aligned to a minute boundary
    assert_eq!(at(0).timestamp() % 60, 0);
    let config = FootprintConfig::from_toml(
        r#"
        tick_size = 0.25
        aggregation_type = "TIME"
        aggregation_value = "1 minute"
        "#,
    )
    .unwrap();
    let mut e = FootprintEngine::from_config(&config).unwrap();

    e.process_tick(at(0), 100.00, 5.0, false).unwrap();
    e.process_tick(at(30), 100.25, 3.0, true).unwrap();
    assert!(e.get_bars().is_empty());

    e.process_tick(at(61), 100.50, 2.0, false).unwrap();
    let bars = e.get_bars();
    assert_eq!(bars.len(), 1);

    let bar = &bars[0];
    assert_eq!((bar.open, bar.high, bar.low, bar.close), (100.00, 100.25, 100.00, 100.25));
    assert_eq!(bar.total_volume, 8.0);
    assert_eq!(bar.delta, 2.0);
    assert_eq!(bar.open_time, at(0));
    assert_eq!(bar.close_time, at(30));
    assert!(bar.is_up_bar);

    // the t=61s tick opened the next bar
    let open = e.open_bar().unwrap().unwrap();
    assert_eq!(open.open, 100.50);
    assert_eq!(open.total_volume, 2.0);
    assert_eq!(open.open_time, at(60));
}

#[test]
fn time_bars_skip_empty_buckets() {
    let mut e = engine(Aggregation::Time(BarInterval::from_secs(60).unwrap()));
    e.process_tick(at(5), 100.0, 1.0, false).unwrap();
    e.process_tick(at(305), 100.0, 1.0, false).unwrap();
    e.flush().unwrap();

    let bars = e.get_bars();
    assert_eq!(bars.len(), 2);
    assert_eq!(bars[0].open_time, at(0));
    assert_eq!(bars[1].open_time, at(300));
}

#[test]
fn tick_bar_appears_right_after_second_tick() {
    let mut e = tick_bars(2);
    e.process_tick(at(0), 100.0, 4.0, false).unwrap();
    assert!(e.get_bars().is_empty());

    e.process_tick(at(1), 100.25, 6.0, true).unwrap();
    assert_eq!(e.get_bars().len(), 1);
    assert_eq!(e.get_bars()[0].total_volume, 10.0);
    assert_eq!(e.get_bars()[0].tick_count, 2);
    assert!(e.open_bar().unwrap().is_none());

    e.process_tick(at(2), 100.5, 1.0, false).unwrap();
    assert_eq!(e.get_bars().len(), 1);
    assert_eq!(e.open_bar().unwrap().unwrap().total_volume, 1.0);
}

// ── 2. Threshold bars ────────────────────────────────────────────────

#[test]
fn volume_bar_includes_breaching_tick() {
    let mut e = engine(Aggregation::Volume(10.0));
    for (i, volume) in [4.0, 4.0, 4.0, 1.0].into_iter().enumerate() {
        e.process_tick(at(i as i64), 100.0, volume, false).unwrap();
    }
    let bars = e.get_bars();
    assert_eq!(bars.len(), 1);
    assert_eq!(bars[0].total_volume, 12.0);
    assert_eq!(e.open_bar().unwrap().unwrap().total_volume, 1.0);
}

#[test]
fn range_bar_closes_when_span_reached() {
    let mut e = engine(Aggregation::Range(1.0));
    e.process_tick(at(0), 100.0, 1.0, false).unwrap();
    e.process_tick(at(1), 100.5, 1.0, false).unwrap();
    assert!(e.get_bars().is_empty());
    e.process_tick(at(2), 101.0, 1.0, false).unwrap();

    let bars = e.get_bars();
    assert_eq!(bars.len(), 1);
    assert_eq!((bars[0].low, bars[0].high), (100.0, 101.0));
    assert_eq!(bars[0].close, 101.0);
}

#[test]
fn reversal_bar_closes_on_retrace_from_high() {
    let mut e = engine(Aggregation::Reversal(0.5));
    for (i, price) in [100.0, 100.5, 101.0, 100.75].into_iter().enumerate() {
        e.process_tick(at(i as i64), price, 1.0, false).unwrap();
    }
    assert!(e.get_bars().is_empty());

    e.process_tick(at(4), 100.5, 1.0, true).unwrap();
    let bars = e.get_bars();
    assert_eq!(bars.len(), 1);
    assert_eq!(bars[0].high, 101.0);
    assert_eq!(bars[0].close, 100.5);
    assert_eq!(bars[0].tick_count, 5);
}

#[test]
fn reversal_bar_closes_on_bounce_from_low() {
    let mut e = engine(Aggregation::Reversal(0.5));
    for (i, price) in [100.0, 99.5, 99.0, 99.5].into_iter().enumerate() {
        e.process_tick(at(i as i64), price, 1.0, true).unwrap();
    }
    let bars = e.get_bars();
    assert_eq!(bars.len(), 1);
    assert!(!bars[0].is_up_bar);
    assert_eq!(bars[0].low, 99.0);
}

#[test]
fn reversal_direction_is_set_by_first_move_even_if_bar_nets_down() {
    let mut e = engine(Aggregation::Reversal(0.5));
    e.process_tick(at(0), 100.0, 1.0, false).unwrap();
    e.process_tick(at(1), 100.25, 1.0, false).unwrap();
    assert!(e.get_bars().is_empty());

    // two levels below the 100.25 high, one below the open
    e.process_tick(at(2), 99.75, 1.0, true).unwrap();
    let bars = e.get_bars();
    assert_eq!(bars.len(), 1);
    assert_eq!((bars[0].open, bars[0].high, bars[0].low, bars[0].close), (100.0, 100.25, 99.75, 99.75));
    assert!(!bars[0].is_up_bar);
    assert_eq!(bars[0].tick_count, 3);
}

// ── 3. Rejections ────────────────────────────────────────────────────

#[test]
fn negative_volume_is_rejected_without_side_effects() {
    let mut e = tick_bars(2);
    e.process_tick(at(0), 100.0, 1.0, false).unwrap();
    e.process_tick(at(1), 100.0, 1.0, false).unwrap();
    let before = e.get_bars().to_vec();

    let err = e.process_tick(at(2), 100.0, -1.0, false).unwrap_err();
    assert!(matches!(err, EngineError::Tick(TickError::InvalidVolume(v)) if v == -1.0));
    assert!(err.is_rejection());

    assert_eq!(e.get_bars(), before.as_slice());
    assert!(e.open_bar().unwrap().is_none());
}

#[test]
fn late_tick_is_rejected_and_stream_continues() {
    let mut e = engine(Aggregation::Time(BarInterval::from_secs(60).unwrap()));
    e.process_tick(at(70), 100.0, 1.0, false).unwrap();

    let err = e.process_tick(at(10), 100.0, 1.0, false).unwrap_err();
    assert!(matches!(err, EngineError::Tick(TickError::OutOfOrder { .. })));
    assert_eq!(e.open_bar().unwrap().unwrap().tick_count, 1);

    e.process_tick(at(75), 100.25, 1.0, false).unwrap();
    assert_eq!(e.open_bar().unwrap().unwrap().tick_count, 2);
    assert_eq!(e.ticks_rejected(), 1);
}

#[test]
fn zero_volume_tick_is_accepted() {
    let mut e = tick_bars(1);
    e.process_tick(at(0), 100.0, 0.0, false).unwrap();
    let bar = &e.get_bars()[0];
    assert_eq!(bar.total_volume, 0.0);
    assert_eq!(bar.point_of_control, 100.0);
    assert_eq!((bar.value_area_low, bar.value_area_high), (100.0, 100.0));
}

// ── 4. Value area ────────────────────────────────────────────────────

#[test]
fn value_area_expands_from_poc_toward_heavier_side() {
    let mut e = engine(Aggregation::Volume(16.0));
    let ticks = [
        (99.75, 2.0, true),
        (100.00, 6.0, false),
        (100.00, 4.0, true),
        (100.25, 3.0, false),
        (100.50, 1.0, false),
    ];
    for (i, (price, volume, is_bid)) in ticks.into_iter().enumerate() {
        e.process_tick(at(i as i64), price, volume, is_bid).unwrap();
    }

    let bar = &e.get_bars()[0];
    assert_eq!(bar.total_volume, 16.0);
    assert_eq!(bar.point_of_control, 100.00);
    assert_eq!(bar.value_area_high, 100.25);
    assert_eq!(bar.value_area_low, 100.00);
    assert_eq!(bar.value_area_volume(), 13.0);
    assert_eq!(bar.level_count(), 4);

    let poc = bar.level(100.0).unwrap();
    assert_eq!((poc.bid_volume, poc.ask_volume), (4.0, 6.0));
    assert_eq!(poc.delta(), 2.0);
}

#[test]
fn every_bar_conserves_volume_and_brackets_poc() {
    let mut e = engine(Aggregation::Tick(NonZeroU64::new(25).unwrap()));
    let ticks: Vec<Tick> = TickGenerator::new(11, 4500.0, 0.25, at(0)).take(1_000).collect();
    e.process_batch(&ticks).unwrap();
    e.flush().unwrap();

    assert_eq!(e.get_bars().len(), 40);
    for bar in e.get_bars() {
        let profiled: f64 = bar.levels.values().map(|l| l.bid_volume + l.ask_volume).sum();
        assert!((profiled - bar.total_volume).abs() < 1e-9);
        assert!(bar.value_area_low <= bar.point_of_control);
        assert!(bar.point_of_control <= bar.value_area_high);
        assert!(bar.is_sane());
    }
}

// ── 5. Lifecycle ─────────────────────────────────────────────────────

#[test]
fn get_bars_is_idempotent() {
    let mut e = tick_bars(3);
    for i in 0..10 {
        e.process_tick(at(i), 100.0 + i as f64 * 0.25, 1.0, i % 2 == 0).unwrap();
    }
    let first = e.get_bars().to_vec();
    let second = e.get_bars().to_vec();
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}

#[test]
fn flush_emits_partial_bar_and_is_noop_afterwards() {
    let mut e = tick_bars(100);
    assert!(!e.flush().unwrap());
    for i in 0..7 {
        e.process_tick(at(i), 100.0, 1.0, false).unwrap();
    }
    assert!(e.flush().unwrap());
    assert!(!e.flush().unwrap());
    assert_eq!(e.get_bars().len(), 1);
    assert_eq!(e.get_bars()[0].tick_count, 7);
}

#[test]
fn batch_stops_at_first_rejection() {
    let mut e = tick_bars(2);
    let ticks = vec![
        Tick::new(at(0), 100.0, 1.0, Side::Ask),
        Tick::new(at(1), 100.0, 1.0, Side::Bid),
        Tick::new(at(2), 100.0, f64::NAN, Side::Ask),
        Tick::new(at(3), 100.0, 1.0, Side::Ask),
    ];
    let err = e.process_batch(&ticks).unwrap_err();
    match err {
        EngineError::Batch { index, source } => {
            assert_eq!(index, 2);
            assert!(matches!(*source, EngineError::Tick(TickError::InvalidVolume(_))));
        }
        other => panic!("expected batch error, got {other:?}"),
    }
    assert_eq!(e.get_bars().len(), 1);
    assert_eq!(e.ticks_processed(), 2);
}

#[test]
fn retention_keeps_newest_bars_in_order() {
    let policy = AggregationPolicy::new(
        0.25,
        Aggregation::Tick(NonZeroU64::new(1).unwrap()),
        0.70,
        ZeroRatioHandling::SetToOne,
    )
    .unwrap()
    .with_max_bars_in_memory(Some(3))
    .unwrap();
    let mut e = FootprintEngine::new(policy);
    for i in 0..5 {
        e.process_tick(at(i), 100.0 + i as f64, 1.0, false).unwrap();
    }

    let closes: Vec<f64> = e.get_bars().iter().map(|b| b.close).collect();
    assert_eq!(closes, vec![102.0, 103.0, 104.0]);
    assert_eq!(e.total_bars_closed(), 5);
}

#[test]
fn bars_carry_policy_identity() {
    let mut e = tick_bars(1);
    e.process_tick(at(0), 100.0, 1.0, false).unwrap();
    let bar = &e.get_bars()[0];
    assert_eq!(bar.tick_size, 0.25);
    assert_eq!(bar.aggregation, e.policy().aggregation());
    assert_eq!(bar.policy_fingerprint, e.policy().fingerprint());
}

#[test]
fn dominance_ratio_follows_zero_handling() {
    let mut ones = engine(Aggregation::Tick(NonZeroU64::new(1).unwrap()));
    ones.process_tick(at(0), 100.0, 4.0, false).unwrap();
    assert_eq!(ones.get_bars()[0].dominance_ratio(), 4.0);

    let policy = AggregationPolicy::new(
        0.25,
        Aggregation::Tick(NonZeroU64::new(1).unwrap()),
        0.70,
        ZeroRatioHandling::Infinite,
    )
    .unwrap();
    let mut inf = FootprintEngine::new(policy);
    inf.process_tick(at(0), 100.0, 4.0, false).unwrap();
    assert!(inf.get_bars()[0].dominance_ratio().is_infinite());
    // delta and totals are never affected by the ratio policy
    assert_eq!(inf.get_bars()[0].delta, 4.0);
}
