//! Settlement generator tests.
//!
//! 1. Scripted draws give exact, hand-checkable amounts
//! 2. Bounds: with the default multiplier range, gross stays in [850, 1176]
//! 3. Baseline and prior-record selection
//! 4. settle_month skips existing periods and never duplicates
//! 5. Same seed, same ledger

use bel_core::{
    calendar::{Month, YearMonth},
    config::EngineConfig,
    ledger::{MemberPayouts, PayoutLedger, PayoutRecord},
    member::{Member, MemberRegistry, Tier},
    rng::{DrawSource, RngBank, StreamSlot},
    settlement::SettlementGenerator,
    types::round2,
    violation::ViolationKind,
};
use chrono::NaiveDate;

/// Replays a fixed sequence of draws, cycling when exhausted.
struct Scripted {
    values: Vec<f64>,
    pos: usize,
}

impl Scripted {
    fn new(values: &[f64]) -> Self {
        Self { values: values.to_vec(), pos: 0 }
    }
}

impl DrawSource for Scripted {
    fn next_f64(&mut self) -> f64 {
        let v = self.values[self.pos % self.values.len()];
        self.pos += 1;
        v
    }
}

fn sep() -> YearMonth {
    YearMonth::new(2025, Month::September)
}

fn prior(gross: f64, period: YearMonth) -> PayoutRecord {
    let wht = round2(gross * 0.2);
    PayoutRecord::settled(
        "prior".into(),
        period,
        NaiveDate::from_ymd_opt(period.year, period.month.number(), 12).unwrap(),
        gross,
        wht,
        round2(gross - wht),
    )
}

fn member(id: &str, tier: Tier) -> Member {
    Member::new(id, tier, NaiveDate::from_ymd_opt(2024, 3, 10))
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: scripted draws
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn lowest_draws_for_builder_give_exact_amounts() {
    let config = EngineConfig::default_test();
    let generator = SettlementGenerator::new(&config.settlement);
    let aug = prior(1000.0, YearMonth::new(2025, Month::August));

    // growth 1.02, multiplier 0.80
    let s = generator
        .derive_next_period("BEL007", Some(&aug), &Tier::Builder, sep(), &mut Scripted::new(&[0.0]))
        .unwrap();

    assert!(!s.tier_fallback);
    assert_eq!(s.record.gross_payout, Some(816.0));
    assert_eq!(s.record.wht, Some(163.2));
    assert_eq!(s.record.net_payout, Some(652.8));
    assert_eq!(s.record.payout_id.as_deref(), Some("PO-2025-007-09"));
    assert_eq!(s.record.date, NaiveDate::from_ymd_opt(2025, 9, 12));
    assert_eq!((s.record.year, s.record.month), (Some(2025), Some(9)));
}

#[test]
fn growth_is_drawn_before_the_multiplier() {
    let config = EngineConfig::default_test();
    let generator = SettlementGenerator::new(&config.settlement);

    // growth at its low end, multiplier at the midpoint of Leader's range.
    let s = generator
        .derive_next_period("BEL001", None, &Tier::Leader, sep(), &mut Scripted::new(&[0.0, 0.5]))
        .unwrap();

    assert!((s.growth - 1.02).abs() < 1e-12);
    assert!((s.multiplier - 1.10).abs() < 1e-12);
    assert_eq!(s.record.gross_payout, Some(round2(1000.0 * 1.02 * 1.10)));
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: bounds
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn unknown_tier_uses_default_range_and_stays_in_bounds() {
    let config = EngineConfig::default_test();
    let generator = SettlementGenerator::new(&config.settlement);
    let tier = Tier::parse("Unknown");
    let aug = prior(1000.0, YearMonth::new(2025, Month::August));
    let mut rng = RngBank::new(2025).for_slot(StreamSlot::Settlement);

    for _ in 0..500 {
        let s = generator.derive_next_period("BEL050", Some(&aug), &tier, sep(), &mut rng).unwrap();
        let gross = s.record.gross();
        assert!(s.tier_fallback);
        assert!((850.0..=1176.0).contains(&gross), "gross {gross} out of bounds");
        assert!((0.85..=1.05).contains(&s.multiplier));
        let expected_net = round2(gross * 0.8);
        assert!((s.record.net() - expected_net).abs() < 0.005, "net {} vs {expected_net}", s.record.net());
    }
}

#[test]
fn every_tier_respects_its_configured_range() {
    let config = EngineConfig::default_test();
    let generator = SettlementGenerator::new(&config.settlement);
    let mut rng = RngBank::new(9).for_slot(StreamSlot::Settlement);

    for (name, (low, high)) in &config.settlement.tier_multipliers {
        let tier = Tier::parse(name);
        let ((l, h), fallback) = generator.multiplier_range(&tier);
        assert_eq!((l, h), (*low, *high));
        assert!(!fallback);
        for _ in 0..100 {
            let s = generator.derive_next_period("BEL001", None, &tier, sep(), &mut rng).unwrap();
            assert!(s.multiplier >= *low && s.multiplier <= *high, "{name}: {}", s.multiplier);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 3: baseline and prior selection
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn no_history_uses_the_baseline() {
    let config = EngineConfig::default_test();
    let generator = SettlementGenerator::new(&config.settlement);
    let s = generator
        .derive_next_period("BEL002", None, &Tier::Enabler, sep(), &mut Scripted::new(&[0.3]))
        .unwrap();
    assert_eq!(s.prior_gross, 1000.0);
    assert!(s.record.gross() > 0.0);
}

#[test]
fn prior_is_previous_month_else_latest_record() {
    let mut history = MemberPayouts::new("BEL003");
    history.payout_history.push(prior(900.0, YearMonth::new(2025, Month::August)));
    history.payout_history.push(prior(1200.0, YearMonth::new(2025, Month::June)));

    let found = SettlementGenerator::prior_for(&history, sep()).unwrap();
    assert_eq!(found.gross(), 900.0, "previous month wins over list order");

    let found = SettlementGenerator::prior_for(&history, YearMonth::new(2025, Month::November)).unwrap();
    assert_eq!(found.gross(), 1200.0, "falls back to the last record");

    assert!(SettlementGenerator::prior_for(&MemberPayouts::new("BEL004"), sep()).is_none());
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 4: settle_month
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn settle_month_skips_existing_and_warns_on_unknown_tier() {
    let config = EngineConfig::default_test();
    let generator = SettlementGenerator::new(&config.settlement);
    let aug = YearMonth::new(2025, Month::August);

    let registry = MemberRegistry::new(vec![
        member("BEL001", Tier::Leader),
        member("BEL002", Tier::Builder),
        member("BEL003", Tier::parse("Platinum")),
    ]);

    let mut done = MemberPayouts::new("BEL001");
    done.payout_history.push(prior(1100.0, sep()));
    let mut pending = MemberPayouts::new("BEL002");
    pending.payout_history.push(prior(1000.0, aug));
    let odd = MemberPayouts::new("BEL003");
    // In the ledger but not in the registry: settled with the fallback tier.
    let orphan = MemberPayouts::new("BEL090");
    let mut ledger = PayoutLedger::new(vec![done, pending, odd, orphan]);

    let mut rng = RngBank::new(42).for_slot(StreamSlot::Settlement);
    let run = generator.settle_month(&mut ledger, &registry, sep(), &mut rng).unwrap();

    assert_eq!(run.skipped, vec!["BEL001".to_string()]);
    let created: Vec<&str> = run.created.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(created, vec!["BEL002", "BEL003", "BEL090"]);

    assert_eq!(run.warnings.len(), 1);
    assert_eq!(run.warnings[0].member_id, "BEL003");
    assert_eq!(run.warnings[0].kind, ViolationKind::UnknownTier { tier: "Platinum".into() });

    let orphan_settlement = &run.created[2].1;
    assert!(!orphan_settlement.tier_fallback);
    assert!((0.80..=1.00).contains(&orphan_settlement.multiplier));

    for id in ["BEL001", "BEL002", "BEL003", "BEL090"] {
        assert!(ledger.has_period(id, sep()), "{id} should have exactly one record");
    }
    assert_eq!(ledger.get("BEL001").unwrap().payout_history[0].gross(), 1100.0);

    // A second run is a no-op.
    let again = generator.settle_month(&mut ledger, &registry, sep(), &mut rng).unwrap();
    assert!(again.created.is_empty());
    assert_eq!(again.skipped.len(), 4);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 5: determinism
// ─────────────────────────────────────────────────────────────────────────────

fn settle_with_seed(seed: u64) -> Vec<f64> {
    let config = EngineConfig::default_test();
    let generator = SettlementGenerator::new(&config.settlement);
    let registry = MemberRegistry::new(vec![member("BEL001", Tier::Leader), member("BEL002", Tier::Explorer)]);
    let mut ledger = PayoutLedger::new(vec![MemberPayouts::new("BEL001"), MemberPayouts::new("BEL002")]);
    let mut rng = RngBank::new(seed).for_slot(StreamSlot::Settlement);
    let run = generator.settle_month(&mut ledger, &registry, sep(), &mut rng).unwrap();
    run.created.iter().map(|(_, s)| s.record.gross()).collect()
}

#[test]
fn same_seed_same_settlement() {
    assert_eq!(settle_with_seed(7), settle_with_seed(7));
    assert_ne!(settle_with_seed(7), settle_with_seed(8));
}
