//! Aggregator tests.
//!
//! 1. September vs August for a 26-member program
//! 2. Zero prior month: percent change is None, not infinite
//! 3. Active (joined) vs paying (has payout) counts
//! 4. Year and range roll-ups
//! 5. Tier and join-date breakdowns
//! 6. Counts saturate; periods past the calendar range are errors
//! 7. Per-tier activity profile and slow-season spreads

use bel_core::{
    aggregator::{
        activity_profile, compare, join_summary, monthly_statistics, range_statistics, slow_season_report,
        tier_distribution, year_statistics, Trend,
    },
    calendar::{Month, YearMonth},
    error::BelError,
    ledger::{payout_id_for, PayoutLedger, PayoutRecord},
    member::{ActivityRecord, ActivityTable, Member, MemberRegistry, Tier},
    types::round2,
};
use chrono::NaiveDate;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn aug() -> YearMonth {
    YearMonth::new(2025, Month::August)
}

fn sep() -> YearMonth {
    YearMonth::new(2025, Month::September)
}

fn payout(member_id: &str, period: YearMonth, net: f64) -> PayoutRecord {
    let gross = round2(net / 0.8);
    PayoutRecord::settled(
        payout_id_for(member_id, period),
        period,
        date(period.year, period.month.number(), 12),
        gross,
        round2(gross - net),
        net,
    )
}

fn id(n: usize) -> String {
    format!("BEL{n:03}")
}

/// 26 members: 24 joined in 2024 and are paid in August and September,
/// 2 joined on 2025-09-05 and have no payouts yet.
fn program(with_august: bool) -> (MemberRegistry, PayoutLedger) {
    let mut members = Vec::new();
    let mut ledger = PayoutLedger::default();

    for n in 1..=26 {
        let joined = if n <= 24 { date(2024, 4, 1) } else { date(2025, 9, 5) };
        let mut activity = ActivityTable::new();
        activity.insert(aug(), ActivityRecord { clicks: 100, orders: 5, revenue: 1000.0 });
        activity.insert(sep(), ActivityRecord { clicks: 120, orders: 6, revenue: 1100.0 });
        members.push(Member::new(id(n), Tier::Builder, Some(joined)).with_activity(activity));

        if n <= 24 {
            // 23 × 514.40 + 514.47 = 12,345.67 ; 23 × 458.33 + 458.41 = 11,000.00
            let (sep_net, aug_net) = if n < 24 { (514.40, 458.33) } else { (514.47, 458.41) };
            ledger.append(&id(n), payout(&id(n), sep(), sep_net));
            if with_august {
                ledger.append(&id(n), payout(&id(n), aug(), aug_net));
            }
        }
    }
    (MemberRegistry::new(members), ledger)
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: month over month
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn september_vs_august_net_and_counts() {
    let (registry, ledger) = program(true);

    let august = monthly_statistics(aug(), &registry, &ledger).unwrap();
    let september = monthly_statistics(sep(), &registry, &ledger).unwrap();

    assert!((august.total_net_payout - 11_000.00).abs() < 0.005, "{}", august.total_net_payout);
    assert!((september.total_net_payout - 12_345.67).abs() < 0.005, "{}", september.total_net_payout);

    let mom = compare(&august, &september);
    assert!((mom.net_payout.change - 1345.67).abs() < 0.005, "{}", mom.net_payout.change);
    let pct = mom.net_payout.pct_change.unwrap();
    assert!((pct - 12.2334).abs() < 0.001, "{pct}");
    assert_eq!(mom.net_payout.trend(), Trend::Increased);

    assert_eq!(august.active_member_count, 24);
    assert_eq!(september.active_member_count, 26);
    assert_eq!(mom.active_members.change, 2.0);

    assert_eq!(august.total_order_count, 26 * 5);
    assert_eq!(september.total_order_count, 26 * 6);
    assert_eq!(mom.paying_members.trend(), Trend::NoChange);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: zero denominator
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn zero_prior_month_has_no_percent_change() {
    let (registry, ledger) = program(false);

    let august = monthly_statistics(aug(), &registry, &ledger).unwrap();
    let september = monthly_statistics(sep(), &registry, &ledger).unwrap();
    assert_eq!(august.total_net_payout, 0.0);
    assert_eq!(august.paying_member_count, 0);

    let mom = compare(&august, &september);
    assert_eq!(mom.net_payout.pct_change, None);
    assert!((mom.net_payout.change - 12_345.67).abs() < 0.005);
    assert_eq!(mom.paying_members.pct_change, None);
    assert!(mom.active_members.pct_change.is_some());
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 3: active vs paying
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn active_and_paying_are_counted_separately() {
    let (registry, ledger) = program(true);
    let september = monthly_statistics(sep(), &registry, &ledger).unwrap();

    assert_eq!(september.active_member_count, 26);
    assert_eq!(september.paying_member_count, 24);
}

#[test]
fn member_joined_on_last_day_is_active_and_missing_date_is_not() {
    let registry = MemberRegistry::new(vec![
        Member::new("BEL001", Tier::Leader, Some(date(2025, 9, 30))),
        Member::new("BEL002", Tier::Leader, Some(date(2025, 10, 1))),
        Member::new("BEL003", Tier::Leader, None),
    ]);
    let stats = monthly_statistics(sep(), &registry, &PayoutLedger::default()).unwrap();
    assert_eq!(stats.active_member_count, 1);
    assert_eq!(stats.total_net_payout, 0.0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 4: year and range
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn year_statistics_accumulate_net() {
    let (registry, ledger) = program(true);
    let year = year_statistics(2025, &registry, &ledger).unwrap();

    assert_eq!(year.months.len(), 12);
    assert_eq!(year.months[0].total_net_payout, 0.0);
    assert!((year.cumulative_net[7] - 11_000.00).abs() < 0.005);
    assert!((year.cumulative_net[8] - 23_345.67).abs() < 0.005);
    assert_eq!(year.cumulative_net[11], year.total_net_payout);
    assert_eq!(year.total_order_count, 26 * 11);
}

#[test]
fn range_statistics_is_inclusive_and_rejects_reversed() {
    let (registry, ledger) = program(true);

    let range = range_statistics(aug(), sep(), &registry, &ledger).unwrap();
    assert_eq!(range.months, 2);
    assert!((range.total_net_payout - 23_345.67).abs() < 0.005);
    assert_eq!(range.active_member_count, 26);

    assert!(range_statistics(sep(), aug(), &registry, &ledger).is_err());
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 5: breakdowns
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn tier_distribution_and_join_summary() {
    let registry = MemberRegistry::new(vec![
        Member::new("BEL001", Tier::Leader, Some(date(2024, 2, 1))),
        Member::new("BEL002", Tier::Builder, Some(date(2024, 2, 20))),
        Member::new("BEL003", Tier::Builder, Some(date(2025, 8, 3))),
        Member::new("BEL004", Tier::Builder, None),
    ]);

    let tiers = tier_distribution(&registry);
    assert_eq!(tiers.len(), 2);
    assert_eq!(tiers[0].tier, "Builder");
    assert_eq!(tiers[0].count, 3);
    assert!((tiers[0].share_pct - 75.0).abs() < 1e-9);

    let joins = join_summary(&registry, date(2025, 1, 1));
    assert_eq!(joins.total, 4);
    assert_eq!(joins.joined_before, 2);
    assert_eq!(joins.missing_join_date, 1);
    assert_eq!(joins.by_month.get("2024-02"), Some(&2));
    assert_eq!(joins.by_month.get("2025-08"), Some(&1));
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 6: boundaries
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn order_counts_saturate_instead_of_wrapping() {
    let huge = ActivityRecord { clicks: u64::MAX / 2 + 1, orders: u64::MAX / 2 + 1, revenue: 1.0 };
    let members = ["BEL001", "BEL002"]
        .into_iter()
        .map(|id| {
            let mut activity = ActivityTable::new();
            activity.insert(sep(), huge);
            Member::new(id, Tier::Leader, Some(date(2024, 1, 1))).with_activity(activity)
        })
        .collect();
    let registry = MemberRegistry::new(members);
    let ledger = PayoutLedger::default();

    let september = monthly_statistics(sep(), &registry, &ledger).unwrap();
    assert_eq!(september.total_order_count, u64::MAX);
    assert_eq!(september.total_clicks, u64::MAX);

    let year = year_statistics(2025, &registry, &ledger).unwrap();
    assert_eq!(year.total_order_count, u64::MAX);

    let range = range_statistics(aug(), YearMonth::new(2025, Month::October), &registry, &ledger).unwrap();
    assert_eq!(range.total_order_count, u64::MAX);
}

#[test]
fn period_past_the_calendar_range_is_an_error() {
    let registry = MemberRegistry::new(vec![Member::new("BEL001", Tier::Leader, Some(date(2024, 1, 1)))]);
    let ledger = PayoutLedger::default();

    let result = monthly_statistics(YearMonth::new(i32::MAX, Month::December), &registry, &ledger);
    assert!(matches!(result, Err(BelError::InvalidPeriod { .. })));
    assert!(YearMonth::new(i32::MIN, Month::January).pred().is_err());
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 7: activity profile
// ─────────────────────────────────────────────────────────────────────────────

fn active_in(records: &[(YearMonth, u64, u64, f64)]) -> ActivityTable {
    let mut table = ActivityTable::new();
    for &(period, clicks, orders, revenue) in records {
        table.insert(period, ActivityRecord { clicks, orders, revenue });
    }
    table
}

#[test]
fn activity_profile_groups_by_tier_and_ignores_idle_records() {
    let registry = MemberRegistry::new(vec![
        Member::new("BEL001", Tier::Leader, None).with_activity(active_in(&[(sep(), 900, 30, 25_000.0)])),
        Member::new("BEL002", Tier::Builder, None).with_activity(active_in(&[(sep(), 200, 4, 3000.0)])),
        Member::new("BEL003", Tier::Builder, None).with_activity(active_in(&[(sep(), 300, 8, 4500.0)])),
        Member::new("BEL004", Tier::Builder, None).with_activity(active_in(&[(sep(), 0, 0, 0.0)])),
    ]);

    let profile = activity_profile(&registry, sep());

    assert_eq!(profile.total_members, 4);
    assert_eq!(profile.members_with_activity, 3);
    assert!((profile.coverage_pct - 75.0).abs() < 1e-9);

    let tiers: Vec<&str> = profile.tiers.iter().map(|t| t.tier.as_str()).collect();
    assert_eq!(tiers, vec!["Builder", "Leader"]);

    let builder = &profile.tiers[0].spread;
    assert_eq!(builder.records, 2, "the zero-click record is not counted");
    assert_eq!(builder.clicks.min, 200.0);
    assert_eq!(builder.clicks.max, 300.0);
    assert_eq!(builder.clicks.mean, 250.0);
    assert_eq!(builder.orders.mean, 6.0);
    assert_eq!(builder.revenue.mean, 3750.0);

    let leader = &profile.tiers[1].spread;
    assert_eq!(leader.records, 1);
    assert_eq!(leader.orders.min, leader.orders.max);
}

#[test]
fn empty_registry_has_zero_coverage() {
    let profile = activity_profile(&MemberRegistry::default(), sep());
    assert_eq!(profile.coverage_pct, 0.0);
    assert!(profile.tiers.is_empty());
}

#[test]
fn slow_season_pools_years_and_leaves_empty_months_blank() {
    let march = |y| YearMonth::new(y, Month::March);
    let july = |y| YearMonth::new(y, Month::July);
    let registry = MemberRegistry::new(vec![
        Member::new("BEL001", Tier::Builder, None).with_activity(active_in(&[
            (march(2024), 100, 2, 1000.0),
            (march(2025), 140, 4, 1400.0),
            (july(2023), 999, 99, 9999.0),
        ])),
        Member::new("BEL002", Tier::Leader, None).with_activity(active_in(&[(march(2025), 120, 3, 1200.0)])),
    ]);

    let report = slow_season_report(&registry, &[2024, 2025], &[Month::March, Month::July]);

    assert_eq!(report.years, vec![2024, 2025]);
    assert_eq!(report.months.len(), 2);

    assert_eq!(report.months[0].month, Month::March);
    let spread = report.months[0].spread.unwrap();
    assert_eq!(spread.records, 3);
    assert_eq!(spread.clicks.min, 100.0);
    assert_eq!(spread.clicks.max, 140.0);
    assert_eq!(spread.clicks.mean, 120.0);
    assert_eq!(spread.orders.mean, 3.0);

    assert_eq!(report.months[1].month, Month::July);
    assert_eq!(report.months[1].spread, None, "2023 is outside the requested years");
}
