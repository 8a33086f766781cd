//! Aggregator — monthly, yearly and range statistics over both datasets.
//!
//! Two member counts are reported and never conflated:
//!   - `active_member_count`: members whose join date is on or before the
//!     last day of the month (members without a join date are not counted)
//!   - `paying_member_count`: distinct members with a payout in the month

use crate::{
    calendar::{Month, YearMonth},
    error::{BelError, BelResult},
    ledger::PayoutLedger,
    member::{ActivityRecord, MemberRegistry},
    types::{pct_change, round2},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyStatistics {
    pub period: YearMonth,
    pub total_net_payout: f64,
    pub total_gross_payout: f64,
    pub active_member_count: usize,
    pub paying_member_count: usize,
    pub total_order_count: u64,
    pub total_clicks: u64,
    pub total_revenue: f64,
}

pub fn monthly_statistics(
    period: YearMonth,
    registry: &MemberRegistry,
    ledger: &PayoutLedger,
) -> BelResult<MonthlyStatistics> {
    let month_end = period.last_day()?;

    let mut net = 0.0;
    let mut gross = 0.0;
    let mut paying: HashSet<&str> = HashSet::new();
    for entry in ledger.iter() {
        for record in entry.records_for(period) {
            net += record.net();
            gross += record.gross();
            paying.insert(entry.member_id.as_str());
        }
    }

    let active = registry
        .iter()
        .filter(|m| m.join_date().is_some_and(|d| d <= month_end))
        .count();

    let (mut orders, mut clicks, mut revenue) = (0u64, 0u64, 0.0);
    // Counts saturate at u64::MAX instead of wrapping.
    for record in registry.iter().filter_map(|m| m.activity.get(period)) {
        orders = orders.saturating_add(record.orders);
        clicks = clicks.saturating_add(record.clicks);
        revenue += record.revenue;
    }

    Ok(MonthlyStatistics {
        period,
        total_net_payout: round2(net),
        total_gross_payout: round2(gross),
        active_member_count: active,
        paying_member_count: paying.len(),
        total_order_count: orders,
        total_clicks: clicks,
        total_revenue: round2(revenue),
    })
}

// ── Month-over-month ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increased,
    Decreased,
    NoChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricDelta {
    pub prior: f64,
    pub current: f64,
    pub change: f64,
    /// None when the prior value is zero.
    pub pct_change: Option<f64>,
}

impl MetricDelta {
    pub fn between(prior: f64, current: f64) -> Self {
        Self {
            prior,
            current,
            change: round2(current - prior),
            pct_change: pct_change(prior, current),
        }
    }

    pub fn trend(&self) -> Trend {
        if self.change > 0.0 {
            Trend::Increased
        } else if self.change < 0.0 {
            Trend::Decreased
        } else {
            Trend::NoChange
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthOverMonth {
    pub from: YearMonth,
    pub to: YearMonth,
    pub net_payout: MetricDelta,
    pub gross_payout: MetricDelta,
    pub active_members: MetricDelta,
    pub paying_members: MetricDelta,
    pub orders: MetricDelta,
}

/// Elementwise difference `current - prior`.
pub fn compare(prior: &MonthlyStatistics, current: &MonthlyStatistics) -> MonthOverMonth {
    MonthOverMonth {
        from: prior.period,
        to: current.period,
        net_payout: MetricDelta::between(prior.total_net_payout, current.total_net_payout),
        gross_payout: MetricDelta::between(prior.total_gross_payout, current.total_gross_payout),
        active_members: MetricDelta::between(
            prior.active_member_count as f64,
            current.active_member_count as f64,
        ),
        paying_members: MetricDelta::between(
            prior.paying_member_count as f64,
            current.paying_member_count as f64,
        ),
        orders: MetricDelta::between(prior.total_order_count as f64, current.total_order_count as f64),
    }
}

// ── Year and range ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearStatistics {
    pub year: i32,
    pub months: Vec<MonthlyStatistics>,
    /// Running net payout total, one entry per month.
    pub cumulative_net: Vec<f64>,
    pub total_net_payout: f64,
    pub total_order_count: u64,
}

pub fn year_statistics(
    year: i32,
    registry: &MemberRegistry,
    ledger: &PayoutLedger,
) -> BelResult<YearStatistics> {
    let months = YearMonth::months_of(year)
        .map(|p| monthly_statistics(p, registry, ledger))
        .collect::<BelResult<Vec<_>>>()?;

    let mut running = 0.0;
    let cumulative_net = months
        .iter()
        .map(|m| {
            running = round2(running + m.total_net_payout);
            running
        })
        .collect();

    Ok(YearStatistics {
        year,
        total_net_payout: running,
        total_order_count: months
            .iter()
            .fold(0u64, |acc, m| acc.saturating_add(m.total_order_count)),
        months,
        cumulative_net,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeStatistics {
    pub from: YearMonth,
    pub to: YearMonth,
    pub months: usize,
    pub total_net_payout: f64,
    pub total_gross_payout: f64,
    pub total_order_count: u64,
    /// Active members at the end of the range.
    pub active_member_count: usize,
}

/// Totals over the inclusive range `from..=to`.
pub fn range_statistics(
    from: YearMonth,
    to: YearMonth,
    registry: &MemberRegistry,
    ledger: &PayoutLedger,
) -> BelResult<RangeStatistics> {
    if from > to {
        return Err(BelError::Other(anyhow::anyhow!("range {from}..={to} is reversed")));
    }

    let mut stats = RangeStatistics {
        from,
        to,
        months: 0,
        total_net_payout: 0.0,
        total_gross_payout: 0.0,
        total_order_count: 0,
        active_member_count: 0,
    };
    let mut period = from;
    loop {
        let m = monthly_statistics(period, registry, ledger)?;
        stats.months += 1;
        stats.total_net_payout = round2(stats.total_net_payout + m.total_net_payout);
        stats.total_gross_payout = round2(stats.total_gross_payout + m.total_gross_payout);
        stats.total_order_count = stats.total_order_count.saturating_add(m.total_order_count);
        stats.active_member_count = m.active_member_count;
        if period == to {
            break;
        }
        period = period.succ()?;
    }
    Ok(stats)
}

// ── Registry breakdowns ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierShare {
    pub tier: String,
    pub count: usize,
    pub share_pct: f64,
}

/// Member count and share per tier, ordered by tier name.
pub fn tier_distribution(registry: &MemberRegistry) -> Vec<TierShare> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for m in registry.iter() {
        *counts.entry(m.tier.to_string()).or_insert(0) += 1;
    }
    let total = registry.len().max(1) as f64;
    counts
        .into_iter()
        .map(|(tier, count)| TierShare { tier, count, share_pct: count as f64 / total * 100.0 })
        .collect()
}

// ── Activity profile ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSpread {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl MetricSpread {
    fn of(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut values = values.into_iter();
        let first = values.next()?;
        let (mut min, mut max, mut sum, mut n) = (first, first, first, 1usize);
        for v in values {
            min = min.min(v);
            max = max.max(v);
            sum += v;
            n += 1;
        }
        Some(Self { min, max, mean: round2(sum / n as f64) })
    }
}

/// Spread of each metric over a set of activity records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivitySpread {
    pub records: usize,
    pub clicks: MetricSpread,
    pub orders: MetricSpread,
    pub revenue: MetricSpread,
}

impl ActivitySpread {
    fn of(records: &[ActivityRecord]) -> Option<Self> {
        Some(Self {
            records: records.len(),
            clicks: MetricSpread::of(records.iter().map(|r| r.clicks as f64))?,
            orders: MetricSpread::of(records.iter().map(|r| r.orders as f64))?,
            revenue: MetricSpread::of(records.iter().map(|r| r.revenue))?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierActivity {
    pub tier: String,
    pub spread: ActivitySpread,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityProfile {
    pub period: YearMonth,
    pub total_members: usize,
    /// Members with at least one click in the period.
    pub members_with_activity: usize,
    pub coverage_pct: f64,
    /// Ordered by tier name; tiers without activity are omitted.
    pub tiers: Vec<TierActivity>,
}

/// Per-tier activity spread for one month, counting only records with
/// clicks.
pub fn activity_profile(registry: &MemberRegistry, period: YearMonth) -> ActivityProfile {
    let mut by_tier: BTreeMap<String, Vec<ActivityRecord>> = BTreeMap::new();
    for m in registry.iter() {
        if let Some(record) = m.activity.get(period).filter(|r| r.clicks > 0) {
            by_tier.entry(m.tier.to_string()).or_default().push(*record);
        }
    }

    let with_activity: usize = by_tier.values().map(Vec::len).sum();
    let coverage_pct = if registry.is_empty() {
        0.0
    } else {
        with_activity as f64 / registry.len() as f64 * 100.0
    };

    ActivityProfile {
        period,
        total_members: registry.len(),
        members_with_activity: with_activity,
        coverage_pct,
        tiers: by_tier
            .into_iter()
            .filter_map(|(tier, records)| ActivitySpread::of(&records).map(|spread| TierActivity { tier, spread }))
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonMonth {
    pub month: Month,
    /// None when no member has activity in that month in any of the years.
    pub spread: Option<ActivitySpread>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlowSeasonReport {
    pub years: Vec<i32>,
    pub months: Vec<SeasonMonth>,
}

/// Activity spread for each of `months`, pooling every member's records
/// with clicks across `years`.
pub fn slow_season_report(registry: &MemberRegistry, years: &[i32], months: &[Month]) -> SlowSeasonReport {
    let months = months
        .iter()
        .map(|&month| {
            let records: Vec<ActivityRecord> = registry
                .iter()
                .flat_map(|m| years.iter().filter_map(move |&y| m.activity.get(YearMonth::new(y, month))))
                .filter(|r| r.clicks > 0)
                .copied()
                .collect();
            SeasonMonth { month, spread: ActivitySpread::of(&records) }
        })
        .collect();
    SlowSeasonReport { years: years.to_vec(), months }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JoinSummary {
    pub total: usize,
    pub missing_join_date: usize,
    /// Members whose join date attribute is present but unreadable.
    pub malformed_join_date: usize,
    /// Members who joined strictly before the cut-off date.
    pub joined_before: usize,
    pub by_month: BTreeMap<String, usize>,
}

/// Join-date breakdown: members per join month, plus how many joined
/// before `cutoff`.
pub fn join_summary(registry: &MemberRegistry, cutoff: NaiveDate) -> JoinSummary {
    let mut summary = JoinSummary { total: registry.len(), ..Default::default() };
    for m in registry.iter() {
        match m.join_date() {
            Some(d) => {
                if d < cutoff {
                    summary.joined_before += 1;
                }
                *summary.by_month.entry(YearMonth::of(d).to_string()).or_insert(0) += 1;
            }
            None if m.malformed_join_date().is_some() => summary.malformed_join_date += 1,
            None => summary.missing_join_date += 1,
        }
    }
    summary
}
