//! Synthetic seeding — activity metrics and join dates for demo datasets.
//!
//! Nothing here is statistically meaningful. The only guarantee is
//! structural: generated values are non-negative and within the tier's
//! configured range (after slow-month dampening). Seeding ignores join
//! dates; run the enforcer afterwards.

use crate::{
    calendar::{Month, YearMonth},
    config::{ActivityRanges, SeedingConfig},
    member::{ActivityRecord, MemberRegistry, Tier},
    rng::DrawSource,
    types::MemberId,
};
use chrono::{Duration, NaiveDate};

pub struct ActivitySeeder<'a> {
    config: &'a SeedingConfig,
}

impl<'a> ActivitySeeder<'a> {
    pub fn new(config: &'a SeedingConfig) -> Self {
        Self { config }
    }

    fn ranges_for(&self, tier: &Tier) -> Option<&ActivityRanges> {
        self.config
            .activity_ranges
            .get(tier.as_str())
            .or_else(|| self.config.activity_ranges.get(&self.config.default_activity_tier))
    }

    /// Dampening factor for a month (1.0 outside the slow season).
    pub fn month_factor(&self, month: Month) -> f64 {
        self.config
            .slow_month_factors
            .get(month.name())
            .copied()
            .unwrap_or(1.0)
    }

    /// One month of metrics for a tier. Values are drawn within the tier's
    /// ranges, scaled by the month factor and truncated.
    pub fn generate(&self, tier: &Tier, month: Month, draw: &mut impl DrawSource) -> ActivityRecord {
        let Some(ranges) = self.ranges_for(tier) else {
            return ActivityRecord::default();
        };
        let factor = self.month_factor(month);
        let mut scaled = |(low, high): (u64, u64)| (draw.int_inclusive(low, high) as f64 * factor) as u64;
        ActivityRecord {
            clicks: scaled(ranges.clicks),
            orders: scaled(ranges.orders),
            revenue: scaled(ranges.revenue) as f64,
        }
    }

    /// Fill `period` for every member whose record is missing or all zero.
    /// Returns the members that were filled.
    pub fn fill_month(
        &self,
        registry: &mut MemberRegistry,
        period: YearMonth,
        draw: &mut impl DrawSource,
    ) -> Vec<MemberId> {
        let mut filled = Vec::new();
        for member in registry.iter_mut() {
            let empty = member.activity.get(period).map_or(true, ActivityRecord::is_zero);
            if empty {
                let record = self.generate(&member.tier, period.month, draw);
                member.activity.insert(period, record);
                filled.push(member.id.clone());
            }
        }
        log::info!("seeding: filled {period} for {} members", filled.len());
        filled
    }

    /// Regenerate existing slow-month records of `year` so the dampening
    /// applies. Months without a record are left absent.
    pub fn reseed_slow_months(
        &self,
        registry: &mut MemberRegistry,
        year: i32,
        draw: &mut impl DrawSource,
    ) -> usize {
        let slow: Vec<Month> = Month::ALL
            .into_iter()
            .filter(|m| self.config.slow_month_factors.contains_key(m.name()))
            .collect();
        let mut count = 0;
        for member in registry.iter_mut() {
            for month in &slow {
                let period = YearMonth::new(year, *month);
                if member.activity.get(period).is_some() {
                    let record = self.generate(&member.tier, *month, draw);
                    member.activity.insert(period, record);
                    count += 1;
                }
            }
        }
        log::info!("seeding: reseeded {count} slow-month records in {year}");
        count
    }

    /// Assign join dates to members that have none, filling the configured
    /// cohorts in order. Once every cohort is full the first one takes the
    /// overflow. Existing join dates are never changed.
    pub fn assign_join_dates(
        &self,
        registry: &mut MemberRegistry,
        draw: &mut impl DrawSource,
    ) -> Vec<(MemberId, NaiveDate)> {
        let cohorts = &self.config.join_cohorts;
        let mut filled = vec![0usize; cohorts.len()];
        let mut assigned = Vec::new();

        for member in registry.iter_mut() {
            if member.join_date().is_some() {
                continue;
            }
            let slot = filled
                .iter()
                .zip(cohorts)
                .position(|(n, c)| *n < c.count)
                .or(if cohorts.is_empty() { None } else { Some(0) });
            let Some(slot) = slot else {
                log::warn!("seeding: no join cohorts configured, {} left without a date", member.id);
                continue;
            };
            let cohort = &cohorts[slot];
            let days = (cohort.end - cohort.start).num_days().max(1) as u64;
            let date = cohort.start + Duration::days(draw.int_inclusive(0, days - 1) as i64);
            if member.assign_join_date(date) {
                filled[slot] += 1;
                assigned.push((member.id.clone(), date));
            }
        }
        log::info!("seeding: assigned {} join dates", assigned.len());
        assigned
    }
}
