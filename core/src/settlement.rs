//! Settlement generator — derives a month's payout from the prior one.
//!
//!   gross = round(prior_gross × growth × tier_multiplier, 2)
//!   wht   = round(gross × wht_rate, 2)
//!   net   = round(gross − wht, 2)
//!
//! growth is drawn from `period_growth`, then the multiplier from the
//! tier's range. Tiers missing from the table use
//! `default_tier_multiplier` and are reported as UnknownTier warnings.
//!
//! RULE: this module never looks at join dates. Window enforcement is a
//! separate pass (enforcer.rs) run afterwards.

use crate::{
    calendar::YearMonth,
    config::{FactorRange, SettlementConfig},
    error::BelResult,
    ledger::{net_of, payout_id_for, MemberPayouts, PayoutLedger, PayoutRecord},
    member::{MemberRegistry, Tier},
    rng::DrawSource,
    types::{round2, MemberId},
    violation::{Violation, ViolationKind},
};
use chrono::{Datelike, NaiveDate};

/// A derived record plus the draws that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub record: PayoutRecord,
    pub prior_gross: f64,
    pub growth: f64,
    pub multiplier: f64,
    /// True when the tier was not in the multiplier table.
    pub tier_fallback: bool,
}

/// Outcome of settling one month across the ledger.
#[derive(Debug, Clone, Default)]
pub struct SettlementRun {
    pub period: Option<YearMonth>,
    pub created: Vec<(MemberId, Settlement)>,
    /// Members that already had a record for the period.
    pub skipped: Vec<MemberId>,
    pub warnings: Vec<Violation>,
}

impl SettlementRun {
    pub fn total_net(&self) -> f64 {
        self.created.iter().map(|(_, s)| s.record.net()).sum()
    }
}

pub struct SettlementGenerator<'a> {
    config: &'a SettlementConfig,
}

impl<'a> SettlementGenerator<'a> {
    pub fn new(config: &'a SettlementConfig) -> Self {
        Self { config }
    }

    /// Multiplier range for a tier, and whether the default range was used.
    pub fn multiplier_range(&self, tier: &Tier) -> (FactorRange, bool) {
        match self.config.tier_multipliers.get(tier.as_str()) {
            Some(range) => (*range, false),
            None => (self.config.default_tier_multiplier, true),
        }
    }

    /// Payout date for a period: the configured day, clamped to month end.
    pub fn settlement_date(&self, period: YearMonth) -> BelResult<NaiveDate> {
        let last = period.last_day()?;
        let day = self.config.settlement_day.min(last.day());
        Ok(last.with_day(day).unwrap_or(last))
    }

    /// Derive `period`'s record for a member from `prior`. With no prior
    /// record, the configured gross baseline is used.
    pub fn derive_next_period(
        &self,
        member_id: &str,
        prior: Option<&PayoutRecord>,
        tier: &Tier,
        period: YearMonth,
        draw: &mut impl DrawSource,
    ) -> BelResult<Settlement> {
        let prior_gross = prior
            .and_then(|p| p.gross_payout)
            .unwrap_or(self.config.default_gross_baseline);

        let (low, high) = self.config.period_growth;
        let growth = draw.uniform(low, high);
        let ((m_low, m_high), tier_fallback) = self.multiplier_range(tier);
        let multiplier = draw.uniform(m_low, m_high);

        let gross = round2(prior_gross * growth * multiplier);
        let wht = round2(gross * self.config.wht_rate);
        let net = net_of(gross, wht);

        let record = PayoutRecord::settled(
            payout_id_for(member_id, period),
            period,
            self.settlement_date(period)?,
            gross,
            wht,
            net,
        );

        Ok(Settlement { record, prior_gross, growth, multiplier, tier_fallback })
    }

    /// The record a new period is derived from: the immediately preceding
    /// month if present, otherwise the latest record in the history.
    pub fn prior_for<'h>(history: &'h MemberPayouts, period: YearMonth) -> Option<&'h PayoutRecord> {
        period
            .pred()
            .ok()
            .and_then(|prev| history.records_for(prev).next())
            .or_else(|| history.last())
    }

    /// Settle `period` for every ledger member that lacks it. Existing
    /// records are never overwritten. Members absent from the registry are
    /// settled with the configured fallback tier.
    pub fn settle_month(
        &self,
        ledger: &mut PayoutLedger,
        registry: &MemberRegistry,
        period: YearMonth,
        draw: &mut impl DrawSource,
    ) -> BelResult<SettlementRun> {
        let mut run = SettlementRun { period: Some(period), ..Default::default() };
        let fallback = Tier::parse(&self.config.fallback_tier);

        for entry in ledger.iter_mut() {
            let id = entry.member_id.clone();
            if entry.records_for(period).next().is_some() {
                log::debug!("settlement: {id} already has {period}, skipped");
                run.skipped.push(id);
                continue;
            }

            let tier = registry.get(&id).map_or(&fallback, |m| &m.tier);
            let settlement = {
                let prior = Self::prior_for(entry, period);
                if prior.is_none() {
                    log::info!(
                        "settlement: {id} has no payout history, using baseline {:.2}",
                        self.config.default_gross_baseline
                    );
                }
                self.derive_next_period(&id, prior, tier, period, draw)?
            };

            if settlement.tier_fallback {
                log::warn!("settlement: {id} has unknown tier '{tier}', default multiplier range used");
                run.warnings.push(Violation::new(
                    id.clone(),
                    ViolationKind::UnknownTier { tier: tier.to_string() },
                ));
            }

            entry.payout_history.push(settlement.record.clone());
            run.created.push((id, settlement));
        }

        log::info!(
            "settlement: {period} created {} records (net {:.2}), skipped {}",
            run.created.len(),
            run.total_net(),
            run.skipped.len()
        );
        Ok(run)
    }
}
