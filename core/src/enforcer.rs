//! Consistency enforcer — nothing may exist before a member's join month.
//!
//! RULES:
//!   - Comparisons are at month granularity (see calendar.rs).
//!   - Repair only resets numeric fields. No record is created or removed.
//!   - The join date is never touched.
//!   - A member without a readable join date is skipped and reported,
//!     not guessed.

use crate::{
    calendar::YearMonth,
    ledger::{MemberPayouts, PayoutLedger},
    member::{MalformedReason, Member, MemberRegistry},
    types::MemberId,
    violation::{RecordSource, Violation, ViolationKind},
};

/// Result of enforcing one member's window on one dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum EnforceOutcome {
    /// Member has no join date; nothing was altered.
    Skipped(Violation),
    /// Periods whose values were reset (already-zero records are not listed).
    Applied { cleared: Vec<YearMonth> },
}

impl EnforceOutcome {
    pub fn cleared(&self) -> &[YearMonth] {
        match self {
            Self::Skipped(_) => &[],
            Self::Applied { cleared } => cleared,
        }
    }
}

/// MalformedJoinDate when the attribute is present but unreadable,
/// MissingJoinDate otherwise.
fn unusable_join_date(member: &Member) -> Violation {
    let kind = match member.malformed_join_date() {
        Some(raw) => ViolationKind::MalformedJoinDate { raw },
        None => ViolationKind::MissingJoinDate,
    };
    Violation::new(member.id.clone(), kind)
}

/// Zero every activity record strictly before the member's join month.
pub fn enforce(member: &mut Member) -> EnforceOutcome {
    let Some(join_month) = member.join_month() else {
        log::warn!("enforcer: {} has no usable join date, skipped", member.id);
        return EnforceOutcome::Skipped(unusable_join_date(member));
    };

    let mut cleared = Vec::new();
    for (period, record) in member.activity.iter_mut() {
        if period < join_month && !record.is_zero() {
            record.clear();
            cleared.push(period);
            log::debug!("enforcer: {} cleared activity for {period}", member.id);
        }
    }
    EnforceOutcome::Applied { cleared }
}

/// Activity violations for one member: missing or unreadable join date,
/// malformed keys, and non-zero records before the join month.
pub fn validate(member: &Member) -> Vec<Violation> {
    let mut out = Vec::new();
    let id = &member.id;

    for entry in member.activity.malformed() {
        let month_key = entry.month_key.clone().unwrap_or_default();
        let kind = match entry.reason {
            MalformedReason::Year => ViolationKind::MalformedYear { year_key: entry.year_key.clone() },
            MalformedReason::Month => ViolationKind::MalformedMonth {
                year_key: entry.year_key.clone(),
                month_key,
            },
            MalformedReason::Record => ViolationKind::MalformedRecord {
                year_key: entry.year_key.clone(),
                month_key,
            },
        };
        out.push(Violation::new(id.clone(), kind));
    }

    let (Some(join_date), Some(join_month)) = (member.join_date(), member.join_month()) else {
        out.push(unusable_join_date(member));
        return out;
    };

    for (period, record) in member.activity.iter() {
        if period < join_month && !record.is_zero() {
            out.push(Violation::new(
                id.clone(),
                ViolationKind::TemporalViolation { source: RecordSource::Activity, period, join_date },
            ));
        }
    }
    out
}

/// Zero every payout declared for a period before the member's join month.
/// Records stay in the history with gross = wht = net = 0.
pub fn enforce_payouts(member: &Member, payouts: &mut MemberPayouts) -> EnforceOutcome {
    let Some(join_month) = member.join_month() else {
        return EnforceOutcome::Skipped(unusable_join_date(member));
    };

    let mut cleared = Vec::new();
    for record in payouts.payout_history.iter_mut() {
        let Some(period) = record.period() else { continue };
        if period < join_month && !record.is_zero_amount() {
            record.zero_amounts();
            cleared.push(period);
            log::debug!("enforcer: {} zeroed payout for {period}", member.id);
        }
    }
    EnforceOutcome::Applied { cleared }
}

/// Non-zero payouts before the join month. Members without a readable
/// join date produce nothing here; `validate` already reports them.
pub fn validate_payout_window(member: &Member, payouts: &MemberPayouts) -> Vec<Violation> {
    let (Some(join_date), Some(join_month)) = (member.join_date(), member.join_month()) else {
        return Vec::new();
    };
    payouts
        .payout_history
        .iter()
        .filter_map(|record| {
            let period = record.period()?;
            (period < join_month && !record.is_zero_amount()).then(|| {
                Violation::new(
                    member.id.clone(),
                    ViolationKind::TemporalViolation { source: RecordSource::Payout, period, join_date },
                )
            })
        })
        .collect()
}

// ── Registry-wide passes ───────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct EnforcementSummary {
    pub activity_cleared: Vec<(MemberId, YearMonth)>,
    pub payouts_zeroed: Vec<(MemberId, YearMonth)>,
    pub skipped: Vec<Violation>,
}

impl EnforcementSummary {
    pub fn changed(&self) -> usize {
        self.activity_cleared.len() + self.payouts_zeroed.len()
    }
}

/// Enforce every member's window on both datasets, in registry order.
/// Ledger entries without a member profile are left alone.
pub fn enforce_all(registry: &mut MemberRegistry, ledger: &mut PayoutLedger) -> EnforcementSummary {
    let mut summary = EnforcementSummary::default();

    for member in registry.iter_mut() {
        match enforce(member) {
            EnforceOutcome::Skipped(v) => {
                summary.skipped.push(v);
                continue;
            }
            EnforceOutcome::Applied { cleared } => summary
                .activity_cleared
                .extend(cleared.into_iter().map(|p| (member.id.clone(), p))),
        }
        if let Some(payouts) = ledger.get_mut(&member.id) {
            let outcome = enforce_payouts(member, payouts);
            summary
                .payouts_zeroed
                .extend(outcome.cleared().iter().map(|p| (member.id.clone(), *p)));
        }
    }

    log::info!(
        "enforcer: {} activity records cleared, {} payouts zeroed, {} members skipped",
        summary.activity_cleared.len(),
        summary.payouts_zeroed.len(),
        summary.skipped.len()
    );
    summary
}

/// Every temporal and key violation across both datasets.
pub fn validate_all(registry: &MemberRegistry, ledger: &PayoutLedger) -> Vec<Violation> {
    let mut out = Vec::new();
    for member in registry.iter() {
        out.extend(validate(member));
        if let Some(payouts) = ledger.get(&member.id) {
            out.extend(validate_payout_window(member, payouts));
        }
    }
    out
}
