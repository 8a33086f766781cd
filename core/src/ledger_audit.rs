//! Ledger audit — structural and arithmetic checks on payout records.
//!
//! Checks per record:
//!   - every required field present and readable
//!   - no negative gross / withholding
//!   - net within tolerance of round(gross - wht, 2)
//!   - declared year/month is a real month and `date` falls inside it
//!   - payout id matches the deterministic derivation
//!
//! Checks per member:
//!   - at most one record per period (DuplicatePeriod, once per period)
//!   - the member exists in the registry

use crate::{
    calendar::YearMonth,
    ledger::{net_of, payout_id_for, PayoutLedger, PayoutRecord, PeriodStatus},
    member::MemberRegistry,
    violation::{Violation, ViolationKind},
};
use std::collections::BTreeMap;

/// Validate a single record belonging to `member_id`.
pub fn validate_payout(member_id: &str, record: &PayoutRecord, tolerance: f64) -> Vec<Violation> {
    let mut out = Vec::new();
    let pid = record.payout_id.clone();

    for field in record.missing_fields() {
        out.push(Violation::new(
            member_id,
            ViolationKind::MissingField { field: field.to_string(), payout_id: pid.clone() },
        ));
    }

    for (field, raw) in record.malformed_fields() {
        out.push(Violation::new(
            member_id,
            ViolationKind::MalformedField { field: field.to_string(), payout_id: pid.clone(), raw: raw.to_string() },
        ));
    }

    for (field, value) in [("grossPayout", record.gross_payout), ("wht", record.wht)] {
        if let Some(v) = value.filter(|v| *v < 0.0) {
            out.push(Violation::new(
                member_id,
                ViolationKind::NegativeAmount { payout_id: pid.clone(), field: field.into(), value: v },
            ));
        }
    }

    if let (Some(gross), Some(wht), Some(net)) = (record.gross_payout, record.wht, record.net_payout) {
        let expected_net = net_of(gross, wht);
        // Exactly one cent off is still within tolerance.
        if (expected_net - net).abs() > tolerance + 1e-9 {
            out.push(Violation::new(
                member_id,
                ViolationKind::ArithmeticMismatch { payout_id: pid.clone(), gross, wht, net, expected_net },
            ));
        }
    }

    if let (Some(year), Some(month)) = (record.year, record.month) {
        match YearMonth::from_numbers(year, month) {
            Ok(period) => {
                if let Some(date) = record.date.filter(|d| !period.contains(*d)) {
                    out.push(Violation::new(
                        member_id,
                        ViolationKind::PeriodMismatch { payout_id: pid.clone(), period, date },
                    ));
                }
                if let Some(actual) = &record.payout_id {
                    let expected = payout_id_for(member_id, period);
                    if *actual != expected {
                        out.push(Violation::new(
                            member_id,
                            ViolationKind::MalformedPayoutId { expected, actual: actual.clone() },
                        ));
                    }
                }
            }
            Err(_) => out.push(Violation::new(
                member_id,
                ViolationKind::InvalidPeriod { payout_id: pid.clone(), year, month },
            )),
        }
    }

    out
}

/// Validate every record in the ledger, plus duplicates and orphans.
pub fn validate_ledger(
    ledger: &PayoutLedger,
    registry: &MemberRegistry,
    tolerance: f64,
) -> Vec<Violation> {
    let mut out = Vec::new();

    for entry in ledger.iter() {
        let id = entry.member_id.as_str();
        if registry.get(id).is_none() {
            out.push(Violation::new(id, ViolationKind::UnknownMember));
        }

        let mut per_period: BTreeMap<YearMonth, usize> = BTreeMap::new();
        for record in &entry.payout_history {
            out.extend(validate_payout(id, record, tolerance));
            if let Some(period) = record.period() {
                *per_period.entry(period).or_insert(0) += 1;
            }
        }

        for (period, count) in per_period.into_iter().filter(|(_, n)| *n > 1) {
            log::warn!("ledger: {id} has {count} payout records for {period}");
            out.push(Violation::new(id, ViolationKind::DuplicatePeriod { period, count }));
        }
    }

    log::info!(
        "ledger audit: {} members, {} violations",
        ledger.len(),
        out.len()
    );
    out
}

/// Every ledger member must have exactly one record for `period`.
/// Missing and duplicate periods are reported distinctly.
pub fn validate_period_coverage(ledger: &PayoutLedger, period: YearMonth) -> Vec<Violation> {
    ledger
        .iter()
        .filter_map(|entry| {
            let id = entry.member_id.as_str();
            match ledger.period_status(id, period) {
                PeriodStatus::Present => None,
                PeriodStatus::Missing => {
                    Some(Violation::new(id, ViolationKind::MissingPeriod { period }))
                }
                PeriodStatus::Duplicate(count) => {
                    Some(Violation::new(id, ViolationKind::DuplicatePeriod { period, count }))
                }
            }
        })
        .collect()
}
