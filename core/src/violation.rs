//! Violation taxonomy.
//!
//! RULE: inconsistencies are collected, never raised. Every check in the
//! engine returns `Vec<Violation>` and keeps going, so one pass surfaces
//! every problem in the dataset.

use crate::{calendar::YearMonth, types::MemberId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// Which dataset a temporal violation was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    Activity,
    Payout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    MissingField {
        field: String,
        payout_id: Option<String>,
    },
    TemporalViolation {
        source: RecordSource,
        period: YearMonth,
        join_date: NaiveDate,
    },
    DuplicatePeriod {
        period: YearMonth,
        count: usize,
    },
    ArithmeticMismatch {
        payout_id: Option<String>,
        gross: f64,
        wht: f64,
        net: f64,
        expected_net: f64,
    },
    UnknownTier {
        tier: String,
    },
    MissingJoinDate,
    MalformedMonth {
        year_key: String,
        month_key: String,
    },
    MalformedYear {
        year_key: String,
    },
    /// An activity entry under valid keys whose body is not a metrics record.
    MalformedRecord {
        year_key: String,
        month_key: String,
    },
    /// A payout whose `year`/`month` pair is not a real calendar month.
    InvalidPeriod {
        payout_id: Option<String>,
        year: i32,
        month: u32,
    },
    PeriodMismatch {
        payout_id: Option<String>,
        period: YearMonth,
        date: NaiveDate,
    },
    MalformedPayoutId {
        expected: String,
        actual: String,
    },
    MissingPeriod {
        period: YearMonth,
    },
    UnknownMember,
    NegativeAmount {
        payout_id: Option<String>,
        field: String,
        value: f64,
    },
    /// `accountCreatedDate` is present but not a `YYYY-MM-DD` date.
    MalformedJoinDate {
        raw: String,
    },
    /// A payout field is present but holds a value of the wrong type.
    MalformedField {
        field: String,
        payout_id: Option<String>,
        raw: String,
    },
}

impl ViolationKind {
    /// Stable snake_case code, used for grouping and the audit store.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingField { .. } => "missing_field",
            Self::TemporalViolation { .. } => "temporal_violation",
            Self::DuplicatePeriod { .. } => "duplicate_period",
            Self::ArithmeticMismatch { .. } => "arithmetic_mismatch",
            Self::UnknownTier { .. } => "unknown_tier",
            Self::MissingJoinDate => "missing_join_date",
            Self::MalformedMonth { .. } => "malformed_month",
            Self::MalformedYear { .. } => "malformed_year",
            Self::MalformedRecord { .. } => "malformed_record",
            Self::InvalidPeriod { .. } => "invalid_period",
            Self::PeriodMismatch { .. } => "period_mismatch",
            Self::MalformedPayoutId { .. } => "malformed_payout_id",
            Self::MissingPeriod { .. } => "missing_period",
            Self::UnknownMember => "unknown_member",
            Self::NegativeAmount { .. } => "negative_amount",
            Self::MalformedJoinDate { .. } => "malformed_join_date",
            Self::MalformedField { .. } => "malformed_field",
        }
    }

    /// UnknownTier is the only non-error condition: the generator falls
    /// back to the default range and carries on.
    pub fn severity(&self) -> Severity {
        match self {
            Self::UnknownTier { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub member_id: MemberId,
    #[serde(flatten)]
    pub kind: ViolationKind,
}

impl Violation {
    pub fn new(member_id: impl Into<MemberId>, kind: ViolationKind) -> Self {
        Self { member_id: member_id.into(), kind }
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = &self.member_id;
        match &self.kind {
            ViolationKind::MissingField { field, payout_id } => match payout_id {
                Some(p) => write!(f, "{id}: payout {p} is missing '{field}'"),
                None => write!(f, "{id}: payout record is missing '{field}'"),
            },
            ViolationKind::TemporalViolation { source, period, join_date } => {
                let what = match source {
                    RecordSource::Activity => "activity",
                    RecordSource::Payout => "payout",
                };
                write!(f, "{id}: has {what} in {period} before joining ({join_date})")
            }
            ViolationKind::DuplicatePeriod { period, count } => {
                write!(f, "{id}: {count} payout records for {period}")
            }
            ViolationKind::ArithmeticMismatch { payout_id, net, expected_net, .. } => write!(
                f,
                "{id}: payout {} net {net:.2} != {expected_net:.2}",
                payout_id.as_deref().unwrap_or("?")
            ),
            ViolationKind::UnknownTier { tier } => {
                write!(f, "{id}: unknown tier '{tier}', default range used")
            }
            ViolationKind::MissingJoinDate => write!(f, "{id}: missing join date"),
            ViolationKind::MalformedMonth { year_key, month_key } => {
                write!(f, "{id}: malformed month key '{month_key}' under {year_key}")
            }
            ViolationKind::MalformedYear { year_key } => {
                write!(f, "{id}: malformed year key '{year_key}'")
            }
            ViolationKind::MalformedRecord { year_key, month_key } => {
                write!(f, "{id}: unreadable activity record at {year_key} {month_key}")
            }
            ViolationKind::InvalidPeriod { payout_id, year, month } => write!(
                f,
                "{id}: payout {} declares invalid period {year}-{month}",
                payout_id.as_deref().unwrap_or("?")
            ),
            ViolationKind::PeriodMismatch { payout_id, period, date } => write!(
                f,
                "{id}: payout {} dated {date} outside {period}",
                payout_id.as_deref().unwrap_or("?")
            ),
            ViolationKind::MalformedPayoutId { expected, actual } => {
                write!(f, "{id}: payout id '{actual}' should be '{expected}'")
            }
            ViolationKind::MissingPeriod { period } => {
                write!(f, "{id}: no payout record for {period}")
            }
            ViolationKind::UnknownMember => write!(f, "{id}: ledger entry has no member profile"),
            ViolationKind::NegativeAmount { payout_id, field, value } => write!(
                f,
                "{id}: payout {} has negative {field} {value:.2}",
                payout_id.as_deref().unwrap_or("?")
            ),
            ViolationKind::MalformedJoinDate { raw } => {
                write!(f, "{id}: unreadable join date '{raw}'")
            }
            ViolationKind::MalformedField { field, payout_id, raw } => write!(
                f,
                "{id}: payout {} has unreadable '{field}': {raw}",
                payout_id.as_deref().unwrap_or("?")
            ),
        }
    }
}

/// Count violations per code, in code order.
pub fn count_by_code(violations: &[Violation]) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for v in violations {
        *counts.entry(v.code()).or_insert(0) += 1;
    }
    counts
}

/// True if any violation is error-level.
pub fn has_errors(violations: &[Violation]) -> bool {
    violations.iter().any(|v| v.severity() == Severity::Error)
}
