//! Payout ledger — each member's ordered list of monthly settlements.
//!
//! Records are kept exactly as found: every field is optional so a
//! record with a missing or unreadable attribute is reported by the
//! ledger audit instead of failing the whole load.

use crate::{calendar::YearMonth, types::{round2, MemberId}};
use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Fields every payout record must carry, by document name.
pub const REQUIRED_FIELDS: [&str; 8] = [
    "payoutId",
    "year",
    "month",
    "date",
    "grossPayout",
    "wht",
    "netPayout",
    "status",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PayoutStatus {
    Completed,
    Pending,
    Other(String),
}

impl From<String> for PayoutStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "Completed" => Self::Completed,
            "Pending" => Self::Pending,
            _ => Self::Other(raw),
        }
    }
}

impl From<PayoutStatus> for String {
    fn from(status: PayoutStatus) -> Self {
        match status {
            PayoutStatus::Completed => "Completed".into(),
            PayoutStatus::Pending => "Pending".into(),
            PayoutStatus::Other(raw) => raw,
        }
    }
}

/// One settlement as found in the ledger. A field that is absent or holds
/// a value of the wrong type decodes to `None`; a wrong-typed value is kept
/// verbatim in `extra` under its own key, so it is reported and written
/// back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gross_payout: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wht: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_payout: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PayoutStatus>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Take `key` out of `raw` as a `T`. Null counts as absent; a value that
/// does not decode is put back so it survives in `extra`.
fn take_field<T: DeserializeOwned>(raw: &mut Map<String, Value>, key: &str) -> Option<T> {
    let value = raw.remove(key)?;
    if value.is_null() {
        return None;
    }
    match serde_json::from_value(value.clone()) {
        Ok(decoded) => Some(decoded),
        Err(_) => {
            raw.insert(key.to_string(), value);
            None
        }
    }
}

impl<'de> Deserialize<'de> for PayoutRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut raw = Map::<String, Value>::deserialize(deserializer)?;
        Ok(Self {
            payout_id: take_field(&mut raw, "payoutId"),
            year: take_field(&mut raw, "year"),
            month: take_field(&mut raw, "month"),
            date: take_field(&mut raw, "date"),
            gross_payout: take_field(&mut raw, "grossPayout"),
            wht: take_field(&mut raw, "wht"),
            net_payout: take_field(&mut raw, "netPayout"),
            status: take_field(&mut raw, "status"),
            extra: raw,
        })
    }
}

impl PayoutRecord {
    /// A fully populated record, as the settlement generator emits it.
    pub fn settled(
        payout_id: String,
        period: YearMonth,
        date: NaiveDate,
        gross: f64,
        wht: f64,
        net: f64,
    ) -> Self {
        Self {
            payout_id: Some(payout_id),
            year: Some(period.year),
            month: Some(period.month.number()),
            date: Some(date),
            gross_payout: Some(gross),
            wht: Some(wht),
            net_payout: Some(net),
            status: Some(PayoutStatus::Completed),
            extra: Map::new(),
        }
    }

    /// The declared period, if both parts are present and form a real month.
    pub fn period(&self) -> Option<YearMonth> {
        YearMonth::from_numbers(self.year?, self.month?).ok()
    }

    pub fn is_for(&self, period: YearMonth) -> bool {
        self.year == Some(period.year) && self.month == Some(period.month.number())
    }

    pub fn net(&self) -> f64 {
        self.net_payout.unwrap_or(0.0)
    }

    pub fn gross(&self) -> f64 {
        self.gross_payout.unwrap_or(0.0)
    }

    /// True when no amount field carries a non-zero value.
    pub fn is_zero_amount(&self) -> bool {
        [self.gross_payout, self.wht, self.net_payout]
            .iter()
            .all(|v| v.map_or(true, |x| x == 0.0))
    }

    /// Reset every amount to zero, keeping net = gross - wht.
    pub fn zero_amounts(&mut self) {
        self.gross_payout = Some(0.0);
        self.wht = Some(0.0);
        self.net_payout = Some(0.0);
    }

    fn decoded(&self) -> [bool; 8] {
        [
            self.payout_id.is_some(),
            self.year.is_some(),
            self.month.is_some(),
            self.date.is_some(),
            self.gross_payout.is_some(),
            self.wht.is_some(),
            self.net_payout.is_some(),
            self.status.is_some(),
        ]
    }

    /// Names of required fields that are absent altogether.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        REQUIRED_FIELDS
            .iter()
            .zip(self.decoded())
            .filter(|(name, ok)| !ok && !self.extra.contains_key(**name))
            .map(|(name, _)| *name)
            .collect()
    }

    /// Required fields that are present but hold an undecodable value,
    /// with that raw value.
    pub fn malformed_fields(&self) -> Vec<(&'static str, &Value)> {
        REQUIRED_FIELDS
            .iter()
            .zip(self.decoded())
            .filter(|(_, ok)| !ok)
            .filter_map(|(name, _)| self.extra.get(*name).map(|raw| (*name, raw)))
            .collect()
    }
}

/// Deterministic payout ID: `PO-<year>-<last 3 chars of member id>-<MM>`.
/// External systems parse this format; do not change it.
pub fn payout_id_for(member_id: &str, period: YearMonth) -> String {
    let chars: Vec<char> = member_id.chars().collect();
    let suffix: String = chars[chars.len().saturating_sub(3)..].iter().collect();
    format!("PO-{}-{}-{:02}", period.year, suffix, period.month.number())
}

/// Net payout from gross and withholding, rounded to cents.
pub fn net_of(gross: f64, wht: f64) -> f64 {
    round2(gross - wht)
}

// ── Per-member history ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberPayouts {
    #[serde(rename = "belId")]
    pub member_id: MemberId,
    #[serde(default)]
    pub payout_history: Vec<PayoutRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MemberPayouts {
    pub fn new(member_id: impl Into<MemberId>) -> Self {
        Self {
            member_id: member_id.into(),
            payout_history: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn records_for(&self, period: YearMonth) -> impl Iterator<Item = &PayoutRecord> {
        self.payout_history.iter().filter(move |p| p.is_for(period))
    }

    pub fn last(&self) -> Option<&PayoutRecord> {
        self.payout_history.last()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodStatus {
    Missing,
    Present,
    Duplicate(usize),
}

impl fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("missing"),
            Self::Present => f.write_str("present"),
            Self::Duplicate(n) => write!(f, "duplicate ({n})"),
        }
    }
}

/// Period totals across the whole ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodTotals {
    pub gross: f64,
    pub net: f64,
    pub records: usize,
}

// ── Ledger ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct PayoutLedger {
    entries: Vec<MemberPayouts>,
}

impl PayoutLedger {
    pub fn new(entries: Vec<MemberPayouts>) -> Self {
        Self { entries }
    }

    pub fn get(&self, member_id: &str) -> Option<&MemberPayouts> {
        self.entries.iter().find(|e| e.member_id == member_id)
    }

    pub fn get_mut(&mut self, member_id: &str) -> Option<&mut MemberPayouts> {
        self.entries.iter_mut().find(|e| e.member_id == member_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemberPayouts> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut MemberPayouts> {
        self.entries.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<MemberPayouts> {
        self.entries
    }

    /// How many records a member has for a period.
    pub fn period_status(&self, member_id: &str, period: YearMonth) -> PeriodStatus {
        let count = self
            .get(member_id)
            .map_or(0, |e| e.records_for(period).count());
        match count {
            0 => PeriodStatus::Missing,
            1 => PeriodStatus::Present,
            n => PeriodStatus::Duplicate(n),
        }
    }

    /// True iff exactly one record exists for the member and period.
    pub fn has_period(&self, member_id: &str, period: YearMonth) -> bool {
        self.period_status(member_id, period) == PeriodStatus::Present
    }

    /// Append a record to a member's history, creating the entry if needed.
    pub fn append(&mut self, member_id: &str, record: PayoutRecord) {
        match self.get_mut(member_id) {
            Some(entry) => entry.payout_history.push(record),
            None => {
                let mut entry = MemberPayouts::new(member_id);
                entry.payout_history.push(record);
                self.entries.push(entry);
            }
        }
    }

    pub fn period_totals(&self, period: YearMonth) -> PeriodTotals {
        self.entries
            .iter()
            .flat_map(|e| e.records_for(period))
            .fold(PeriodTotals::default(), |mut acc, p| {
                acc.gross += p.gross();
                acc.net += p.net();
                acc.records += 1;
                acc
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Month;

    #[test]
    fn payout_id_uses_last_three_chars_and_padded_month() {
        let sep = YearMonth::new(2025, Month::September);
        assert_eq!(payout_id_for("BEL007", sep), "PO-2025-007-09");
        assert_eq!(payout_id_for("X1", sep), "PO-2025-X1-09");
        assert_eq!(payout_id_for("BEL123", YearMonth::new(2024, Month::December)), "PO-2024-123-12");
    }

    #[test]
    fn missing_fields_lists_document_names() {
        let record = PayoutRecord {
            year: Some(2025),
            month: Some(9),
            gross_payout: Some(10.0),
            ..Default::default()
        };
        assert_eq!(
            record.missing_fields(),
            vec!["payoutId", "date", "wht", "netPayout", "status"]
        );
    }
}
