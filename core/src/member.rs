//! Member registry — identity, tier, join date and monthly activity.
//!
//! The activity table is keyed by [`YearMonth`], so only the twelve
//! canonical month names can index a period. Keys that fail to parse are
//! kept aside (never indexed, never altered) and written back unchanged.

use crate::{
    calendar::{Month, YearMonth},
    types::MemberId,
};
use chrono::NaiveDate;
use serde::{
    de::Deserializer,
    ser::{Error as _, SerializeMap, Serializer},
    Deserialize, Serialize,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

// ── Tier ───────────────────────────────────────────────────────────

/// Member tier. The named tiers are the ones the program knows about;
/// anything else is carried as `Other` and resolved through fallback
/// ranges wherever a tier is looked up.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Tier {
    Leader,
    Exploder,
    Enabler,
    Builder,
    Explorer,
    Other(String),
}

impl Tier {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Leader" => Self::Leader,
            "Exploder" => Self::Exploder,
            "Enabler" => Self::Enabler,
            "Builder" => Self::Builder,
            "Explorer" => Self::Explorer,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Leader => "Leader",
            Self::Exploder => "Exploder",
            Self::Enabler => "Enabler",
            Self::Builder => "Builder",
            Self::Explorer => "Explorer",
            Self::Other(raw) => raw,
        }
    }
}

impl Default for Tier {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<String> for Tier {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<Tier> for String {
    fn from(tier: Tier) -> Self {
        tier.as_str().to_string()
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Activity ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    #[serde(default)]
    pub clicks: u64,
    #[serde(default)]
    pub orders: u64,
    #[serde(default)]
    pub revenue: f64,
}

impl ActivityRecord {
    pub fn is_zero(&self) -> bool {
        self.clicks == 0 && self.orders == 0 && self.revenue == 0.0
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedReason {
    /// Year key is not an integer, or its body is not an object.
    Year,
    /// Month key is not a canonical month name.
    Month,
    /// Keys are fine but the body is not a metrics record.
    Record,
}

/// A raw activity entry that could not be indexed as a period.
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedEntry {
    pub year_key: String,
    /// None when the whole year body is malformed.
    pub month_key: Option<String>,
    pub reason: MalformedReason,
    pub raw: Value,
}

/// Sparse year → month → metrics table for one member.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityTable {
    entries: BTreeMap<YearMonth, ActivityRecord>,
    malformed: Vec<MalformedEntry>,
}

impl ActivityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, period: YearMonth) -> Option<&ActivityRecord> {
        self.entries.get(&period)
    }

    pub fn get_mut(&mut self, period: YearMonth) -> Option<&mut ActivityRecord> {
        self.entries.get_mut(&period)
    }

    /// Insert or replace the record for a period. Used by seeding only;
    /// repair never creates records.
    pub fn insert(&mut self, period: YearMonth, record: ActivityRecord) -> Option<ActivityRecord> {
        self.entries.insert(period, record)
    }

    /// Records in chronological order.
    pub fn iter(&self) -> impl Iterator<Item = (YearMonth, &ActivityRecord)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (YearMonth, &mut ActivityRecord)> {
        self.entries.iter_mut().map(|(k, v)| (*k, v))
    }

    pub fn malformed(&self) -> &[MalformedEntry] {
        &self.malformed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sort a raw entry into the indexed table or the malformed bucket.
    fn absorb(&mut self, year_key: String, month_key: String, raw: Value) {
        let year = canonical_year(&year_key);
        let month = Month::from_name(&month_key);
        match (year, month) {
            (Some(year), Some(month)) => match serde_json::from_value::<ActivityRecord>(raw.clone()) {
                Ok(record) => {
                    self.entries.insert(YearMonth::new(year, month), record);
                }
                Err(_) => self.malformed.push(MalformedEntry {
                    year_key,
                    month_key: Some(month_key),
                    reason: MalformedReason::Record,
                    raw,
                }),
            },
            (_, None) => self.malformed.push(MalformedEntry {
                year_key,
                month_key: Some(month_key),
                reason: MalformedReason::Month,
                raw,
            }),
            (None, Some(_)) => self.malformed.push(MalformedEntry {
                year_key,
                month_key: Some(month_key),
                reason: MalformedReason::Year,
                raw,
            }),
        }
    }
}

/// A year key is only indexed when it is the plain decimal form of its
/// value, so "02025" or "+2025" cannot collide with "2025".
fn canonical_year(key: &str) -> Option<i32> {
    key.parse::<i32>().ok().filter(|y| y.to_string() == key)
}

impl<'de> Deserialize<'de> for ActivityTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: BTreeMap<String, Value> = BTreeMap::deserialize(deserializer)?;
        let mut table = ActivityTable::new();
        for (year_key, body) in raw {
            match body {
                Value::Object(months) => {
                    for (month_key, record) in months {
                        table.absorb(year_key.clone(), month_key, record);
                    }
                }
                other => table.malformed.push(MalformedEntry {
                    year_key,
                    month_key: None,
                    reason: MalformedReason::Year,
                    raw: other,
                }),
            }
        }
        Ok(table)
    }
}

/// One year's body, serialised with months in calendar order and any
/// malformed month keys after them.
struct YearBody(Vec<(String, Value)>);

impl Serialize for YearBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

enum YearSlot {
    Months(YearBody),
    Raw(Value),
}

impl Serialize for ActivityTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut years: BTreeMap<String, YearSlot> = BTreeMap::new();
        for (period, record) in &self.entries {
            let value = serde_json::to_value(record).map_err(S::Error::custom)?;
            let slot = years
                .entry(period.year.to_string())
                .or_insert_with(|| YearSlot::Months(YearBody(Vec::new())));
            if let YearSlot::Months(body) = slot {
                body.0.push((period.month.name().to_string(), value));
            }
        }
        for entry in &self.malformed {
            match &entry.month_key {
                Some(month_key) => {
                    let slot = years
                        .entry(entry.year_key.clone())
                        .or_insert_with(|| YearSlot::Months(YearBody(Vec::new())));
                    if let YearSlot::Months(body) = slot {
                        body.0.push((month_key.clone(), entry.raw.clone()));
                    }
                }
                None => {
                    years.insert(entry.year_key.clone(), YearSlot::Raw(entry.raw.clone()));
                }
            }
        }

        let mut map = serializer.serialize_map(Some(years.len()))?;
        for (year_key, slot) in &years {
            match slot {
                YearSlot::Months(body) => map.serialize_entry(year_key, body)?,
                YearSlot::Raw(raw) => map.serialize_entry(year_key, raw)?,
            }
        }
        map.end()
    }
}

// ── Member ─────────────────────────────────────────────────────────

/// `accountCreatedDate` as found in the document. Anything that is not a
/// `YYYY-MM-DD` date is kept verbatim and never interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum JoinDateField {
    Date(NaiveDate),
    Raw(Value),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "level", default)]
    pub tier: Tier,
    #[serde(rename = "accountCreatedDate", default, skip_serializing_if = "Option::is_none")]
    join_date: Option<JoinDateField>,
    #[serde(rename = "monthlyData", default)]
    pub activity: ActivityTable,
    /// Document attributes the engine does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Member {
    pub fn new(id: impl Into<MemberId>, tier: Tier, join_date: Option<NaiveDate>) -> Self {
        Self {
            id: id.into(),
            name: None,
            tier,
            join_date: join_date.map(JoinDateField::Date),
            activity: ActivityTable::new(),
            extra: Map::new(),
        }
    }

    pub fn with_activity(mut self, activity: ActivityTable) -> Self {
        self.activity = activity;
        self
    }

    /// The join date, if present and readable.
    pub fn join_date(&self) -> Option<NaiveDate> {
        match &self.join_date {
            Some(JoinDateField::Date(date)) => Some(*date),
            _ => None,
        }
    }

    /// The raw join date text when the attribute is present but unreadable.
    pub fn malformed_join_date(&self) -> Option<String> {
        match &self.join_date {
            Some(JoinDateField::Raw(Value::String(raw))) => Some(raw.clone()),
            Some(JoinDateField::Raw(other)) => Some(other.to_string()),
            _ => None,
        }
    }

    /// First month in which the member may have non-zero activity.
    pub fn join_month(&self) -> Option<YearMonth> {
        self.join_date().map(YearMonth::of)
    }

    /// Set the join date if the attribute is absent. An existing value,
    /// readable or not, is never replaced: returns false and leaves it
    /// untouched.
    pub fn assign_join_date(&mut self, date: NaiveDate) -> bool {
        if self.join_date.is_some() {
            return false;
        }
        self.join_date = Some(JoinDateField::Date(date));
        true
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

// ── Registry ───────────────────────────────────────────────────────

/// Every member profile, in document order.
#[derive(Debug, Clone, Default)]
pub struct MemberRegistry {
    members: Vec<Member>,
}

impl MemberRegistry {
    pub fn new(members: Vec<Member>) -> Self {
        Self { members }
    }

    pub fn get(&self, id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Member> {
        self.members.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn into_members(self) -> Vec<Member> {
        self.members
    }
}
