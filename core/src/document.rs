//! Document codec — the two input collections as JSON text.
//!
//! Profiles: `{ "leaderboard": [ <member>, ... ], ... }`
//! Payouts:  `{ "belPayoutHistory": [ { "belId", "payoutHistory": [...] }, ... ], ... }`
//!
//! Only a missing collection (or unparsable JSON) is fatal. Top-level
//! keys besides the collection are preserved on write.

use crate::{
    error::{BelError, BelResult},
    ledger::{MemberPayouts, PayoutLedger},
    member::{Member, MemberRegistry},
};
use serde_json::{Map, Value};

pub const PROFILES_COLLECTION: &str = "leaderboard";
pub const PAYOUTS_COLLECTION: &str = "belPayoutHistory";

/// Split a document into its named collection and the remaining keys.
fn take_collection(json: &str, name: &str) -> BelResult<(Value, Map<String, Value>)> {
    let mut root: Map<String, Value> = serde_json::from_str(json)?;
    match root.remove(name) {
        Some(Value::Null) | None => Err(BelError::MissingCollection { name: name.to_string() }),
        Some(collection) => Ok((collection, root)),
    }
}

fn assemble(name: &str, collection: Value, rest: &Map<String, Value>) -> BelResult<String> {
    let mut root = rest.clone();
    root.insert(name.to_string(), collection);
    Ok(serde_json::to_string_pretty(&Value::Object(root))?)
}

#[derive(Debug, Clone, Default)]
pub struct ProfilesDocument {
    pub registry: MemberRegistry,
    pub extra: Map<String, Value>,
}

impl ProfilesDocument {
    pub fn from_json(json: &str) -> BelResult<Self> {
        let (collection, extra) = take_collection(json, PROFILES_COLLECTION)?;
        let members: Vec<Member> = serde_json::from_value(collection)?;
        Ok(Self { registry: MemberRegistry::new(members), extra })
    }

    pub fn to_json(&self) -> BelResult<String> {
        let members: Vec<&Member> = self.registry.iter().collect();
        assemble(PROFILES_COLLECTION, serde_json::to_value(members)?, &self.extra)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PayoutsDocument {
    pub ledger: PayoutLedger,
    pub extra: Map<String, Value>,
}

impl PayoutsDocument {
    pub fn from_json(json: &str) -> BelResult<Self> {
        let (collection, extra) = take_collection(json, PAYOUTS_COLLECTION)?;
        let entries: Vec<MemberPayouts> = serde_json::from_value(collection)?;
        Ok(Self { ledger: PayoutLedger::new(entries), extra })
    }

    pub fn to_json(&self) -> BelResult<String> {
        let entries: Vec<&MemberPayouts> = self.ledger.iter().collect();
        assemble(PAYOUTS_COLLECTION, serde_json::to_value(entries)?, &self.extra)
    }
}
