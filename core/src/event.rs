//! Engine events — the record of everything a run changed or found.
//!
//! Every mutation the engine performs is described by an event. The
//! runner persists them to the audit store; tests inspect them directly.

use crate::{
    calendar::YearMonth,
    types::{MemberId, RunId},
};
use serde::{Deserialize, Serialize};

/// Variants are appended — never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    // ── Run lifecycle ──────────────────────────────
    RunStarted {
        run_id: RunId,
        seed: u64,
        command: String,
    },
    RunCompleted {
        run_id: RunId,
        violations: usize,
    },

    // ── Enforcement ────────────────────────────────
    ActivityCleared {
        member_id: MemberId,
        period: YearMonth,
    },
    PayoutZeroed {
        member_id: MemberId,
        period: YearMonth,
    },
    MemberSkipped {
        member_id: MemberId,
        reason: String,
    },

    // ── Settlement ─────────────────────────────────
    SettlementCreated {
        member_id: MemberId,
        payout_id: String,
        period: YearMonth,
        gross: f64,
        net: f64,
    },
    SettlementSkipped {
        member_id: MemberId,
        period: YearMonth,
    },
    TierFallback {
        member_id: MemberId,
        tier: String,
    },

    // ── Seeding ────────────────────────────────────
    ActivitySeeded {
        member_id: MemberId,
        period: YearMonth,
    },
    JoinDateAssigned {
        member_id: MemberId,
        date: chrono::NaiveDate,
    },

    // ── Reporting ──────────────────────────────────
    StatisticsComputed {
        period: YearMonth,
        total_net_payout: f64,
        active_member_count: usize,
        paying_member_count: usize,
        total_order_count: u64,
    },
}

impl EngineEvent {
    /// Stable string name, used for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::RunCompleted { .. } => "run_completed",
            Self::ActivityCleared { .. } => "activity_cleared",
            Self::PayoutZeroed { .. } => "payout_zeroed",
            Self::MemberSkipped { .. } => "member_skipped",
            Self::SettlementCreated { .. } => "settlement_created",
            Self::SettlementSkipped { .. } => "settlement_skipped",
            Self::TierFallback { .. } => "tier_fallback",
            Self::ActivitySeeded { .. } => "activity_seeded",
            Self::JoinDateAssigned { .. } => "join_date_assigned",
            Self::StatisticsComputed { .. } => "statistics_computed",
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub run_id: RunId,
    /// Position of the event within its run.
    pub seq: u64,
    pub event_type: String,
    pub payload: String, // JSON-serialized EngineEvent
}
