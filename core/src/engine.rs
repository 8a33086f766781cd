//! The engine — one batch run over a member registry and a payout ledger.
//!
//! PASS ORDER (fixed, documented, never reordered):
//!   1. Seeding       (optional: join dates, activity)
//!   2. Settlement    (optional: derive a month's payouts)
//!   3. Enforcement   (zero everything before each join month)
//!   4. Audit         (temporal, key and ledger checks)
//!   5. Statistics    (read-only)
//!
//! RULES:
//!   - The engine holds no datasets; callers pass them into every pass.
//!   - All randomness flows through the RngBank, one stream per purpose,
//!     salted by period.
//!   - Every change a pass makes is recorded as an EngineEvent.

use crate::{
    aggregator::{monthly_statistics, MonthlyStatistics},
    calendar::YearMonth,
    config::EngineConfig,
    enforcer::{enforce_all, validate_all, EnforcementSummary},
    error::BelResult,
    event::{EngineEvent, EventLogEntry},
    ledger::PayoutLedger,
    ledger_audit::validate_ledger,
    member::MemberRegistry,
    rng::{RngBank, StreamSlot},
    seeding::ActivitySeeder,
    settlement::{SettlementGenerator, SettlementRun},
    store::AuditStore,
    types::{MemberId, RunId},
    violation::{Violation, ViolationKind},
};
use chrono::NaiveDate;

/// Enforcement followed by a full audit.
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    pub enforcement: EnforcementSummary,
    pub violations: Vec<Violation>,
}

pub struct BelEngine {
    pub run_id: RunId,
    pub config: EngineConfig,
    rng_bank: RngBank,
    store: Option<AuditStore>,
    events: Vec<EngineEvent>,
}

impl BelEngine {
    pub fn new(run_id: RunId, seed: u64, config: EngineConfig) -> Self {
        Self {
            run_id,
            config,
            rng_bank: RngBank::new(seed),
            store: None,
            events: Vec::new(),
        }
    }

    /// Engine with default test config and no audit store.
    pub fn build_test(run_id: &str, seed: u64) -> Self {
        Self::new(run_id.to_string(), seed, EngineConfig::default_test())
    }

    /// Attach an audit store; events and violations are persisted from
    /// the next `begin` on.
    pub fn with_store(mut self, store: AuditStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn store(&self) -> Option<&AuditStore> {
        self.store.as_ref()
    }

    pub fn events(&self) -> &[EngineEvent] {
        &self.events
    }

    pub fn seed(&self) -> u64 {
        self.rng_bank.seed()
    }

    /// Open a run record. Call once before any pass.
    pub fn begin(&mut self, command: &str) -> BelResult<()> {
        if let Some(store) = &self.store {
            store.insert_run(&self.run_id, self.seed(), command, &now())?;
        }
        self.record(EngineEvent::RunStarted {
            run_id: self.run_id.clone(),
            seed: self.seed(),
            command: command.to_string(),
        })
    }

    /// Close the run record.
    pub fn finish(&mut self, violations: usize) -> BelResult<()> {
        self.record(EngineEvent::RunCompleted { run_id: self.run_id.clone(), violations })?;
        if let Some(store) = &self.store {
            store.complete_run(&self.run_id, &now(), violations)?;
        }
        Ok(())
    }

    // ── Passes ─────────────────────────────────────────────────

    pub fn assign_join_dates(&mut self, registry: &mut MemberRegistry) -> BelResult<Vec<(MemberId, NaiveDate)>> {
        let mut draw = self.rng_bank.for_slot(StreamSlot::JoinDate);
        let assigned = ActivitySeeder::new(&self.config.seeding).assign_join_dates(registry, &mut draw);
        for (member_id, date) in &assigned {
            self.record(EngineEvent::JoinDateAssigned { member_id: member_id.clone(), date: *date })?;
        }
        Ok(assigned)
    }

    pub fn seed_activity(&mut self, registry: &mut MemberRegistry, period: YearMonth) -> BelResult<Vec<MemberId>> {
        let mut draw = self.rng_bank.for_slot_at(StreamSlot::Activity, period_salt(period));
        let filled = ActivitySeeder::new(&self.config.seeding).fill_month(registry, period, &mut draw);
        for member_id in &filled {
            self.record(EngineEvent::ActivitySeeded { member_id: member_id.clone(), period })?;
        }
        Ok(filled)
    }

    /// Derive `period`'s payouts. Join dates are not consulted here; run
    /// `repair` afterwards.
    pub fn settle(
        &mut self,
        registry: &MemberRegistry,
        ledger: &mut PayoutLedger,
        period: YearMonth,
    ) -> BelResult<SettlementRun> {
        let mut draw = self.rng_bank.for_slot_at(StreamSlot::Settlement, period_salt(period));
        let run = SettlementGenerator::new(&self.config.settlement)
            .settle_month(ledger, registry, period, &mut draw)?;

        for member_id in &run.skipped {
            self.record(EngineEvent::SettlementSkipped { member_id: member_id.clone(), period })?;
        }
        for (member_id, s) in &run.created {
            self.record(EngineEvent::SettlementCreated {
                member_id: member_id.clone(),
                payout_id: s.record.payout_id.clone().unwrap_or_default(),
                period,
                gross: s.record.gross(),
                net: s.record.net(),
            })?;
        }
        for warning in &run.warnings {
            if let ViolationKind::UnknownTier { tier } = &warning.kind {
                self.record(EngineEvent::TierFallback {
                    member_id: warning.member_id.clone(),
                    tier: tier.clone(),
                })?;
            }
        }
        Ok(run)
    }

    pub fn repair(&mut self, registry: &mut MemberRegistry, ledger: &mut PayoutLedger) -> BelResult<EnforcementSummary> {
        let summary = enforce_all(registry, ledger);
        for (member_id, period) in &summary.activity_cleared {
            self.record(EngineEvent::ActivityCleared { member_id: member_id.clone(), period: *period })?;
        }
        for (member_id, period) in &summary.payouts_zeroed {
            self.record(EngineEvent::PayoutZeroed { member_id: member_id.clone(), period: *period })?;
        }
        for v in &summary.skipped {
            self.record(EngineEvent::MemberSkipped {
                member_id: v.member_id.clone(),
                reason: v.code().to_string(),
            })?;
        }
        Ok(summary)
    }

    /// Every violation across both datasets. Persisted when a store is
    /// attached.
    pub fn audit(&mut self, registry: &MemberRegistry, ledger: &PayoutLedger) -> BelResult<Vec<Violation>> {
        let mut violations = validate_all(registry, ledger);
        violations.extend(validate_ledger(ledger, registry, self.config.ledger.net_tolerance));

        if let Some(store) = &self.store {
            for v in &violations {
                store.insert_violation(&self.run_id, v)?;
            }
        }
        log::info!("run={} audit: {} violations", self.run_id, violations.len());
        Ok(violations)
    }

    /// Repair, then re-check everything.
    pub fn run_pass(&mut self, registry: &mut MemberRegistry, ledger: &mut PayoutLedger) -> BelResult<PassReport> {
        let enforcement = self.repair(registry, ledger)?;
        let violations = self.audit(registry, ledger)?;
        Ok(PassReport { enforcement, violations })
    }

    pub fn statistics(
        &mut self,
        period: YearMonth,
        registry: &MemberRegistry,
        ledger: &PayoutLedger,
    ) -> BelResult<MonthlyStatistics> {
        let stats = monthly_statistics(period, registry, ledger)?;
        self.record(EngineEvent::StatisticsComputed {
            period,
            total_net_payout: stats.total_net_payout,
            active_member_count: stats.active_member_count,
            paying_member_count: stats.paying_member_count,
            total_order_count: stats.total_order_count,
        })?;
        Ok(stats)
    }

    fn record(&mut self, event: EngineEvent) -> BelResult<()> {
        if let Some(store) = &self.store {
            let entry = EventLogEntry {
                id: None,
                run_id: self.run_id.clone(),
                seq: self.events.len() as u64,
                event_type: event.type_name().to_string(),
                payload: serde_json::to_string(&event)?,
            };
            store.append_event(&entry)?;
        }
        self.events.push(event);
        Ok(())
    }
}

fn period_salt(period: YearMonth) -> u64 {
    (period.year as i64 * 12 + period.month.index() as i64) as u64
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}
