use crate::error::{BelError, BelResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Inclusive `[low, high]` range a factor is drawn from.
pub type FactorRange = (f64, f64);

// ── Settlement policy ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Withholding tax as a fraction of gross payout.
    pub wht_rate: f64,
    /// Gross used when a member has no prior payout at all.
    pub default_gross_baseline: f64,
    /// Month-on-month growth factor range.
    pub period_growth: FactorRange,
    /// Tier name → multiplier range.
    pub tier_multipliers: HashMap<String, FactorRange>,
    /// Range used for any tier missing from `tier_multipliers`.
    pub default_tier_multiplier: FactorRange,
    /// Tier assumed for ledger members absent from the registry.
    pub fallback_tier: String,
    /// Day of month stamped on generated payouts (clamped to month end).
    pub settlement_day: u32,
}

// ── Ledger checks ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Allowed |net - (gross - wht)|.
    pub net_tolerance: f64,
}

// ── Synthetic seeding ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRanges {
    pub clicks: (u64, u64),
    pub orders: (u64, u64),
    pub revenue: (u64, u64),
}

/// A window that a fixed number of join dates is drawn from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinCohort {
    pub label: String,
    pub start: NaiveDate,
    /// Exclusive.
    pub end: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedingConfig {
    pub activity_ranges: HashMap<String, ActivityRanges>,
    /// Tier whose ranges are used for tiers missing from `activity_ranges`.
    pub default_activity_tier: String,
    /// Month name → dampening factor applied to generated metrics.
    pub slow_month_factors: HashMap<String, f64>,
    /// Filled in order; overflow lands in the first cohort.
    pub join_cohorts: Vec<JoinCohort>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub settlement: SettlementConfig,
    pub ledger: LedgerConfig,
    pub seeding: SeedingConfig,
}

impl EngineConfig {
    /// Load from `<data_dir>/engine_config.json`.
    /// In tests, use EngineConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/engine_config.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: EngineConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid {path}: {e}"))?;
        Ok(config)
    }

    /// Reject configurations the generator cannot honour.
    pub fn validate(&self) -> BelResult<()> {
        let s = &self.settlement;
        check_range("period_growth", s.period_growth)?;
        check_range("default_tier_multiplier", s.default_tier_multiplier)?;
        for (tier, range) in &s.tier_multipliers {
            check_range(&format!("tier_multipliers.{tier}"), *range)?;
        }
        if !(0.0..1.0).contains(&s.wht_rate) {
            return Err(BelError::InvalidRange {
                name: "wht_rate".into(),
                low: s.wht_rate,
                high: s.wht_rate,
            });
        }
        if !(1..=31).contains(&s.settlement_day) {
            return Err(BelError::Other(anyhow::anyhow!(
                "settlement_day {} outside 1..=31",
                s.settlement_day
            )));
        }
        if self.ledger.net_tolerance < 0.0 {
            return Err(BelError::InvalidRange {
                name: "net_tolerance".into(),
                low: self.ledger.net_tolerance,
                high: self.ledger.net_tolerance,
            });
        }
        for cohort in &self.seeding.join_cohorts {
            if cohort.end <= cohort.start {
                return Err(BelError::Other(anyhow::anyhow!(
                    "join cohort '{}' has an empty window",
                    cohort.label
                )));
            }
        }
        Ok(())
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        let tier_multipliers: HashMap<String, FactorRange> = [
            ("Leader".to_string(), (1.05, 1.15)),
            ("Exploder".to_string(), (0.95, 1.10)),
            ("Enabler".to_string(), (0.85, 1.05)),
            ("Builder".to_string(), (0.80, 1.00)),
            ("Explorer".to_string(), (0.75, 0.95)),
        ]
        .into();

        let activity_ranges: HashMap<String, ActivityRanges> = [
            (
                "Leader".to_string(),
                ActivityRanges { clicks: (800, 1200), orders: (25, 40), revenue: (20_000, 35_000) },
            ),
            (
                "Exploder".to_string(),
                ActivityRanges { clicks: (500, 800), orders: (15, 25), revenue: (12_000, 20_000) },
            ),
            (
                "Enabler".to_string(),
                ActivityRanges { clicks: (300, 500), orders: (8, 15), revenue: (6_000, 12_000) },
            ),
            (
                "Builder".to_string(),
                ActivityRanges { clicks: (150, 300), orders: (4, 8), revenue: (3_000, 6_000) },
            ),
        ]
        .into();

        let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default();

        Self {
            settlement: SettlementConfig {
                wht_rate: 0.20,
                default_gross_baseline: 1000.0,
                period_growth: (1.02, 1.12),
                tier_multipliers,
                default_tier_multiplier: (0.85, 1.05),
                fallback_tier: "Builder".into(),
                settlement_day: 12,
            },
            ledger: LedgerConfig { net_tolerance: 0.01 },
            seeding: SeedingConfig {
                activity_ranges,
                default_activity_tier: "Builder".into(),
                slow_month_factors: [
                    ("March".to_string(), 0.70),
                    ("April".to_string(), 0.75),
                    ("July".to_string(), 0.80),
                ]
                .into(),
                join_cohorts: vec![
                    JoinCohort {
                        label: "early".into(),
                        start: date(2024, 1, 1),
                        end: date(2025, 6, 30),
                        count: 21,
                    },
                    JoinCohort {
                        label: "august_2025".into(),
                        start: date(2025, 8, 1),
                        end: date(2025, 8, 31),
                        count: 3,
                    },
                ],
            },
        }
    }
}

fn check_range(name: &str, (low, high): FactorRange) -> BelResult<()> {
    if low > high || low < 0.0 || !low.is_finite() || !high.is_finite() {
        return Err(BelError::InvalidRange { name: name.to_string(), low, high });
    }
    Ok(())
}
