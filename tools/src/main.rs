//! bel-admin: headless maintenance runner for the BEL datasets.
//!
//! Usage:
//!   bel-admin validate  --profiles data/belProfiles.json --payouts data/payouts.json
//!   bel-admin repair    [--dry-run]
//!   bel-admin settle    --year 2025 --month 9 [--seed 42]
//!   bel-admin stats     --year 2025 --month 9 [--json]
//!   bel-admin year-stats --year 2025
//!   bel-admin seed-activity --year 2025 --month 9
//!   bel-admin assign-join-dates
//!   bel-admin summary   [--cutoff 2025-01-01]
//!   bel-admin activity  --year 2025 --month 9 [--years 2024,2025] [--json]
//!
//! Common flags: --config <dir> (engine_config.json), --audit-db <path>.

use anyhow::{bail, Context, Result};
use bel_core::{
    aggregator::{
        activity_profile, compare, join_summary, slow_season_report, tier_distribution, year_statistics,
        ActivityProfile, ActivitySpread, MonthOverMonth, MonthlyStatistics, SlowSeasonReport,
    },
    calendar::{Month, YearMonth},
    config::EngineConfig,
    document::{PayoutsDocument, ProfilesDocument},
    engine::BelEngine,
    store::AuditStore,
    types::new_run_id,
    violation::{count_by_code, has_errors, Violation},
};
use chrono::NaiveDate;
use std::env;

struct Args {
    command: String,
    profiles: String,
    payouts: String,
    config_dir: String,
    audit_db: Option<String>,
    seed: u64,
    year: Option<i32>,
    month: Option<u32>,
    cutoff: Option<String>,
    years: Option<String>,
    dry_run: bool,
    json: bool,
}

#[derive(serde::Serialize)]
struct StatsReport<'a> {
    current: &'a MonthlyStatistics,
    prior: &'a MonthlyStatistics,
    month_over_month: &'a MonthOverMonth,
}

#[derive(serde::Serialize)]
struct ActivityReport<'a> {
    profile: &'a ActivityProfile,
    slow_season: &'a SlowSeasonReport,
}

fn main() -> Result<()> {
    env_logger::init();

    let raw: Vec<String> = env::args().collect();
    let args = parse_args(&raw)?;

    let config = EngineConfig::load(&args.config_dir)
        .with_context(|| format!("loading engine config from {}", args.config_dir))?;

    let mut profiles = ProfilesDocument::from_json(&read(&args.profiles)?)
        .with_context(|| format!("parsing {}", args.profiles))?;
    let mut payouts = PayoutsDocument::from_json(&read(&args.payouts)?)
        .with_context(|| format!("parsing {}", args.payouts))?;

    let mut engine = BelEngine::new(new_run_id(), args.seed, config);
    if let Some(path) = &args.audit_db {
        let store = AuditStore::open(path)?;
        store.migrate()?;
        engine = engine.with_store(store);
    }
    engine.begin(&args.command)?;

    if !args.json {
        println!("BEL admin — {}", args.command);
        println!("  run_id:    {}", engine.run_id);
        println!("  profiles:  {} ({} members)", args.profiles, profiles.registry.len());
        println!("  payouts:   {} ({} ledgers)", args.payouts, payouts.ledger.len());
        println!();
    }

    let mut violations: Vec<Violation> = Vec::new();
    let mut dirty = false;

    match args.command.as_str() {
        "validate" => {
            violations = engine.audit(&profiles.registry, &payouts.ledger)?;
            print_violations(&violations);
        }
        "repair" => {
            let report = engine.run_pass(&mut profiles.registry, &mut payouts.ledger)?;
            println!("=== REPAIR ===");
            println!("  activity cleared: {}", report.enforcement.activity_cleared.len());
            println!("  payouts zeroed:   {}", report.enforcement.payouts_zeroed.len());
            println!("  members skipped:  {}", report.enforcement.skipped.len());
            println!();
            dirty = report.enforcement.changed() > 0;
            violations = report.violations;
            print_violations(&violations);
        }
        "settle" => {
            let period = period_arg(&args)?;
            let run = engine.settle(&profiles.registry, &mut payouts.ledger, period)?;
            let report = engine.run_pass(&mut profiles.registry, &mut payouts.ledger)?;
            println!("=== SETTLEMENT {period} ===");
            for (member_id, s) in &run.created {
                println!(
                    "  {member_id:<10} {} gross ${:>10.2}  net ${:>10.2}",
                    s.record.payout_id.as_deref().unwrap_or("-"),
                    s.record.gross(),
                    s.record.net()
                );
            }
            println!("  created: {}  skipped: {}  net total: ${:.2}", run.created.len(), run.skipped.len(), run.total_net());
            println!();
            dirty = !run.created.is_empty() || report.enforcement.changed() > 0;
            violations = report.violations;
            violations.extend(run.warnings);
            print_violations(&violations);
        }
        "stats" => {
            let period = period_arg(&args)?;
            let current = engine.statistics(period, &profiles.registry, &payouts.ledger)?;
            let prior = engine.statistics(period.pred()?, &profiles.registry, &payouts.ledger)?;
            let mom = compare(&prior, &current);
            if args.json {
                let report = StatsReport { current: &current, prior: &prior, month_over_month: &mom };
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_month(&prior);
                print_month(&current);
                print_mom(&mom);
            }
        }
        "year-stats" => {
            let year = args.year.context("--year is required")?;
            let stats = year_statistics(year, &profiles.registry, &payouts.ledger)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("=== {year} MONTHLY PAYOUTS ===");
                for (m, cumulative) in stats.months.iter().zip(&stats.cumulative_net) {
                    if m.paying_member_count == 0 {
                        println!("  {:>9}: no data", m.period.month.name());
                        continue;
                    }
                    println!(
                        "  {:>9}: net ${:>10.2}  active {:>3}  paying {:>3}  orders {:>5}  cumulative ${:>12.2}",
                        m.period.month.name(),
                        m.total_net_payout,
                        m.active_member_count,
                        m.paying_member_count,
                        m.total_order_count,
                        cumulative
                    );
                }
                println!("  total: ${:.2}", stats.total_net_payout);
            }
        }
        "seed-activity" => {
            let period = period_arg(&args)?;
            let filled = engine.seed_activity(&mut profiles.registry, period)?;
            let report = engine.run_pass(&mut profiles.registry, &mut payouts.ledger)?;
            println!("Seeded {period} for {} members", filled.len());
            dirty = !filled.is_empty() || report.enforcement.changed() > 0;
            violations = report.violations;
            print_violations(&violations);
        }
        "assign-join-dates" => {
            let assigned = engine.assign_join_dates(&mut profiles.registry)?;
            for (member_id, date) in &assigned {
                println!("  {member_id:<10} joined {date}");
            }
            println!("Assigned {} join dates", assigned.len());
            dirty = !assigned.is_empty();
        }
        "summary" => {
            let cutoff = match &args.cutoff {
                Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .with_context(|| format!("--cutoff '{raw}' is not YYYY-MM-DD"))?,
                None => NaiveDate::from_ymd_opt(2025, 1, 1).context("invalid default cutoff")?,
            };
            println!("=== TIERS ===");
            for share in tier_distribution(&profiles.registry) {
                println!("  {:<10} {:>3} ({:.1}%)", share.tier, share.count, share.share_pct);
            }
            let joins = join_summary(&profiles.registry, cutoff);
            println!();
            println!("=== JOIN DATES ===");
            println!("  total members:      {}", joins.total);
            println!("  joined before {cutoff}: {}", joins.joined_before);
            println!("  missing join date:  {}", joins.missing_join_date);
            println!("  unreadable date:    {}", joins.malformed_join_date);
            for (month, count) in &joins.by_month {
                println!("  {month}: {count}");
            }
        }
        "activity" => {
            let period = period_arg(&args)?;
            let years = years_arg(&args, period.year)?;
            let slow: Vec<Month> = Month::ALL
                .into_iter()
                .filter(|m| engine.config.seeding.slow_month_factors.contains_key(m.name()))
                .collect();
            let profile = activity_profile(&profiles.registry, period);
            let season = slow_season_report(&profiles.registry, &years, &slow);
            if args.json {
                let report = ActivityReport { profile: &profile, slow_season: &season };
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("=== ACTIVITY {period} ===");
                println!(
                    "  coverage: {}/{} members ({:.1}%)",
                    profile.members_with_activity, profile.total_members, profile.coverage_pct
                );
                for t in &profile.tiers {
                    print_spread(&t.tier, &t.spread);
                }
                println!();
                let listed: Vec<String> = years.iter().map(i32::to_string).collect();
                println!("=== SLOW MONTHS ({}) ===", listed.join(", "));
                for m in &season.months {
                    match &m.spread {
                        Some(spread) => print_spread(m.month.name(), spread),
                        None => println!("  {:<10} no data", m.month.name()),
                    }
                }
            }
        }
        other => bail!("unknown command '{other}'"),
    }

    if dirty {
        if args.dry_run {
            println!("(dry run: datasets not written)");
        } else {
            std::fs::write(&args.profiles, profiles.to_json()?)
                .with_context(|| format!("writing {}", args.profiles))?;
            std::fs::write(&args.payouts, payouts.to_json()?)
                .with_context(|| format!("writing {}", args.payouts))?;
            log::info!("wrote {} and {}", args.profiles, args.payouts);
        }
    }

    engine.finish(violations.len())?;
    if has_errors(&violations) {
        std::process::exit(2);
    }
    Ok(())
}

fn parse_args(args: &[String]) -> Result<Args> {
    let command = args
        .get(1)
        .filter(|c| !c.starts_with("--"))
        .cloned()
        .context("usage: bel-admin <command> [flags]")?;
    Ok(Args {
        command,
        profiles: flag(args, "--profiles").unwrap_or("./data/belProfiles.json").to_string(),
        payouts: flag(args, "--payouts").unwrap_or("./data/payouts.json").to_string(),
        config_dir: flag(args, "--config").unwrap_or("./data").to_string(),
        audit_db: flag(args, "--audit-db").map(str::to_string),
        seed: parse_arg(args, "--seed", 42u64),
        year: flag(args, "--year").and_then(|v| v.parse().ok()),
        month: flag(args, "--month").and_then(|v| v.parse().ok()),
        cutoff: flag(args, "--cutoff").map(str::to_string),
        years: flag(args, "--years").map(str::to_string),
        dry_run: args.iter().any(|a| a == "--dry-run"),
        json: args.iter().any(|a| a == "--json"),
    })
}

fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == name).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], name: &str, default: T) -> T {
    flag(args, name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn period_arg(args: &Args) -> Result<YearMonth> {
    let year = args.year.context("--year is required")?;
    let month = args.month.context("--month is required")?;
    Ok(YearMonth::from_numbers(year, month)?)
}

/// `--years 2024,2025`; defaults to the period's year and the one before.
fn years_arg(args: &Args, year: i32) -> Result<Vec<i32>> {
    match &args.years {
        Some(raw) => raw
            .split(',')
            .map(|y| y.trim().parse::<i32>().with_context(|| format!("--years: '{y}' is not a year")))
            .collect(),
        None => Ok(vec![year.saturating_sub(1), year]),
    }
}

fn read(path: &str) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("cannot read {path}"))
}

fn print_violations(violations: &[Violation]) {
    if violations.is_empty() {
        println!("All datasets are consistent.");
        return;
    }
    println!("=== VIOLATIONS ({}) ===", violations.len());
    for v in violations {
        println!("  - {v}");
    }
    println!();
    for (code, count) in count_by_code(violations) {
        println!("  {code:<22} {count}");
    }
}

fn print_month(m: &MonthlyStatistics) {
    println!("{}:", m.period);
    println!("  Net Payout Amount: ${:.2}", m.total_net_payout);
    println!("  Active BEL Count:  {}", m.active_member_count);
    println!("  Paying BEL Count:  {}", m.paying_member_count);
    println!("  Total Order Count: {}", m.total_order_count);
}

fn print_mom(mom: &MonthOverMonth) {
    let pct = |p: Option<f64>| p.map_or("N/A".to_string(), |v| format!("{v:+.1}%"));
    println!();
    println!("=== {} vs {} (MoM) ===", mom.to, mom.from);
    println!("  Net Payout:     {:+.2} ({}) {:?}", mom.net_payout.change, pct(mom.net_payout.pct_change), mom.net_payout.trend());
    println!("  Active BELs:    {:+} ({}) {:?}", mom.active_members.change, pct(mom.active_members.pct_change), mom.active_members.trend());
    println!("  Paying BELs:    {:+} ({}) {:?}", mom.paying_members.change, pct(mom.paying_members.pct_change), mom.paying_members.trend());
    println!("  Orders:         {:+} ({}) {:?}", mom.orders.change, pct(mom.orders.pct_change), mom.orders.trend());
}

fn print_spread(label: &str, s: &ActivitySpread) {
    println!(
        "  {label:<10} n={:<3} clicks {:.0}-{:.0} (avg {:.2})  orders {:.0}-{:.0} (avg {:.2})  revenue {:.2}-{:.2} (avg {:.2})",
        s.records,
        s.clicks.min,
        s.clicks.max,
        s.clicks.mean,
        s.orders.min,
        s.orders.max,
        s.orders.mean,
        s.revenue.min,
        s.revenue.max,
        s.revenue.mean
    );
}
