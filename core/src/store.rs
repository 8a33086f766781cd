//! SQLite audit store.
//!
//! RULE: Only store.rs talks to the database.
//! The engine hands over events and violations; it never executes SQL.

use crate::{
    error::BelResult,
    event::EventLogEntry,
    violation::Violation,
};
use rusqlite::{params, Connection, OptionalExtension};

pub struct AuditStore {
    conn: Connection,
}

impl AuditStore {
    /// Open (or create) the audit database at `path`.
    pub fn open(path: &str) -> BelResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> BelResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> BelResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_audit.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(&self, run_id: &str, seed: u64, command: &str, started_at: &str) -> BelResult<()> {
        self.conn.execute(
            "INSERT INTO run (run_id, seed, command, started_at) VALUES (?1, ?2, ?3, ?4)",
            params![run_id, seed as i64, command, started_at],
        )?;
        Ok(())
    }

    pub fn complete_run(&self, run_id: &str, completed_at: &str, violations: usize) -> BelResult<()> {
        self.conn.execute(
            "UPDATE run SET completed_at = ?2, violations = ?3 WHERE run_id = ?1",
            params![run_id, completed_at, violations as i64],
        )?;
        Ok(())
    }

    /// Violation count recorded when the run completed, if it has.
    pub fn run_violations(&self, run_id: &str) -> BelResult<Option<i64>> {
        let count = self
            .conn
            .query_row(
                "SELECT violations FROM run WHERE run_id = ?1",
                params![run_id],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()?
            .flatten();
        Ok(count)
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> BelResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (run_id, seq, event_type, payload) VALUES (?1, ?2, ?3, ?4)",
            params![entry.run_id, entry.seq as i64, entry.event_type, entry.payload],
        )?;
        Ok(())
    }

    pub fn events_for_run(&self, run_id: &str) -> BelResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, seq, event_type, payload
             FROM event_log WHERE run_id = ?1
             ORDER BY seq ASC, id ASC",
        )?;
        let entries = stmt
            .query_map(params![run_id], |row| {
                Ok(EventLogEntry {
                    id: Some(row.get(0)?),
                    run_id: row.get(1)?,
                    seq: row.get::<_, i64>(2)? as u64,
                    event_type: row.get(3)?,
                    payload: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count(&self, run_id: &str, event_type: &str) -> BelResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM event_log WHERE run_id = ?1 AND event_type = ?2",
            params![run_id, event_type],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ── Violations ─────────────────────────────────────────────

    pub fn insert_violation(&self, run_id: &str, violation: &Violation) -> BelResult<()> {
        let severity = serde_json::to_value(violation.severity())?;
        self.conn.execute(
            "INSERT INTO violation (run_id, member_id, code, severity, detail, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                run_id,
                violation.member_id,
                violation.code(),
                severity.as_str().unwrap_or("error"),
                violation.to_string(),
                serde_json::to_string(violation)?,
            ],
        )?;
        Ok(())
    }

    /// (code, count) pairs for a run, ordered by code.
    pub fn violation_counts(&self, run_id: &str) -> BelResult<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT code, COUNT(*) FROM violation
             WHERE run_id = ?1 GROUP BY code ORDER BY code ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
