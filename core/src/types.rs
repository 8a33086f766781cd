//! Shared primitive types used across the engine.

/// A stable, unique identifier for a BEL member (e.g. "BEL007").
pub type MemberId = String;

/// The canonical run identifier used by the audit store.
pub type RunId = String;

/// A fresh, unique run identifier.
pub fn new_run_id() -> RunId {
    format!("run-{}", uuid::Uuid::new_v4())
}

/// Round a monetary amount to 2 decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentage change from `prior` to `current`.
/// None when the prior value is zero: the change is undefined, not infinite.
pub fn pct_change(prior: f64, current: f64) -> Option<f64> {
    if prior == 0.0 {
        return None;
    }
    Some((current - prior) / prior * 100.0)
}
