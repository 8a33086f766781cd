//! Consistency and aggregation engine for the BEL affiliate program.
//!
//! Two datasets go in (member profiles and the payout ledger), repaired
//! datasets, violations and statistics come out. File I/O and printing
//! belong to the caller.

pub mod aggregator;
pub mod calendar;
pub mod config;
pub mod document;
pub mod enforcer;
pub mod engine;
pub mod error;
pub mod event;
pub mod ledger;
pub mod ledger_audit;
pub mod member;
pub mod rng;
pub mod seeding;
pub mod settlement;
pub mod store;
pub mod types;
pub mod violation;
