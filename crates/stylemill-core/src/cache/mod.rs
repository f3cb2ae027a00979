//! Import tracking and staleness decisions for compiled style sheets
//!
//! The ledger remembers which files each source transitively includes after
//! a successful compile. The decider combines it with modification times to
//! decide whether a requested output must be rebuilt.

mod invalidation;
mod ledger;

pub use invalidation::{Decision, StaleReason, StalenessDecider};
pub use ledger::ImportLedger;
