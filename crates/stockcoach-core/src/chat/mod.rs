//! The StockCoach chat core.
//!
//! - `store`: remote + local-cache message persistence with reconciliation
//! - `exchange`: webhook round trip with deadline, reply validation, canned fallback
//! - `session`: date projection and the one-session-per-day rule
//! - `welcome`: greeting messages for fresh sessions
//! - `orchestrator`: the per-user surface tying it all together

pub mod attachment;
pub mod exchange;
pub mod orchestrator;
pub mod session;
pub mod store;
pub mod welcome;
