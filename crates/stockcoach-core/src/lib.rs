//! Business logic and port definitions for StockCoach.
//!
//! This crate defines the "ports" (repository, cache, clock, geo lookup and
//! webhook transport traits) that the infrastructure layer implements, plus
//! the chat core built on top of them. It depends only on `stockcoach-types`
//! and never on `stockcoach-infra` or any database/HTTP crate.

pub mod chat;
pub mod clock;
pub mod repository;
pub mod storage;
pub mod timezone;

#[cfg(test)]
pub(crate) mod testing;
