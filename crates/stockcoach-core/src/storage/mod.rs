//! Storage abstractions for StockCoach.
//!
//! Defines the local key-value cache trait. Implementations live in
//! stockcoach-infra.

pub mod kv_store;
