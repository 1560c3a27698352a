//! Shared domain types for StockCoach.
//!
//! This crate contains the core domain types used across the StockCoach chat
//! service: chat messages, the current-user identity, session view flags,
//! webhook wire types, configuration, and their associated error types.
//!
//! Zero infrastructure dependencies: only serde, uuid, chrono and thiserror.

pub mod config;
pub mod error;
pub mod message;
pub mod session;
pub mod user;
pub mod webhook;
