//! Infrastructure layer for StockCoach.
//!
//! Implementations of the ports defined in `stockcoach-core`: the SQLite
//! remote message store, the JSON-file local cache, and reqwest clients for
//! the chat webhook, the transcription webhook and IP geolocation. Also the
//! `config.toml` loader.

pub mod config;
pub mod filesystem;
pub mod geo;
pub mod sqlite;
pub mod webhook;
