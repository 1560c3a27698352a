//! Repository trait definitions (ports).
//!
//! These traits define the remote storage interface that the infrastructure
//! layer (stockcoach-infra) implements. The core crate never depends on any
//! specific storage technology.

pub mod message;
