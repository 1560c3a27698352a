//! HTTP/REST API layer for StockCoach.
//!
//! Axum-based REST API at `/api/v1/` with gateway-supplied identity headers,
//! envelope response format, and CORS support.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
