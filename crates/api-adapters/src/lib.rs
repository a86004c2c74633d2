//! # api-adapters
//!
//! HTTP surface of the Story feed. Transport-neutral pieces (query DTOs,
//! upload sniffing, metrics) are always compiled; the axum router sits
//! behind the `web-axum` feature.

pub mod dto;
pub mod metrics;
pub mod upload;

#[cfg(feature = "web-axum")]
pub mod error;
#[cfg(feature = "web-axum")]
pub mod extract;
#[cfg(feature = "web-axum")]
pub mod handlers;
#[cfg(feature = "web-axum")]
pub mod router;
#[cfg(feature = "web-axum")]
pub mod state;

pub use metrics::StoryMetrics;

#[cfg(feature = "web-axum")]
pub use router::build_router;
#[cfg(feature = "web-axum")]
pub use state::{ApiConfig, AppState};
