//! # domains
//!
//! Core entities, pure rules and port traits for the ephemeral Story feed.
//! Nothing in this crate performs I/O; adapters implement the ports.

pub mod clock;
pub mod error;
pub mod ledger;
pub mod media;
pub mod models;
pub mod pagination;
pub mod ports;
pub mod visibility;

// Re-exporting for easier access in other crates
pub use clock::*;
pub use error::*;
pub use ledger::*;
pub use media::*;
pub use models::*;
pub use pagination::*;
pub use ports::*;
pub use visibility::*;
