//! # storage-adapters
//!
//! Implementations of the `domains` ports. The in-memory adapters are always
//! compiled (tests, local runs); PostgreSQL and local-disk media sit behind
//! the `db-postgres` and `media-local` features.

pub mod content;
pub mod memory;

#[cfg(feature = "db-postgres")]
pub mod postgres;

#[cfg(feature = "media-local")]
pub mod media_local;

pub use memory::{InMemoryMediaStorage, InMemorySocialGraph, InMemoryStore};
