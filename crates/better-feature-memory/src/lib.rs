//! In-memory adapter for better-feature.
//!
//! Used automatically when no database is configured. Not durable and not
//! meant for production traffic.

pub mod adapter;

pub use adapter::MemoryAdapter;
