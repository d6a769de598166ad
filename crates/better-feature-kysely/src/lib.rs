//! Kysely-style SQL adapter for better-feature.
//!
//! Wraps [`better_feature_sqlx::SqlxAdapter`] and applies Kysely naming:
//! snake_case columns, snake_case (optionally plural) tables. Connections are
//! described by [`KyselyConnection`]: an open pool with its dialect, or a
//! dialect URL to connect to.

pub mod adapter;
pub mod dialect;
pub mod naming;

pub use adapter::{KyselyAdapter, KyselyAdapterConfig};
pub use better_feature_sqlx::DatabaseType as KyselyDatabaseType;
pub use dialect::KyselyConnection;
