//! SQL storage for better-feature on top of `sqlx::AnyPool`.
//!
//! [`SqlxAdapter`] implements the core `Adapter` trait for SQLite, Postgres
//! and MySQL. [`get_migrations`] diffs a `DatabaseSchema` against the live
//! database and produces the DDL needed to bring it up to date.

pub mod adapter;
pub mod dialect;
pub mod migration;
pub mod query_builder;
pub mod schema;

pub use adapter::SqlxAdapter;
pub use dialect::DatabaseType;
pub use migration::{get_migrations, plan_migrations, MigrationPlan};
pub use query_builder::{QueryBuilder, SqlFragment};
