// Database layer: adapter dispatch, table aggregation, hooks and the
// internal adapter.

pub mod adapter_factory;
pub mod config;
pub mod get_schema;
pub mod get_tables;
pub mod hooks;
pub mod internal_adapter;
pub mod legacy;

pub use adapter_factory::{get_adapter, AdapterSource, ResolvedAdapter};
pub use config::{AdapterFactory, DatabaseConfig};
pub use get_schema::get_schema;
pub use get_tables::get_feature_tables;
pub use hooks::{BeforeHookOutcome, DatabaseHooks, HookChain, TableHooks};
pub use internal_adapter::InternalAdapter;
