// DatabaseConfig: which backend a feature instance should use. One
// constructor per backend; shape inference over untyped values only happens
// for `DatabaseConfig::Legacy` (see `db::legacy`).

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use better_feature_core::db::adapter::Adapter;
use better_feature_core::error::Result;
use better_feature_kysely::{KyselyAdapterConfig, KyselyConnection};
use better_feature_sequelize::SequelizeAdapterConfig;

use crate::options::FeatureOptions;

/// Builds the adapter from the final options. Its result is used verbatim.
pub type AdapterFactory = Arc<dyn Fn(&FeatureOptions) -> Result<Arc<dyn Adapter>> + Send + Sync>;

#[derive(Clone)]
pub enum DatabaseConfig {
    /// In-memory store, seeded with one collection per table.
    Memory,
    Factory(AdapterFactory),
    Sequelize(SequelizeAdapterConfig),
    Kysely {
        connection: KyselyConnection,
        config: KyselyAdapterConfig,
    },
    /// An untyped descriptor resolved by shape.
    Legacy(Value),
}

impl DatabaseConfig {
    pub fn memory() -> Self {
        Self::Memory
    }

    pub fn factory<F>(f: F) -> Self
    where
        F: Fn(&FeatureOptions) -> Result<Arc<dyn Adapter>> + Send + Sync + 'static,
    {
        Self::Factory(Arc::new(f))
    }

    /// Wrap a ready-made adapter.
    pub fn adapter(adapter: Arc<dyn Adapter>) -> Self {
        Self::factory(move |_| Ok(adapter.clone()))
    }

    pub fn sequelize(config: SequelizeAdapterConfig) -> Self {
        Self::Sequelize(config)
    }

    pub fn kysely(connection: KyselyConnection) -> Self {
        Self::Kysely { connection, config: KyselyAdapterConfig::default() }
    }

    pub fn kysely_with(connection: KyselyConnection, config: KyselyAdapterConfig) -> Self {
        Self::Kysely { connection, config }
    }

    pub fn legacy(descriptor: Value) -> Self {
        Self::Legacy(descriptor)
    }

    /// Whether this names a database instance (as opposed to an adapter), i.e.
    /// whether migrations can run against it.
    pub fn is_database_instance(&self) -> bool {
        matches!(self, Self::Kysely { .. } | Self::Legacy(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Factory(_) => "factory",
            Self::Sequelize(_) => "sequelize",
            Self::Kysely { .. } => "kysely",
            Self::Legacy(_) => "legacy",
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("Memory"),
            Self::Factory(_) => f.write_str("Factory(..)"),
            Self::Sequelize(config) => f.debug_tuple("Sequelize").field(config).finish(),
            Self::Kysely { connection, config } => f
                .debug_struct("Kysely")
                .field("database_type", &connection.database_type())
                .field("config", config)
                .finish(),
            Self::Legacy(value) => f.debug_tuple("Legacy").field(value).finish(),
        }
    }
}
