// Adapter dispatch: turn the configured `DatabaseConfig` into one long-lived
// adapter. Runs once per feature instance; a failure here aborts init.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use better_feature_core::db::adapter::Adapter;
use better_feature_core::error::{FeatureError, Result};
use better_feature_core::logger::FeatureLogger;
use better_feature_kysely::{KyselyAdapter, KyselyAdapterConfig};
use better_feature_memory::MemoryAdapter;
use better_feature_sequelize::SequelizeAdapter;

use super::config::DatabaseConfig;
use super::get_tables::get_feature_tables;
use super::legacy::{self, LegacyShape};
use crate::options::FeatureOptions;

pub const MEMORY_FALLBACK_WARNING: &str =
    "No database configuration provided. Using memory adapter in development";

/// How the adapter was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterSource {
    /// Nothing configured; development fallback.
    MemoryFallback,
    Memory,
    Factory,
    Sequelize,
    Kysely,
    Legacy(LegacyShape),
}

#[derive(Clone)]
pub struct ResolvedAdapter {
    pub adapter: Arc<dyn Adapter>,
    pub source: AdapterSource,
    /// The SQL connection behind database-instance configurations. Migrations
    /// run through it.
    pub sql: Option<KyselyAdapter>,
}

impl fmt::Debug for ResolvedAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedAdapter")
            .field("adapter", &self.adapter.metadata().adapter_id)
            .field("source", &self.source)
            .field("sql", &self.sql.is_some())
            .finish()
    }
}

impl ResolvedAdapter {
    fn plain(adapter: Arc<dyn Adapter>, source: AdapterSource) -> Self {
        Self { adapter, source, sql: None }
    }

    fn sql(adapter: KyselyAdapter, source: AdapterSource) -> Self {
        Self { adapter: Arc::new(adapter.clone()), source, sql: Some(adapter) }
    }
}

pub async fn get_adapter(options: &FeatureOptions) -> Result<ResolvedAdapter> {
    let Some(database) = options.runtime.database.clone() else {
        FeatureLogger::new(options.logger_config()).warn(MEMORY_FALLBACK_WARNING);
        return Ok(ResolvedAdapter::plain(memory_adapter(options), AdapterSource::MemoryFallback));
    };

    tracing::debug!(kind = database.kind(), "resolving database adapter");
    match database {
        DatabaseConfig::Memory => Ok(ResolvedAdapter::plain(memory_adapter(options), AdapterSource::Memory)),
        // The factory's adapter is used as-is.
        DatabaseConfig::Factory(factory) => Ok(ResolvedAdapter::plain(factory(options)?, AdapterSource::Factory)),
        DatabaseConfig::Sequelize(config) => Ok(ResolvedAdapter::plain(
            Arc::new(SequelizeAdapter::new(config)),
            AdapterSource::Sequelize,
        )),
        DatabaseConfig::Kysely { connection, config } => {
            let adapter = connection.into_adapter(config).await?;
            Ok(ResolvedAdapter::sql(adapter, AdapterSource::Kysely))
        }
        DatabaseConfig::Legacy(descriptor) => {
            let resolved = legacy::sniff(&descriptor)?;
            let shape = resolved.shape;
            let config = legacy_flags(descriptor)?;
            let adapter = resolved.into_connection().into_adapter(config).await?;
            Ok(ResolvedAdapter::sql(adapter, AdapterSource::Legacy(shape)))
        }
    }
}

/// `usePlural` / `debugLogs` ride along on a legacy descriptor. The dialect
/// comes from the sniffed connection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyFlags {
    #[serde(default)]
    use_plural: bool,
    #[serde(default)]
    debug_logs: bool,
}

fn legacy_flags(descriptor: Value) -> Result<KyselyAdapterConfig> {
    let flags: LegacyFlags = serde_json::from_value(descriptor)
        .map_err(|e| FeatureError::Configuration(format!("invalid legacy database options: {e}")))?;
    Ok(KyselyAdapterConfig { database_type: None, use_plural: flags.use_plural, debug_logs: flags.debug_logs })
}

/// One empty collection per aggregated table.
fn memory_adapter(options: &FeatureOptions) -> Arc<dyn Adapter> {
    let tables = get_feature_tables(options);
    Arc::new(MemoryAdapter::with_tables(tables.into_values().map(|t| t.model_name)))
}
