// Kysely-style connection descriptors: a pre-built pool (`{ db, type }`) or a
// dialect to connect with (`{ dialect, type }`).

use sqlx::AnyPool;

use better_feature_core::error::{FeatureError, Result};
use better_feature_sqlx::{DatabaseType, SqlxAdapter};

use crate::adapter::{KyselyAdapter, KyselyAdapterConfig};

#[derive(Debug, Clone)]
pub enum KyselyConnection {
    /// An already-open pool and the dialect it speaks.
    Db { pool: AnyPool, database_type: DatabaseType },
    /// Connect on first use.
    Dialect { url: String, database_type: DatabaseType },
}

impl KyselyConnection {
    pub fn db(pool: AnyPool, database_type: DatabaseType) -> Self {
        Self::Db { pool, database_type }
    }

    pub fn dialect(url: impl Into<String>, database_type: DatabaseType) -> Self {
        Self::Dialect { url: url.into(), database_type }
    }

    /// Derive the dialect from the URL scheme.
    pub fn from_url(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let database_type = DatabaseType::from_url(&url).ok_or_else(|| {
            FeatureError::Configuration(format!("Cannot infer a SQL dialect from \"{url}\""))
        })?;
        Ok(Self::Dialect { url, database_type })
    }

    pub fn database_type(&self) -> DatabaseType {
        match self {
            Self::Db { database_type, .. } | Self::Dialect { database_type, .. } => *database_type,
        }
    }

    pub async fn into_adapter(self, mut config: KyselyAdapterConfig) -> Result<KyselyAdapter> {
        config.database_type.get_or_insert(self.database_type());
        let inner = match self {
            Self::Db { pool, database_type } => SqlxAdapter::new(pool, database_type),
            Self::Dialect { url, database_type } => {
                let adapter = SqlxAdapter::connect(&url).await?;
                if adapter.database_type() != database_type {
                    tracing::warn!(
                        declared = %database_type,
                        detected = %adapter.database_type(),
                        "Kysely dialect type does not match the connection URL"
                    );
                }
                adapter
            }
        };
        Ok(KyselyAdapter::from_inner(inner.debug_logs(config.debug_logs), config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_url() {
        let conn = KyselyConnection::from_url("postgres://localhost/app").unwrap();
        assert_eq!(conn.database_type(), DatabaseType::Postgres);
        assert!(KyselyConnection::from_url("file.db").is_err());
    }

    #[tokio::test]
    async fn test_dialect_connection_builds_adapter() {
        let adapter = KyselyConnection::dialect("sqlite::memory:", DatabaseType::Sqlite)
            .into_adapter(KyselyAdapterConfig::default())
            .await
            .unwrap();
        assert_eq!(adapter.config().database_type, Some(DatabaseType::Sqlite));
    }
}
