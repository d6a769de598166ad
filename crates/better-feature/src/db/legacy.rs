// Best-effort resolution of untyped database descriptors.
//
// Older configurations passed a client object and let the library guess the
// dialect from which members it had. Those shapes arrive here as JSON and are
// mapped onto a typed `KyselyConnection`. Nothing outside
// `DatabaseConfig::Legacy` goes through this module.

use serde_json::Value;

use better_feature_core::error::{FeatureError, Result};
use better_feature_kysely::{KyselyConnection, KyselyDatabaseType};

pub const NO_ADAPTER_DETECTED: &str = "no compatible database adapter detected";

/// Which rule matched a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyShape {
    /// `{ db, type }`
    Db,
    /// `{ dialect, type }`
    Dialect,
    /// A driver factory; `name` picks the dialect.
    CreateDriver,
    /// SQLite client.
    Aggregate,
    /// MySQL pool.
    GetConnection,
    /// Postgres pool.
    Connect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyDescriptor {
    pub shape: LegacyShape,
    pub database_type: KyselyDatabaseType,
    pub url: String,
}

impl LegacyDescriptor {
    pub fn into_connection(self) -> KyselyConnection {
        KyselyConnection::dialect(self.url, self.database_type)
    }
}

/// Classify a descriptor. Rules are tried in declaration order of
/// [`LegacyShape`]; the first that matches wins.
pub fn sniff(value: &Value) -> Result<LegacyDescriptor> {
    let obj = value.as_object().ok_or_else(not_detected)?;
    let has = |key: &str| obj.contains_key(key);

    let (shape, database_type) = if has("db") && has("type") {
        (LegacyShape::Db, declared_type(value)?)
    } else if has("dialect") && has("type") {
        (LegacyShape::Dialect, declared_type(value)?)
    } else if has("createDriver") {
        let name = obj.get("name").and_then(Value::as_str).unwrap_or_default();
        (LegacyShape::CreateDriver, driver_type(name).ok_or_else(not_detected)?)
    } else if has("aggregate") {
        (LegacyShape::Aggregate, KyselyDatabaseType::Sqlite)
    } else if has("getConnection") {
        (LegacyShape::GetConnection, KyselyDatabaseType::Mysql)
    } else if has("connect") {
        (LegacyShape::Connect, KyselyDatabaseType::Postgres)
    } else {
        return Err(not_detected());
    };

    let url = connection_url(value, shape).ok_or_else(|| {
        FeatureError::Configuration(format!(
            "Database descriptor matched {shape:?} but has no `url` or `connectionString`"
        ))
    })?;

    tracing::debug!(?shape, database_type = %database_type, "resolved legacy database descriptor");
    Ok(LegacyDescriptor { shape, database_type, url })
}

fn declared_type(value: &Value) -> Result<KyselyDatabaseType> {
    let raw = value.get("type").and_then(Value::as_str).unwrap_or_default();
    raw.parse()
}

fn driver_type(name: &str) -> Option<KyselyDatabaseType> {
    let name = name.to_lowercase();
    if name.contains("sqlite") {
        Some(KyselyDatabaseType::Sqlite)
    } else if name.contains("mysql") {
        Some(KyselyDatabaseType::Mysql)
    } else if name.contains("postgres") || name.contains("pg") {
        Some(KyselyDatabaseType::Postgres)
    } else if name.contains("mssql") {
        Some(KyselyDatabaseType::Mssql)
    } else {
        None
    }
}

/// `url` / `connectionString` on the descriptor, or on its `db` / `dialect`
/// member for the two wrapper shapes.
fn connection_url(value: &Value, shape: LegacyShape) -> Option<String> {
    let read = |v: &Value| {
        v.get("url")
            .or_else(|| v.get("connectionString"))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    let nested = match shape {
        LegacyShape::Db => value.get("db"),
        LegacyShape::Dialect => value.get("dialect"),
        _ => None,
    };
    read(value).or_else(|| nested.and_then(read))
}

fn not_detected() -> FeatureError {
    FeatureError::Configuration(NO_ADAPTER_DETECTED.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_db_and_dialect_wrappers() {
        let d = sniff(&json!({ "db": { "url": "sqlite::memory:" }, "type": "sqlite" })).unwrap();
        assert_eq!(d.shape, LegacyShape::Db);
        assert_eq!(d.url, "sqlite::memory:");

        let d = sniff(&json!({ "dialect": {}, "type": "postgres", "connectionString": "postgres://h/db" }))
            .unwrap();
        assert_eq!(d.shape, LegacyShape::Dialect);
        assert_eq!(d.database_type, KyselyDatabaseType::Postgres);
    }

    #[test]
    fn test_member_sniffing() {
        let d = sniff(&json!({ "createDriver": true, "name": "MysqlDialect", "url": "mysql://h/db" })).unwrap();
        assert_eq!(d.database_type, KyselyDatabaseType::Mysql);

        let d = sniff(&json!({ "aggregate": true, "url": "sqlite::memory:" })).unwrap();
        assert_eq!(d.database_type, KyselyDatabaseType::Sqlite);

        let d = sniff(&json!({ "getConnection": true, "url": "mysql://h/db" })).unwrap();
        assert_eq!(d.database_type, KyselyDatabaseType::Mysql);

        let d = sniff(&json!({ "connect": true, "url": "postgres://h/db" })).unwrap();
        assert_eq!(d.database_type, KyselyDatabaseType::Postgres);
    }

    #[test]
    fn test_first_matching_rule_wins() {
        // Both `aggregate` and `connect`: sqlite is checked first.
        let d = sniff(&json!({ "aggregate": true, "connect": true, "url": "sqlite::memory:" })).unwrap();
        assert_eq!(d.shape, LegacyShape::Aggregate);
    }

    #[test]
    fn test_unknown_shape_is_configuration_error() {
        let err = sniff(&json!({ "host": "localhost" })).unwrap_err();
        assert!(matches!(err, FeatureError::Configuration(ref m) if m == NO_ADAPTER_DETECTED));
        assert!(sniff(&json!("sqlite")).is_err());
        assert!(sniff(&json!({ "createDriver": true, "name": "Oracle" })).is_err());
    }

    #[test]
    fn test_missing_url_is_reported() {
        let err = sniff(&json!({ "aggregate": true })).unwrap_err();
        assert!(err.to_string().contains("connectionString"));
    }
}
