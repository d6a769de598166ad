//! Adapter dispatch and migrations against in-memory SQLite.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use better_feature::context::MIGRATIONS_UNSUPPORTED;
use better_feature::db::AdapterSource;
use better_feature::plugin::PluginMigration;
use better_feature::plugins::tester::{TesterPlugin, TESTER_TABLE};
use better_feature::{better_feature, get_adapter, init, DatabaseConfig, FeatureOptions, FeaturePlugin};
use better_feature_core::db::adapter::{SchemaStatus, WhereClause};
use better_feature_kysely::{KyselyConnection, KyselyDatabaseType};
use better_feature_sequelize::{ModelRegistry, SequelizeAdapterConfig};

const SQLITE: &str = "sqlite::memory:";

#[derive(Debug)]
struct AuditLog;

#[async_trait]
impl FeaturePlugin for AuditLog {
    fn id(&self) -> &str {
        "audit-log"
    }

    fn migrations(&self) -> Vec<PluginMigration> {
        vec![PluginMigration::new(
            "create_audit_log",
            "CREATE TABLE IF NOT EXISTS audit_log (id TEXT PRIMARY KEY, entry TEXT NOT NULL)",
        )]
    }
}

fn kysely_options() -> FeatureOptions {
    FeatureOptions::new()
        .database(DatabaseConfig::kysely(KyselyConnection::dialect(SQLITE, KyselyDatabaseType::Sqlite)))
        .plugin(TesterPlugin::default())
}

#[tokio::test]
async fn kysely_migrations_create_plugin_tables() {
    let feature = better_feature(kysely_options().plugin(AuditLog)).await.unwrap();

    let status = feature.run_migrations().await.unwrap();
    assert!(matches!(status, SchemaStatus::Applied { .. }));

    let db = &feature.context().internal_adapter;
    let created = db
        .create(TESTER_TABLE, json!({ "name": "Sql", "displayName": "On Disk" }), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(created["name"], "sql");

    let found = db
        .find_one(TESTER_TABLE, &[WhereClause::eq("displayName", "On Disk")], None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found["id"], created["id"]);

    // Plugin migrations ran against the same connection.
    let sql = feature.context().sql().unwrap();
    let inserted = sql.inner().execute_raw("INSERT INTO audit_log (id, entry) VALUES ('1', 'x')").await.unwrap();
    assert_eq!(inserted, 1);
}

#[tokio::test]
async fn migrations_are_repeatable() {
    let ctx = init(kysely_options().plugin(AuditLog)).await.unwrap();
    ctx.run_migrations().await.unwrap();
    let second = ctx.run_migrations().await.unwrap();
    assert!(matches!(second, SchemaStatus::UpToDate | SchemaStatus::Applied { .. }));
}

#[tokio::test]
async fn legacy_descriptor_dispatches_to_sql() {
    let options = FeatureOptions::new()
        .database(DatabaseConfig::legacy(json!({ "aggregate": true, "url": SQLITE })))
        .plugin(TesterPlugin::default());
    let resolved = get_adapter(&options).await.unwrap();
    assert!(matches!(resolved.source, AdapterSource::Legacy(_)));
    assert!(resolved.sql.is_some());

    let ctx = init(options).await.unwrap();
    ctx.run_migrations().await.unwrap();
    assert_eq!(ctx.internal_adapter.count(TESTER_TABLE, &[]).await.unwrap(), 0);
}

#[tokio::test]
async fn adapters_cannot_migrate() {
    let registry = Arc::new(ModelRegistry::new());
    let sequelize = FeatureOptions::new().database(DatabaseConfig::sequelize(SequelizeAdapterConfig::new(registry)));
    let err = init(sequelize).await.unwrap().run_migrations().await.unwrap_err();
    assert!(err.to_string().contains(MIGRATIONS_UNSUPPORTED));

    let memory = init(FeatureOptions::new().database(DatabaseConfig::memory())).await.unwrap();
    assert!(memory.run_migrations().await.is_err());
}

#[tokio::test]
async fn unknown_legacy_shape_fails_init() {
    let options = FeatureOptions::new().database(DatabaseConfig::legacy(json!({ "host": "localhost" })));
    let err = init(options).await.unwrap_err();
    assert!(err.is_fatal());
}
