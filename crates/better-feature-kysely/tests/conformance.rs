use std::sync::Arc;

use serde_json::json;

use better_feature_core::db::adapter::{Adapter, SchemaOptions, WhereClause};
use better_feature_kysely::{KyselyAdapter, KyselyAdapterConfig};
use better_feature_test_utils::{conformance_schema, AdapterTestSuite, TESTER_MODEL};

async fn setup(use_plural: bool) -> KyselyAdapter {
    let adapter = KyselyAdapter::connect(
        "sqlite::memory:",
        KyselyAdapterConfig { use_plural, ..Default::default() },
    )
    .await
    .expect("connect");
    adapter
        .create_schema(&conformance_schema(), &SchemaOptions { auto_migrate: true })
        .await
        .expect("create schema");
    adapter
}

#[tokio::test]
async fn kysely_adapter_passes_conformance_suite() {
    let report = AdapterTestSuite::conformance().run(Arc::new(setup(false).await)).await;
    report.assert_all_passed();
}

#[tokio::test]
async fn kysely_plural_adapter_passes_conformance_suite() {
    let report = AdapterTestSuite::conformance().run(Arc::new(setup(true).await)).await;
    report.assert_all_passed();
}

#[tokio::test]
async fn test_columns_are_snake_case_on_disk() {
    let adapter = setup(true).await;
    adapter
        .create(TESTER_MODEL, json!({ "id": "k-1", "name": "kay", "displayName": "Kay" }), None)
        .await
        .unwrap();

    // Read through the raw sqlx layer to see the physical names.
    let raw = adapter
        .inner()
        .find_one("testers", &[WhereClause::eq("id", "k-1")], None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(raw["display_name"], "Kay");

    let logical = adapter
        .find_one(TESTER_MODEL, &[WhereClause::eq("displayName", "Kay")], None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(logical["displayName"], "Kay");
}
