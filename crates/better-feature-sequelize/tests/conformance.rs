use std::sync::Arc;

use serde_json::json;

use better_feature_core::db::adapter::{Adapter, WhereClause};
use better_feature_sequelize::{
    AttributeDefinition, ModelAttributes, ModelRegistry, SequelizeAdapter, SequelizeAdapterConfig,
};
use better_feature_test_utils::{AdapterTestSuite, TESTER_MODEL};

fn registry() -> ModelRegistry {
    let mut attrs = ModelAttributes::new();
    attrs.insert("name".into(), AttributeDefinition::required());
    attrs.insert("displayName".into(), AttributeDefinition::nullable());
    attrs.insert("age".into(), AttributeDefinition::nullable());
    ModelRegistry::new().with_model(TESTER_MODEL, attrs)
}

#[tokio::test]
async fn sequelize_adapter_passes_conformance_suite() {
    let adapter = SequelizeAdapter::new(SequelizeAdapterConfig::new(Arc::new(registry())));
    let report = AdapterTestSuite::conformance().run(Arc::new(adapter)).await;
    report.assert_all_passed();
}

#[tokio::test]
async fn test_update_can_change_the_matched_field() {
    let adapter = SequelizeAdapter::new(SequelizeAdapterConfig::new(Arc::new(registry())));
    adapter
        .create(TESTER_MODEL, json!({ "id": "r-1", "name": "before" }), None)
        .await
        .unwrap();
    let updated = adapter
        .update(TESTER_MODEL, &[WhereClause::eq("name", "before")], json!({ "name": "after" }))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated["name"], "after");
    assert_eq!(updated["id"], "r-1");
}

#[tokio::test]
async fn test_validation_errors_surface_as_validation() {
    let adapter = SequelizeAdapter::new(SequelizeAdapterConfig::new(Arc::new(registry())));
    let err = adapter
        .create(TESTER_MODEL, json!({ "displayName": "no name" }), None)
        .await
        .unwrap_err();
    assert!(matches!(err, better_feature_core::FeatureError::Validation(_)));
}
