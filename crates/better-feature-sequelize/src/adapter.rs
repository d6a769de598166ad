// SequelizeAdapter: the Adapter contract over a `Sequelize` model registry.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use better_feature_core::db::adapter::{
    apply_select, Adapter, AdapterMetadata, FindManyQuery, WhereClause,
};
use better_feature_core::db::filter::{translate_where, NativeFilter};
use better_feature_core::error::{FeatureError, Result};
use better_feature_core::utils::pluralize;

use crate::model::{FindOptions, Sequelize, SequelizeError, SequelizeModel};

/// `{ sequelize, usePlural?, debugLogs? }`
#[derive(Clone)]
pub struct SequelizeAdapterConfig {
    pub sequelize: Arc<dyn Sequelize>,
    pub use_plural: bool,
    pub debug_logs: bool,
}

impl SequelizeAdapterConfig {
    pub fn new(sequelize: Arc<dyn Sequelize>) -> Self {
        Self { sequelize, use_plural: false, debug_logs: false }
    }

    pub fn use_plural(mut self, enabled: bool) -> Self {
        self.use_plural = enabled;
        self
    }

    pub fn debug_logs(mut self, enabled: bool) -> Self {
        self.debug_logs = enabled;
        self
    }
}

impl fmt::Debug for SequelizeAdapterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequelizeAdapterConfig")
            .field("models", &self.sequelize.model_names())
            .field("use_plural", &self.use_plural)
            .field("debug_logs", &self.debug_logs)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SequelizeAdapter {
    config: SequelizeAdapterConfig,
}

pub fn sequelize_adapter(config: SequelizeAdapterConfig) -> SequelizeAdapter {
    SequelizeAdapter::new(config)
}

impl SequelizeAdapter {
    pub fn new(config: SequelizeAdapterConfig) -> Self {
        Self { config }
    }

    pub fn sequelize(&self) -> &Arc<dyn Sequelize> {
        &self.config.sequelize
    }

    pub fn model_name(&self, model: &str) -> String {
        if self.config.use_plural {
            pluralize(model)
        } else {
            model.to_string()
        }
    }

    /// Resolve a model or fail with a hint to generate the schema.
    fn resolve(&self, model: &str) -> Result<Arc<dyn SequelizeModel>> {
        let name = self.model_name(model);
        self.config
            .sequelize
            .model(&name)
            .ok_or_else(|| FeatureError::model_not_found(name))
    }

    fn log(&self, op: &str, model: &str, filter: Option<&NativeFilter>) {
        if self.config.debug_logs {
            let filter = filter
                .and_then(|f| serde_json::to_string(f).ok())
                .unwrap_or_default();
            tracing::debug!("[Sequelize Adapter] {op} on '{model}' where {filter}");
        }
    }
}

#[async_trait]
impl Adapter for SequelizeAdapter {
    fn metadata(&self) -> AdapterMetadata {
        AdapterMetadata {
            use_plural: self.config.use_plural,
            debug_logs: self.config.debug_logs,
            ..AdapterMetadata::new("sequelize", "Sequelize Adapter")
        }
    }

    fn options(&self) -> Value {
        serde_json::json!({
            "usePlural": self.config.use_plural,
            "debugLogs": self.config.debug_logs,
        })
    }

    async fn create(&self, model: &str, data: Value, select: Option<&[String]>) -> Result<Value> {
        let target = self.resolve(model)?;
        self.log("create", model, None);
        let record = target.create(data).await?;
        Ok(apply_select(record.into_plain(), select))
    }

    async fn find_one(
        &self,
        model: &str,
        where_clauses: &[WhereClause],
        select: Option<&[String]>,
    ) -> Result<Option<Value>> {
        let target = self.resolve(model)?;
        let filter = translate_where(where_clauses)?;
        self.log("findOne", model, filter.as_ref());
        let mut options = FindOptions::filter(filter);
        options.attributes = select.filter(|s| !s.is_empty()).map(|s| {
            let mut attrs = s.to_vec();
            if !attrs.iter().any(|a| a == "id") {
                attrs.insert(0, "id".into());
            }
            attrs
        });
        Ok(target.find_one(options).await?.map(|r| r.into_plain()))
    }

    async fn find_many(&self, model: &str, query: FindManyQuery) -> Result<Vec<Value>> {
        let target = self.resolve(model)?;
        let filter = translate_where(&query.where_clauses)?;
        self.log("findAll", model, filter.as_ref());
        let options = FindOptions {
            filter,
            attributes: None,
            limit: query.limit.map(|l| l.max(0) as usize),
            offset: query.offset.map(|o| o.max(0) as usize),
            order: query
                .sort_by
                .map(|sort| vec![(sort.field, sort.direction)])
                .unwrap_or_default(),
        };
        let records = target.find_all(options).await?;
        Ok(records
            .into_iter()
            .map(|r| apply_select(r.into_plain(), query.select.as_deref()))
            .collect())
    }

    async fn count(&self, model: &str, where_clauses: &[WhereClause]) -> Result<i64> {
        let target = self.resolve(model)?;
        let filter = translate_where(where_clauses)?;
        self.log("count", model, filter.as_ref());
        Ok(target.count(filter.as_ref()).await? as i64)
    }

    async fn update(
        &self,
        model: &str,
        where_clauses: &[WhereClause],
        data: Value,
    ) -> Result<Option<Value>> {
        let target = self.resolve(model)?;
        let filter = translate_where(where_clauses)?;
        self.log("update", model, filter.as_ref());
        let Some(record) = target.find_one(FindOptions::filter(filter)).await? else {
            return Ok(None);
        };
        let Some(id) = record.get("id").cloned() else {
            return Err(FeatureError::Database(format!("\"{model}\" record has no id")));
        };
        let by_id = translate_where(&[WhereClause::eq("id", id.clone())])?;
        let affected = target.update(data.clone(), by_id.as_ref()).await?.unwrap_or(0);
        if affected == 0 {
            return Ok(None);
        }
        let id = data.get("id").filter(|v| !v.is_null()).cloned().unwrap_or(id);
        let refetch = translate_where(&[WhereClause::eq("id", id)])?;
        Ok(target
            .find_one(FindOptions::filter(refetch))
            .await?
            .map(|r| r.into_plain()))
    }

    async fn update_many(&self, model: &str, where_clauses: &[WhereClause], data: Value) -> Result<i64> {
        let target = self.resolve(model)?;
        let filter = translate_where(where_clauses)?;
        self.log("updateMany", model, filter.as_ref());
        Ok(target.update(data, filter.as_ref()).await?.unwrap_or(0) as i64)
    }

    async fn delete(&self, model: &str, where_clauses: &[WhereClause]) -> Result<()> {
        let target = self.resolve(model)?;
        let filter = translate_where(where_clauses)?;
        self.log("destroy", model, filter.as_ref());
        let Some(record) = target.find_one(FindOptions::filter(filter)).await? else {
            return Ok(());
        };
        let by_id = translate_where(&[WhereClause::eq("id", record.get("id").cloned().unwrap_or(Value::Null))])?;
        match target.destroy(by_id.as_ref()).await {
            Ok(_) | Err(SequelizeError::RecordNotFound) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_many(&self, model: &str, where_clauses: &[WhereClause]) -> Result<i64> {
        let target = self.resolve(model)?;
        let filter = translate_where(where_clauses)?;
        self.log("destroyMany", model, filter.as_ref());
        Ok(target.destroy(filter.as_ref()).await?.unwrap_or(0) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{AttributeDefinition, ModelAttributes, ModelRegistry};
    use serde_json::json;

    fn adapter(use_plural: bool) -> SequelizeAdapter {
        let mut attrs = ModelAttributes::new();
        attrs.insert("name".into(), AttributeDefinition::nullable());
        let registry = ModelRegistry::new().with_model("users", attrs.clone()).with_model("user", attrs);
        sequelize_adapter(SequelizeAdapterConfig::new(Arc::new(registry)).use_plural(use_plural))
    }

    #[tokio::test]
    async fn test_missing_model_names_generate_command() {
        let err = adapter(false).count("session", &[]).await.unwrap_err();
        let FeatureError::ModelNotFound { model, hint } = err else {
            panic!("expected ModelNotFound");
        };
        assert_eq!(model, "session");
        assert!(hint.contains("generate"));
    }

    #[tokio::test]
    async fn test_use_plural_resolves_plural_model() {
        let adapter = adapter(true);
        adapter.create("user", json!({ "name": "p" }), None).await.unwrap();
        let registry = adapter.sequelize();
        assert_eq!(registry.model("users").unwrap().count(None).await.unwrap(), 1);
        assert_eq!(registry.model("user").unwrap().count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_of_absent_record_is_swallowed() {
        let adapter = adapter(false);
        adapter
            .delete("user", &[WhereClause::eq("name", "ghost")])
            .await
            .unwrap();
    }

    #[derive(Debug)]
    struct UncountedModel;

    #[async_trait]
    impl SequelizeModel for UncountedModel {
        fn name(&self) -> &str {
            "uncounted"
        }
        async fn create(&self, _: Value) -> std::result::Result<crate::model::ModelInstance, SequelizeError> {
            Err(SequelizeError::Database("read only".into()))
        }
        async fn find_one(&self, _: FindOptions) -> std::result::Result<Option<crate::model::ModelInstance>, SequelizeError> {
            Ok(None)
        }
        async fn find_all(&self, _: FindOptions) -> std::result::Result<Vec<crate::model::ModelInstance>, SequelizeError> {
            Ok(Vec::new())
        }
        async fn update(&self, _: Value, _: Option<&NativeFilter>) -> std::result::Result<Option<u64>, SequelizeError> {
            Ok(None)
        }
        async fn destroy(&self, _: Option<&NativeFilter>) -> std::result::Result<Option<u64>, SequelizeError> {
            Err(SequelizeError::RecordNotFound)
        }
        async fn count(&self, _: Option<&NativeFilter>) -> std::result::Result<u64, SequelizeError> {
            Ok(0)
        }
    }

    #[derive(Debug)]
    struct Uncounted;

    impl Sequelize for Uncounted {
        fn model(&self, _: &str) -> Option<Arc<dyn SequelizeModel>> {
            Some(Arc::new(UncountedModel))
        }
        fn model_names(&self) -> Vec<String> {
            vec!["uncounted".into()]
        }
    }

    #[tokio::test]
    async fn test_missing_count_defaults_to_zero() {
        let adapter = SequelizeAdapter::new(SequelizeAdapterConfig::new(Arc::new(Uncounted)));
        let n = adapter.update_many("uncounted", &[], json!({ "a": 1 })).await.unwrap();
        assert_eq!(n, 0);
        let err = adapter.delete_many("uncounted", &[]).await.unwrap_err();
        assert!(matches!(err, FeatureError::Database(_)));
    }

    #[test]
    fn test_metadata_and_options() {
        let adapter = adapter(true);
        let meta = adapter.metadata();
        assert_eq!(meta.adapter_id, "sequelize");
        assert!(meta.supports_json);
        assert!(meta.use_plural);
        assert_eq!(adapter.options(), json!({ "usePlural": true, "debugLogs": false }));
    }
}
