// The ORM surface the Sequelize adapter consumes: a registry of named models,
// each with create/findOne/findAll/update/destroy/count.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use better_feature_core::db::adapter::SortDirection;
use better_feature_core::db::filter::NativeFilter;
use better_feature_core::error::FeatureError;

#[derive(Debug, Error)]
pub enum SequelizeError {
    #[error("Record not found")]
    RecordNotFound,
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Unique constraint error: {field} must be unique")]
    UniqueConstraint { field: String },
    #[error("{0}")]
    Database(String),
}

impl From<SequelizeError> for FeatureError {
    fn from(err: SequelizeError) -> Self {
        match err {
            SequelizeError::Validation(_) | SequelizeError::UniqueConstraint { .. } => {
                FeatureError::Validation(err.to_string())
            }
            other => FeatureError::Database(other.to_string()),
        }
    }
}

/// `findOne` / `findAll` options.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub filter: Option<NativeFilter>,
    /// Columns to return; `None` returns all.
    pub attributes: Option<Vec<String>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub order: Vec<(String, SortDirection)>,
}

impl FindOptions {
    pub fn filter(filter: Option<NativeFilter>) -> Self {
        Self { filter, ..Default::default() }
    }
}

/// A loaded row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelInstance {
    data_values: Map<String, Value>,
}

impl ModelInstance {
    pub fn new(data_values: Map<String, Value>) -> Self {
        Self { data_values }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data_values.get(key)
    }

    /// `instance.get({ plain: true })`
    pub fn get_plain(&self) -> Value {
        Value::Object(self.data_values.clone())
    }

    pub fn into_plain(self) -> Value {
        Value::Object(self.data_values)
    }
}

#[async_trait]
pub trait SequelizeModel: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    async fn create(&self, values: Value) -> Result<ModelInstance, SequelizeError>;

    async fn find_one(&self, options: FindOptions) -> Result<Option<ModelInstance>, SequelizeError>;

    async fn find_all(&self, options: FindOptions) -> Result<Vec<ModelInstance>, SequelizeError>;

    /// Affected row count, when the dialect reports one.
    async fn update(
        &self,
        values: Value,
        filter: Option<&NativeFilter>,
    ) -> Result<Option<u64>, SequelizeError>;

    async fn destroy(&self, filter: Option<&NativeFilter>) -> Result<Option<u64>, SequelizeError>;

    async fn count(&self, filter: Option<&NativeFilter>) -> Result<u64, SequelizeError>;
}

/// `sequelize.models`
pub trait Sequelize: Send + Sync + fmt::Debug {
    fn model(&self, name: &str) -> Option<Arc<dyn SequelizeModel>>;

    fn model_names(&self) -> Vec<String>;
}
