// In-process model registry: a `Sequelize` implementation that keeps rows in
// memory. Models are defined with their attributes, like `sequelize.define`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use better_feature_core::db::adapter::SortDirection;
use better_feature_core::db::filter::{compare_values, matches, NativeFilter};

use crate::model::{FindOptions, ModelInstance, Sequelize, SequelizeError, SequelizeModel};

#[derive(Debug, Clone, Default)]
pub struct AttributeDefinition {
    pub allow_null: bool,
    pub unique: bool,
    pub default_value: Option<Value>,
}

impl AttributeDefinition {
    pub fn required() -> Self {
        Self::default()
    }

    pub fn nullable() -> Self {
        Self { allow_null: true, ..Default::default() }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// Attributes by column name. `id` is implicit.
pub type ModelAttributes = BTreeMap<String, AttributeDefinition>;

#[derive(Debug, Default)]
struct ModelRows {
    rows: Vec<Map<String, Value>>,
    next_id: i64,
}

#[derive(Debug)]
pub struct MemoryModel {
    name: String,
    attributes: ModelAttributes,
    state: Mutex<ModelRows>,
}

impl MemoryModel {
    pub fn new(name: impl Into<String>, attributes: ModelAttributes) -> Self {
        Self {
            name: name.into(),
            attributes,
            state: Mutex::new(ModelRows { rows: Vec::new(), next_id: 1 }),
        }
    }

    fn validate(&self, row: &Map<String, Value>, others: &[Map<String, Value>]) -> Result<(), SequelizeError> {
        for (column, attr) in &self.attributes {
            let value = row.get(column).unwrap_or(&Value::Null);
            if value.is_null() {
                if !attr.allow_null {
                    return Err(SequelizeError::Validation(format!(
                        "{}.{column} cannot be null",
                        self.name
                    )));
                }
                continue;
            }
            if attr.unique && others.iter().any(|o| o.get(column) == Some(value)) {
                return Err(SequelizeError::UniqueConstraint { field: column.clone() });
            }
        }
        Ok(())
    }
}

fn values_object(values: Value) -> Result<Map<String, Value>, SequelizeError> {
    match values {
        Value::Object(map) => Ok(map),
        other => Err(SequelizeError::Validation(format!("expected an object, got {other}"))),
    }
}

fn project(row: &Map<String, Value>, attributes: Option<&[String]>) -> ModelInstance {
    match attributes {
        Some(attrs) if !attrs.is_empty() => ModelInstance::new(
            row.iter()
                .filter(|(k, _)| attrs.iter().any(|a| a == *k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        _ => ModelInstance::new(row.clone()),
    }
}

#[async_trait]
impl SequelizeModel for MemoryModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create(&self, values: Value) -> Result<ModelInstance, SequelizeError> {
        let mut row = values_object(values)?;
        for (column, attr) in &self.attributes {
            if let (None | Some(Value::Null), Some(default)) = (row.get(column), &attr.default_value) {
                row.insert(column.clone(), default.clone());
            }
        }
        let mut state = self.state.lock().await;
        if row.get("id").map_or(true, Value::is_null) {
            // Auto-increment primary key.
            row.insert("id".into(), Value::from(state.next_id));
            state.next_id += 1;
        }
        if state.rows.iter().any(|r| r.get("id") == row.get("id")) {
            return Err(SequelizeError::UniqueConstraint { field: "id".into() });
        }
        self.validate(&row, &state.rows)?;
        state.rows.push(row.clone());
        Ok(ModelInstance::new(row))
    }

    async fn find_one(&self, options: FindOptions) -> Result<Option<ModelInstance>, SequelizeError> {
        let mut options = options;
        options.limit = Some(1);
        Ok(self.find_all(options).await?.into_iter().next())
    }

    async fn find_all(&self, options: FindOptions) -> Result<Vec<ModelInstance>, SequelizeError> {
        let state = self.state.lock().await;
        let mut rows: Vec<&Map<String, Value>> = state
            .rows
            .iter()
            .filter(|r| matches(options.filter.as_ref(), &Value::Object((*r).clone())))
            .collect();
        for (column, direction) in options.order.iter().rev() {
            rows.sort_by(|a, b| {
                let ord = compare_values(
                    a.get(column).unwrap_or(&Value::Null),
                    b.get(column).unwrap_or(&Value::Null),
                )
                .unwrap_or(std::cmp::Ordering::Equal);
                match direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }
        Ok(rows
            .into_iter()
            .skip(options.offset.unwrap_or(0))
            .take(options.limit.unwrap_or(usize::MAX))
            .map(|r| project(r, options.attributes.as_deref()))
            .collect())
    }

    async fn update(&self, values: Value, filter: Option<&NativeFilter>) -> Result<Option<u64>, SequelizeError> {
        let values = values_object(values)?;
        let mut state = self.state.lock().await;
        let mut affected = 0;
        for idx in 0..state.rows.len() {
            if !matches(filter, &Value::Object(state.rows[idx].clone())) {
                continue;
            }
            let mut updated = state.rows[idx].clone();
            updated.extend(values.clone());
            let others: Vec<Map<String, Value>> = state
                .rows
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != idx)
                .map(|(_, r)| r.clone())
                .collect();
            self.validate(&updated, &others)?;
            state.rows[idx] = updated;
            affected += 1;
        }
        Ok(Some(affected))
    }

    async fn destroy(&self, filter: Option<&NativeFilter>) -> Result<Option<u64>, SequelizeError> {
        let mut state = self.state.lock().await;
        let before = state.rows.len();
        state.rows.retain(|r| !matches(filter, &Value::Object(r.clone())));
        Ok(Some((before - state.rows.len()) as u64))
    }

    async fn count(&self, filter: Option<&NativeFilter>) -> Result<u64, SequelizeError> {
        let state = self.state.lock().await;
        Ok(state
            .rows
            .iter()
            .filter(|r| matches(filter, &Value::Object((*r).clone())))
            .count() as u64)
    }
}

/// Cloning shares the same models.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: Arc<RwLock<HashMap<String, Arc<MemoryModel>>>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or redefine) a model.
    pub fn define(&self, name: impl Into<String>, attributes: ModelAttributes) -> Arc<MemoryModel> {
        let name = name.into();
        let model = Arc::new(MemoryModel::new(name.clone(), attributes));
        if let Ok(mut models) = self.models.write() {
            models.insert(name, model.clone());
        }
        model
    }

    pub fn with_model(self, name: impl Into<String>, attributes: ModelAttributes) -> Self {
        self.define(name, attributes);
        self
    }
}

impl Sequelize for ModelRegistry {
    fn model(&self, name: &str) -> Option<Arc<dyn SequelizeModel>> {
        let models = self.models.read().ok()?;
        models.get(name).map(|m| m.clone() as Arc<dyn SequelizeModel>)
    }

    fn model_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .models
            .read()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}
