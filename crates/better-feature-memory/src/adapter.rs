// In-memory adapter: `HashMap<model, Vec<record>>` behind a tokio `RwLock`.
//
// Development fallback used when no database is configured. Data lives for
// the lifetime of the adapter value only; it is single-process and offers no
// isolation between concurrent writers beyond the lock around each call.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use better_feature_core::db::adapter::{
    apply_select, Adapter, AdapterMetadata, FindManyQuery, SchemaOptions, SchemaStatus,
    SortDirection, WhereClause,
};
use better_feature_core::db::filter::{self, compare_values, translate_where, NativeFilter};
use better_feature_core::db::schema::DatabaseSchema;
use better_feature_core::error::{FeatureError, Result};

type Store = HashMap<String, Vec<Value>>;

#[derive(Debug, Clone, Default)]
pub struct MemoryAdapter {
    store: Arc<RwLock<Store>>,
    debug_logs: bool,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed one empty collection per model name.
    pub fn with_tables<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = models.into_iter().map(|m| (m.into(), Vec::new())).collect();
        Self::with_data(store)
    }

    pub fn with_data(data: Store) -> Self {
        Self {
            store: Arc::new(RwLock::new(data)),
            debug_logs: false,
        }
    }

    pub fn debug_logs(mut self, enabled: bool) -> Self {
        self.debug_logs = enabled;
        self
    }

    pub async fn snapshot(&self) -> Store {
        self.store.read().await.clone()
    }

    pub async fn clear(&self) {
        for records in self.store.write().await.values_mut() {
            records.clear();
        }
    }

    pub async fn model_count(&self, model: &str) -> usize {
        self.store.read().await.get(model).map_or(0, Vec::len)
    }

    pub async fn models(&self) -> Vec<String> {
        let mut names: Vec<String> = self.store.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    fn log(&self, action: &str, model: &str) {
        if self.debug_logs {
            tracing::debug!("[Memory Adapter] {} on '{}'", action, model);
        }
    }
}

fn compile(where_clauses: &[WhereClause]) -> Result<Option<NativeFilter>> {
    translate_where(where_clauses)
}

fn sort_records(records: &mut [Value], query: &FindManyQuery) {
    let Some(sort) = &query.sort_by else {
        return;
    };
    records.sort_by(|a, b| {
        let ordering = match (a.get(&sort.field), b.get(&sort.field)) {
            (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        match sort.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

fn merge_update(record: &mut Value, data: &Value) {
    if let (Some(target), Some(patch)) = (record.as_object_mut(), data.as_object()) {
        for (k, v) in patch {
            target.insert(k.clone(), v.clone());
        }
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    fn metadata(&self) -> AdapterMetadata {
        AdapterMetadata {
            supports_numeric_ids: false,
            debug_logs: self.debug_logs,
            ..AdapterMetadata::new("memory", "Memory Adapter")
        }
    }

    fn options(&self) -> Value {
        json!({ "debugLogs": self.debug_logs })
    }

    async fn create(&self, model: &str, data: Value, select: Option<&[String]>) -> Result<Value> {
        self.log("CREATE", model);
        let Value::Object(mut record) = data else {
            return Err(FeatureError::Validation(format!(
                "create on \"{model}\" expects an object"
            )));
        };
        if record.get("id").map_or(true, Value::is_null) {
            record.insert("id".into(), Value::String(uuid::Uuid::new_v4().to_string()));
        }
        let record = Value::Object(record);
        self.store
            .write()
            .await
            .entry(model.to_string())
            .or_default()
            .push(record.clone());
        Ok(apply_select(record, select))
    }

    async fn find_one(
        &self,
        model: &str,
        where_clauses: &[WhereClause],
        select: Option<&[String]>,
    ) -> Result<Option<Value>> {
        self.log("FIND_ONE", model);
        let filter = compile(where_clauses)?;
        let store = self.store.read().await;
        Ok(store
            .get(model)
            .and_then(|records| records.iter().find(|r| filter::matches(filter.as_ref(), r)))
            .cloned()
            .map(|r| apply_select(r, select)))
    }

    async fn find_many(&self, model: &str, query: FindManyQuery) -> Result<Vec<Value>> {
        self.log("FIND_MANY", model);
        let filter = compile(&query.where_clauses)?;
        let store = self.store.read().await;
        let mut result: Vec<Value> = store
            .get(model)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| filter::matches(filter.as_ref(), r))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(store);

        sort_records(&mut result, &query);
        let offset = query.offset.unwrap_or(0).max(0) as usize;
        let limit = query.limit.map_or(usize::MAX, |l| l.max(0) as usize);
        Ok(result
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|r| apply_select(r, query.select.as_deref()))
            .collect())
    }

    async fn count(&self, model: &str, where_clauses: &[WhereClause]) -> Result<i64> {
        self.log("COUNT", model);
        let filter = compile(where_clauses)?;
        let store = self.store.read().await;
        Ok(store.get(model).map_or(0, |records| {
            records
                .iter()
                .filter(|r| filter::matches(filter.as_ref(), r))
                .count() as i64
        }))
    }

    async fn update(
        &self,
        model: &str,
        where_clauses: &[WhereClause],
        data: Value,
    ) -> Result<Option<Value>> {
        self.log("UPDATE", model);
        let filter = compile(where_clauses)?;
        let mut store = self.store.write().await;
        let found = store.get_mut(model).and_then(|records| {
            records
                .iter_mut()
                .find(|r| filter::matches(filter.as_ref(), r))
        });
        Ok(found.map(|record| {
            merge_update(record, &data);
            record.clone()
        }))
    }

    async fn update_many(
        &self,
        model: &str,
        where_clauses: &[WhereClause],
        data: Value,
    ) -> Result<i64> {
        self.log("UPDATE_MANY", model);
        let filter = compile(where_clauses)?;
        let mut store = self.store.write().await;
        let mut count = 0;
        if let Some(records) = store.get_mut(model) {
            for record in records
                .iter_mut()
                .filter(|r| filter::matches(filter.as_ref(), r))
            {
                merge_update(record, &data);
                count += 1;
            }
        }
        Ok(count)
    }

    async fn delete(&self, model: &str, where_clauses: &[WhereClause]) -> Result<()> {
        self.log("DELETE", model);
        let filter = compile(where_clauses)?;
        let mut store = self.store.write().await;
        if let Some(records) = store.get_mut(model) {
            if let Some(pos) = records
                .iter()
                .position(|r| filter::matches(filter.as_ref(), r))
            {
                records.remove(pos);
            }
        }
        Ok(())
    }

    async fn delete_many(&self, model: &str, where_clauses: &[WhereClause]) -> Result<i64> {
        self.log("DELETE_MANY", model);
        let filter = compile(where_clauses)?;
        let mut store = self.store.write().await;
        Ok(store.get_mut(model).map_or(0, |records| {
            let before = records.len();
            records.retain(|r| !filter::matches(filter.as_ref(), r));
            (before - records.len()) as i64
        }))
    }

    /// Adds a collection for every table it does not know yet.
    async fn create_schema(
        &self,
        schema: &DatabaseSchema,
        options: &SchemaOptions,
    ) -> Result<SchemaStatus> {
        let mut store = self.store.write().await;
        let missing: Vec<String> = schema
            .tables
            .keys()
            .filter(|name| !store.contains_key(*name))
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(SchemaStatus::UpToDate);
        }
        let statements: Vec<String> = missing.iter().map(|m| format!("collection {m}")).collect();
        if !options.auto_migrate {
            return Ok(SchemaStatus::NeedsMigration { statements });
        }
        for name in missing {
            store.insert(name, Vec::new());
        }
        Ok(SchemaStatus::Applied { statements })
    }
}
