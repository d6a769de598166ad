// Internal adapter: the persistence layer plugins and endpoints use.
//
// Wraps the raw `Adapter` with the table map and the ordered database hook
// chain. Callers speak logical table keys and logical field keys; the raw
// adapter sees model names and storage columns.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use better_feature_core::db::adapter::{apply_select, Adapter, AdapterMetadata, FindManyQuery, WhereClause};
use better_feature_core::db::field::{convert_from_db, convert_to_db};
use better_feature_core::db::schema::{FieldType, TableSchema, TableSchemaMap};
use better_feature_core::error::{FeatureError, Result};

use super::hooks::{HookChain, HookFlow};
use crate::options::IdGenerator;

#[derive(Clone)]
pub struct InternalAdapter {
    adapter: Arc<dyn Adapter>,
    tables: Arc<TableSchemaMap>,
    hooks: HookChain,
    generate_id: IdGenerator,
}

impl InternalAdapter {
    pub fn new(
        adapter: Arc<dyn Adapter>,
        tables: Arc<TableSchemaMap>,
        hooks: HookChain,
        generate_id: IdGenerator,
    ) -> Self {
        Self { adapter, tables, hooks, generate_id }
    }

    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    pub fn tables(&self) -> &TableSchemaMap {
        &self.tables
    }

    pub fn hooks(&self) -> &HookChain {
        &self.hooks
    }

    // ─── Writes ──────────────────────────────────────────────────

    /// Insert a record. `None` when a before-create hook short-circuited
    /// without a result.
    pub async fn create(&self, model: &str, data: Value, select: Option<&[String]>) -> Result<Option<Value>> {
        let (key, table) = self.table(model)?;
        let data = match self.hooks.run_before_create(key, data).await? {
            HookFlow::Proceed(data) => data,
            HookFlow::ShortCircuit(result) => return Ok(result),
        };

        let row = self.prepare_create(key, table, data)?;
        let columns = self.map_select(table, select);
        let created = self.adapter.create(&table.model_name, row, columns.as_deref()).await?;
        let record = self.output(table, &created, select);

        self.hooks.run_after_create(key, &record).await?;
        Ok(Some(record))
    }

    /// Update the first matching record.
    pub async fn update(&self, model: &str, where_clauses: &[WhereClause], data: Value) -> Result<Option<Value>> {
        let (key, table) = self.table(model)?;
        let data = match self.hooks.run_before_update(key, data).await? {
            HookFlow::Proceed(data) => data,
            HookFlow::ShortCircuit(result) => return Ok(result),
        };

        let row = self.prepare_update(table, data)?;
        let clauses = self.map_where(table, where_clauses);
        let Some(updated) = self.adapter.update(&table.model_name, &clauses, row).await? else {
            return Ok(None);
        };
        let record = self.output(table, &updated, None);

        self.hooks.run_after_update(key, &record).await?;
        Ok(Some(record))
    }

    /// Update every matching record. After-update hooks receive the applied
    /// payload, since no single record exists to hand them.
    pub async fn update_many(&self, model: &str, where_clauses: &[WhereClause], data: Value) -> Result<i64> {
        let (key, table) = self.table(model)?;
        let data = match self.hooks.run_before_update(key, data).await? {
            HookFlow::Proceed(data) => data,
            HookFlow::ShortCircuit(result) => {
                return Ok(result.as_ref().and_then(Value::as_i64).unwrap_or(0));
            }
        };

        let row = self.prepare_update(table, data)?;
        let clauses = self.map_where(table, where_clauses);
        let applied = self.output(table, &row, None);
        let count = self.adapter.update_many(&table.model_name, &clauses, row).await?;

        self.hooks.run_after_update(key, &applied).await?;
        Ok(count)
    }

    pub async fn delete(&self, model: &str, where_clauses: &[WhereClause]) -> Result<()> {
        let (_, table) = self.table(model)?;
        let clauses = self.map_where(table, where_clauses);
        self.adapter.delete(&table.model_name, &clauses).await
    }

    pub async fn delete_many(&self, model: &str, where_clauses: &[WhereClause]) -> Result<i64> {
        let (_, table) = self.table(model)?;
        let clauses = self.map_where(table, where_clauses);
        self.adapter.delete_many(&table.model_name, &clauses).await
    }

    // ─── Reads ───────────────────────────────────────────────────

    pub async fn find_one(
        &self,
        model: &str,
        where_clauses: &[WhereClause],
        select: Option<&[String]>,
    ) -> Result<Option<Value>> {
        let (_, table) = self.table(model)?;
        let clauses = self.map_where(table, where_clauses);
        let columns = self.map_select(table, select);
        let row = self.adapter.find_one(&table.model_name, &clauses, columns.as_deref()).await?;
        Ok(row.map(|row| self.output(table, &row, select)))
    }

    pub async fn find_many(&self, model: &str, query: FindManyQuery) -> Result<Vec<Value>> {
        let (_, table) = self.table(model)?;
        let select = query.select.clone();
        let mapped = FindManyQuery {
            where_clauses: self.map_where(table, &query.where_clauses),
            limit: query.limit,
            offset: query.offset,
            sort_by: query.sort_by.map(|mut sort| {
                sort.field = table.column_for(&sort.field).to_string();
                sort
            }),
            select: self.map_select(table, select.as_deref()),
        };
        let rows = self.adapter.find_many(&table.model_name, mapped).await?;
        Ok(rows.iter().map(|row| self.output(table, row, select.as_deref())).collect())
    }

    pub async fn count(&self, model: &str, where_clauses: &[WhereClause]) -> Result<i64> {
        let (_, table) = self.table(model)?;
        let clauses = self.map_where(table, where_clauses);
        self.adapter.count(&table.model_name, &clauses).await
    }

    // ─── Mapping ─────────────────────────────────────────────────

    /// Resolve a table by key or by model name.
    fn table(&self, model: &str) -> Result<(&str, &TableSchema)> {
        self.tables
            .get_key_value(model)
            .or_else(|| self.tables.iter().find(|(_, t)| t.model_name == model))
            .map(|(key, table)| (key.as_str(), table))
            .ok_or_else(|| FeatureError::model_not_found(model))
    }

    fn metadata(&self) -> AdapterMetadata {
        self.adapter.metadata()
    }

    fn map_where(&self, table: &TableSchema, clauses: &[WhereClause]) -> Vec<WhereClause> {
        let booleans = self.metadata().supports_booleans;
        clauses
            .iter()
            .map(|clause| {
                let mut mapped = clause.clone();
                mapped.field = table.column_for(&clause.field).to_string();
                if let Some(attr) = table.fields.get(&clause.field) {
                    mapped.value = encode_value(attr.field_type, clause.value.clone(), booleans);
                }
                mapped
            })
            .collect()
    }

    fn map_select(&self, table: &TableSchema, select: Option<&[String]>) -> Option<Vec<String>> {
        select.map(|keys| keys.iter().map(|k| table.column_for(k).to_string()).collect())
    }

    fn prepare_create(&self, key: &str, table: &TableSchema, data: Value) -> Result<Value> {
        let Value::Object(mut obj) = data else {
            return Err(FeatureError::Validation(format!("data for \"{key}\" must be an object")));
        };

        if obj.get("id").map_or(true, Value::is_null) {
            obj.insert("id".into(), Value::String((self.generate_id)(key, None)));
        }

        for (field, attr) in &table.fields {
            if is_missing(obj.get(field)) {
                if let Some(default) = &attr.default_value {
                    obj.insert(field.clone(), default.clone());
                }
            }
        }

        self.apply_input(table, &mut obj)?;

        for (field, attr) in &table.fields {
            if attr.required && is_missing(obj.get(field)) {
                return Err(FeatureError::Validation(format!("{field} is required")));
            }
        }

        Ok(convert_to_db(&table.fields, &self.encode(table, obj)))
    }

    fn prepare_update(&self, table: &TableSchema, data: Value) -> Result<Value> {
        let Value::Object(mut obj) = data else {
            return Err(FeatureError::Validation("update data must be an object".into()));
        };
        self.apply_input(table, &mut obj)?;
        Ok(convert_to_db(&table.fields, &self.encode(table, obj)))
    }

    /// `transform.input`, then validators, on every field present.
    fn apply_input(&self, table: &TableSchema, obj: &mut Map<String, Value>) -> Result<()> {
        for (field, attr) in &table.fields {
            let Some(value) = obj.get_mut(field) else { continue };
            if value.is_null() {
                continue;
            }
            if let Some(transform) = &attr.transform.input {
                *value = transform(value.take());
            }
            if let Some(validator) = &attr.validator {
                (validator.0)(value).map_err(|msg| FeatureError::Validation(format!("{field}: {msg}")))?;
            }
        }
        Ok(())
    }

    fn encode(&self, table: &TableSchema, mut obj: Map<String, Value>) -> Value {
        let booleans = self.metadata().supports_booleans;
        for (field, attr) in &table.fields {
            if let Some(value) = obj.get_mut(field) {
                *value = encode_value(attr.field_type, value.take(), booleans);
            }
        }
        Value::Object(obj)
    }

    /// Storage row to logical record: rename columns, drop hidden fields,
    /// apply `transform.output`, and decode values the backend could not
    /// store natively.
    fn output(&self, table: &TableSchema, row: &Value, select: Option<&[String]>) -> Value {
        let meta = self.metadata();
        let Some(Value::Object(mut record)) = convert_from_db(&table.fields, row) else {
            return Value::Null;
        };
        for (field, attr) in &table.fields {
            if !attr.returned {
                record.remove(field);
                continue;
            }
            let Some(value) = record.get_mut(field) else { continue };
            let mut decoded = decode_value(attr.field_type, value.take(), &meta);
            if let Some(transform) = &attr.transform.output {
                if !decoded.is_null() {
                    decoded = transform(decoded);
                }
            }
            *value = decoded;
        }
        apply_select(Value::Object(record), select)
    }
}

impl fmt::Debug for InternalAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InternalAdapter")
            .field("adapter", &self.adapter.metadata().adapter_id)
            .field("tables", &self.tables.keys().collect::<Vec<_>>())
            .field("hooks", &self.hooks)
            .finish()
    }
}

fn is_missing(value: Option<&Value>) -> bool {
    value.map_or(true, Value::is_null)
}

fn encode_value(field_type: FieldType, value: Value, supports_booleans: bool) -> Value {
    match (field_type, value) {
        (FieldType::Boolean, Value::Bool(b)) if !supports_booleans => Value::from(i64::from(b)),
        (_, value) => value,
    }
}

fn decode_value(field_type: FieldType, value: Value, meta: &AdapterMetadata) -> Value {
    match (field_type, value) {
        (FieldType::Boolean, Value::Number(n)) if !meta.supports_booleans => {
            Value::Bool(n.as_i64().unwrap_or(0) != 0)
        }
        (FieldType::Boolean, Value::String(s)) if !meta.supports_booleans => {
            Value::Bool(matches!(s.as_str(), "true" | "1"))
        }
        (t, Value::String(s)) if t.is_array() && !meta.supports_json => {
            serde_json::from_str(&s).unwrap_or(Value::String(s))
        }
        (_, value) => value,
    }
}
