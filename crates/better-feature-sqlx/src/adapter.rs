// SqlxAdapter: the Adapter trait over a single `sqlx::AnyPool`, covering
// SQLite, Postgres and MySQL. Model names are table names and field keys are
// column names; renaming layers sit on top (see the kysely crate).

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::any::{AnyArguments, AnyPoolOptions, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, AnyPool, Column, Row};

use better_feature_core::db::adapter::{
    apply_select, Adapter, AdapterMetadata, FindManyQuery, SchemaOptions, SchemaStatus,
    WhereClause,
};
use better_feature_core::db::filter::translate_where;
use better_feature_core::db::schema::DatabaseSchema;
use better_feature_core::error::{FeatureError, Result};
use better_feature_core::utils::generate_id;

use crate::dialect::DatabaseType;
use crate::migration::get_migrations;
use crate::query_builder::{QueryBuilder, SqlFragment};

#[derive(Debug, Clone)]
pub struct SqlxAdapter {
    pool: AnyPool,
    db_type: DatabaseType,
    debug_logs: bool,
}

impl SqlxAdapter {
    pub fn new(pool: AnyPool, db_type: DatabaseType) -> Self {
        Self { pool, db_type, debug_logs: false }
    }

    /// Connect to a database URL; the dialect comes from the URL scheme.
    pub async fn connect(url: &str) -> Result<Self> {
        let db_type = DatabaseType::from_url(url).ok_or_else(|| {
            FeatureError::Configuration(format!("Unsupported database URL \"{url}\""))
        })?;
        if db_type == DatabaseType::Mssql {
            return Err(FeatureError::Configuration(
                "SQL Server connections are not supported by the sqlx adapter".into(),
            ));
        }
        sqlx::any::install_default_drivers();

        // Every connection to an in-memory SQLite URL opens a fresh database.
        let pool = if url.contains(":memory:") || url.contains("mode=memory") {
            AnyPoolOptions::new().max_connections(1).connect(url).await
        } else {
            AnyPool::connect(url).await
        }
        .map_err(|e| FeatureError::Database(format!("Database connection failed: {e}")))?;

        tracing::debug!(database = %db_type, "connected sqlx pool");
        Ok(Self::new(pool, db_type))
    }

    pub fn debug_logs(mut self, enabled: bool) -> Self {
        self.debug_logs = enabled;
        self
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn database_type(&self) -> DatabaseType {
        self.db_type
    }

    /// Run one statement without binds. Used for plugin-supplied migrations.
    pub async fn execute_raw(&self, sql: &str) -> Result<u64> {
        self.execute(sql, &[]).await
    }

    fn builder(&self) -> QueryBuilder {
        QueryBuilder::new(self.db_type)
    }

    fn log(&self, sql: &str, binds: &[Value]) {
        if self.debug_logs {
            tracing::info!(target: "better_feature::sqlx", %sql, binds = ?binds, "query");
        } else {
            tracing::trace!(%sql, "query");
        }
    }

    async fn fetch_all(&self, sql: &str, binds: &[Value]) -> Result<Vec<AnyRow>> {
        self.log(sql, binds);
        let values: Vec<BindValue> = binds.iter().map(BindValue::from).collect();
        bind_all(sqlx::query(sql), &values)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| FeatureError::Database(format!("Query failed: {e}")))
    }

    async fn fetch_optional(&self, sql: &str, binds: &[Value]) -> Result<Option<AnyRow>> {
        self.log(sql, binds);
        let values: Vec<BindValue> = binds.iter().map(BindValue::from).collect();
        bind_all(sqlx::query(sql), &values)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| FeatureError::Database(format!("Query failed: {e}")))
    }

    async fn execute(&self, sql: &str, binds: &[Value]) -> Result<u64> {
        self.log(sql, binds);
        let values: Vec<BindValue> = binds.iter().map(BindValue::from).collect();
        let result = bind_all(sqlx::query(sql), &values)
            .execute(&self.pool)
            .await
            .map_err(|e| FeatureError::Database(format!("Execute failed: {e}")))?;
        Ok(result.rows_affected())
    }

    async fn find_by_id(&self, model: &str, id: &Value, select: Option<&[String]>) -> Result<Option<Value>> {
        self.find_one(model, &[WhereClause::eq("id", id.clone())], select).await
    }

    /// Id of the first record matching the clauses.
    async fn first_id(&self, model: &str, where_clauses: &[WhereClause]) -> Result<Option<Value>> {
        let b = self.builder();
        let filter = translate_where(where_clauses)?;
        let where_frag = b.build_where(filter.as_ref(), 0)?;
        let sql = format!(
            "SELECT {} FROM {}{} LIMIT 1",
            b.quote("id"),
            b.quote(model),
            where_frag.sql
        );
        let row = self.fetch_optional(&sql, &where_frag.binds).await?;
        Ok(row.map(|r| row_to_json(&r)).and_then(|v| v.get("id").cloned()))
    }

    fn where_fragment(&self, where_clauses: &[WhereClause], offset: usize) -> Result<SqlFragment> {
        let filter = translate_where(where_clauses)?;
        self.builder().build_where(filter.as_ref(), offset)
    }
}

/// Read every column of a row into a JSON object.
pub(crate) fn row_to_json(row: &AnyRow) -> Value {
    let mut map = Map::new();
    for col in row.columns() {
        let name = col.name();
        let value = if let Ok(v) = row.try_get::<String, _>(name) {
            Value::String(v)
        } else if let Ok(v) = row.try_get::<i64, _>(name) {
            Value::from(v)
        } else if let Ok(v) = row.try_get::<i32, _>(name) {
            Value::from(v)
        } else if let Ok(v) = row.try_get::<f64, _>(name) {
            serde_json::Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<bool, _>(name) {
            Value::Bool(v)
        } else {
            Value::Null
        };
        map.insert(name.to_string(), value);
    }
    Value::Object(map)
}

/// Owned bind value; sqlx borrows binds for the lifetime of the query.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BindValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl From<&Value> for BindValue {
    fn from(v: &Value) -> Self {
        match v {
            Value::String(s) => Self::Text(s.clone()),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or_else(|| Self::Text(n.to_string())),
            Value::Bool(b) => Self::Bool(*b),
            Value::Null => Self::Null,
            // Arrays and objects are stored as JSON text.
            other => Self::Text(other.to_string()),
        }
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Any, AnyArguments<'q>>,
    values: &'q [BindValue],
) -> Query<'q, Any, AnyArguments<'q>> {
    for value in values {
        query = match value {
            BindValue::Text(s) => query.bind(s.as_str()),
            BindValue::Int(i) => query.bind(*i),
            BindValue::Float(f) => query.bind(*f),
            BindValue::Bool(b) => query.bind(*b),
            BindValue::Null => query.bind(Option::<String>::None),
        };
    }
    query
}

#[async_trait]
impl Adapter for SqlxAdapter {
    fn metadata(&self) -> AdapterMetadata {
        AdapterMetadata {
            supports_booleans: self.db_type.supports_booleans(),
            supports_dates: false,
            supports_json: false,
            debug_logs: self.debug_logs,
            ..AdapterMetadata::new("sqlx", "Sqlx Adapter")
        }
    }

    fn options(&self) -> Value {
        serde_json::json!({ "databaseType": self.db_type, "debugLogs": self.debug_logs })
    }

    async fn create(&self, model: &str, data: Value, select: Option<&[String]>) -> Result<Value> {
        let mut data = match data {
            Value::Object(map) => map,
            _ => {
                return Err(FeatureError::Validation(format!(
                    "create on \"{model}\" expects an object"
                )))
            }
        };
        let id = match data.get("id") {
            Some(id) if !id.is_null() => id.clone(),
            _ => {
                let id = Value::String(generate_id(None));
                data.insert("id".into(), id.clone());
                id
            }
        };
        let frag = self.builder().build_insert(model, &Value::Object(data))?;
        self.execute(&frag.sql, &frag.binds).await?;
        self.find_by_id(model, &id, select)
            .await?
            .ok_or_else(|| FeatureError::Database(format!("inserted \"{model}\" row was not found")))
    }

    async fn find_one(
        &self,
        model: &str,
        where_clauses: &[WhereClause],
        select: Option<&[String]>,
    ) -> Result<Option<Value>> {
        let where_frag = self.where_fragment(where_clauses, 0)?;
        let sql = format!(
            "{}{} LIMIT 1",
            self.builder().build_select(model, select),
            where_frag.sql
        );
        let row = self.fetch_optional(&sql, &where_frag.binds).await?;
        Ok(row.map(|r| apply_select(row_to_json(&r), select)))
    }

    async fn find_many(&self, model: &str, query: FindManyQuery) -> Result<Vec<Value>> {
        let b = self.builder();
        let where_frag = self.where_fragment(&query.where_clauses, 0)?;
        let sql = format!(
            "{}{}{}{}",
            b.build_select(model, query.select.as_deref()),
            where_frag.sql,
            b.build_order_by(&query),
            b.build_limit_offset(&query)
        );
        let rows = self.fetch_all(&sql, &where_frag.binds).await?;
        Ok(rows
            .iter()
            .map(|r| apply_select(row_to_json(r), query.select.as_deref()))
            .collect())
    }

    async fn count(&self, model: &str, where_clauses: &[WhereClause]) -> Result<i64> {
        let where_frag = self.where_fragment(where_clauses, 0)?;
        let sql = format!(
            "SELECT COUNT(*) AS count FROM {}{}",
            self.builder().quote(model),
            where_frag.sql
        );
        let row = self
            .fetch_optional(&sql, &where_frag.binds)
            .await?
            .ok_or_else(|| FeatureError::Database("count returned no rows".into()))?;
        row.try_get::<i64, _>("count")
            .or_else(|_| row.try_get::<i32, _>("count").map(i64::from))
            .map_err(|e| FeatureError::Database(format!("count decode failed: {e}")))
    }

    async fn update(
        &self,
        model: &str,
        where_clauses: &[WhereClause],
        data: Value,
    ) -> Result<Option<Value>> {
        let Some(id) = self.first_id(model, where_clauses).await? else {
            return Ok(None);
        };
        let b = self.builder();
        let set = b.build_update_set(&data, 0)?;
        let filter = translate_where(&[WhereClause::eq("id", id.clone())])?;
        let where_frag = b.build_where(filter.as_ref(), set.binds.len())?;
        let sql = format!("UPDATE {} SET {}{}", b.quote(model), set.sql, where_frag.sql);
        let binds: Vec<Value> = set.binds.into_iter().chain(where_frag.binds).collect();
        self.execute(&sql, &binds).await?;

        let id = data.get("id").filter(|v| !v.is_null()).cloned().unwrap_or(id);
        self.find_by_id(model, &id, None).await
    }

    async fn update_many(&self, model: &str, where_clauses: &[WhereClause], data: Value) -> Result<i64> {
        let b = self.builder();
        let set = b.build_update_set(&data, 0)?;
        let where_frag = self.where_fragment(where_clauses, set.binds.len())?;
        let sql = format!("UPDATE {} SET {}{}", b.quote(model), set.sql, where_frag.sql);
        let binds: Vec<Value> = set.binds.into_iter().chain(where_frag.binds).collect();
        Ok(self.execute(&sql, &binds).await? as i64)
    }

    async fn delete(&self, model: &str, where_clauses: &[WhereClause]) -> Result<()> {
        if let Some(id) = self.first_id(model, where_clauses).await? {
            self.delete_many(model, &[WhereClause::eq("id", id)]).await?;
        }
        Ok(())
    }

    async fn delete_many(&self, model: &str, where_clauses: &[WhereClause]) -> Result<i64> {
        let where_frag = self.where_fragment(where_clauses, 0)?;
        let sql = format!("DELETE FROM {}{}", self.builder().quote(model), where_frag.sql);
        Ok(self.execute(&sql, &where_frag.binds).await? as i64)
    }

    async fn create_schema(&self, schema: &DatabaseSchema, options: &SchemaOptions) -> Result<SchemaStatus> {
        let plan = get_migrations(&self.pool, schema, self.db_type).await?;
        if !plan.has_pending() {
            return Ok(SchemaStatus::UpToDate);
        }
        if !options.auto_migrate {
            return Ok(SchemaStatus::NeedsMigration { statements: plan.statements });
        }
        plan.run(&self.pool).await?;
        tracing::info!(statements = plan.statements.len(), "applied schema migrations");
        Ok(SchemaStatus::Applied { statements: plan.statements })
    }
}
