// KyselyAdapter: SqlxAdapter plus Kysely naming conventions. Logical
// camelCase keys become snake_case columns and model names become
// (optionally plural) snake_case tables.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use sqlx::AnyPool;

use better_feature_core::db::adapter::{
    Adapter, AdapterMetadata, FindManyQuery, SchemaOptions, SchemaStatus, SortBy, WhereClause,
};
use better_feature_core::db::schema::{DatabaseSchema, SchemaTable};
use better_feature_core::error::Result;
use better_feature_sqlx::{DatabaseType, SqlxAdapter};

use crate::naming;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KyselyAdapterConfig {
    /// Taken from the connection when not set.
    #[serde(default, rename = "type")]
    pub database_type: Option<DatabaseType>,
    #[serde(default)]
    pub use_plural: bool,
    #[serde(default)]
    pub debug_logs: bool,
}

/// ```rust,no_run
/// use better_feature_kysely::{KyselyAdapter, KyselyAdapterConfig};
///
/// # async fn run() -> better_feature_core::Result<()> {
/// let adapter = KyselyAdapter::connect("sqlite:./app.db", KyselyAdapterConfig::default()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct KyselyAdapter {
    inner: SqlxAdapter,
    config: KyselyAdapterConfig,
}

impl KyselyAdapter {
    pub fn new(pool: AnyPool, database_type: DatabaseType, config: KyselyAdapterConfig) -> Self {
        let inner = SqlxAdapter::new(pool, database_type).debug_logs(config.debug_logs);
        Self::from_inner(inner, config)
    }

    pub async fn connect(url: &str, config: KyselyAdapterConfig) -> Result<Self> {
        let inner = SqlxAdapter::connect(url).await?.debug_logs(config.debug_logs);
        Ok(Self::from_inner(inner, config))
    }

    pub(crate) fn from_inner(inner: SqlxAdapter, mut config: KyselyAdapterConfig) -> Self {
        config.database_type.get_or_insert(inner.database_type());
        Self { inner, config }
    }

    pub fn config(&self) -> &KyselyAdapterConfig {
        &self.config
    }

    pub fn inner(&self) -> &SqlxAdapter {
        &self.inner
    }

    pub fn table_name(&self, model: &str) -> String {
        naming::model_to_table_name(model, self.config.use_plural)
    }

    fn columns(&self, fields: &[String]) -> Vec<String> {
        fields.iter().map(|f| naming::field_to_column_name(f)).collect()
    }

    fn translate_where(&self, clauses: &[WhereClause]) -> Vec<WhereClause> {
        clauses
            .iter()
            .map(|w| WhereClause {
                field: naming::field_to_column_name(&w.field),
                ..w.clone()
            })
            .collect()
    }

    fn translate_data(&self, data: Value) -> Value {
        match data {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (naming::field_to_column_name(&k), v))
                    .collect(),
            ),
            other => other,
        }
    }

    /// Rename top-level columns back to field keys. Values are left alone.
    fn translate_result(&self, row: Value) -> Value {
        match row {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (naming::column_to_field_name(&k), v))
                    .collect::<Map<_, _>>(),
            ),
            other => other,
        }
    }

    /// The same schema with physical table and column names.
    pub fn translate_schema(&self, schema: &DatabaseSchema) -> DatabaseSchema {
        let tables = schema
            .tables
            .iter()
            .map(|(name, table)| {
                let fields = table
                    .fields
                    .iter()
                    .map(|(key, field)| {
                        let mut field = field.clone();
                        if let Some(reference) = field.references.as_mut() {
                            reference.model = self.table_name(&reference.model);
                            reference.field = naming::field_to_column_name(&reference.field);
                        }
                        (naming::field_to_column_name(key), field)
                    })
                    .collect();
                (self.table_name(name), SchemaTable { fields, ..table.clone() })
            })
            .collect();
        DatabaseSchema { tables }
    }

    fn log(&self, op: &str, model: &str, table: &str) {
        if self.config.debug_logs {
            tracing::debug!("[Kysely Adapter] {op} on '{model}' (table: '{table}')");
        }
    }
}

#[async_trait]
impl Adapter for KyselyAdapter {
    fn metadata(&self) -> AdapterMetadata {
        AdapterMetadata {
            adapter_id: "kysely".into(),
            adapter_name: "Kysely Adapter".into(),
            use_plural: self.config.use_plural,
            ..self.inner.metadata()
        }
    }

    fn options(&self) -> Value {
        serde_json::json!({
            "type": self.config.database_type,
            "usePlural": self.config.use_plural,
            "debugLogs": self.config.debug_logs,
        })
    }

    async fn create(&self, model: &str, data: Value, select: Option<&[String]>) -> Result<Value> {
        let table = self.table_name(model);
        self.log("CREATE", model, &table);
        let select = select.map(|s| self.columns(s));
        let row = self
            .inner
            .create(&table, self.translate_data(data), select.as_deref())
            .await?;
        Ok(self.translate_result(row))
    }

    async fn find_one(
        &self,
        model: &str,
        where_clauses: &[WhereClause],
        select: Option<&[String]>,
    ) -> Result<Option<Value>> {
        let table = self.table_name(model);
        self.log("FIND_ONE", model, &table);
        let select = select.map(|s| self.columns(s));
        let row = self
            .inner
            .find_one(&table, &self.translate_where(where_clauses), select.as_deref())
            .await?;
        Ok(row.map(|r| self.translate_result(r)))
    }

    async fn find_many(&self, model: &str, query: FindManyQuery) -> Result<Vec<Value>> {
        let table = self.table_name(model);
        self.log("FIND_MANY", model, &table);
        let query = FindManyQuery {
            where_clauses: self.translate_where(&query.where_clauses),
            sort_by: query.sort_by.map(|sort| SortBy {
                field: naming::field_to_column_name(&sort.field),
                direction: sort.direction,
            }),
            select: query.select.map(|s| self.columns(&s)),
            ..query
        };
        let rows = self.inner.find_many(&table, query).await?;
        Ok(rows.into_iter().map(|r| self.translate_result(r)).collect())
    }

    async fn count(&self, model: &str, where_clauses: &[WhereClause]) -> Result<i64> {
        let table = self.table_name(model);
        self.inner.count(&table, &self.translate_where(where_clauses)).await
    }

    async fn update(
        &self,
        model: &str,
        where_clauses: &[WhereClause],
        data: Value,
    ) -> Result<Option<Value>> {
        let table = self.table_name(model);
        self.log("UPDATE", model, &table);
        let row = self
            .inner
            .update(&table, &self.translate_where(where_clauses), self.translate_data(data))
            .await?;
        Ok(row.map(|r| self.translate_result(r)))
    }

    async fn update_many(&self, model: &str, where_clauses: &[WhereClause], data: Value) -> Result<i64> {
        let table = self.table_name(model);
        self.log("UPDATE_MANY", model, &table);
        self.inner
            .update_many(&table, &self.translate_where(where_clauses), self.translate_data(data))
            .await
    }

    async fn delete(&self, model: &str, where_clauses: &[WhereClause]) -> Result<()> {
        let table = self.table_name(model);
        self.log("DELETE", model, &table);
        self.inner.delete(&table, &self.translate_where(where_clauses)).await
    }

    async fn delete_many(&self, model: &str, where_clauses: &[WhereClause]) -> Result<i64> {
        let table = self.table_name(model);
        self.log("DELETE_MANY", model, &table);
        self.inner.delete_many(&table, &self.translate_where(where_clauses)).await
    }

    async fn create_schema(&self, schema: &DatabaseSchema, options: &SchemaOptions) -> Result<SchemaStatus> {
        self.inner.create_schema(&self.translate_schema(schema), options).await
    }
}
