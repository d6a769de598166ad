// Database adapter contract and the portable Where-clause query model.
//
// Every backend (memory, sqlx, kysely, sequelize) implements `Adapter` over
// `serde_json::Value` records; the internal adapter in the `better-feature`
// crate layers schema conversion and lifecycle hooks on top.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::schema::DatabaseSchema;
use crate::error::{FeatureError, Result};

// ─── Where Clause ────────────────────────────────────────────────

/// Comparison operator of a where clause. Parsing is case-insensitive;
/// unrecognized names are kept in `Other` and degrade to equality at
/// translation time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    #[default]
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
    Contains,
    StartsWith,
    EndsWith,
    Other(String),
}

impl Operator {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for Operator {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "eq" => Self::Eq,
            "ne" => Self::Ne,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "in" => Self::In,
            "not_in" | "notin" => Self::NotIn,
            "contains" => Self::Contains,
            "starts_with" | "startswith" => Self::StartsWith,
            "ends_with" | "endswith" => Self::EndsWith,
            _ => Self::Other(s.to_string()),
        }
    }
}

impl From<String> for Operator {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.as_str().to_string()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which bucket a clause belongs to. Absent means AND.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Connector {
    #[serde(rename = "AND", alias = "and")]
    And,
    #[serde(rename = "OR", alias = "or")]
    Or,
}

/// One filter predicate. A list of clauses is flat: AND clauses must all
/// hold and, when any OR clause exists, at least one of them must hold.
/// An empty list matches every row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereClause {
    pub field: String,
    pub value: Value,
    #[serde(default)]
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector: Option<Connector>,
}

impl WhereClause {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            operator,
            connector: None,
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Ne, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Gte, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Lte, value)
    }

    pub fn in_list(field: impl Into<String>, values: impl Into<Value>) -> Self {
        Self::new(field, Operator::In, values)
    }

    pub fn not_in(field: impl Into<String>, values: impl Into<Value>) -> Self {
        Self::new(field, Operator::NotIn, values)
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Contains, value)
    }

    pub fn starts_with(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::StartsWith, value)
    }

    pub fn ends_with(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::EndsWith, value)
    }

    pub fn and(mut self) -> Self {
        self.connector = Some(Connector::And);
        self
    }

    pub fn or(mut self) -> Self {
        self.connector = Some(Connector::Or);
        self
    }

    pub fn is_or(&self) -> bool {
        self.connector == Some(Connector::Or)
    }
}

// ─── Sort / Pagination ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortBy {
    pub field: String,
    pub direction: SortDirection,
}

impl SortBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Query parameters for `find_many`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindManyQuery {
    #[serde(default, rename = "where")]
    pub where_clauses: Vec<WhereClause>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Vec<String>>,
}

impl FindManyQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, clauses: Vec<WhereClause>) -> Self {
        self.where_clauses = clauses;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn sort_by(mut self, sort: SortBy) -> Self {
        self.sort_by = Some(sort);
        self
    }
}

// ─── Metadata ────────────────────────────────────────────────────

/// Adapter identity and capability flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterMetadata {
    pub adapter_id: String,
    pub adapter_name: String,
    pub supports_booleans: bool,
    pub supports_dates: bool,
    #[serde(rename = "supportsJSON")]
    pub supports_json: bool,
    pub supports_numeric_ids: bool,
    #[serde(default)]
    pub use_plural: bool,
    #[serde(default)]
    pub debug_logs: bool,
}

impl AdapterMetadata {
    pub fn new(adapter_id: impl Into<String>, adapter_name: impl Into<String>) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            adapter_name: adapter_name.into(),
            supports_booleans: true,
            supports_dates: true,
            supports_json: true,
            supports_numeric_ids: true,
            use_plural: false,
            debug_logs: false,
        }
    }
}

// ─── Schema / Migration ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaStatus {
    UpToDate,
    /// Statements still to run.
    NeedsMigration { statements: Vec<String> },
    Applied { statements: Vec<String> },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaOptions {
    #[serde(default)]
    pub auto_migrate: bool,
}

// ─── Adapter Trait ───────────────────────────────────────────────

/// Uniform CRUD over one storage backend.
///
/// `model` is the logical model name; adapters resolve it to their own table
/// or model naming. Absence is data: `find_one` and `update` return `None`
/// instead of failing when nothing matches.
#[async_trait]
pub trait Adapter: Send + Sync + fmt::Debug {
    fn metadata(&self) -> AdapterMetadata;

    /// Static options bag the adapter was built with.
    fn options(&self) -> Value {
        Value::Object(Default::default())
    }

    /// Insert a record and return it as stored.
    async fn create(&self, model: &str, data: Value, select: Option<&[String]>) -> Result<Value>;

    async fn find_one(
        &self,
        model: &str,
        where_clauses: &[WhereClause],
        select: Option<&[String]>,
    ) -> Result<Option<Value>>;

    async fn find_many(&self, model: &str, query: FindManyQuery) -> Result<Vec<Value>>;

    async fn count(&self, model: &str, where_clauses: &[WhereClause]) -> Result<i64>;

    /// Update the first matching record and return it.
    async fn update(
        &self,
        model: &str,
        where_clauses: &[WhereClause],
        data: Value,
    ) -> Result<Option<Value>>;

    /// Returns the number of affected rows.
    async fn update_many(&self, model: &str, where_clauses: &[WhereClause], data: Value)
        -> Result<i64>;

    /// Idempotent: deleting nothing is not an error.
    async fn delete(&self, model: &str, where_clauses: &[WhereClause]) -> Result<()>;

    async fn delete_many(&self, model: &str, where_clauses: &[WhereClause]) -> Result<i64>;

    /// Compare (and optionally apply) the physical schema.
    async fn create_schema(
        &self,
        _schema: &DatabaseSchema,
        _options: &SchemaOptions,
    ) -> Result<SchemaStatus> {
        Err(FeatureError::Configuration(format!(
            "{} does not support schema creation",
            self.metadata().adapter_name
        )))
    }
}

/// Keep only the selected keys of a record (`id` is always kept).
pub fn apply_select(record: Value, select: Option<&[String]>) -> Value {
    match (select, record) {
        (Some(fields), Value::Object(map)) if !fields.is_empty() => Value::Object(
            map.into_iter()
                .filter(|(k, _)| k == "id" || fields.iter().any(|f| f == k))
                .collect(),
        ),
        (_, record) => record,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_parsing_is_case_insensitive() {
        assert_eq!(Operator::from("EQ"), Operator::Eq);
        assert_eq!(Operator::from("notIn"), Operator::NotIn);
        assert_eq!(Operator::from("startsWith"), Operator::StartsWith);
        assert_eq!(Operator::from("between"), Operator::Other("between".into()));
    }

    #[test]
    fn test_where_clause_from_json() {
        let clause: WhereClause = serde_json::from_value(json!({
            "field": "age", "value": 3, "operator": "GTE", "connector": "OR"
        }))
        .unwrap();
        assert_eq!(clause.operator, Operator::Gte);
        assert!(clause.is_or());

        let bare: WhereClause =
            serde_json::from_value(json!({ "field": "name", "value": "a" })).unwrap();
        assert_eq!(bare.operator, Operator::Eq);
        assert_eq!(bare.connector, None);
    }

    #[test]
    fn test_operator_serializes_snake_case() {
        let clause = WhereClause::not_in("id", json!([1, 2]));
        let out = serde_json::to_value(&clause).unwrap();
        assert_eq!(out["operator"], "not_in");
    }

    #[test]
    fn test_apply_select_keeps_id() {
        let record = json!({ "id": "1", "name": "a", "displayName": "A" });
        let fields = vec!["name".to_string()];
        assert_eq!(apply_select(record, Some(&fields)), json!({ "id": "1", "name": "a" }));
    }

    #[test]
    fn test_metadata_serializes_capability_flags() {
        let meta = AdapterMetadata::new("memory", "Memory Adapter");
        let out = serde_json::to_value(meta).unwrap();
        assert_eq!(out["adapterId"], "memory");
        assert_eq!(out["supportsJSON"], true);
    }
}
