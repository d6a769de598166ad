// Tester plugin: a sample plugin with its own table, a list endpoint and an
// input-checking endpoint.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};

use better_feature_core::db::adapter::{FindManyQuery, SortBy};
use better_feature_core::db::schema::{FieldAttribute, PluginSchema, TableFragment};

use crate::api::endpoint::PluginEndpoint;
use crate::api::endpoint_pipeline::HookEndpointContext;
use crate::api::error::ApiError;
use crate::plugin::FeaturePlugin;

pub const TESTER_TABLE: &str = "tester";
pub const DEFAULT_MIN_TESTING_ATTEMPTS: u32 = 3;
const DEFAULT_LIMIT: i64 = 10;

pub type InputValidator = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Renames for the `tester` table: model name and logical field -> column.
#[derive(Debug, Clone, Default)]
pub struct TesterSchemaOverride {
    pub model_name: Option<String>,
    pub fields: BTreeMap<String, String>,
}

impl TesterSchemaOverride {
    pub fn model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = Some(name.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, column: impl Into<String>) -> Self {
        self.fields.insert(key.into(), column.into());
        self
    }
}

#[derive(Clone, Default)]
pub struct TesterOptions {
    pub schema: Option<TesterSchemaOverride>,
    /// Defaults to 3.
    pub min_testing_attempts: Option<u32>,
    /// Replaces the default check, which allows `[A-Za-z0-9_]` only.
    pub validator: Option<InputValidator>,
}

impl fmt::Debug for TesterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TesterOptions")
            .field("schema", &self.schema)
            .field("min_testing_attempts", &self.min_testing_attempts)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct TesterPlugin {
    options: TesterOptions,
}

impl TesterPlugin {
    pub fn new(options: TesterOptions) -> Self {
        Self { options }
    }

    pub fn min_testing_attempts(&self) -> u32 {
        self.options.min_testing_attempts.unwrap_or(DEFAULT_MIN_TESTING_ATTEMPTS)
    }
}

impl Default for TesterPlugin {
    fn default() -> Self {
        Self::new(TesterOptions::default())
    }
}

pub fn tester(options: TesterOptions) -> TesterPlugin {
    TesterPlugin::new(options)
}

// ─── Schema ─────────────────────────────────────────────────────────────

pub fn tester_schema() -> PluginSchema {
    let name = FieldAttribute::string()
        .optional()
        .sortable()
        .unique()
        .transform_input(|value| match value {
            Value::String(s) => Value::String(s.to_lowercase()),
            other => other,
        });
    let table = TableFragment::new()
        .model_name(TESTER_TABLE)
        .field("name", name)
        .field("displayName", FieldAttribute::string().optional());
    PluginSchema::from([(TESTER_TABLE.to_string(), table)])
}

/// Apply user renames onto the base schema. Unknown fields are ignored.
pub fn merge_schema(mut schema: PluginSchema, overrides: Option<&TesterSchemaOverride>) -> PluginSchema {
    let Some(overrides) = overrides else {
        return schema;
    };
    if let Some(table) = schema.get_mut(TESTER_TABLE) {
        if let Some(name) = &overrides.model_name {
            table.model_name = Some(name.clone());
        }
        for (key, column) in &overrides.fields {
            if let Some(attr) = table.fields.get_mut(key) {
                attr.field_name = Some(column.clone());
            }
        }
    }
    schema
}

// ─── Endpoints ──────────────────────────────────────────────────────────

async fn list_testers(ctx: HookEndpointContext) -> Result<Value, ApiError> {
    let limit = ctx.query_i64("limit").unwrap_or(DEFAULT_LIMIT);
    let offset = ctx.query_i64("offset").unwrap_or(0);
    let db = &ctx.context.internal_adapter;

    let testers = db
        .find_many(
            TESTER_TABLE,
            FindManyQuery::new().limit(limit).offset(offset).sort_by(SortBy::asc("name")),
        )
        .await?;
    let total = db.count(TESTER_TABLE, &[]).await?;

    let testers: Vec<Value> = testers
        .iter()
        .map(|t| json!({ "id": t["id"], "name": t["name"], "displayName": t["displayName"] }))
        .collect();
    Ok(json!({ "testers": testers, "total": total }))
}

async fn initiate(ctx: HookEndpointContext, validator: InputValidator) -> Result<Value, ApiError> {
    let Some(input) = ctx.body_str("input").filter(|s| !s.is_empty()) else {
        ctx.context.logger.error("input not found");
        return Err(ApiError::unauthorized("SOMETHING WENT WRONG"));
    };

    let validate = ctx.body.as_ref().and_then(|b| b.get("validate")).and_then(Value::as_bool);
    let validated = match validate {
        Some(true) => validator(input),
        _ => true,
    };
    Ok(json!({ "example": { "validated": validated, "message": "example" } }))
}

fn default_validator() -> InputValidator {
    match Regex::new(r"^[A-Za-z0-9_]+$") {
        Ok(re) => Arc::new(move |input| re.is_match(input)),
        Err(_) => Arc::new(|input: &str| input.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')),
    }
}

#[async_trait]
impl FeaturePlugin for TesterPlugin {
    fn id(&self) -> &str {
        "tester"
    }

    fn schema(&self) -> PluginSchema {
        merge_schema(tester_schema(), self.options.schema.as_ref())
    }

    fn endpoints(&self) -> Vec<PluginEndpoint> {
        let validator = self.options.validator.clone().unwrap_or_else(default_validator);
        vec![
            PluginEndpoint::get("/tester/list", list_testers),
            PluginEndpoint::post("/tester/initiate", move |ctx| initiate(ctx, validator.clone())),
        ]
    }

    fn error_codes(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("INPUT_NOT_FOUND".to_string(), "input not found".to_string()),
            ("SOMETHING_WENT_WRONG".to_string(), "SOMETHING WENT WRONG".to_string()),
        ])
    }

    fn options(&self) -> Value {
        json!({ "minTestingAttempts": self.min_testing_attempts() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::endpoint::FeatureRequest;
    use crate::init::better_feature;
    use crate::options::FeatureOptions;

    #[test]
    fn test_schema_shape() {
        let schema = tester_schema();
        let table = &schema[TESTER_TABLE];
        let name = &table.fields["name"];
        assert!(!name.required && name.unique && name.sortable);
        let lower = name.transform.input.as_ref().unwrap();
        assert_eq!(lower(json!("MiXeD")), json!("mixed"));
        assert!(!table.fields["displayName"].required);
    }

    #[test]
    fn test_schema_override_renames() {
        let plugin = tester(TesterOptions {
            schema: Some(TesterSchemaOverride::default().model_name("qa").field("displayName", "display_name")),
            ..Default::default()
        });
        let schema = plugin.schema();
        let table = &schema[TESTER_TABLE];
        assert_eq!(table.model_name.as_deref(), Some("qa"));
        assert_eq!(table.fields["displayName"].field_name.as_deref(), Some("display_name"));
    }

    #[test]
    fn test_options_default() {
        assert_eq!(TesterPlugin::default().options(), json!({ "minTestingAttempts": 3 }));
    }

    #[tokio::test]
    async fn test_initiate_requires_input() {
        let feature = better_feature(FeatureOptions::new().plugin(TesterPlugin::default())).await.unwrap();
        let res = feature.handle(FeatureRequest::post("/api/auth/tester/initiate", json!({}))).await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["message"], "SOMETHING WENT WRONG");
    }

    #[tokio::test]
    async fn test_initiate_validates_on_request() {
        let feature = better_feature(FeatureOptions::new().plugin(TesterPlugin::default())).await.unwrap();
        let res = feature
            .handle(FeatureRequest::post("/tester/initiate", json!({ "input": "not ok!", "validate": true })))
            .await;
        assert_eq!(res.body, json!({ "example": { "validated": false, "message": "example" } }));

        let res = feature.handle(FeatureRequest::post("/tester/initiate", json!({ "input": "not ok!" }))).await;
        assert_eq!(res.body["example"]["validated"], true);
    }

    #[tokio::test]
    async fn test_custom_validator() {
        let plugin = tester(TesterOptions {
            validator: Some(Arc::new(|input: &str| input.len() > 3)),
            ..Default::default()
        });
        let feature = better_feature(FeatureOptions::new().plugin(plugin)).await.unwrap();
        let res = feature
            .handle(FeatureRequest::post("/tester/initiate", json!({ "input": "abc", "validate": true })))
            .await;
        assert_eq!(res.body["example"]["validated"], false);
    }

    #[tokio::test]
    async fn test_list_sorts_and_pages() {
        let feature = better_feature(FeatureOptions::new().plugin(TesterPlugin::default())).await.unwrap();
        let db = &feature.context().internal_adapter;
        for name in ["Charlie", "alpha", "Bravo"] {
            db.create(TESTER_TABLE, json!({ "name": name }), None).await.unwrap();
        }

        let res = feature.handle(FeatureRequest::get("/tester/list?limit=2&offset=1")).await;
        assert!(res.is_success());
        assert_eq!(res.body["total"], 3);
        let names: Vec<&str> = res.body["testers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["bravo", "charlie"]);
    }
}
