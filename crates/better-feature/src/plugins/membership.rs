// Membership plugin: login against a Sequelize model registry.
//
// A before hook puts the registry handle into the request's locals; the login
// endpoint reads it from there. Nothing is kept between requests.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use better_feature_core::db::adapter::WhereClause;
use better_feature_core::db::filter::translate_where;
use better_feature_core::db::schema::{FieldAttribute, PluginSchema, TableFragment};
use better_feature_core::error::FeatureError;
use better_feature_sequelize::{FindOptions, Sequelize};

use crate::api::endpoint::PluginEndpoint;
use crate::api::endpoint_pipeline::{HookEndpointContext, HookEntry, HookResult, PluginHooks};
use crate::api::error::ApiError;
use crate::db::config::DatabaseConfig;
use crate::plugin::FeaturePlugin;

pub const MEMBERSHIP_TABLE: &str = "test";
pub const MOCK_TOKEN: &str = "mock-token-123";
const DB_NOT_FOUND: &str = "Database pool not found";

/// The registry handle for the current request.
#[derive(Clone, Debug)]
pub struct MembershipDb(pub Arc<dyn Sequelize>);

#[derive(Debug, Clone, Default)]
pub struct MembershipPlugin;

pub fn membership_login() -> MembershipPlugin {
    MembershipPlugin
}

fn resolve_db(ctx: &mut HookEndpointContext) -> Result<HookResult, ApiError> {
    match &ctx.context.options.runtime.database {
        Some(DatabaseConfig::Sequelize(config)) => {
            ctx.locals.set(MembershipDb(config.sequelize.clone()));
            Ok(HookResult::Continue)
        }
        _ => Err(ApiError::internal(DB_NOT_FOUND)),
    }
}

async fn login(ctx: HookEndpointContext) -> Result<Value, ApiError> {
    let membership_id = ctx.body_str("membershipId").ok_or_else(|| ApiError::bad_request("membershipId is required"))?;
    let password = ctx.body_str("password").ok_or_else(|| ApiError::bad_request("password is required"))?;

    let MembershipDb(db) = ctx.locals.get::<MembershipDb>().ok_or_else(|| ApiError::internal(DB_NOT_FOUND))?;
    let model = db
        .model(MEMBERSHIP_TABLE)
        .ok_or_else(|| ApiError::from(FeatureError::model_not_found(MEMBERSHIP_TABLE)))?;

    let filter = translate_where(&[WhereClause::eq("membershipId", membership_id)])?;
    let found = model.find_one(FindOptions::filter(filter)).await.map_err(FeatureError::from)?;

    let Some(member) = found.filter(|m| m.get("password").and_then(Value::as_str) == Some(password)) else {
        return Err(ApiError::unauthorized("Invalid credentials"));
    };

    Ok(json!({
        "token": MOCK_TOKEN,
        "user": {
            "membershipId": member.get("membershipId"),
            "membershipLevel": member.get("membershipLevel"),
        },
    }))
}

#[async_trait]
impl FeaturePlugin for MembershipPlugin {
    fn id(&self) -> &str {
        "membership"
    }

    fn schema(&self) -> PluginSchema {
        let table = TableFragment::new()
            .model_name(MEMBERSHIP_TABLE)
            .field("membershipId", FieldAttribute::string().unique())
            .field("membershipLevel", FieldAttribute::string().optional())
            .field("password", FieldAttribute::string().default_value("1234afsd"))
            .field("createdAt", FieldAttribute::date().optional())
            .field("updatedAt", FieldAttribute::date().optional());
        PluginSchema::from([(MEMBERSHIP_TABLE.to_string(), table)])
    }

    fn endpoints(&self) -> Vec<PluginEndpoint> {
        vec![
            PluginEndpoint::post("/membership/login", login),
            PluginEndpoint::get("/test", |_| async { Ok(json!({ "message": "Hello from membership plugin" })) }),
        ]
    }

    fn hooks(&self) -> PluginHooks {
        PluginHooks::default().before(HookEntry::new(
            |ctx| ctx.path.starts_with("/membership"),
            |ctx| {
                let result = resolve_db(ctx);
                Box::pin(async move { result })
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::endpoint::FeatureRequest;
    use crate::init::better_feature;
    use crate::options::FeatureOptions;
    use better_feature_sequelize::{AttributeDefinition, ModelAttributes, ModelRegistry, SequelizeAdapterConfig};

    async fn registry() -> Arc<ModelRegistry> {
        let attributes = ModelAttributes::from([
            ("membershipId".to_string(), AttributeDefinition::required().unique()),
            ("membershipLevel".to_string(), AttributeDefinition::nullable()),
            ("password".to_string(), AttributeDefinition::required()),
        ]);
        let registry = Arc::new(ModelRegistry::new().with_model(MEMBERSHIP_TABLE, attributes));
        let model = registry.model(MEMBERSHIP_TABLE).unwrap();
        model
            .create(json!({ "membershipId": "m-1", "membershipLevel": "gold", "password": "pw" }))
            .await
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_login() {
        let config = SequelizeAdapterConfig::new(registry().await);
        let feature = better_feature(
            FeatureOptions::new().database(DatabaseConfig::sequelize(config)).plugin(membership_login()),
        )
        .await
        .unwrap();

        let ok = feature
            .handle(FeatureRequest::post("/membership/login", json!({ "membershipId": "m-1", "password": "pw" })))
            .await;
        assert_eq!(
            ok.body,
            json!({ "token": MOCK_TOKEN, "user": { "membershipId": "m-1", "membershipLevel": "gold" } })
        );

        let bad = feature
            .handle(FeatureRequest::post("/membership/login", json!({ "membershipId": "m-1", "password": "nope" })))
            .await;
        assert_eq!(bad.status, 401);
        assert_eq!(bad.body["message"], "Invalid credentials");
    }

    #[tokio::test]
    async fn test_hook_fails_without_sequelize() {
        let feature = better_feature(FeatureOptions::new().plugin(membership_login())).await.unwrap();
        let res = feature
            .handle(FeatureRequest::post("/membership/login", json!({ "membershipId": "m-1", "password": "pw" })))
            .await;
        assert_eq!(res.status, 500);
        assert_eq!(res.body["message"], DB_NOT_FOUND);

        // Paths outside the hook's matcher are unaffected.
        let hello = feature.handle(FeatureRequest::get("/test")).await;
        assert_eq!(hello.body, json!({ "message": "Hello from membership plugin" }));
    }
}
