//! Feature initialization: the plugin fold, schema aggregation, the internal
//! adapter's hook chain and the request pipeline, end to end over the memory
//! fallback.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use better_feature::api::endpoint_pipeline::{HookEntry, HookResult, PluginHooks};
use better_feature::api::{ContextModification, FeatureRequest, PluginEndpoint};
use better_feature::db::hooks::{BeforeHookOutcome, TableHooks};
use better_feature::db::AdapterSource;
use better_feature::plugins::tester::{TesterPlugin, TESTER_TABLE};
use better_feature::{
    better_feature, get_adapter, get_schema, init, ContextOverrides, FeatureContext, FeatureOptions,
    FeaturePlugin, PluginInitOutput, PluginOptions, Result,
};
use better_feature_core::db::adapter::{FindManyQuery, WhereClause};
use better_feature_core::db::schema::{FieldAttribute, PluginSchema, TableFragment};
use better_feature_test_utils::AdapterTestSuite;

#[derive(Debug)]
struct AppName(&'static str);

#[async_trait]
impl FeaturePlugin for AppName {
    fn id(&self) -> &str {
        "app-name"
    }

    async fn init(&self, _ctx: &FeatureContext) -> Result<Option<PluginInitOutput>> {
        Ok(Some(PluginInitOutput::context(ContextOverrides::default().app_name(self.0))))
    }
}

/// Adds `age` to the tester table and lowercases names through a database hook.
#[derive(Debug, Default)]
struct Audit {
    seen: Arc<Mutex<Vec<Value>>>,
}

#[async_trait]
impl FeaturePlugin for Audit {
    fn id(&self) -> &str {
        "audit"
    }

    async fn init(&self, _ctx: &FeatureContext) -> Result<Option<PluginInitOutput>> {
        let seen = self.seen.clone();
        let hooks = TableHooks::new()
            .on_create_before(TESTER_TABLE, |mut data: Value| async move {
                if let Some(name) = data["displayName"].as_str().map(str::to_lowercase) {
                    data["displayName"] = json!(name);
                }
                Ok(BeforeHookOutcome::Transform(data))
            })
            .on_create_after(TESTER_TABLE, move |record| {
                let seen = seen.clone();
                async move {
                    seen.lock().unwrap().push(record);
                    Ok(())
                }
            });
        Ok(Some(PluginInitOutput::options(PluginOptions::default().database_hooks(hooks))))
    }

    fn schema(&self) -> PluginSchema {
        PluginSchema::from([(
            TESTER_TABLE.to_string(),
            TableFragment::new().field("age", FieldAttribute::number().optional()),
        )])
    }
}

#[tokio::test]
async fn plugin_init_overrides_app_name() {
    better_feature_core::env::init_logger();
    let ctx = init(FeatureOptions::new().plugin(AppName("X"))).await.unwrap();
    assert_eq!(ctx.app_name, "X");
}

#[tokio::test]
async fn independent_inits_share_no_state() {
    let first = init(FeatureOptions::new().plugin(TesterPlugin::default())).await.unwrap();
    let second = init(FeatureOptions::new().plugin(TesterPlugin::default())).await.unwrap();

    first.internal_adapter.create(TESTER_TABLE, json!({ "name": "only-here" }), None).await.unwrap();

    assert_eq!(first.internal_adapter.count(TESTER_TABLE, &[]).await.unwrap(), 1);
    assert_eq!(second.internal_adapter.count(TESTER_TABLE, &[]).await.unwrap(), 0);
}

#[tokio::test]
async fn schema_is_the_union_of_plugin_fields() {
    let options = FeatureOptions::new().plugin(TesterPlugin::default()).plugin(Audit::default());
    let schema = get_schema(&options);
    let tester = &schema.tables[TESTER_TABLE];
    let mut fields: Vec<&str> = tester.fields.keys().map(String::as_str).collect();
    fields.sort();
    assert_eq!(fields, vec!["age", "displayName", "name"]);
}

#[tokio::test]
async fn memory_fallback_round_trips_records() {
    let options = FeatureOptions::new().plugin(TesterPlugin::default());
    let resolved = get_adapter(&options).await.unwrap();
    assert_eq!(resolved.source, AdapterSource::MemoryFallback);

    let ctx = init(options).await.unwrap();
    let db = &ctx.internal_adapter;
    let created = db
        .create(TESTER_TABLE, json!({ "name": "Round", "displayName": "Trip" }), None)
        .await
        .unwrap()
        .unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    let found = db.find_one(TESTER_TABLE, &[WhereClause::eq("id", id.as_str())], None).await.unwrap();
    assert_eq!(found, Some(created));

    db.update(TESTER_TABLE, &[WhereClause::eq("id", id.as_str())], json!({ "displayName": "Again" }))
        .await
        .unwrap();
    let all = db.find_many(TESTER_TABLE, FindManyQuery::new()).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0]["displayName"], "Again");

    db.delete(TESTER_TABLE, &[WhereClause::eq("id", id.as_str())]).await.unwrap();
    assert_eq!(db.count(TESTER_TABLE, &[]).await.unwrap(), 0);
}

#[tokio::test]
async fn resolved_memory_adapter_passes_conformance_suite() {
    let resolved = get_adapter(&FeatureOptions::new()).await.unwrap();
    AdapterTestSuite::conformance().run(resolved.adapter).await.assert_all_passed();
}

#[tokio::test]
async fn database_hooks_rewrite_then_observe() {
    let audit = Audit::default();
    let seen = audit.seen.clone();
    let options = FeatureOptions::new()
        .plugin(TesterPlugin::default())
        .plugin(audit)
        .database_hooks(TableHooks::new().on_create_before(TESTER_TABLE, |mut data: Value| async move {
            data["age"] = json!(30);
            Ok(BeforeHookOutcome::Transform(data))
        }));
    let ctx = init(options).await.unwrap();
    assert_eq!(ctx.internal_adapter.hooks().len(), 2);

    let created = ctx
        .internal_adapter
        .create(TESTER_TABLE, json!({ "name": "MixedCase", "displayName": "Shown" }), None)
        .await
        .unwrap()
        .unwrap();

    // `name` goes through the field transform, `displayName` through the hook.
    assert_eq!(created["name"], "mixedcase");
    assert_eq!(created["displayName"], "shown");
    assert_eq!(created["age"], 30);

    // After hooks see the persisted record, top-level changes included.
    let observed = seen.lock().unwrap().clone();
    assert_eq!(observed.len(), 1);
    assert_eq!(observed[0]["displayName"], "shown");
    assert_eq!(observed[0]["age"], 30);
    assert_eq!(observed[0]["id"], created["id"]);
}

#[tokio::test]
async fn short_circuit_skips_persistence() {
    let options = FeatureOptions::new().plugin(TesterPlugin::default()).database_hooks(
        TableHooks::new().on_create_before(TESTER_TABLE, |_| async {
            Ok(BeforeHookOutcome::ShortCircuit(Some(json!({ "dryRun": true }))))
        }),
    );
    let ctx = init(options).await.unwrap();
    let result = ctx.internal_adapter.create(TESTER_TABLE, json!({ "name": "x" }), None).await.unwrap();
    assert_eq!(result, Some(json!({ "dryRun": true })));
    assert_eq!(ctx.internal_adapter.count(TESTER_TABLE, &[]).await.unwrap(), 0);
}

// ─── Request pipeline ───────────────────────────────────────────

/// Lowercases `input` before `/tester/initiate` and tags the response.
#[derive(Debug)]
struct Normalizer;

#[async_trait]
impl FeaturePlugin for Normalizer {
    fn id(&self) -> &str {
        "normalizer"
    }

    fn hooks(&self) -> PluginHooks {
        PluginHooks::default()
            .before(HookEntry::new(
                |ctx| ctx.path == "/tester/initiate",
                |ctx| {
                    let lower = ctx.body_str("input").map(str::to_lowercase);
                    Box::pin(async move {
                        Ok(HookResult::ContinueWith(ContextModification {
                            body: lower.map(|input| json!({ "input": input })),
                            ..Default::default()
                        }))
                    })
                },
            ))
            .after(HookEntry::new(
                |ctx| ctx.path == "/tester/initiate",
                |ctx| {
                    let mut body = ctx.returned.clone().unwrap_or_default();
                    body["seenBy"] = json!("normalizer");
                    Box::pin(async move { Ok(HookResult::Respond(body)) })
                },
            ))
    }

    fn endpoints(&self) -> Vec<PluginEndpoint> {
        vec![PluginEndpoint::post("/tester/echo", |ctx| async move {
            Ok(ctx.body.clone().unwrap_or_default())
        })]
    }
}

#[tokio::test]
async fn builtin_ok_route() {
    let feature = better_feature(FeatureOptions::new()).await.unwrap();
    let res = feature.handle(FeatureRequest::get("/api/auth/ok")).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body, json!({ "ok": true }));

    let missing = feature.handle(FeatureRequest::get("/api/auth/nope")).await;
    assert_eq!(missing.status, 404);
}

#[tokio::test]
async fn before_and_after_hooks_wrap_endpoints() {
    let feature = better_feature(FeatureOptions::new().plugin(TesterPlugin::default()).plugin(Normalizer))
        .await
        .unwrap();

    let res = feature
        .handle(FeatureRequest::post("/tester/initiate", json!({ "input": "ABC_1", "validate": true })))
        .await;
    assert_eq!(
        res.body,
        json!({ "example": { "validated": true, "message": "example" }, "seenBy": "normalizer" })
    );

    // Hooks only match their own path.
    let echo = feature.handle(FeatureRequest::post("/tester/echo", json!({ "input": "KEEP" }))).await;
    assert_eq!(echo.body, json!({ "input": "KEEP" }));
}

#[tokio::test]
async fn duplicate_endpoints_keep_the_first_registration() {
    #[derive(Debug)]
    struct Shadow;

    #[async_trait]
    impl FeaturePlugin for Shadow {
        fn id(&self) -> &str {
            "shadow"
        }

        fn endpoints(&self) -> Vec<PluginEndpoint> {
            vec![PluginEndpoint::get("/tester/list", |_| async { Ok(json!({ "shadow": true })) })]
        }
    }

    let feature = better_feature(FeatureOptions::new().plugin(TesterPlugin::default()).plugin(Shadow))
        .await
        .unwrap();
    let conflicts = feature.router().conflicts();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].plugin_ids, vec!["tester", "shadow"]);

    let res = feature.handle(FeatureRequest::get("/tester/list")).await;
    assert_eq!(res.body["total"], 0);
}

#[tokio::test]
async fn error_codes_are_merged_onto_the_context() {
    let ctx = init(FeatureOptions::new().plugin(TesterPlugin::default())).await.unwrap();
    assert_eq!(ctx.error_codes.get("INPUT_NOT_FOUND").map(String::as_str), Some("input not found"));
    assert!(ctx.has_plugin("tester"));
}
