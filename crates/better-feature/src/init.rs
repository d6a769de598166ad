// Feature initialization: resolve the adapter, build the first context from
// options, then fold every plugin's `init` output into it.

use std::sync::Arc;

use serde_json::Map;

use better_feature_core::db::adapter::SchemaStatus;
use better_feature_core::env;
use better_feature_core::error::{FeatureError, Result};
use better_feature_core::logger::FeatureLogger;
use better_feature_core::utils::url::DEFAULT_BASE_PATH;
use better_feature_core::utils::{self, get_base_url, get_origin};

use crate::api::endpoint::{FeatureRequest, FeatureResponse};
use crate::api::router::Router;
use crate::context::{FeatureContext, RateLimitPolicy};
use crate::db::adapter_factory::{get_adapter, ResolvedAdapter};
use crate::db::get_tables::{get_feature_tables, RATE_LIMIT_TABLE};
use crate::db::hooks::{DatabaseHooks, HookChain};
use crate::db::internal_adapter::InternalAdapter;
use crate::options::{FeatureOptions, IdGenerator, RateLimitStorage};

pub const DEFAULT_SECRET: &str = "better-feature-secret-123456789";
pub const DEFAULT_APP_NAME: &str = "Better Feature";

const DEFAULT_SECRET_ERROR: &str = "You are using the default secret. Please set `BETTER_AUTH_SECRET` in your environment variables or pass `secret` in your auth config.";

/// A ready feature instance: the shared context plus its routes.
pub struct BetterFeature {
    pub context: Arc<FeatureContext>,
    router: Router,
}

impl BetterFeature {
    pub fn context(&self) -> &FeatureContext {
        &self.context
    }

    pub fn options(&self) -> &FeatureOptions {
        &self.context.options
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub async fn handle(&self, request: FeatureRequest) -> FeatureResponse {
        self.router.handle(self.context.clone(), request).await
    }

    pub async fn run_migrations(&self) -> Result<SchemaStatus> {
        self.context.run_migrations().await
    }
}

impl std::fmt::Debug for BetterFeature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BetterFeature")
            .field("context", &self.context)
            .field("router", &self.router)
            .finish()
    }
}

/// Build a feature instance. Endpoint conflicts are logged, not fatal.
pub async fn better_feature(options: FeatureOptions) -> Result<BetterFeature> {
    let context = init(options).await?;
    let router = Router::new(&context);
    Ok(BetterFeature { context: Arc::new(context), router })
}

/// Build the final context.
///
/// Every call is independent: two calls with the same options share no
/// state beyond what the options themselves share.
pub async fn init(options: FeatureOptions) -> Result<FeatureContext> {
    let resolved = get_adapter(&options).await?;
    let ctx = create_context(options, resolved)?;
    run_plugin_init(ctx).await
}

fn create_context(options: FeatureOptions, resolved: ResolvedAdapter) -> Result<FeatureContext> {
    let logger = FeatureLogger::new(options.logger_config());

    let secret = resolve_secret(&options);
    if secret == DEFAULT_SECRET && env::is_production() {
        logger.error(DEFAULT_SECRET_ERROR);
    }

    let base_path = options.base_path.clone().unwrap_or_else(|| DEFAULT_BASE_PATH.to_string());
    let base_url = get_base_url(options.base_url.as_deref(), Some(&base_path))?;
    let trusted_origins = resolve_trusted_origins(&options, base_url.as_deref());
    let rate_limit = resolve_rate_limit(&options);
    let generate_id = resolve_id_generator(&options);

    let tables = Arc::new(get_feature_tables(&options));
    let internal_adapter = InternalAdapter::new(
        resolved.adapter.clone(),
        tables.clone(),
        HookChain::default(),
        generate_id.clone(),
    );
    let error_codes = options.plugins_iter().flat_map(|p| p.error_codes()).collect();

    Ok(FeatureContext {
        app_name: options.app_name.clone().unwrap_or_else(|| DEFAULT_APP_NAME.to_string()),
        base_url,
        base_path,
        secret,
        tables,
        trusted_origins,
        rate_limit,
        logger,
        adapter: resolved.adapter,
        internal_adapter,
        secondary_storage: options.runtime.secondary_storage.clone(),
        error_codes,
        extensions: Map::new(),
        generate_id,
        sql: resolved.sql,
        options,
    })
}

/// Fold plugin `init` outputs into `ctx`, in plugin order.
///
/// Database hooks are collected in order; the top-level hooks go last.
async fn run_plugin_init(mut ctx: FeatureContext) -> Result<FeatureContext> {
    let plugins = ctx.options.runtime.plugins.clone();
    let mut database_hooks: Vec<Arc<dyn DatabaseHooks>> = Vec::new();

    for plugin in &plugins {
        let output = match plugin.init(&ctx).await {
            Ok(output) => output,
            Err(err) => {
                let err = match err {
                    err @ FeatureError::Plugin { .. } => err,
                    other => FeatureError::plugin(plugin.id(), other),
                };
                ctx.logger.error(&err.to_string());
                return Err(err);
            }
        };
        let Some(output) = output else {
            continue;
        };

        if let Some(overrides) = output.context {
            ctx.apply_overrides(overrides);
        }
        if let Some(options) = output.options {
            if let Some(hooks) = options.database_hooks {
                database_hooks.push(hooks);
            }
            if options.values.as_object().is_some_and(|v| !v.is_empty()) {
                let precedence = ctx.options.plugin_option_precedence;
                ctx.options.merge_patch(&options.values, precedence)?;
                ctx.tables = Arc::new(get_feature_tables(&ctx.options));
            }
            ctx.internal_adapter = internal_adapter(&ctx, &database_hooks);
        }
        tracing::debug!(plugin = plugin.id(), "plugin initialized");
    }

    if let Some(hooks) = ctx.options.runtime.database_hooks.clone() {
        database_hooks.push(hooks);
    }
    ctx.internal_adapter = internal_adapter(&ctx, &database_hooks);
    Ok(ctx)
}

fn internal_adapter(ctx: &FeatureContext, hooks: &[Arc<dyn DatabaseHooks>]) -> InternalAdapter {
    InternalAdapter::new(
        ctx.adapter.clone(),
        ctx.tables.clone(),
        HookChain::new(hooks.to_vec()),
        ctx.generate_id.clone(),
    )
}

/// `options.secret`, then `BETTER_AUTH_SECRET` / `AUTH_SECRET`, then the
/// development default.
fn resolve_secret(options: &FeatureOptions) -> String {
    options
        .secret
        .clone()
        .filter(|s| !s.is_empty())
        .or_else(env::secret_from_env)
        .unwrap_or_else(|| DEFAULT_SECRET.to_string())
}

/// Base URL origin, then configured origins, then the environment. Without
/// a base URL nothing is trusted.
fn resolve_trusted_origins(options: &FeatureOptions, base_url: Option<&str>) -> Vec<String> {
    let Some(origin) = base_url.and_then(get_origin) else {
        return Vec::new();
    };
    let mut origins = vec![origin];
    for candidate in options.trusted_origins.iter().cloned().chain(env::trusted_origins_from_env()) {
        if !origins.contains(&candidate) {
            origins.push(candidate);
        }
    }
    origins
}

fn resolve_rate_limit(options: &FeatureOptions) -> RateLimitPolicy {
    let configured = options.rate_limit.clone().unwrap_or_default();
    let storage = configured.storage.unwrap_or(if options.runtime.secondary_storage.is_some() {
        RateLimitStorage::SecondaryStorage
    } else {
        RateLimitStorage::Memory
    });
    RateLimitPolicy {
        enabled: configured.enabled.unwrap_or_else(env::is_production),
        window: configured.window.unwrap_or(10),
        max: configured.max.unwrap_or(100),
        storage,
        model_name: configured.model_name.unwrap_or_else(|| RATE_LIMIT_TABLE.to_string()),
        rules: options.plugins_iter().flat_map(|p| p.rate_limit()).collect(),
    }
}

fn resolve_id_generator(options: &FeatureOptions) -> IdGenerator {
    if let Some(custom) = options.runtime.generate_id.clone().or_else(|| options.runtime.database_generate_id.clone()) {
        return custom;
    }
    let default_size = options.advanced.as_ref().and_then(|a| a.id_size);
    Arc::new(move |_model, size| utils::generate_id(size.or(default_size)))
}
