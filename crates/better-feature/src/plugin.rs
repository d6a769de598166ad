// Plugin trait: the unit that contributes schema, endpoints, request hooks,
// error codes and, at boot, context and option overrides.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use better_feature_core::db::schema::PluginSchema;
use better_feature_core::error::Result;

use crate::api::endpoint::PluginEndpoint;
use crate::api::endpoint_pipeline::PluginHooks;
use crate::context::FeatureContext;
use crate::db::hooks::DatabaseHooks;

/// Every method except `id` has an empty default.
#[async_trait]
pub trait FeaturePlugin: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    /// Called once during init, in plugin order, with the context folded so
    /// far. An error aborts construction of the feature instance.
    async fn init(&self, _ctx: &FeatureContext) -> Result<Option<PluginInitOutput>> {
        Ok(None)
    }

    /// Table fragments keyed by logical table key.
    fn schema(&self) -> PluginSchema {
        PluginSchema::new()
    }

    /// SQL run after the schema by `FeatureContext::run_migrations`.
    fn migrations(&self) -> Vec<PluginMigration> {
        Vec::new()
    }

    fn endpoints(&self) -> Vec<PluginEndpoint> {
        Vec::new()
    }

    fn hooks(&self) -> PluginHooks {
        PluginHooks::default()
    }

    /// `$ERROR_CODES`: code -> message.
    fn error_codes(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    fn rate_limit(&self) -> Vec<RateLimitRule> {
        Vec::new()
    }

    /// The options the plugin was built with.
    fn options(&self) -> Value {
        Value::Null
    }
}

// ─── Init output ────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct PluginInitOutput {
    pub context: Option<ContextOverrides>,
    pub options: Option<PluginOptions>,
}

impl PluginInitOutput {
    pub fn context(overrides: ContextOverrides) -> Self {
        Self { context: Some(overrides), options: None }
    }

    pub fn options(options: PluginOptions) -> Self {
        Self { context: None, options: Some(options) }
    }
}

/// Fields a plugin may override on the running context. `None` leaves the
/// current value in place.
#[derive(Debug, Clone, Default)]
pub struct ContextOverrides {
    pub app_name: Option<String>,
    pub base_url: Option<String>,
    pub trusted_origins: Option<Vec<String>>,
    pub secret: Option<String>,
    pub rate_limit: Option<RateLimitOverrides>,
    /// Merged key by key into `FeatureContext::extensions`.
    pub extensions: Map<String, Value>,
}

impl ContextOverrides {
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    pub fn extension(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct RateLimitOverrides {
    pub enabled: Option<bool>,
    pub window: Option<u64>,
    pub max: Option<u64>,
}

/// Option changes returned from `init`.
#[derive(Clone, Default)]
pub struct PluginOptions {
    /// Appended to the hook chain, not merged.
    pub database_hooks: Option<Arc<dyn DatabaseHooks>>,
    /// Deep-merged into the running options (camelCase keys).
    pub values: Value,
}

impl PluginOptions {
    pub fn database_hooks(mut self, hooks: impl DatabaseHooks + 'static) -> Self {
        self.database_hooks = Some(Arc::new(hooks));
        self
    }

    pub fn values(mut self, values: Value) -> Self {
        self.values = values;
        self
    }
}

impl fmt::Debug for PluginOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginOptions")
            .field("database_hooks", &self.database_hooks)
            .field("values", &self.values)
            .finish()
    }
}

// ─── Migrations / rate limits ───────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginMigration {
    pub name: String,
    /// Should be idempotent; it runs on every `run_migrations` call.
    pub up: String,
}

impl PluginMigration {
    pub fn new(name: impl Into<String>, up: impl Into<String>) -> Self {
        Self { name: name.into(), up: up.into() }
    }
}

/// A per-path rate limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
    /// Matches this path and everything below it.
    pub path: String,
    /// Seconds.
    pub window: u64,
    pub max: u64,
}

impl RateLimitRule {
    pub fn matches(&self, path: &str) -> bool {
        let prefix = self.path.trim_end_matches('/');
        path == prefix || path.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Bare;

    impl FeaturePlugin for Bare {
        fn id(&self) -> &str {
            "bare"
        }
    }

    #[test]
    fn test_defaults_are_empty() {
        let plugin = Bare;
        assert!(plugin.schema().is_empty());
        assert!(plugin.endpoints().is_empty());
        assert!(plugin.error_codes().is_empty());
        assert!(plugin.options().is_null());
        let hooks = plugin.hooks();
        assert!(hooks.before.is_empty() && hooks.after.is_empty());
    }

    #[test]
    fn test_rate_limit_rule_prefix() {
        let rule = RateLimitRule { path: "/tester".into(), window: 60, max: 3 };
        assert!(rule.matches("/tester"));
        assert!(rule.matches("/tester/initiate"));
        assert!(!rule.matches("/testers"));
    }
}
