// FeatureOptions: the configuration a feature instance is built from.
//
// Serializable settings live directly on the struct (camelCase, so JSON
// configs and plugin option patches use the same keys). Values that cannot
// be serialized (plugins, database, hooks, storage, callbacks) live in
// `RuntimeOptions` and are only set through builder methods.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use better_feature_core::db::secondary_storage::SecondaryStorage;
use better_feature_core::error::Result;
use better_feature_core::logger::{LogHandler, LogLevel, LoggerConfig};

use crate::db::config::DatabaseConfig;
use crate::db::hooks::DatabaseHooks;
use crate::plugin::FeaturePlugin;

/// `(model, size) -> id`
pub type IdGenerator = Arc<dyn Fn(&str, Option<usize>) -> String + Send + Sync>;

// ─── Settings ────────────────────────────────────────────────────

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,

    #[serde(default, rename = "baseURL", skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Defaults to `/api/auth`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trusted_origins: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advanced: Option<AdvancedOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logger: Option<LoggerOptions>,

    /// How option patches returned by plugin `init` hooks are layered.
    #[serde(default, skip_serializing_if = "PluginOptionPrecedence::is_default")]
    pub plugin_option_precedence: PluginOptionPrecedence,

    /// Keys this crate does not interpret; kept for plugins.
    #[serde(flatten)]
    pub extra: Map<String, Value>,

    #[serde(skip)]
    pub runtime: RuntimeOptions,
}

/// Collision rule when a plugin's option patch meets options already folded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PluginOptionPrecedence {
    /// Values already present (user configuration and earlier plugins) win;
    /// the plugin only fills gaps.
    #[default]
    ExistingWins,
    /// The plugin's values override what is already there.
    PluginWins,
}

impl PluginOptionPrecedence {
    fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitOptions {
    /// Defaults to `true` in production.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Seconds. Defaults to 10.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<u64>,
    /// Requests per window. Defaults to 100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<RateLimitStorage>,
    /// Table name when `storage` is `database`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<RateLimitFields>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateLimitStorage {
    Memory,
    Database,
    SecondaryStorage,
}

/// Column overrides for the `rateLimit` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_request: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedOptions {
    /// Size passed to the default id generator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie_prefix: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggerOptions {
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<LogLevel>,
}

// ─── Runtime values ──────────────────────────────────────────────

/// Members of [`FeatureOptions`] that are not plain data.
#[derive(Clone, Default)]
pub struct RuntimeOptions {
    pub plugins: Vec<Arc<dyn FeaturePlugin>>,
    /// `None` falls back to the in-memory adapter.
    pub database: Option<DatabaseConfig>,
    pub database_hooks: Option<Arc<dyn DatabaseHooks>>,
    pub secondary_storage: Option<Arc<dyn SecondaryStorage>>,
    /// `advanced.generateId`
    pub generate_id: Option<IdGenerator>,
    /// `advanced.database.generateId`, consulted after `generate_id`.
    pub database_generate_id: Option<IdGenerator>,
    pub log_handler: Option<Arc<dyn LogHandler>>,
}

impl fmt::Debug for RuntimeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plugins: Vec<&str> = self.plugins.iter().map(|p| p.id()).collect();
        f.debug_struct("RuntimeOptions")
            .field("plugins", &plugins)
            .field("database", &self.database)
            .field("database_hooks", &self.database_hooks.is_some())
            .field("secondary_storage", &self.secondary_storage.is_some())
            .field("generate_id", &self.generate_id.is_some())
            .field("database_generate_id", &self.database_generate_id.is_some())
            .field("log_handler", &self.log_handler.is_some())
            .finish()
    }
}

impl fmt::Debug for FeatureOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureOptions")
            .field("app_name", &self.app_name)
            .field("base_url", &self.base_url)
            .field("base_path", &self.base_path)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("trusted_origins", &self.trusted_origins)
            .field("rate_limit", &self.rate_limit)
            .field("advanced", &self.advanced)
            .field("logger", &self.logger)
            .field("plugin_option_precedence", &self.plugin_option_precedence)
            .field("extra", &self.extra)
            .field("runtime", &self.runtime)
            .finish()
    }
}

// ─── Builder ─────────────────────────────────────────────────────

impl FeatureOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn base_path(mut self, path: impl Into<String>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn trusted_origin(mut self, origin: impl Into<String>) -> Self {
        self.trusted_origins.push(origin.into());
        self
    }

    pub fn rate_limit(mut self, rate_limit: RateLimitOptions) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    pub fn logger(mut self, logger: LoggerOptions) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn plugin_option_precedence(mut self, precedence: PluginOptionPrecedence) -> Self {
        self.plugin_option_precedence = precedence;
        self
    }

    pub fn plugin(mut self, plugin: impl FeaturePlugin + 'static) -> Self {
        self.runtime.plugins.push(Arc::new(plugin));
        self
    }

    pub fn plugins(mut self, plugins: Vec<Arc<dyn FeaturePlugin>>) -> Self {
        self.runtime.plugins.extend(plugins);
        self
    }

    pub fn database(mut self, database: DatabaseConfig) -> Self {
        self.runtime.database = Some(database);
        self
    }

    pub fn database_hooks(mut self, hooks: impl DatabaseHooks + 'static) -> Self {
        self.runtime.database_hooks = Some(Arc::new(hooks));
        self
    }

    pub fn secondary_storage(mut self, storage: Arc<dyn SecondaryStorage>) -> Self {
        self.runtime.secondary_storage = Some(storage);
        self
    }

    pub fn generate_id<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Option<usize>) -> String + Send + Sync + 'static,
    {
        self.runtime.generate_id = Some(Arc::new(f));
        self
    }

    pub fn database_generate_id<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Option<usize>) -> String + Send + Sync + 'static,
    {
        self.runtime.database_generate_id = Some(Arc::new(f));
        self
    }

    pub fn log_handler(mut self, handler: Arc<dyn LogHandler>) -> Self {
        self.runtime.log_handler = Some(handler);
        self
    }

    /// Parse serializable settings from JSON. Runtime values start empty.
    pub fn from_json(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn plugins_iter(&self) -> impl Iterator<Item = &Arc<dyn FeaturePlugin>> {
        self.runtime.plugins.iter()
    }

    pub fn logger_config(&self) -> LoggerConfig {
        let opts = self.logger.clone().unwrap_or_default();
        LoggerConfig {
            disabled: opts.disabled,
            level: opts.level.unwrap_or(LogLevel::Warn),
            handler: self.runtime.log_handler.clone(),
        }
    }

    /// Layer a plugin's option patch onto these options.
    ///
    /// Objects merge recursively, arrays concatenate (winning side first) and
    /// `null` never overwrites. Runtime values are untouched.
    pub fn merge_patch(&mut self, patch: &Value, precedence: PluginOptionPrecedence) -> Result<()> {
        let current = serde_json::to_value(&*self)?;
        let merged = match precedence {
            PluginOptionPrecedence::ExistingWins => defu(current, patch.clone()),
            PluginOptionPrecedence::PluginWins => defu(patch.clone(), current),
        };
        let mut next: FeatureOptions = serde_json::from_value(merged)?;
        next.runtime = std::mem::take(&mut self.runtime);
        *self = next;
        Ok(())
    }
}

/// Fill `base` with `defaults`: keys set in `base` win, nested objects are
/// merged, arrays are concatenated and `null` in `base` is treated as unset.
pub fn defu(base: Value, defaults: Value) -> Value {
    match (base, defaults) {
        (Value::Object(base), Value::Object(mut out)) => {
            for (key, value) in base {
                if value.is_null() {
                    continue;
                }
                let merged = match (value, out.remove(&key)) {
                    (Value::Array(mut first), Some(Value::Array(rest))) => {
                        first.extend(rest);
                        Value::Array(first)
                    }
                    (value @ Value::Object(_), Some(default @ Value::Object(_))) => defu(value, default),
                    (value, _) => value,
                };
                out.insert(key, merged);
            }
            Value::Object(out)
        }
        (Value::Null, defaults) => defaults,
        (base, _) => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defu_base_wins_and_fills_gaps() {
        let out = defu(
            json!({ "appName": "Mine", "rateLimit": { "max": 5 } }),
            json!({ "appName": "Plugin", "rateLimit": { "max": 50, "window": 60 }, "basePath": "/x" }),
        );
        assert_eq!(
            out,
            json!({ "appName": "Mine", "rateLimit": { "max": 5, "window": 60 }, "basePath": "/x" })
        );
    }

    #[test]
    fn test_defu_concatenates_arrays_and_skips_null() {
        let out = defu(
            json!({ "trustedOrigins": ["https://a.com"], "secret": null }),
            json!({ "trustedOrigins": ["https://b.com"], "secret": "s" }),
        );
        assert_eq!(out["trustedOrigins"], json!(["https://a.com", "https://b.com"]));
        assert_eq!(out["secret"], "s");
    }

    #[test]
    fn test_merge_patch_existing_wins() {
        let mut options = FeatureOptions::new().app_name("User App");
        options
            .merge_patch(&json!({ "appName": "Plugin App", "basePath": "/feature" }), PluginOptionPrecedence::ExistingWins)
            .unwrap();
        assert_eq!(options.app_name.as_deref(), Some("User App"));
        assert_eq!(options.base_path.as_deref(), Some("/feature"));
    }

    #[test]
    fn test_merge_patch_plugin_wins() {
        let mut options = FeatureOptions::new().app_name("User App");
        options
            .merge_patch(&json!({ "appName": "Plugin App" }), PluginOptionPrecedence::PluginWins)
            .unwrap();
        assert_eq!(options.app_name.as_deref(), Some("Plugin App"));
    }

    #[test]
    fn test_merge_patch_keeps_runtime_and_extra() {
        #[derive(Debug)]
        struct Noop;
        impl DatabaseHooks for Noop {}

        let mut options = FeatureOptions::new().database_hooks(Noop);
        options
            .merge_patch(&json!({ "customFlag": true }), PluginOptionPrecedence::ExistingWins)
            .unwrap();
        assert!(options.runtime.database_hooks.is_some());
        assert_eq!(options.extra.get("customFlag"), Some(&json!(true)));
    }

    #[test]
    fn test_options_from_json() {
        let options = FeatureOptions::from_json(json!({
            "appName": "Demo",
            "baseURL": "http://localhost:3000",
            "rateLimit": { "storage": "secondary-storage", "fields": { "lastRequest": "last_request" } },
            "logger": { "level": "debug" },
            "pluginOptionPrecedence": "plugin-wins"
        }))
        .unwrap();
        assert_eq!(options.base_url.as_deref(), Some("http://localhost:3000"));
        let rate_limit = options.rate_limit.unwrap();
        assert_eq!(rate_limit.storage, Some(RateLimitStorage::SecondaryStorage));
        assert_eq!(rate_limit.fields.unwrap().last_request.as_deref(), Some("last_request"));
        assert_eq!(options.plugin_option_precedence, PluginOptionPrecedence::PluginWins);
        assert!(options.extra.is_empty());
    }

    #[test]
    fn test_logger_config_defaults_to_warn() {
        let config = FeatureOptions::new().logger_config();
        assert_eq!(config.level, LogLevel::Warn);
        assert!(!config.disabled);
    }
}
