// FeatureContext: the state a feature instance runs on. Built by `init`,
// changed only while plugin `init` hooks are folded, then shared read-only
// behind an `Arc` by every request.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use better_feature_core::db::adapter::{Adapter, SchemaOptions, SchemaStatus};
use better_feature_core::db::schema::TableSchemaMap;
use better_feature_core::db::secondary_storage::SecondaryStorage;
use better_feature_core::error::{FeatureError, Result};
use better_feature_core::logger::FeatureLogger;
use better_feature_core::utils::get_origin;
use better_feature_kysely::KyselyAdapter;

use crate::db::get_schema::get_schema;
use crate::db::internal_adapter::InternalAdapter;
use crate::options::{FeatureOptions, IdGenerator, RateLimitStorage};
use crate::plugin::{ContextOverrides, FeaturePlugin, RateLimitRule};

pub const MIGRATIONS_UNSUPPORTED: &str = "Database is not provided or it's an adapter. Migrations are only supported with a database instance.";

/// Resolved rate-limit policy. Plugin rules come after the global window.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitPolicy {
    pub enabled: bool,
    /// Seconds.
    pub window: u64,
    pub max: u64,
    pub storage: RateLimitStorage,
    pub model_name: String,
    pub rules: Vec<RateLimitRule>,
}

impl RateLimitPolicy {
    /// `(window, max)` for a path: the first matching plugin rule, else the
    /// global values.
    pub fn limits_for(&self, path: &str) -> (u64, u64) {
        self.rules
            .iter()
            .find(|rule| rule.matches(path))
            .map_or((self.window, self.max), |rule| (rule.window, rule.max))
    }
}

#[derive(Clone)]
pub struct FeatureContext {
    pub app_name: String,
    /// `origin + basePath`, when a base URL is known.
    pub base_url: Option<String>,
    pub base_path: String,
    pub secret: String,
    /// The options as folded so far; final once `init` returns.
    pub options: FeatureOptions,
    pub tables: Arc<TableSchemaMap>,
    pub trusted_origins: Vec<String>,
    pub rate_limit: RateLimitPolicy,
    pub logger: FeatureLogger,
    pub adapter: Arc<dyn Adapter>,
    pub internal_adapter: InternalAdapter,
    pub secondary_storage: Option<Arc<dyn SecondaryStorage>>,
    /// `$ERROR_CODES` of every plugin.
    pub error_codes: BTreeMap<String, String>,
    /// Values plugins attach to the context.
    pub extensions: Map<String, Value>,
    pub(crate) generate_id: IdGenerator,
    pub(crate) sql: Option<KyselyAdapter>,
}

impl FeatureContext {
    pub fn generate_id(&self, model: &str, size: Option<usize>) -> String {
        (self.generate_id)(model, size)
    }

    /// The SQL connection, for database-instance configurations.
    pub fn sql(&self) -> Option<&KyselyAdapter> {
        self.sql.as_ref()
    }

    pub fn has_plugin(&self, id: &str) -> bool {
        self.plugin(id).is_some()
    }

    pub fn plugin(&self, id: &str) -> Option<&Arc<dyn FeaturePlugin>> {
        self.options.plugins_iter().find(|p| p.id() == id)
    }

    /// Whether `url`'s origin is trusted. Patterns may use `*` in the host.
    pub fn is_trusted_origin(&self, url: &str) -> bool {
        let Some(origin) = get_origin(url) else {
            return false;
        };
        self.trusted_origins.iter().any(|pattern| {
            if pattern.contains('*') {
                wildcard_origin(pattern).is_some_and(|re| re.is_match(&origin))
            } else {
                pattern.trim_end_matches('/') == origin
            }
        })
    }

    /// Create the tables of `get_schema` and run plugin migrations.
    ///
    /// Only database-instance configurations (`kysely`, `legacy`) can
    /// migrate; adapters and the memory fallback cannot.
    pub async fn run_migrations(&self) -> Result<SchemaStatus> {
        let Some(sql) = &self.sql else {
            return Err(FeatureError::Configuration(MIGRATIONS_UNSUPPORTED.to_string()));
        };

        let schema = get_schema(&self.options);
        let status = sql.create_schema(&schema, &SchemaOptions { auto_migrate: true }).await?;

        for plugin in self.options.plugins_iter() {
            for migration in plugin.migrations() {
                tracing::debug!(plugin = plugin.id(), migration = %migration.name, "running plugin migration");
                sql.inner().execute_raw(&migration.up).await?;
            }
        }
        Ok(status)
    }

    /// Fold a plugin's context overrides. Nested values merge field by field.
    pub(crate) fn apply_overrides(&mut self, overrides: ContextOverrides) {
        if let Some(name) = overrides.app_name {
            self.app_name = name;
        }
        if let Some(url) = overrides.base_url {
            self.base_url = Some(url);
        }
        if let Some(origins) = overrides.trusted_origins {
            self.trusted_origins = origins;
        }
        if let Some(secret) = overrides.secret {
            self.secret = secret;
        }
        if let Some(rate_limit) = overrides.rate_limit {
            if let Some(enabled) = rate_limit.enabled {
                self.rate_limit.enabled = enabled;
            }
            if let Some(window) = rate_limit.window {
                self.rate_limit.window = window;
            }
            if let Some(max) = rate_limit.max {
                self.rate_limit.max = max;
            }
        }
        self.extensions.extend(overrides.extensions);
    }
}

impl fmt::Debug for FeatureContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureContext")
            .field("app_name", &self.app_name)
            .field("secret", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("base_path", &self.base_path)
            .field("trusted_origins", &self.trusted_origins)
            .field("rate_limit", &self.rate_limit)
            .field("tables", &self.tables.keys().collect::<Vec<_>>())
            .field("internal_adapter", &self.internal_adapter)
            .field("error_codes", &self.error_codes.len())
            .field("extensions", &self.extensions)
            .finish()
    }
}

/// `https://*.example.com` as an anchored regex; `*` stays within one label.
fn wildcard_origin(pattern: &str) -> Option<regex::Regex> {
    let escaped = regex::escape(pattern.trim_end_matches('/')).replace(r"\*", "[^./]*");
    regex::Regex::new(&format!("^{escaped}$")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::init;
    use crate::plugin::RateLimitOverrides;

    #[tokio::test]
    async fn test_trusted_origins() {
        let options = FeatureOptions::new()
            .base_url("https://example.com")
            .trusted_origin("https://app.example.com")
            .trusted_origin("https://*.preview.dev");
        let ctx = init(options).await.unwrap();
        assert!(ctx.is_trusted_origin("https://example.com/api"));
        assert!(ctx.is_trusted_origin("https://app.example.com/callback"));
        assert!(ctx.is_trusted_origin("https://pr-12.preview.dev"));
        assert!(!ctx.is_trusted_origin("https://a.b.preview.dev"));
        assert!(!ctx.is_trusted_origin("https://evil.com"));
        assert!(!ctx.is_trusted_origin("/relative"));
    }

    #[tokio::test]
    async fn test_migrations_need_a_database_instance() {
        let ctx = init(FeatureOptions::new()).await.unwrap();
        let err = ctx.run_migrations().await.unwrap_err();
        assert_eq!(err.to_string(), format!("Configuration error: {MIGRATIONS_UNSUPPORTED}"));
    }

    #[tokio::test]
    async fn test_overrides_merge_nested_fields() {
        let mut ctx = init(FeatureOptions::new()).await.unwrap();
        let max = ctx.rate_limit.max;
        ctx.apply_overrides(ContextOverrides {
            rate_limit: Some(RateLimitOverrides { window: Some(60), ..Default::default() }),
            ..ContextOverrides::default().app_name("X").extension("flag", Value::Bool(true))
        });
        assert_eq!(ctx.app_name, "X");
        assert_eq!(ctx.rate_limit.window, 60);
        assert_eq!(ctx.rate_limit.max, max);
        assert_eq!(ctx.extensions["flag"], true);
    }

    #[test]
    fn test_plugin_rule_wins_over_global_limits() {
        let policy = RateLimitPolicy {
            enabled: true,
            window: 10,
            max: 100,
            storage: RateLimitStorage::Memory,
            model_name: "rateLimit".into(),
            rules: vec![RateLimitRule { path: "/tester".into(), window: 60, max: 3 }],
        };
        assert_eq!(policy.limits_for("/tester/initiate"), (60, 3));
        assert_eq!(policy.limits_for("/ok"), (10, 100));
    }
}
