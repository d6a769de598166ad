// better-feature: plugin composition and context initialization.
//
// `better_feature(options)` resolves the database adapter, folds every
// plugin's `init` output into a `FeatureContext` and builds the in-process
// router that runs plugin endpoints through their request hooks.

pub mod api;
pub mod context;
pub mod db;
pub mod init;
pub mod options;
pub mod plugin;
pub mod plugins;

pub use better_feature_core::error::{FeatureError, Result};

pub use api::{ApiError, FeatureRequest, FeatureResponse, HttpMethod};
pub use context::{FeatureContext, RateLimitPolicy};
pub use db::{get_adapter, get_feature_tables, get_schema, DatabaseConfig, DatabaseHooks, InternalAdapter};
pub use init::{better_feature, init, BetterFeature};
pub use options::{FeatureOptions, PluginOptionPrecedence};
pub use plugin::{ContextOverrides, FeaturePlugin, PluginInitOutput, PluginOptions};
