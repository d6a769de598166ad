// Environment detection, env-sourced settings and tracing subscriber setup.

use std::sync::OnceLock;

static ENV_MODE: OnceLock<EnvMode> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvMode {
    Production,
    Development,
    Test,
}

/// Detect the environment mode once per process.
/// Checks `BETTER_AUTH_ENV`, `RUST_ENV`, then `NODE_ENV`.
pub fn detect_env_mode() -> EnvMode {
    *ENV_MODE.get_or_init(|| {
        let value = std::env::var("BETTER_AUTH_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .or_else(|_| std::env::var("NODE_ENV"))
            .unwrap_or_default();
        parse_env_mode(&value)
    })
}

pub fn parse_env_mode(value: &str) -> EnvMode {
    match value.to_lowercase().as_str() {
        "production" | "prod" => EnvMode::Production,
        "test" | "testing" => EnvMode::Test,
        _ => EnvMode::Development,
    }
}

pub fn is_production() -> bool {
    detect_env_mode() == EnvMode::Production
}

/// `BETTER_AUTH_SECRET`, falling back to `AUTH_SECRET`.
pub fn secret_from_env() -> Option<String> {
    non_empty_var("BETTER_AUTH_SECRET").or_else(|| non_empty_var("AUTH_SECRET"))
}

pub fn url_from_env() -> Option<String> {
    non_empty_var("BETTER_AUTH_URL")
}

/// Comma-separated `BETTER_AUTH_TRUSTED_ORIGINS`.
pub fn trusted_origins_from_env() -> Vec<String> {
    non_empty_var("BETTER_AUTH_TRUSTED_ORIGINS")
        .map(|v| split_origins(&v))
        .unwrap_or_default()
}

pub fn split_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Install the `tracing` subscriber. `RUST_LOG` wins over the defaults.
pub fn init_logger() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if is_production() {
            EnvFilter::new("better_feature=info")
        } else {
            EnvFilter::new("better_feature=debug")
        }
    });

    // A second call (tests, embedding apps) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
