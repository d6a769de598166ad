// URL helpers for base URL resolution and trusted origins.

use url::Url;

use crate::env;
use crate::error::{FeatureError, Result};

pub const DEFAULT_BASE_PATH: &str = "/api/auth";

/// `https://example.com/path` -> `https://example.com`. `None` when unparsable.
pub fn get_origin(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    match parsed.origin() {
        origin @ url::Origin::Tuple(..) => Some(origin.ascii_serialization()),
        url::Origin::Opaque(_) => None,
    }
}

/// Whether the URL carries a path beyond `/`.
pub fn has_path(url: &str) -> bool {
    Url::parse(url)
        .map(|u| {
            let path = u.path().trim_end_matches('/');
            !path.is_empty()
        })
        .unwrap_or(false)
}

/// Attach `path` to `url` unless the URL already has its own path.
pub fn with_path(url: &str, path: Option<&str>) -> Result<String> {
    let parsed = Url::parse(url)
        .map_err(|e| FeatureError::Configuration(format!("Invalid base URL \"{url}\": {e}")))?;
    if has_path(url) {
        return Ok(parsed.as_str().trim_end_matches('/').to_string());
    }
    let path = path.unwrap_or(DEFAULT_BASE_PATH);
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    let origin = get_origin(url).ok_or_else(|| {
        FeatureError::Configuration(format!("Base URL \"{url}\" has no origin"))
    })?;
    Ok(format!("{}{}", origin, path.trim_end_matches('/')))
}

/// Resolve the full base URL (`origin + basePath`).
///
/// Falls back to `BETTER_AUTH_URL`; returns `Ok(None)` when neither is set.
pub fn get_base_url(base_url: Option<&str>, path: Option<&str>) -> Result<Option<String>> {
    let from_env = env::url_from_env();
    match base_url.filter(|u| !u.is_empty()).or(from_env.as_deref()) {
        Some(url) => with_path(url, path).map(Some),
        None => Ok(None),
    }
}
