// In-process endpoint surface: requests, responses and the endpoints plugins
// contribute. There is no HTTP transport here; a server integration converts
// its own request type into `FeatureRequest`.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;

use better_feature_core::error::FeatureError;

use super::endpoint_pipeline::HookEndpointContext;
use super::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            other => Err(FeatureError::Validation(format!("unsupported method \"{other}\""))),
        }
    }
}

// ─── Endpoints ──────────────────────────────────────────────────

pub type EndpointFuture = Pin<Box<dyn Future<Output = Result<Value, ApiError>> + Send>>;
pub type EndpointHandler = Arc<dyn Fn(HookEndpointContext) -> EndpointFuture + Send + Sync>;

/// One route contributed by a plugin. `path` is relative to the base path.
#[derive(Clone)]
pub struct PluginEndpoint {
    pub path: String,
    pub method: HttpMethod,
    pub handler: EndpointHandler,
}

impl PluginEndpoint {
    pub fn new<F, Fut>(method: HttpMethod, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(HookEndpointContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
    {
        Self {
            path: path.into(),
            method,
            handler: Arc::new(move |ctx| Box::pin(handler(ctx))),
        }
    }

    pub fn get<F, Fut>(path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(HookEndpointContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
    {
        Self::new(HttpMethod::Get, path, handler)
    }

    pub fn post<F, Fut>(path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(HookEndpointContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
    {
        Self::new(HttpMethod::Post, path, handler)
    }
}

impl fmt::Debug for PluginEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginEndpoint")
            .field("method", &self.method)
            .field("path", &self.path)
            .finish()
    }
}

// ─── Request / Response ─────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FeatureRequest {
    pub method: HttpMethod,
    /// Full path, with or without the base path.
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
    pub query: Option<Value>,
}

impl FeatureRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HashMap::new(),
            body: None,
            query: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Post, path).body(body)
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query(mut self, query: Value) -> Self {
        self.query = Some(query);
        self
    }

    /// Header names are stored lowercase.
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name.as_ref().to_lowercase(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Value,
}

impl FeatureResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, headers: HashMap::new(), body }
    }

    pub fn error(err: &ApiError) -> Self {
        Self { status: err.status, headers: HashMap::new(), body: err.to_json() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parsing() {
        assert_eq!("post".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
        assert!("TRACE".parse::<HttpMethod>().is_err());
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
    }

    #[test]
    fn test_request_headers_are_lowercased() {
        let req = FeatureRequest::get("/ok").header("X-Request-Id", "1");
        assert_eq!(req.headers.get("x-request-id").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_error_response() {
        let res = FeatureResponse::error(&ApiError::not_found("missing"));
        assert_eq!(res.status, 404);
        assert!(!res.is_success());
        assert_eq!(res.body["code"], "NOT_FOUND");
    }
}
