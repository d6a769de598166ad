// Request hook pipeline: ordered `matcher` + `handler` pairs that plugins
// register to run before and after endpoints.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use super::endpoint::HttpMethod;
use super::error::ApiError;
use super::request_state::RequestLocals;
use crate::context::FeatureContext;

/// What hooks and endpoints see for one request.
#[derive(Debug, Clone)]
pub struct HookEndpointContext {
    pub context: Arc<FeatureContext>,
    pub method: HttpMethod,
    /// Path relative to the base path, e.g. `/tester/list`.
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
    pub query: Option<Value>,
    pub response_headers: HashMap<String, String>,
    /// The endpoint's result, visible to after hooks.
    pub returned: Option<Value>,
    /// Request-scoped state.
    pub locals: RequestLocals,
}

impl HookEndpointContext {
    pub fn new(context: Arc<FeatureContext>, method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            context,
            method,
            path: path.into(),
            headers: HashMap::new(),
            body: None,
            query: None,
            response_headers: HashMap::new(),
            returned: None,
            locals: RequestLocals::new(),
        }
    }

    /// A top-level string member of the body.
    pub fn body_str(&self, key: &str) -> Option<&str> {
        self.body.as_ref()?.get(key)?.as_str()
    }

    /// A query parameter, accepting numbers sent as strings.
    pub fn query_i64(&self, key: &str) -> Option<i64> {
        let value = self.query.as_ref()?.get(key)?;
        value.as_i64().or_else(|| value.as_str()?.parse().ok())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }
}

// ─── Hooks ──────────────────────────────────────────────────────

pub type HookHandlerFuture = Pin<Box<dyn Future<Output = Result<HookResult, ApiError>> + Send>>;
type Matcher = Box<dyn Fn(&HookEndpointContext) -> bool + Send + Sync>;
type Handler = Box<dyn Fn(&mut HookEndpointContext) -> HookHandlerFuture + Send + Sync>;

/// A request hook. The handler gets `&mut` access to the request context
/// before its future is created; the future itself must own what it uses.
pub struct HookEntry {
    /// Set by the router from the contributing plugin.
    pub plugin_id: String,
    pub matcher: Matcher,
    pub handler: Handler,
}

impl HookEntry {
    pub fn new<M, H>(matcher: M, handler: H) -> Self
    where
        M: Fn(&HookEndpointContext) -> bool + Send + Sync + 'static,
        H: Fn(&mut HookEndpointContext) -> HookHandlerFuture + Send + Sync + 'static,
    {
        Self {
            plugin_id: String::new(),
            matcher: Box::new(matcher),
            handler: Box::new(handler),
        }
    }
}

impl fmt::Debug for HookEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookEntry").field("plugin_id", &self.plugin_id).finish()
    }
}

/// Before and after hooks of one plugin.
#[derive(Debug, Default)]
pub struct PluginHooks {
    pub before: Vec<HookEntry>,
    pub after: Vec<HookEntry>,
}

impl PluginHooks {
    pub fn before(mut self, hook: HookEntry) -> Self {
        self.before.push(hook);
        self
    }

    pub fn after(mut self, hook: HookEntry) -> Self {
        self.after.push(hook);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HookResult {
    Continue,
    /// Continue with these changes merged into the request.
    ContinueWith(ContextModification),
    /// Before hooks: answer the request now. After hooks: replace the
    /// response.
    Respond(Value),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextModification {
    pub headers: Option<HashMap<String, String>>,
    /// Object members are merged into the request body; anything else
    /// replaces it.
    pub body: Option<Value>,
    pub response_headers: Option<HashMap<String, String>>,
}

/// Run matching before hooks in order.
///
/// `Ok(Some(value))` means a hook answered the request.
pub async fn run_before_hooks(
    ctx: &mut HookEndpointContext,
    hooks: &[HookEntry],
) -> Result<Option<Value>, ApiError> {
    for hook in hooks {
        if !(hook.matcher)(ctx) {
            continue;
        }
        match (hook.handler)(ctx).await? {
            HookResult::Continue => {}
            HookResult::ContinueWith(changes) => apply_modification(ctx, changes),
            HookResult::Respond(value) => {
                tracing::debug!(plugin = %hook.plugin_id, path = %ctx.path, "before hook answered request");
                return Ok(Some(value));
            }
        }
    }
    Ok(None)
}

/// Run matching after hooks in order. Failures are logged and skipped.
pub async fn run_after_hooks(ctx: &mut HookEndpointContext, hooks: &[HookEntry]) -> Option<Value> {
    for hook in hooks {
        if !(hook.matcher)(ctx) {
            continue;
        }
        match (hook.handler)(ctx).await {
            Ok(HookResult::Respond(value)) => ctx.returned = Some(value),
            Ok(HookResult::ContinueWith(changes)) => {
                if let Some(headers) = changes.response_headers {
                    ctx.response_headers.extend(headers);
                }
            }
            Ok(HookResult::Continue) => {}
            Err(e) => {
                tracing::warn!("After hook error from plugin '{}': {}", hook.plugin_id, e.message);
            }
        }
    }
    ctx.returned.clone()
}

fn apply_modification(ctx: &mut HookEndpointContext, changes: ContextModification) {
    if let Some(headers) = changes.headers {
        ctx.headers.extend(headers.into_iter().map(|(k, v)| (k.to_lowercase(), v)));
    }
    if let Some(body) = changes.body {
        match (ctx.body.as_mut(), body) {
            (Some(Value::Object(current)), Value::Object(patch)) => current.extend(patch),
            (_, body) => ctx.body = Some(body),
        }
    }
    if let Some(headers) = changes.response_headers {
        ctx.response_headers.extend(headers);
    }
}
