// Route table and request dispatch: built-in routes, plugin endpoints and the
// plugins' request hooks, collected once when the instance is built.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use super::endpoint::{EndpointHandler, FeatureRequest, FeatureResponse, HttpMethod, PluginEndpoint};
use super::endpoint_pipeline::{run_after_hooks, run_before_hooks, HookEndpointContext, HookEntry};
use super::error::ApiError;
use crate::context::FeatureContext;

const CORE_ID: &str = "core";

/// Two plugins registering the same method and path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConflict {
    pub path: String,
    pub method: HttpMethod,
    pub plugin_ids: Vec<String>,
}

struct Route {
    plugin_id: String,
    handler: EndpointHandler,
}

pub struct Router {
    routes: HashMap<(HttpMethod, String), Route>,
    before: Vec<HookEntry>,
    after: Vec<HookEntry>,
    conflicts: Vec<EndpointConflict>,
}

impl Router {
    pub fn new(context: &FeatureContext) -> Self {
        let mut registrations: Vec<(String, PluginEndpoint)> =
            vec![(CORE_ID.to_string(), PluginEndpoint::get("/ok", |_| async { Ok(json!({ "ok": true })) }))];
        let mut before = Vec::new();
        let mut after = Vec::new();

        for plugin in context.options.plugins_iter() {
            let id = plugin.id().to_string();
            registrations.extend(plugin.endpoints().into_iter().map(|e| (id.clone(), e)));

            let hooks = plugin.hooks();
            before.extend(hooks.before.into_iter().map(|h| HookEntry { plugin_id: id.clone(), ..h }));
            after.extend(hooks.after.into_iter().map(|h| HookEntry { plugin_id: id.clone(), ..h }));
        }

        let conflicts = check_endpoint_conflicts(&registrations);
        for conflict in &conflicts {
            context.logger.error(&format!(
                "Endpoint conflict on {} {}: registered by {}. The first registration is used.",
                conflict.method,
                conflict.path,
                conflict.plugin_ids.join(", ")
            ));
        }

        let mut routes = HashMap::new();
        for (plugin_id, endpoint) in registrations {
            let key = (endpoint.method, normalize(&endpoint.path));
            routes.entry(key).or_insert(Route { plugin_id, handler: endpoint.handler });
        }

        Self { routes, before, after, conflicts }
    }

    pub fn conflicts(&self) -> &[EndpointConflict] {
        &self.conflicts
    }

    /// `(method, path, plugin id)` of every route, sorted by path.
    pub fn routes(&self) -> Vec<(HttpMethod, &str, &str)> {
        let mut routes: Vec<_> = self
            .routes
            .iter()
            .map(|((method, path), route)| (*method, path.as_str(), route.plugin_id.as_str()))
            .collect();
        routes.sort_by(|a, b| a.1.cmp(b.1).then(a.0.as_str().cmp(b.0.as_str())));
        routes
    }

    /// Route, run before hooks, the endpoint, then after hooks.
    pub async fn handle(&self, context: Arc<FeatureContext>, request: FeatureRequest) -> FeatureResponse {
        let path = strip_base_path(&request.path, &context.base_path);
        let Some(route) = self.routes.get(&(request.method, path.clone())) else {
            return FeatureResponse::error(&ApiError::not_found(format!(
                "No endpoint for {} {}",
                request.method, path
            )));
        };

        let mut ctx = HookEndpointContext::new(context, request.method, path);
        ctx.headers = request.headers;
        ctx.body = request.body;
        ctx.query = request.query.or_else(|| query_from_path(&request.path));

        match run_before_hooks(&mut ctx, &self.before).await {
            Ok(Some(value)) => return respond(&ctx, value),
            Ok(None) => {}
            Err(err) => return FeatureResponse::error(&err),
        }

        match (route.handler)(ctx.clone()).await {
            Ok(value) => ctx.returned = Some(value),
            Err(err) => {
                tracing::debug!(plugin = %route.plugin_id, path = %ctx.path, error = %err, "endpoint returned an error");
                return FeatureResponse::error(&err);
            }
        }

        let value = run_after_hooks(&mut ctx, &self.after).await.unwrap_or_default();
        respond(&ctx, value)
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes.len())
            .field("before_hooks", &self.before.len())
            .field("after_hooks", &self.after.len())
            .finish()
    }
}

fn respond(ctx: &HookEndpointContext, body: serde_json::Value) -> FeatureResponse {
    let mut response = FeatureResponse::ok(body);
    response.headers = ctx.response_headers.clone();
    response
}

/// Registrations sharing a method and path.
pub fn check_endpoint_conflicts(registrations: &[(String, PluginEndpoint)]) -> Vec<EndpointConflict> {
    let mut by_route: HashMap<(HttpMethod, String), Vec<String>> = HashMap::new();
    for (plugin_id, endpoint) in registrations {
        by_route
            .entry((endpoint.method, normalize(&endpoint.path)))
            .or_default()
            .push(plugin_id.clone());
    }
    let mut conflicts: Vec<EndpointConflict> = by_route
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|((method, path), plugin_ids)| EndpointConflict { path, method, plugin_ids })
        .collect();
    conflicts.sort_by(|a, b| a.path.cmp(&b.path));
    conflicts
}

/// `?a=1&b=x` as a JSON object of strings.
fn query_from_path(path: &str) -> Option<serde_json::Value> {
    let (_, query) = path.split_once('?')?;
    let map = url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), serde_json::Value::String(v.into_owned())))
        .collect();
    Some(serde_json::Value::Object(map))
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Drop the base path and any query string.
fn strip_base_path(path: &str, base_path: &str) -> String {
    let path = path.split('?').next().unwrap_or_default();
    let base = base_path.trim_end_matches('/');
    let relative = match path.strip_prefix(base) {
        Some(rest) if !base.is_empty() && (rest.is_empty() || rest.starts_with('/')) => rest,
        _ => path,
    };
    normalize(relative)
}
