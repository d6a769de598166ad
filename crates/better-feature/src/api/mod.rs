// In-process API: endpoints, the before/after hook pipeline, routing and
// request-scoped state.

pub mod endpoint;
pub mod endpoint_pipeline;
pub mod error;
pub mod request_state;
pub mod router;

pub use endpoint::{FeatureRequest, FeatureResponse, HttpMethod, PluginEndpoint};
pub use endpoint_pipeline::{
    run_after_hooks, run_before_hooks, ContextModification, HookEndpointContext, HookEntry, HookResult,
    PluginHooks,
};
pub use error::ApiError;
pub use request_state::RequestLocals;
pub use router::{check_endpoint_conflicts, EndpointConflict, Router};
