// Database lifecycle hooks run by the internal adapter around create and
// update. Hook sets run strictly in order: plugin hooks in plugin order, then
// the top-level `databaseHooks`.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use better_feature_core::error::Result;

// ─── Hook Results ───────────────────────────────────────────────

/// What a before-hook decided.
#[derive(Debug, Clone, PartialEq)]
pub enum BeforeHookOutcome {
    /// Proceed with the payload unchanged.
    Continue,
    /// Proceed with this payload instead.
    Transform(Value),
    /// Skip persistence and the remaining hooks; the value is returned to the
    /// caller as the operation's result.
    ShortCircuit(Option<Value>),
}

/// Result of running a whole before-hook chain.
#[derive(Debug, Clone, PartialEq)]
pub enum HookFlow {
    Proceed(Value),
    ShortCircuit(Option<Value>),
}

// ─── Hook Trait ─────────────────────────────────────────────────

/// One set of database hooks. `model` is the logical table key.
///
/// Errors from any hook abort the operation and reach the caller.
#[async_trait]
pub trait DatabaseHooks: Send + Sync + fmt::Debug {
    async fn before_create(&self, _model: &str, _data: &Value) -> Result<BeforeHookOutcome> {
        Ok(BeforeHookOutcome::Continue)
    }

    /// Observes the persisted record.
    async fn after_create(&self, _model: &str, _record: &Value) -> Result<()> {
        Ok(())
    }

    async fn before_update(&self, _model: &str, _data: &Value) -> Result<BeforeHookOutcome> {
        Ok(BeforeHookOutcome::Continue)
    }

    /// For `update` this is the updated record; for `update_many` it is the
    /// applied update payload.
    async fn after_update(&self, _model: &str, _record: &Value) -> Result<()> {
        Ok(())
    }
}

// ─── Hook Chain ─────────────────────────────────────────────────

/// Ordered hook sets.
#[derive(Default, Clone)]
pub struct HookChain {
    hooks: Vec<Arc<dyn DatabaseHooks>>,
}

impl HookChain {
    pub fn new(hooks: Vec<Arc<dyn DatabaseHooks>>) -> Self {
        Self { hooks }
    }

    pub fn push(&mut self, hook: Arc<dyn DatabaseHooks>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub async fn run_before_create(&self, model: &str, data: Value) -> Result<HookFlow> {
        let mut current = data;
        for hook in &self.hooks {
            match hook.before_create(model, &current).await? {
                BeforeHookOutcome::Continue => {}
                BeforeHookOutcome::Transform(next) => current = next,
                BeforeHookOutcome::ShortCircuit(result) => return Ok(HookFlow::ShortCircuit(result)),
            }
        }
        Ok(HookFlow::Proceed(current))
    }

    pub async fn run_after_create(&self, model: &str, record: &Value) -> Result<()> {
        for hook in &self.hooks {
            hook.after_create(model, record).await?;
        }
        Ok(())
    }

    pub async fn run_before_update(&self, model: &str, data: Value) -> Result<HookFlow> {
        let mut current = data;
        for hook in &self.hooks {
            match hook.before_update(model, &current).await? {
                BeforeHookOutcome::Continue => {}
                BeforeHookOutcome::Transform(next) => current = next,
                BeforeHookOutcome::ShortCircuit(result) => return Ok(HookFlow::ShortCircuit(result)),
            }
        }
        Ok(HookFlow::Proceed(current))
    }

    pub async fn run_after_update(&self, model: &str, record: &Value) -> Result<()> {
        for hook in &self.hooks {
            hook.after_update(model, record).await?;
        }
        Ok(())
    }
}

impl fmt::Debug for HookChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookChain").field("hook_count", &self.hooks.len()).finish()
    }
}

// ─── Closure hooks ──────────────────────────────────────────────

pub type HookFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;
type BeforeFn = Arc<dyn Fn(Value) -> HookFuture<BeforeHookOutcome> + Send + Sync>;
type AfterFn = Arc<dyn Fn(Value) -> HookFuture<()> + Send + Sync>;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
enum Slot {
    CreateBefore,
    CreateAfter,
    UpdateBefore,
    UpdateAfter,
}

/// `databaseHooks` as per-table closures:
///
/// ```rust
/// use better_feature::db::hooks::{BeforeHookOutcome, TableHooks};
/// use serde_json::json;
///
/// let hooks = TableHooks::new().on_create_before("tester", |data| async move {
///     let mut data = data;
///     data["name"] = json!(data["name"].as_str().unwrap_or_default().to_lowercase());
///     Ok(BeforeHookOutcome::Transform(data))
/// });
/// ```
#[derive(Clone, Default)]
pub struct TableHooks {
    before: HashMap<(String, Slot), Vec<BeforeFn>>,
    after: HashMap<(String, Slot), Vec<AfterFn>>,
}

impl TableHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_create_before<F, Fut>(self, table: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<BeforeHookOutcome>> + Send + 'static,
    {
        self.before_slot(table.into(), Slot::CreateBefore, f)
    }

    pub fn on_create_after<F, Fut>(self, table: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.after_slot(table.into(), Slot::CreateAfter, f)
    }

    pub fn on_update_before<F, Fut>(self, table: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<BeforeHookOutcome>> + Send + 'static,
    {
        self.before_slot(table.into(), Slot::UpdateBefore, f)
    }

    pub fn on_update_after<F, Fut>(self, table: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.after_slot(table.into(), Slot::UpdateAfter, f)
    }

    fn before_slot<F, Fut>(mut self, table: String, slot: Slot, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<BeforeHookOutcome>> + Send + 'static,
    {
        let f: BeforeFn = Arc::new(move |v| Box::pin(f(v)));
        self.before.entry((table, slot)).or_default().push(f);
        self
    }

    fn after_slot<F, Fut>(mut self, table: String, slot: Slot, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let f: AfterFn = Arc::new(move |v| Box::pin(f(v)));
        self.after.entry((table, slot)).or_default().push(f);
        self
    }

    async fn run_before(&self, model: &str, slot: Slot, data: &Value) -> Result<BeforeHookOutcome> {
        let Some(fns) = self.before.get(&(model.to_string(), slot)) else {
            return Ok(BeforeHookOutcome::Continue);
        };
        let mut current: Option<Value> = None;
        for f in fns {
            let input = current.clone().unwrap_or_else(|| data.clone());
            match f(input).await? {
                BeforeHookOutcome::Continue => {}
                BeforeHookOutcome::Transform(next) => current = Some(next),
                short @ BeforeHookOutcome::ShortCircuit(_) => return Ok(short),
            }
        }
        Ok(current.map_or(BeforeHookOutcome::Continue, BeforeHookOutcome::Transform))
    }

    async fn run_after(&self, model: &str, slot: Slot, record: &Value) -> Result<()> {
        if let Some(fns) = self.after.get(&(model.to_string(), slot)) {
            for f in fns {
                f(record.clone()).await?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for TableHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tables: Vec<&str> = self
            .before
            .keys()
            .chain(self.after.keys())
            .map(|(t, _)| t.as_str())
            .collect();
        tables.sort_unstable();
        tables.dedup();
        f.debug_struct("TableHooks").field("tables", &tables).finish()
    }
}

#[async_trait]
impl DatabaseHooks for TableHooks {
    async fn before_create(&self, model: &str, data: &Value) -> Result<BeforeHookOutcome> {
        self.run_before(model, Slot::CreateBefore, data).await
    }

    async fn after_create(&self, model: &str, record: &Value) -> Result<()> {
        self.run_after(model, Slot::CreateAfter, record).await
    }

    async fn before_update(&self, model: &str, data: &Value) -> Result<BeforeHookOutcome> {
        self.run_before(model, Slot::UpdateBefore, data).await
    }

    async fn after_update(&self, model: &str, record: &Value) -> Result<()> {
        self.run_after(model, Slot::UpdateAfter, record).await
    }
}

// ─── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use better_feature_core::error::FeatureError;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct TrackingHook {
        after_create: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl DatabaseHooks for TrackingHook {
        async fn after_create(&self, _model: &str, record: &Value) -> Result<()> {
            self.after_create.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_empty_chain_passes_through() {
        let chain = HookChain::default();
        assert!(chain.is_empty());
        let data = json!({ "name": "a" });
        let flow = chain.run_before_create("tester", data.clone()).await.unwrap();
        assert_eq!(flow, HookFlow::Proceed(data));
    }

    #[tokio::test]
    async fn test_transform_is_visible_to_next_hook() {
        let seen = Arc::new(AtomicU32::new(0));
        let counter = seen.clone();
        let first = TableHooks::new().on_create_before("tester", |mut data| async move {
            data["step"] = json!(1);
            Ok(BeforeHookOutcome::Transform(data))
        });
        let second = TableHooks::new().on_create_before("tester", move |data| {
            let counter = counter.clone();
            async move {
                assert_eq!(data["step"], 1);
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(BeforeHookOutcome::Transform(json!({ "step": 2 })))
            }
        });
        let chain = HookChain::new(vec![Arc::new(first), Arc::new(second)]);
        let flow = chain.run_before_create("tester", json!({ "name": "a" })).await.unwrap();
        // Transform replaces the payload whole.
        assert_eq!(flow, HookFlow::Proceed(json!({ "step": 2 })));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_short_circuit_stops_chain() {
        let never = TableHooks::new().on_create_before("tester", |_| async {
            Err(FeatureError::Other("should not run".into()))
        });
        let dry_run = TableHooks::new().on_create_before("tester", |data| async move {
            Ok(BeforeHookOutcome::ShortCircuit(Some(data)))
        });
        let chain = HookChain::new(vec![Arc::new(dry_run), Arc::new(never)]);
        let flow = chain.run_before_create("tester", json!({ "name": "a" })).await.unwrap();
        assert_eq!(flow, HookFlow::ShortCircuit(Some(json!({ "name": "a" }))));
    }

    #[tokio::test]
    async fn test_hooks_only_fire_for_their_table() {
        let hooks = TableHooks::new().on_update_before("tester", |_| async {
            Ok(BeforeHookOutcome::ShortCircuit(None))
        });
        let chain = HookChain::new(vec![Arc::new(hooks)]);
        let other = chain.run_before_update("session", json!({})).await.unwrap();
        assert_eq!(other, HookFlow::Proceed(json!({})));
        let tester = chain.run_before_update("tester", json!({})).await.unwrap();
        assert_eq!(tester, HookFlow::ShortCircuit(None));
    }

    #[tokio::test]
    async fn test_after_hooks_run_in_order_and_propagate_errors() {
        let tracking = Arc::new(TrackingHook::default());
        let failing = TableHooks::new().on_create_after("tester", |_| async {
            Err(FeatureError::Other("after failed".into()))
        });
        let chain = HookChain::new(vec![tracking.clone(), Arc::new(failing)]);
        let err = chain.run_after_create("tester", &json!({ "id": "1" })).await.unwrap_err();
        assert_eq!(err.to_string(), "after failed");
        assert_eq!(tracking.after_create.lock().unwrap().len(), 1);
    }
}
