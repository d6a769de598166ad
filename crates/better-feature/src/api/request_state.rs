// Request-scoped state shared between the hooks and the endpoint of a single
// request. Values are keyed by type; each request starts with an empty store.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

type Slots = HashMap<TypeId, Box<dyn Any + Send + Sync>>;

/// Cloning shares the store: a hook that clones the locals into its future
/// writes to the same slots the endpoint later reads.
#[derive(Clone, Default)]
pub struct RequestLocals {
    inner: Arc<Mutex<Slots>>,
}

impl RequestLocals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: Any + Send + Sync + Clone>(&self) -> Option<T> {
        let guard = self.inner.lock().ok()?;
        guard.get(&TypeId::of::<T>()).and_then(|v| v.downcast_ref::<T>()).cloned()
    }

    /// Overwrites any previous value of the same type.
    pub fn set<T: Any + Send + Sync>(&self, value: T) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.insert(TypeId::of::<T>(), Box::new(value));
        }
    }

    pub fn has<T: Any + Send + Sync>(&self) -> bool {
        self.inner
            .lock()
            .map(|guard| guard.contains_key(&TypeId::of::<T>()))
            .unwrap_or(false)
    }

    pub fn remove<T: Any + Send + Sync>(&self) -> Option<T> {
        let mut guard = self.inner.lock().ok()?;
        guard.remove(&TypeId::of::<T>()).and_then(|v| v.downcast::<T>().ok()).map(|v| *v)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for RequestLocals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLocals").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Pool(&'static str);

    #[test]
    fn test_set_get_remove() {
        let locals = RequestLocals::new();
        assert!(!locals.has::<Pool>());
        locals.set(Pool("a"));
        assert_eq!(locals.get::<Pool>(), Some(Pool("a")));
        locals.set(Pool("b"));
        assert_eq!(locals.len(), 1);
        assert_eq!(locals.remove::<Pool>(), Some(Pool("b")));
        assert!(locals.is_empty());
    }

    #[test]
    fn test_clones_share_slots_but_stores_do_not() {
        let first = RequestLocals::new();
        let shared = first.clone();
        shared.set(Pool("a"));
        assert_eq!(first.get::<Pool>(), Some(Pool("a")));

        let other = RequestLocals::new();
        assert!(other.get::<Pool>().is_none());
    }
}
