// ── Observable property store ──
//
// Named dynamic values with change notification. Models, controllers,
// and views all keep their attributes here; sync bindings and delegate
// watchers subscribe to `change:<name>` events.

mod listeners;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::trace;

use listeners::Listeners;
pub use listeners::ListenerId;

/// Payload delivered to listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub event: String,
    pub value: Value,
    pub previous: Value,
}

/// Event name emitted when property `name` changes.
pub fn change_event(name: &str) -> String {
    format!("change:{name}")
}

/// Shared, single-threaded property store.
///
/// Cloning yields another handle to the same store. Setting a property
/// to a value equal to its current one is a no-op: nothing is stored and
/// no event is emitted.
#[derive(Clone, Default)]
pub struct PropertyStore {
    inner: Rc<RefCell<StoreInner>>,
}

#[derive(Default)]
struct StoreInner {
    values: IndexMap<String, Value>,
    children: IndexMap<String, PropertyStore>,
    listeners: Listeners,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store with the given properties declared as `null`.
    pub fn with_properties<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        {
            let mut inner = store.inner.borrow_mut();
            for name in names {
                inner.values.entry(name.into()).or_insert(Value::Null);
            }
        }
        store
    }

    // ── Values ───────────────────────────────────────────────────────

    /// Current value of `name`, or `null` when unset.
    pub fn get(&self, name: &str) -> Value {
        self.inner
            .borrow()
            .values
            .get(name)
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn has(&self, name: &str) -> bool {
        self.inner.borrow().values.contains_key(name)
    }

    /// Store `value` under `name` and emit `change:<name>` if it differs
    /// from the current value. Returns whether anything changed.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        let previous = {
            let mut inner = self.inner.borrow_mut();
            if inner.values.get(name) == Some(&value) {
                return false;
            }
            inner
                .values
                .insert(name.to_owned(), value.clone())
                .unwrap_or(Value::Null)
        };
        trace!(property = name, "property changed");
        self.emit(&Change {
            event: change_event(name),
            value,
            previous,
        });
        true
    }

    /// Set every entry of `values`, in order. Returns the number of
    /// properties that changed.
    pub fn set_many(&self, values: &Map<String, Value>) -> usize {
        values
            .iter()
            .filter(|(name, value)| self.set(name, (*value).clone()))
            .count()
    }

    /// Property names in declaration order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.borrow().values.keys().cloned().collect()
    }

    pub fn snapshot(&self) -> Map<String, Value> {
        self.inner
            .borrow()
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    // ── Nested stores ────────────────────────────────────────────────

    /// Hold another store under `name`, making `name.<prop>` paths
    /// resolvable from this one.
    pub fn set_object(&self, name: impl Into<String>, store: PropertyStore) {
        self.inner.borrow_mut().children.insert(name.into(), store);
    }

    pub fn object(&self, name: &str) -> Option<PropertyStore> {
        self.inner.borrow().children.get(name).cloned()
    }

    /// Walk nested stores along `segments`. An empty path resolves to
    /// this store.
    pub fn resolve(&self, segments: &[&str]) -> Option<PropertyStore> {
        segments
            .iter()
            .try_fold(self.clone(), |store, segment| store.object(segment))
    }

    // ── Events ───────────────────────────────────────────────────────

    pub fn on<F>(&self, event: impl Into<String>, callback: F) -> ListenerId
    where
        F: Fn(&Change) + 'static,
    {
        self.inner
            .borrow_mut()
            .listeners
            .add(event.into(), false, Rc::new(callback))
    }

    /// Like [`on`](Self::on), but the listener is removed after it fires
    /// once.
    pub fn once<F>(&self, event: impl Into<String>, callback: F) -> ListenerId
    where
        F: Fn(&Change) + 'static,
    {
        self.inner
            .borrow_mut()
            .listeners
            .add(event.into(), true, Rc::new(callback))
    }

    /// Detach a listener. Returns `false` if it was already gone.
    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.borrow_mut().listeners.remove(id)
    }

    /// Detach every listener on this store.
    pub fn off_all(&self) {
        self.inner.borrow_mut().listeners.clear();
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.inner.borrow().listeners.count(event)
    }

    pub fn total_listeners(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    /// Emit `event` without changing anything. For `change:<name>` events
    /// listeners receive the current value as both `value` and
    /// `previous`; other events carry `null`.
    pub fn trigger(&self, event: &str) {
        let value = event
            .strip_prefix("change:")
            .map_or(Value::Null, |name| self.get(name));
        self.emit(&Change {
            event: event.to_owned(),
            previous: value.clone(),
            value,
        });
    }

    /// Whether both handles point at the same store.
    pub fn ptr_eq(&self, other: &PropertyStore) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn emit(&self, change: &Change) {
        // Collect first so callbacks may freely read, write, and
        // (un)subscribe on this store.
        let callbacks = self.inner.borrow_mut().listeners.take_matching(&change.event);
        for callback in callbacks {
            callback(change);
        }
    }
}

impl fmt::Debug for PropertyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("PropertyStore")
            .field("values", &inner.values)
            .field("children", &inner.children.keys().collect::<Vec<_>>())
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}
