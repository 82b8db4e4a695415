// ── Property synchronization ──
//
// `Controller::sync` binds one property (possibly on a nested store,
// via a dotted path) to two consumers: a controller change handler and a
// view refresh handler. Handler names derive from the property:
//
//   accessor      get<Property>
//   handler       <property>DidChange
//   view handler  refresh<Full.Path.Camel>PropertyOnView
//
// View pushes made while the view is unavailable are deferred. Only the
// latest deferred push is delivered once the view becomes available.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;
use tracing::{debug, trace};
use trellis_api::util::camel_case;

use crate::controller::{
    Accessor, ChangeHandler, Controller, ControllerInner, FilterFn, LifecycleState,
};
use crate::error::CoreError;
use crate::store::{ListenerId, PropertyStore, change_event};
use crate::view::{AVAILABLE, View};

/// Which changes a binding dispatches.
#[derive(Clone, Default)]
pub enum Filter {
    #[default]
    Always,
    /// A filter from the controller definition's filter table.
    Named(String),
    Func(FilterFn),
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("Always"),
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Func(_) => f.write_str("Func(..)"),
        }
    }
}

/// Per-binding overrides for [`Controller::sync_with`].
#[derive(Clone)]
pub struct SyncOptions {
    accessor: Option<String>,
    handler: Option<String>,
    view_handler: Option<String>,
    filter: Filter,
    trigger: bool,
    trigger_view: bool,
    callback: Option<ChangeHandler>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            accessor: None,
            handler: None,
            view_handler: None,
            filter: Filter::Always,
            trigger: false,
            trigger_view: true,
            callback: None,
        }
    }
}

impl SyncOptions {
    pub fn accessor(mut self, name: impl Into<String>) -> Self {
        self.accessor = Some(name.into());
        self
    }

    pub fn handler(mut self, name: impl Into<String>) -> Self {
        self.handler = Some(name.into());
        self
    }

    pub fn view_handler(mut self, name: impl Into<String>) -> Self {
        self.view_handler = Some(name.into());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Dispatch once immediately after binding.
    pub fn trigger(mut self, enabled: bool) -> Self {
        self.trigger = enabled;
        self
    }

    /// Push the current value to the view immediately after binding.
    pub fn trigger_view(mut self, enabled: bool) -> Self {
        self.trigger_view = enabled;
        self
    }

    /// Extra handler invoked after the named one.
    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Controller, &Value, &Value) + 'static,
    {
        self.callback = Some(Rc::new(callback));
        self
    }
}

impl fmt::Debug for SyncOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOptions")
            .field("accessor", &self.accessor)
            .field("handler", &self.handler)
            .field("view_handler", &self.view_handler)
            .field("filter", &self.filter)
            .field("trigger", &self.trigger)
            .field("trigger_view", &self.trigger_view)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Name of the view refresh handler for a property path.
pub fn view_handler_name(path: &str) -> String {
    let camel: String = path.split('.').map(camel_case).collect();
    format!("refresh{camel}PropertyOnView")
}

// ── Binding ──────────────────────────────────────────────────────────

/// A live property binding. Owned by its controller; listeners hold
/// weak references only.
pub(crate) struct SyncBinding {
    path: String,
    property: String,
    target: PropertyStore,
    view: View,
    controller: Weak<ControllerInner>,
    accessor: Option<Accessor>,
    handler: Option<ChangeHandler>,
    callback: Option<ChangeHandler>,
    view_handler: String,
    filter: Option<FilterFn>,
    previous: RefCell<Value>,
    pending: RefCell<Option<(Value, Value)>>,
    change_listener: Cell<Option<ListenerId>>,
    availability_listener: Cell<Option<ListenerId>>,
}

impl SyncBinding {
    /// Current value through the accessor, or straight from the store.
    fn read(&self) -> Value {
        match self.accessor {
            Some(ref accessor) => accessor(&self.target),
            None => self.target.get(&self.property),
        }
    }

    fn passes(&self, current: &Value, previous: &Value) -> bool {
        self.filter
            .as_ref()
            .is_none_or(|filter| filter(current, previous))
    }

    fn dispatch(self: &Rc<Self>) {
        let current = self.read();
        let previous = self.previous.borrow().clone();

        if self.passes(&current, &previous) {
            if let Some(inner) = self.controller.upgrade() {
                let controller = Controller::from_inner(inner);
                if let Some(ref handler) = self.handler {
                    handler(&controller, &current, &previous);
                }
                if let Some(ref callback) = self.callback {
                    callback(&controller, &current, &previous);
                }
            }
            self.push_view(current.clone(), previous);
        } else {
            trace!(path = %self.path, "change filtered out");
        }

        *self.previous.borrow_mut() = current;
    }

    fn push_view(self: &Rc<Self>, current: Value, previous: Value) {
        if self.view.is_available() {
            self.apply(&current, &previous);
            return;
        }

        trace!(path = %self.path, "view unavailable, deferring refresh");
        *self.pending.borrow_mut() = Some((current, previous));
        if self.availability_listener.get().is_some() {
            return;
        }
        let weak = Rc::downgrade(self);
        let id = self.view.props().on(change_event(AVAILABLE), move |_| {
            if let Some(binding) = weak.upgrade() {
                binding.flush();
            }
        });
        self.availability_listener.set(Some(id));
    }

    fn flush(&self) {
        if !self.view.is_available() {
            return;
        }
        if let Some(id) = self.availability_listener.take() {
            self.view.props().off(id);
        }
        let pending = self.pending.borrow_mut().take();
        if let Some((current, previous)) = pending {
            self.apply(&current, &previous);
        }
    }

    fn apply(&self, current: &Value, previous: &Value) {
        match self.view.handler(&self.view_handler) {
            Some(handler) => handler(current, previous),
            None => trace!(handler = %self.view_handler, "no view handler"),
        }
    }

    fn detach(&self) {
        if let Some(id) = self.change_listener.take() {
            self.target.off(id);
        }
        if let Some(id) = self.availability_listener.take() {
            self.view.props().off(id);
        }
        self.pending.borrow_mut().take();
    }
}

// ── Controller API ───────────────────────────────────────────────────

impl Controller {
    /// Bind `path` with default options.
    pub fn sync(&self, path: &str) -> Result<&Self, CoreError> {
        self.sync_with(path, SyncOptions::default())
    }

    /// Bind `path` and also call `callback` on every change, starting
    /// with an immediate dispatch.
    pub fn sync_fn<F>(&self, path: &str, callback: F) -> Result<&Self, CoreError>
    where
        F: Fn(&Controller, &Value, &Value) + 'static,
    {
        self.sync_with(path, SyncOptions::default().trigger(true).callback(callback))
    }

    /// Bind `path` (a property name, or `a.b.prop` through nested stores).
    /// Every call creates an independent binding.
    pub fn sync_with(&self, path: &str, options: SyncOptions) -> Result<&Self, CoreError> {
        let unresolved = || CoreError::UnresolvedPath {
            path: path.to_owned(),
        };
        let segments: Vec<&str> = path.split('.').collect();
        let (property, parents) = segments.split_last().ok_or_else(unresolved)?;
        if property.is_empty() {
            return Err(unresolved());
        }
        let target = self.props().resolve(parents).ok_or_else(unresolved)?;
        let view = self.require_view()?;
        let def = self.def();
        if self.state() >= LifecycleState::Unloaded {
            return Err(CoreError::Configuration {
                controller: def.name.clone(),
                message: format!("cannot sync '{path}' after unload"),
            });
        }

        let accessor_name = options
            .accessor
            .unwrap_or_else(|| format!("get{}", camel_case(property)));
        let handler_name = options
            .handler
            .unwrap_or_else(|| format!("{property}DidChange"));
        let filter = match options.filter {
            Filter::Always => None,
            Filter::Func(f) => Some(f),
            Filter::Named(name) => Some(def.filters.get(&name).cloned().ok_or_else(|| {
                CoreError::Definition {
                    owner: format!("controller '{}'", def.name),
                    message: format!("sync of '{path}' names unknown filter '{name}'"),
                }
            })?),
        };

        let binding = Rc::new(SyncBinding {
            path: path.to_owned(),
            property: (*property).to_owned(),
            target: target.clone(),
            view,
            controller: self.downgrade(),
            accessor: def.accessors.get(&accessor_name).cloned(),
            handler: def.handlers.get(&handler_name).cloned(),
            callback: options.callback,
            view_handler: options
                .view_handler
                .unwrap_or_else(|| view_handler_name(path)),
            filter,
            previous: RefCell::new(Value::Null),
            pending: RefCell::new(None),
            change_listener: Cell::new(None),
            availability_listener: Cell::new(None),
        });

        let weak = Rc::downgrade(&binding);
        let id = target.on(change_event(property), move |_| {
            if let Some(binding) = weak.upgrade() {
                binding.dispatch();
            }
        });
        binding.change_listener.set(Some(id));

        let weak = Rc::downgrade(&binding);
        self.add_teardown(move || {
            if let Some(binding) = weak.upgrade() {
                binding.detach();
            }
        });
        self.push_binding(Rc::clone(&binding));
        debug!(controller = %def.name, path, "property synced");

        if options.trigger_view {
            binding.push_view(binding.read(), Value::Null);
        }
        if options.trigger {
            target.trigger(&change_event(property));
        }
        Ok(self)
    }
}
