// ── Controller lifecycle ──
//
// A controller mediates between model properties and a view. It is
// created from a shared `ControllerDef`, obtains its view during
// construction, and moves through setup, render, availability, unload,
// and destroy. Lifecycle notifications (`setup`, `view:ready`,
// `view:render`, `view:available`, `unload`) are emitted on the
// controller's own property store, which is also where the declared
// event map listens.

mod def;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;
use strum::Display;
use tokio::sync::watch;
use tracing::{debug, trace};

pub use def::{
    Accessor, Action, BindHook, ChangeHandler, ControllerDef, ControllerDefBuilder, FilterFn,
    Hook, ViewFactory,
};

use crate::error::CoreError;
use crate::model::Model;
use crate::store::{ListenerId, PropertyStore, change_event};
use crate::sync::SyncBinding;
use crate::validate::collect_failures;
use crate::view::{AVAILABLE, View};

// ── LifecycleState ───────────────────────────────────────────────────

/// Lifecycle stage, observable through [`Controller::subscribe_state`].
/// Stages only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
#[strum(serialize_all = "snake_case")]
pub enum LifecycleState {
    Constructed,
    ViewSetup,
    ViewReady,
    ViewAvailable,
    Unloaded,
    Destroyed,
}

/// Options for [`Controller::setup`].
#[derive(Debug, Clone, Default)]
pub struct SetupOptions {
    /// Store the view presents. Defaults to the controller's own.
    pub delegate: Option<PropertyStore>,
}

type Teardown = Box<dyn FnOnce()>;

// ── Controller ───────────────────────────────────────────────────────

/// Cheaply cloneable handle to a controller instance.
#[derive(Clone)]
pub struct Controller {
    inner: Rc<ControllerInner>,
}

pub(crate) struct ControllerInner {
    def: Rc<ControllerDef>,
    props: PropertyStore,
    view: RefCell<Option<View>>,
    state: watch::Sender<LifecycleState>,
    teardown: RefCell<Vec<Teardown>>,
    bindings: RefCell<Vec<Rc<SyncBinding>>>,
    availability_listener: Cell<Option<ListenerId>>,
}

impl Controller {
    /// Create an instance of `def`. Runs the definition's `setup_view`;
    /// a factory that yields no view is a configuration error.
    pub fn new(def: &Rc<ControllerDef>) -> Result<Self, CoreError> {
        let (state, _) = watch::channel(LifecycleState::Constructed);
        let controller = Self {
            inner: Rc::new(ControllerInner {
                def: Rc::clone(def),
                props: PropertyStore::with_properties(def.properties.iter().cloned()),
                view: RefCell::new(None),
                state,
                teardown: RefCell::new(Vec::new()),
                bindings: RefCell::new(Vec::new()),
                availability_listener: Cell::new(None),
            }),
        };

        let view = (def.setup_view)(&controller).ok_or_else(|| CoreError::Configuration {
            controller: def.name.clone(),
            message: "setup_view did not assign a view".into(),
        })?;
        *controller.inner.view.borrow_mut() = Some(view.clone());
        controller.advance(LifecycleState::ViewSetup);

        controller.register_observers();
        controller.register_events();
        controller.arm_availability(&view);
        debug!(controller = %def.name, "controller constructed");
        Ok(controller)
    }

    pub(crate) fn from_inner(inner: Rc<ControllerInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<ControllerInner> {
        Rc::downgrade(&self.inner)
    }

    pub fn definition(&self) -> &ControllerDef {
        &self.inner.def
    }

    pub fn name(&self) -> &str {
        &self.inner.def.name
    }

    /// The controller's own properties and event bus.
    pub fn props(&self) -> &PropertyStore {
        &self.inner.props
    }

    pub fn get(&self, name: &str) -> Value {
        self.inner.props.get(name)
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> bool {
        self.inner.props.set(name, value)
    }

    /// Hold `model` under `name` so `name.<prop>` paths resolve to it.
    pub fn set_model(&self, name: &str, model: &Model) {
        self.inner.props.set_object(name, model.props().clone());
    }

    /// Emit a controller event.
    pub fn trigger(&self, event: &str) {
        self.inner.props.trigger(event);
    }

    pub fn view(&self) -> Option<View> {
        self.inner.view.borrow().clone()
    }

    pub(crate) fn require_view(&self) -> Result<View, CoreError> {
        self.view().ok_or_else(|| CoreError::NoView {
            controller: self.inner.def.name.clone(),
        })
    }

    pub(crate) fn def(&self) -> &Rc<ControllerDef> {
        &self.inner.def
    }

    pub(crate) fn push_binding(&self, binding: Rc<SyncBinding>) {
        self.inner.bindings.borrow_mut().push(binding);
    }

    /// Number of sync bindings currently attached.
    pub fn binding_count(&self) -> usize {
        self.inner.bindings.borrow().len()
    }

    // ── State ────────────────────────────────────────────────────────

    pub fn state(&self) -> LifecycleState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<LifecycleState> {
        self.inner.state.subscribe()
    }

    fn advance(&self, next: LifecycleState) {
        self.inner.state.send_if_modified(|state| {
            if next > *state {
                trace!(controller = %self.inner.def.name, from = %state, to = %next, "lifecycle");
                *state = next;
                true
            } else {
                false
            }
        });
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Attach the view to `element`, point it at its delegate, run the
    /// `bind` hook, and announce readiness.
    pub fn setup(
        &self,
        element: impl Into<Value>,
        options: SetupOptions,
    ) -> Result<&Self, CoreError> {
        let view = self.require_view()?;
        view.set_element(element);
        view.set_delegate(
            options
                .delegate
                .unwrap_or_else(|| self.inner.props.clone()),
        );
        view.watch_delegate_properties();

        if let Some(bind) = self.inner.def.bind.clone() {
            bind(self)?;
        }

        self.advance(LifecycleState::ViewReady);
        self.trigger("setup");
        self.trigger("view:ready");
        if let Some(hook) = self.inner.def.view_is_ready.clone() {
            hook(self);
        }
        Ok(self)
    }

    pub fn render(&self) -> Result<&Self, CoreError> {
        let view = self.require_view()?;
        view.render();
        self.trigger("view:render");
        Ok(self)
    }

    /// Register a callback run (most recent first) when the controller
    /// unloads. Once unloaded, the callback runs immediately.
    pub fn add_teardown(&self, callback: impl FnOnce() + 'static) {
        if self.state() >= LifecycleState::Unloaded {
            callback();
            return;
        }
        self.inner.teardown.borrow_mut().push(Box::new(callback));
    }

    /// Run teardown callbacks, emit `unload`, and unload the view.
    /// Calling it again has no effect.
    pub fn unload(&self) {
        if self.state() >= LifecycleState::Unloaded {
            return;
        }
        let callbacks = std::mem::take(&mut *self.inner.teardown.borrow_mut());
        for callback in callbacks.into_iter().rev() {
            callback();
        }
        self.advance(LifecycleState::Unloaded);
        self.trigger("unload");
        if let Some(view) = self.view() {
            view.unload();
        }
        debug!(controller = %self.inner.def.name, "controller unloaded");
    }

    /// [`unload`](Self::unload), then invoke `callback`.
    pub fn unload_then(&self, callback: impl FnOnce(&Controller)) {
        self.unload();
        callback(self);
    }

    /// Unload, destroy the view, and release every listener and binding.
    pub fn destroy(&self) {
        if self.state() == LifecycleState::Destroyed {
            return;
        }
        self.unload();
        let view = self.inner.view.borrow_mut().take();
        if let Some(view) = view {
            if let Some(id) = self.inner.availability_listener.take() {
                view.props().off(id);
            }
            view.destroy();
        }
        self.inner.bindings.borrow_mut().clear();
        self.inner.props.off_all();
        self.advance(LifecycleState::Destroyed);
    }

    // ── Validation ───────────────────────────────────────────────────

    /// Check every declared validator, reporting all failures together.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut failures = Vec::new();
        for (property, rules) in &self.inner.def.validators {
            collect_failures(property, &self.get(property), rules, &mut failures);
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Validation { failures })
        }
    }

    pub fn validate_property(&self, property: &str) -> Result<(), CoreError> {
        let mut failures = Vec::new();
        if let Some(rules) = self.inner.def.validators.get(property) {
            collect_failures(property, &self.get(property), rules, &mut failures);
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Validation { failures })
        }
    }

    // ── Wiring ───────────────────────────────────────────────────────

    fn register_observers(&self) {
        for (property, handler_name) in &self.inner.def.observes {
            let Some(handler) = self.inner.def.handlers.get(handler_name).cloned() else {
                continue;
            };
            let weak = self.downgrade();
            self.inner.props.on(change_event(property), move |change| {
                if let Some(inner) = weak.upgrade() {
                    handler(&Controller::from_inner(inner), &change.value, &change.previous);
                }
            });
        }
    }

    fn register_events(&self) {
        for (event, action_name) in &self.inner.def.events {
            let action = action_name
                .as_ref()
                .and_then(|name| self.inner.def.actions.get(name).cloned());
            let weak = self.downgrade();
            let event_name = event.clone();
            self.inner.props.on(event.clone(), move |_| match (&action, weak.upgrade()) {
                (Some(action), Some(inner)) => action(&Controller::from_inner(inner)),
                _ => trace!(event = %event_name, "event observed"),
            });
        }
    }

    /// One-shot: the first time the view becomes available, emit
    /// `view:available` and run the `view_is_available` hook.
    fn arm_availability(&self, view: &View) {
        let weak = self.downgrade();
        let id = view.props().on(change_event(AVAILABLE), move |change| {
            if change.value != Value::Bool(true) {
                return;
            }
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let controller = Controller::from_inner(inner);
            if let (Some(id), Some(view)) =
                (controller.inner.availability_listener.take(), controller.view())
            {
                view.props().off(id);
            }
            controller.advance(LifecycleState::ViewAvailable);
            controller.trigger("view:available");
            if let Some(hook) = controller.inner.def.view_is_available.clone() {
                hook(&controller);
            }
        });
        self.inner.availability_listener.set(Some(id));
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("name", &self.inner.def.name)
            .field("state", &self.state())
            .field("bindings", &self.binding_count())
            .finish_non_exhaustive()
    }
}
