// ── Controller definitions ──
//
// Everything a controller type declares up front: its properties, the
// named handler/accessor/filter/action tables that sync bindings and
// event maps resolve against, and its lifecycle hooks. Derived
// definitions merge their parent's tables through `extends`; same-named
// entries in the child win.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

use crate::controller::Controller;
use crate::error::CoreError;
use crate::store::PropertyStore;
use crate::validate::Validator;
use crate::view::View;

/// Change handler: `(controller, current, previous)`.
pub type ChangeHandler = Rc<dyn Fn(&Controller, &Value, &Value)>;
/// Reads a property from the store a binding targets.
pub type Accessor = Rc<dyn Fn(&PropertyStore) -> Value>;
/// Decides whether a change is dispatched: `(current, previous)`.
pub type FilterFn = Rc<dyn Fn(&Value, &Value) -> bool>;
pub type Action = Rc<dyn Fn(&Controller)>;
pub type Hook = Rc<dyn Fn(&Controller)>;
pub type BindHook = Rc<dyn Fn(&Controller) -> Result<(), CoreError>>;
/// Creates the controller's view. Returning `None` is a configuration
/// error.
pub type ViewFactory = Rc<dyn Fn(&Controller) -> Option<View>>;

/// Compiled controller type. Shared by every instance via `Rc`.
pub struct ControllerDef {
    pub(crate) name: String,
    pub(crate) properties: IndexSet<String>,
    pub(crate) handlers: HashMap<String, ChangeHandler>,
    pub(crate) accessors: HashMap<String, Accessor>,
    pub(crate) filters: HashMap<String, FilterFn>,
    pub(crate) actions: HashMap<String, Action>,
    pub(crate) events: IndexMap<String, Option<String>>,
    pub(crate) observes: IndexMap<String, String>,
    pub(crate) validators: IndexMap<String, Vec<Validator>>,
    pub(crate) setup_view: ViewFactory,
    pub(crate) bind: Option<BindHook>,
    pub(crate) view_is_ready: Option<Hook>,
    pub(crate) view_is_available: Option<Hook>,
}

impl ControllerDef {
    pub fn builder(name: impl Into<String>) -> ControllerDefBuilder {
        ControllerDefBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(String::as_str)
    }

    /// Event name to action name (`None`: observed, no default action).
    pub fn events(&self) -> &IndexMap<String, Option<String>> {
        &self.events
    }

    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }
}

impl fmt::Debug for ControllerDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerDef")
            .field("name", &self.name)
            .field("properties", &self.properties)
            .field("events", &self.events)
            .field("observes", &self.observes)
            .field("validators", &self.validators)
            .finish_non_exhaustive()
    }
}

/// Collects the declarative pieces of a [`ControllerDef`].
#[derive(Default)]
pub struct ControllerDefBuilder {
    name: String,
    parent: Option<Rc<ControllerDef>>,
    properties: IndexSet<String>,
    handlers: HashMap<String, ChangeHandler>,
    accessors: HashMap<String, Accessor>,
    filters: HashMap<String, FilterFn>,
    actions: HashMap<String, Action>,
    events: IndexMap<String, Option<String>>,
    observes: IndexMap<String, String>,
    validators: IndexMap<String, Vec<Validator>>,
    setup_view: Option<ViewFactory>,
    bind: Option<BindHook>,
    view_is_ready: Option<Hook>,
    view_is_available: Option<Hook>,
}

impl ControllerDefBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Inherit every table and hook from `parent`.
    pub fn extends(mut self, parent: &Rc<ControllerDef>) -> Self {
        self.parent = Some(Rc::clone(parent));
        self
    }

    pub fn properties<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn handler<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Controller, &Value, &Value) + 'static,
    {
        self.handlers.insert(name.into(), Rc::new(handler));
        self
    }

    pub fn accessor<F>(mut self, name: impl Into<String>, accessor: F) -> Self
    where
        F: Fn(&PropertyStore) -> Value + 'static,
    {
        self.accessors.insert(name.into(), Rc::new(accessor));
        self
    }

    pub fn filter<F>(mut self, name: impl Into<String>, filter: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + 'static,
    {
        self.filters.insert(name.into(), Rc::new(filter));
        self
    }

    pub fn action<F>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&Controller) + 'static,
    {
        self.actions.insert(name.into(), Rc::new(action));
        self
    }

    /// Listen for `event` on the controller. `action` names an entry in
    /// the action table; `None` listens without acting.
    pub fn event(mut self, event: impl Into<String>, action: Option<&str>) -> Self {
        self.events.insert(event.into(), action.map(str::to_owned));
        self
    }

    /// Call handler `handler` whenever controller property `property`
    /// changes.
    pub fn observe(mut self, property: impl Into<String>, handler: impl Into<String>) -> Self {
        self.observes.insert(property.into(), handler.into());
        self
    }

    pub fn validate(mut self, property: impl Into<String>, validator: Validator) -> Self {
        self.validators
            .entry(property.into())
            .or_default()
            .push(validator);
        self
    }

    pub fn setup_view<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Controller) -> Option<View> + 'static,
    {
        self.setup_view = Some(Rc::new(factory));
        self
    }

    pub fn bind<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Controller) -> Result<(), CoreError> + 'static,
    {
        self.bind = Some(Rc::new(hook));
        self
    }

    pub fn view_is_ready<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Controller) + 'static,
    {
        self.view_is_ready = Some(Rc::new(hook));
        self
    }

    pub fn view_is_available<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Controller) + 'static,
    {
        self.view_is_available = Some(Rc::new(hook));
        self
    }

    /// Merge with the parent and check every cross-reference.
    pub fn build(self) -> Result<Rc<ControllerDef>, CoreError> {
        let parent = self.parent.as_deref();

        let mut properties = parent.map(|p| p.properties.clone()).unwrap_or_default();
        properties.extend(self.properties);

        let mut handlers = parent.map(|p| p.handlers.clone()).unwrap_or_default();
        handlers.extend(self.handlers);

        let mut accessors = parent.map(|p| p.accessors.clone()).unwrap_or_default();
        accessors.extend(self.accessors);

        let mut filters = parent.map(|p| p.filters.clone()).unwrap_or_default();
        filters.extend(self.filters);

        let mut actions = parent.map(|p| p.actions.clone()).unwrap_or_default();
        actions.extend(self.actions);

        let mut events = parent.map(|p| p.events.clone()).unwrap_or_default();
        events.extend(self.events);

        let mut observes = parent.map(|p| p.observes.clone()).unwrap_or_default();
        observes.extend(self.observes);

        let mut validators = parent.map(|p| p.validators.clone()).unwrap_or_default();
        for (property, rules) in self.validators {
            validators.entry(property).or_default().extend(rules);
        }

        let definition_error = |message: String| CoreError::Definition {
            owner: format!("controller '{}'", self.name),
            message,
        };

        let setup_view = self
            .setup_view
            .or_else(|| parent.map(|p| Rc::clone(&p.setup_view)))
            .ok_or_else(|| definition_error("no setup_view declared".into()))?;

        for (event, action) in &events {
            if let Some(action) = action {
                if !actions.contains_key(action) {
                    return Err(definition_error(format!(
                        "event '{event}' names unknown action '{action}'"
                    )));
                }
            }
        }
        for (property, handler) in &observes {
            if !handlers.contains_key(handler) {
                return Err(definition_error(format!(
                    "observer of '{property}' names unknown handler '{handler}'"
                )));
            }
        }

        Ok(Rc::new(ControllerDef {
            bind: self.bind.or_else(|| parent.and_then(|p| p.bind.clone())),
            view_is_ready: self
                .view_is_ready
                .or_else(|| parent.and_then(|p| p.view_is_ready.clone())),
            view_is_available: self
                .view_is_available
                .or_else(|| parent.and_then(|p| p.view_is_available.clone())),
            name: self.name,
            properties,
            handlers,
            accessors,
            filters,
            actions,
            events,
            observes,
            validators,
            setup_view,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn base() -> Rc<ControllerDef> {
        ControllerDef::builder("base")
            .properties(["title"])
            .action("save", |_| {})
            .action("close", |_| {})
            .event("save", Some("save"))
            .event("close", None)
            .setup_view(|_| Some(View::new("base")))
            .build()
            .unwrap()
    }

    #[test]
    fn missing_setup_view_is_rejected() {
        let err = ControllerDef::builder("bare").build().unwrap_err();
        assert!(err.is_definition());
        assert!(err.to_string().contains("setup_view"));
    }

    #[test]
    fn unknown_action_is_rejected() {
        let err = ControllerDef::builder("c")
            .setup_view(|_| None)
            .event("save", Some("persist"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("persist"));
    }

    #[test]
    fn unknown_observer_handler_is_rejected() {
        let err = ControllerDef::builder("c")
            .setup_view(|_| None)
            .observe("title", "titleDidChange")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("titleDidChange"));
    }

    #[test]
    fn events_merge_with_the_parent() {
        let child = ControllerDef::builder("child")
            .extends(&base())
            .properties(["body"])
            .event("close", Some("close"))
            .event("publish", None)
            .build()
            .unwrap();

        let events: Vec<(&str, Option<&str>)> = child
            .events()
            .iter()
            .map(|(e, a)| (e.as_str(), a.as_deref()))
            .collect();
        assert_eq!(
            events,
            vec![
                ("save", Some("save")),
                ("close", Some("close")),
                ("publish", None),
            ]
        );
        assert_eq!(child.properties().collect::<Vec<_>>(), vec!["title", "body"]);
        assert!(child.has_action("save"));
    }
}
