// ── Headless view ──
//
// A view owns an element handle, a refresh-handler table that sync
// bindings push values into, and an `available` flag. It becomes
// available once it has both an element and a completed render; pushes
// that arrive earlier are deferred by the binding, not by the view.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;
use tracing::{debug, trace};

use crate::store::{ListenerId, PropertyStore, change_event};

/// Refresh handler: receives `(current, previous)`.
pub type RefreshFn = Rc<dyn Fn(&Value, &Value)>;

/// Draws a view. The default view has no renderer and only tracks state.
pub trait Renderer {
    fn render(&self, view: &View);
}

pub const AVAILABLE: &str = "available";
pub const RENDERED: &str = "rendered";
pub const ELEMENT: &str = "element";

/// Cheaply cloneable handle to a view.
#[derive(Clone)]
pub struct View {
    inner: Rc<ViewInner>,
}

struct ViewInner {
    name: String,
    props: PropertyStore,
    handlers: RefCell<HashMap<String, RefreshFn>>,
    renderer: RefCell<Option<Rc<dyn Renderer>>>,
    delegate: RefCell<Option<PropertyStore>>,
    watched: RefCell<Vec<String>>,
    delegate_listeners: RefCell<Vec<ListenerId>>,
    render_count: Cell<usize>,
    destroyed: Cell<bool>,
}

impl View {
    pub fn new(name: impl Into<String>) -> Self {
        let props = PropertyStore::with_properties([ELEMENT]);
        props.set(AVAILABLE, false);
        props.set(RENDERED, false);
        Self {
            inner: Rc::new(ViewInner {
                name: name.into(),
                props,
                handlers: RefCell::new(HashMap::new()),
                renderer: RefCell::new(None),
                delegate: RefCell::new(None),
                watched: RefCell::new(Vec::new()),
                delegate_listeners: RefCell::new(Vec::new()),
                render_count: Cell::new(0),
                destroyed: Cell::new(false),
            }),
        }
    }

    pub fn with_renderer(self, renderer: impl Renderer + 'static) -> Self {
        *self.inner.renderer.borrow_mut() = Some(Rc::new(renderer));
        self
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The view's own attributes: `available`, `rendered`, `element`.
    pub fn props(&self) -> &PropertyStore {
        &self.inner.props
    }

    // ── Refresh handlers ─────────────────────────────────────────────

    /// Register a refresh handler under `name`, replacing any existing
    /// one.
    pub fn on_refresh<F>(&self, name: impl Into<String>, handler: F) -> &Self
    where
        F: Fn(&Value, &Value) + 'static,
    {
        self.inner
            .handlers
            .borrow_mut()
            .insert(name.into(), Rc::new(handler));
        self
    }

    pub fn handler(&self, name: &str) -> Option<RefreshFn> {
        self.inner.handlers.borrow().get(name).cloned()
    }

    // ── Element and availability ─────────────────────────────────────

    pub fn set_element(&self, element: impl Into<Value>) {
        self.inner.props.set(ELEMENT, element);
        self.refresh_availability();
    }

    pub fn element(&self) -> Value {
        self.inner.props.get(ELEMENT)
    }

    pub fn is_available(&self) -> bool {
        self.inner.props.get(AVAILABLE) == Value::Bool(true)
    }

    pub fn is_rendered(&self) -> bool {
        self.inner.props.get(RENDERED) == Value::Bool(true)
    }

    /// Force the availability flag. Emits `change:available` when it flips.
    pub fn set_available(&self, available: bool) {
        if self.inner.props.set(AVAILABLE, available) {
            debug!(view = %self.inner.name, available, "view availability changed");
        }
    }

    pub fn set_rendered(&self) {
        self.inner.props.set(RENDERED, true);
        self.refresh_availability();
    }

    fn refresh_availability(&self) {
        let has_element = !trellis_api::util::is_falsy(&self.element());
        self.set_available(has_element && self.is_rendered());
    }

    // ── Rendering ────────────────────────────────────────────────────

    /// Run the renderer (if any) and mark the view rendered.
    pub fn render(&self) {
        if self.inner.destroyed.get() {
            return;
        }
        let renderer = self.inner.renderer.borrow().clone();
        if let Some(renderer) = renderer {
            renderer.render(self);
        }
        self.inner.render_count.set(self.inner.render_count.get() + 1);
        trace!(view = %self.inner.name, "rendered");
        self.set_rendered();
    }

    pub fn render_count(&self) -> usize {
        self.inner.render_count.get()
    }

    // ── Delegate ─────────────────────────────────────────────────────

    /// The store whose properties this view presents.
    pub fn set_delegate(&self, delegate: PropertyStore) {
        self.detach_delegate();
        *self.inner.delegate.borrow_mut() = Some(delegate);
    }

    pub fn delegate(&self) -> Option<PropertyStore> {
        self.inner.delegate.borrow().clone()
    }

    /// Delegate properties that trigger a re-render when they change.
    pub fn watch<I, S>(&self, names: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner
            .watched
            .borrow_mut()
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Subscribe to the watched delegate properties. Replaces any earlier
    /// subscriptions.
    pub fn watch_delegate_properties(&self) {
        self.detach_delegate();
        let Some(delegate) = self.delegate() else {
            return;
        };
        let weak: Weak<ViewInner> = Rc::downgrade(&self.inner);
        let ids = self
            .inner
            .watched
            .borrow()
            .iter()
            .map(|name| {
                let weak = weak.clone();
                delegate.on(change_event(name), move |_| {
                    if let Some(inner) = weak.upgrade() {
                        View { inner }.render();
                    }
                })
            })
            .collect();
        *self.inner.delegate_listeners.borrow_mut() = ids;
    }

    fn detach_delegate(&self) {
        let ids = std::mem::take(&mut *self.inner.delegate_listeners.borrow_mut());
        if let Some(delegate) = self.delegate() {
            for id in ids {
                delegate.off(id);
            }
        }
    }

    // ── Teardown ─────────────────────────────────────────────────────

    /// Stop presenting: drop delegate subscriptions and become
    /// unavailable. The view can be rendered again afterwards.
    pub fn unload(&self) {
        self.detach_delegate();
        self.inner.props.set(RENDERED, false);
        self.set_available(false);
    }

    /// Unload and release every handler and listener. Further renders
    /// are ignored.
    pub fn destroy(&self) {
        if self.inner.destroyed.replace(true) {
            return;
        }
        self.unload();
        self.inner.props.off_all();
        self.inner.handlers.borrow_mut().clear();
        self.inner.renderer.borrow_mut().take();
        self.inner.delegate.borrow_mut().take();
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("name", &self.inner.name)
            .field("available", &self.is_available())
            .field("handlers", &self.inner.handlers.borrow().len())
            .field("render_count", &self.render_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    struct CountingRenderer(Rc<Cell<usize>>);

    impl Renderer for CountingRenderer {
        fn render(&self, _view: &View) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn available_after_element_and_render() {
        let view = View::new("doc");
        assert!(!view.is_available());

        view.render();
        assert!(!view.is_available(), "no element yet");

        view.set_element("#main");
        assert!(view.is_available());

        view.unload();
        assert!(!view.is_available());
        assert!(!view.is_rendered());
    }

    #[test]
    fn availability_changes_are_observable() {
        let view = View::new("doc");
        let flips = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&flips);
        view.props()
            .on(change_event(AVAILABLE), move |c| sink.borrow_mut().push(c.value.clone()));

        view.set_element("#main");
        view.render();
        view.render();
        view.unload();

        assert_eq!(*flips.borrow(), vec![json!(true), json!(false)]);
    }

    #[test]
    fn watched_delegate_properties_rerender() {
        let renders = Rc::new(Cell::new(0));
        let view = View::new("doc").with_renderer(CountingRenderer(Rc::clone(&renders)));
        let delegate = PropertyStore::new();
        view.watch(["title"]);
        view.set_delegate(delegate.clone());
        view.watch_delegate_properties();

        delegate.set("title", "a");
        delegate.set("body", "ignored");
        assert_eq!(renders.get(), 1);

        view.unload();
        delegate.set("title", "b");
        assert_eq!(renders.get(), 1);
        assert_eq!(delegate.total_listeners(), 0);
    }

    #[test]
    fn destroy_releases_handlers_and_listeners() {
        let view = View::new("doc");
        view.on_refresh("refreshTitlePropertyOnView", |_, _| {});
        view.props().on(change_event(AVAILABLE), |_| {});

        view.destroy();
        assert!(view.is_destroyed());
        assert!(view.handler("refreshTitlePropertyOnView").is_none());
        assert_eq!(view.props().total_listeners(), 0);

        view.render();
        assert_eq!(view.render_count(), 0);
    }
}
