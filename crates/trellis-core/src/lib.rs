// trellis-core: observable models, controllers, and views bound by property sync.

pub mod controller;
pub mod error;
pub mod model;
pub mod store;
pub mod sync;
pub mod validate;
pub mod view;

// ── Primary re-exports ──────────────────────────────────────────────
pub use controller::{
    Controller, ControllerDef, ControllerDefBuilder, LifecycleState, SetupOptions,
};
pub use error::CoreError;
pub use model::Model;
pub use store::{Change, ListenerId, PropertyStore};
pub use sync::{Filter, SyncOptions};
pub use validate::{ValidationFailure, Validator};
pub use view::{Renderer, View};
