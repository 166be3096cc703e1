//! Client-side state engine for the blog backend: an observable, eventually
//! consistent mirror of the signed-in session and the post collection.

pub mod backend;
pub mod config;
pub mod content;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod selectors;
pub mod session;

pub use backend::{BlogBackend, HttpBackend, MissingBackend};
pub use config::{load_settings, ClientSettings};
pub use content::{derive_summary, parse_tags, ContentCollection, Pagination, PostDraft, SyncStatus};
pub use engine::{
    AppState, ChangeCause, Engine, Listener, LocalAction, Operation, Payload, StateChange,
    Subscription,
};
pub use error::{BackendError, SettingsError};
pub use lifecycle::{OperationKind, Phase, Rejection, RejectionCause};
pub use session::{SessionState, SessionStatus};

#[cfg(test)]
#[path = "tests/fixtures.rs"]
mod fixtures;
