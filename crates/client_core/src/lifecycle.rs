//! Requested → pending → fulfilled | rejected protocol shared by every
//! asynchronous operation.
//!
//! The owning state machine sees `Requested` synchronously, before the unit of
//! work is even polled, and exactly one terminal envelope once it settles.
//! There is no cancellation: a superseded invocation still runs to completion
//! and still settles.

use std::{fmt, future::Future, sync::Arc};

use async_trait::async_trait;
use tokio::{runtime::Handle, task::JoinHandle};
use tracing::{debug, warn};

use crate::error::BackendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Register,
    Login,
    Logout,
    Whoami,
    ListPosts,
    FetchPost,
    CreatePost,
    UpdatePost,
    DeletePost,
}

impl OperationKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Register => "auth/register",
            Self::Login => "auth/login",
            Self::Logout => "auth/logout",
            Self::Whoami => "auth/whoami",
            Self::ListPosts => "posts/list",
            Self::FetchPost => "posts/fetch",
            Self::CreatePost => "posts/create",
            Self::UpdatePost => "posts/update",
            Self::DeletePost => "posts/delete",
        }
    }

    /// Message recorded when the backend gives no message of its own.
    pub fn fallback_error(self) -> &'static str {
        match self {
            Self::Register => "Registration failed",
            Self::Login => "Login failed",
            Self::Logout => "Logout failed",
            Self::Whoami => "Failed to get user data",
            Self::ListPosts => "Failed to fetch blogs",
            Self::FetchPost => "Failed to fetch blog",
            Self::CreatePost => "Failed to create blog",
            Self::UpdatePost => "Failed to update blog",
            Self::DeletePost => "Failed to delete blog",
        }
    }

    pub fn is_session(self) -> bool {
        matches!(
            self,
            Self::Register | Self::Login | Self::Logout | Self::Whoami
        )
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Requested,
    Pending,
    Fulfilled,
    Rejected,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Fulfilled | Self::Rejected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionCause {
    /// The backend answered with a non-success status.
    Remote,
    /// No usable response arrived.
    Transport,
    /// The backend refused the credential that was attached.
    StaleCredentials,
}

/// Settled failure of one invocation, already reduced to what state machines need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub message: String,
    pub cause: RejectionCause,
}

impl Rejection {
    pub fn from_backend(kind: OperationKind, err: &BackendError) -> Self {
        let cause = if err.is_stale_credentials() {
            RejectionCause::StaleCredentials
        } else if err.is_transport() {
            RejectionCause::Transport
        } else {
            RejectionCause::Remote
        };
        Self {
            message: err
                .server_message()
                .unwrap_or_else(|| kind.fallback_error())
                .to_string(),
            cause,
        }
    }

    pub fn is_stale_credentials(&self) -> bool {
        self.cause == RejectionCause::StaleCredentials
    }
}

/// The unit the lifecycle hands to its owner. Never outlives one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope<T> {
    pub kind: OperationKind,
    pub seq: u64,
    pub phase: Phase,
    pub outcome: Option<Result<T, Rejection>>,
}

impl<T> Envelope<T> {
    pub fn requested(kind: OperationKind, seq: u64) -> Self {
        Self {
            kind,
            seq,
            phase: Phase::Requested,
            outcome: None,
        }
    }

    pub fn settled(kind: OperationKind, seq: u64, outcome: Result<T, Rejection>) -> Self {
        let phase = if outcome.is_ok() {
            Phase::Fulfilled
        } else {
            Phase::Rejected
        };
        Self {
            kind,
            seq,
            phase,
            outcome: Some(outcome),
        }
    }
}

/// Owner of the state an operation drives.
#[async_trait]
pub trait LifecycleSink: Send + Sync + 'static {
    type Output: Send + 'static;
    /// Whatever the owner hands to the unit of work at request time. It comes
    /// back with the settlement so the owner can tell which request settled.
    type Context: Clone + Send + 'static;

    /// Applied synchronously before the work starts. Must not block.
    fn on_requested(&self, envelope: Envelope<Self::Output>) -> Self::Context;

    async fn on_settled(&self, context: Self::Context, envelope: Envelope<Self::Output>);
}

/// Runs one invocation: `Requested` now, the terminal envelope once `work` settles.
pub fn launch<S, W, Fut>(
    runtime: &Handle,
    sink: Arc<S>,
    kind: OperationKind,
    seq: u64,
    work: W,
) -> JoinHandle<()>
where
    S: LifecycleSink,
    W: FnOnce(S::Context) -> Fut,
    Fut: Future<Output = Result<S::Output, BackendError>> + Send + 'static,
{
    let context = sink.on_requested(Envelope::requested(kind, seq));
    let pending = work(context.clone());
    debug!(operation = %kind, seq, "operation pending");

    runtime.spawn(async move {
        let outcome = pending.await.map_err(|err| {
            warn!(operation = %kind, seq, error = %err, "operation rejected");
            Rejection::from_backend(kind, &err)
        });
        sink.on_settled(context, Envelope::settled(kind, seq, outcome))
            .await;
    })
}

#[cfg(test)]
#[path = "tests/lifecycle_tests.rs"]
mod tests;
