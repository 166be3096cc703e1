//! Dispatch/selector façade over the session and content state machines.
//!
//! Collaborators hand in [`Operation`]s and read state back through
//! [`Engine::select`] or a [`Subscription`]. They never mutate state directly
//! and never receive an operation's result as a return value.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use shared::{
    domain::{ContentItem, PostId},
    protocol::{AuthPayload, LoginRequest, PostPatch, RegisterRequest, WhoamiPayload},
};
use storage::TokenStore;
use tokio::{
    runtime::Handle,
    sync::{broadcast, Mutex as AsyncMutex},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::{
    backend::BlogBackend,
    config::ClientSettings,
    content::{ContentCollection, Pagination, PostDraft},
    error::BackendError,
    lifecycle::{self, Envelope, LifecycleSink, OperationKind, Phase},
    session::{SessionEffect, SessionState},
};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppState {
    pub session: SessionState,
    pub content: ContentCollection,
}

/// Operation triggers accepted by [`Engine::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Register {
        name: String,
        email: String,
        password: String,
    },
    Login {
        email: String,
        password: String,
    },
    Logout,
    Whoami,
    ListPosts,
    FetchPost {
        id: PostId,
    },
    CreatePost(PostDraft),
    UpdatePost {
        id: PostId,
        patch: PostPatch,
    },
    DeletePost {
        id: PostId,
    },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Register { .. } => OperationKind::Register,
            Self::Login { .. } => OperationKind::Login,
            Self::Logout => OperationKind::Logout,
            Self::Whoami => OperationKind::Whoami,
            Self::ListPosts => OperationKind::ListPosts,
            Self::FetchPost { .. } => OperationKind::FetchPost,
            Self::CreatePost(_) => OperationKind::CreatePost,
            Self::UpdatePost { .. } => OperationKind::UpdatePost,
            Self::DeletePost { .. } => OperationKind::DeletePost,
        }
    }
}

/// Fulfilled value of any operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    SignedIn(AuthPayload),
    SignedOut,
    Identity(WhoamiPayload),
    Posts(Vec<ContentItem>),
    Fetched(ContentItem),
    Created(ContentItem),
    Updated(ContentItem),
    Deleted(PostId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalAction {
    ClearSessionError,
    ClearContentError,
    ClearSelection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeCause {
    /// `phase` is `Pending` right after dispatch, then exactly one terminal phase.
    Operation {
        kind: OperationKind,
        seq: u64,
        phase: Phase,
    },
    Local(LocalAction),
}

/// One committed mutation together with the state it produced.
#[derive(Debug, Clone)]
pub struct StateChange {
    pub cause: ChangeCause,
    pub state: Arc<AppState>,
}

pub struct Subscription {
    receiver: broadcast::Receiver<StateChange>,
}

impl Subscription {
    /// Next change, or `None` once the engine is gone. Lagged changes are
    /// skipped; the next one still carries the full current state.
    pub async fn recv(&mut self) -> Option<StateChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscriber lagged behind state changes");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<StateChange> {
        loop {
            match self.receiver.try_recv() {
                Ok(change) => return Some(change),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscriber lagged behind state changes");
                }
                Err(_) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {}
}

/// Callback subscription. Delivery stops on [`Listener::unsubscribe`] or drop.
pub struct Listener {
    task: JoinHandle<()>,
}

impl Listener {
    pub fn unsubscribe(self) {}
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

type Work = Pin<Box<dyn Future<Output = Result<Payload, BackendError>> + Send>>;

pub struct Engine {
    settings: ClientSettings,
    backend: Arc<dyn BlogBackend>,
    tokens: Arc<dyn TokenStore>,
    runtime: Handle,
    state: Mutex<AppState>,
    /// Serializes settlements so durable token writes land in reducer order.
    settle_gate: AsyncMutex<()>,
    next_seq: AtomicU64,
    events: broadcast::Sender<StateChange>,
}

impl Engine {
    /// Builds the engine and hydrates the session from the token store before
    /// returning. Must be called from within a tokio runtime.
    pub async fn new(
        settings: ClientSettings,
        backend: Arc<dyn BlogBackend>,
        tokens: Arc<dyn TokenStore>,
    ) -> Result<Arc<Self>> {
        let token = tokens
            .read()
            .await
            .context("failed to hydrate session token")?;
        info!(has_token = token.is_some(), "engine hydrated from token store");

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Arc::new(Self {
            settings,
            backend,
            tokens,
            runtime: Handle::current(),
            state: Mutex::new(AppState {
                session: SessionState::hydrated(token),
                content: ContentCollection::default(),
            }),
            settle_gate: AsyncMutex::new(()),
            next_seq: AtomicU64::new(0),
            events,
        }))
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.settings.page_size)
    }

    /// Fire-and-forget. The handle carries no result; it only lets a caller
    /// wait for the terminal notification.
    pub fn dispatch(self: &Arc<Self>, operation: Operation) -> JoinHandle<()> {
        let kind = operation.kind();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let backend = Arc::clone(&self.backend);
        let summary_len = self.settings.summary_len;
        lifecycle::launch(&self.runtime, Arc::clone(self), kind, seq, move |token| {
            unit_of_work(backend, operation, token, summary_len)
        })
    }

    /// Confirms a stored token with the backend. Does nothing without one.
    pub fn restore_session(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.select(|state| state.session.token.is_none()) {
            return None;
        }
        Some(self.dispatch(Operation::Whoami))
    }

    pub fn select<T>(&self, selector: impl FnOnce(&AppState) -> T) -> T {
        selector(&self.lock_state())
    }

    pub fn snapshot(&self) -> AppState {
        self.lock_state().clone()
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.events.subscribe(),
        }
    }

    pub fn listen<F>(&self, listener: F) -> Listener
    where
        F: Fn(&StateChange) + Send + 'static,
    {
        let mut subscription = self.subscribe();
        let task = self.runtime.spawn(async move {
            while let Some(change) = subscription.recv().await {
                listener(&change);
            }
        });
        Listener { task }
    }

    pub fn clear_session_error(&self) {
        self.apply_local(LocalAction::ClearSessionError);
    }

    pub fn clear_content_error(&self) {
        self.apply_local(LocalAction::ClearContentError);
    }

    pub fn clear_selection(&self) {
        self.apply_local(LocalAction::ClearSelection);
    }

    fn apply_local(&self, action: LocalAction) {
        let mut state = self.lock_state();
        match action {
            LocalAction::ClearSessionError => state.session.clear_error(),
            LocalAction::ClearContentError => state.content.clear_error(),
            LocalAction::ClearSelection => state.content.clear_selection(),
        }
        self.publish(&state, ChangeCause::Local(action));
    }

    fn lock_state(&self) -> MutexGuard<'_, AppState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sent while the state lock is held, so subscribers observe changes in
    /// commit order and never a half-applied one.
    fn publish(&self, state: &AppState, cause: ChangeCause) {
        let _ = self.events.send(StateChange {
            cause,
            state: Arc::new(state.clone()),
        });
    }

    /// `sent_with` is the token the settled request carried.
    fn reduce(
        &self,
        state: &mut AppState,
        sent_with: Option<&str>,
        envelope: Envelope<Payload>,
    ) -> SessionEffect {
        let Envelope {
            kind, seq, outcome, ..
        } = envelope;
        let Some(outcome) = outcome else {
            return SessionEffect::None;
        };

        match outcome {
            Ok(Payload::SignedIn(payload)) => state.session.signed_in(seq, payload),
            Ok(Payload::SignedOut) => state.session.signed_out(seq, None),
            Ok(Payload::Identity(payload)) => {
                state.session.identity_confirmed(sent_with, payload)
            }
            Ok(Payload::Posts(items)) => {
                state
                    .content
                    .listed(seq, items, self.settings.discard_stale_lists);
                SessionEffect::None
            }
            Ok(Payload::Fetched(item)) => {
                state.content.fetched(item);
                SessionEffect::None
            }
            Ok(Payload::Created(item)) => {
                state.content.created(item);
                SessionEffect::None
            }
            Ok(Payload::Updated(item)) => {
                state.content.updated(item);
                SessionEffect::None
            }
            Ok(Payload::Deleted(id)) => {
                state.content.deleted(&id);
                SessionEffect::None
            }
            Err(rejection) => match kind {
                OperationKind::Register | OperationKind::Login => {
                    state.session.sign_in_failed(seq, rejection)
                }
                OperationKind::Logout => state.session.signed_out(seq, Some(rejection)),
                OperationKind::Whoami => state.session.identity_rejected(sent_with, rejection),
                _ => {
                    state.content.rejected(&rejection);
                    if rejection.is_stale_credentials() {
                        state
                            .session
                            .credentials_rejected(sent_with, &rejection.message)
                    } else {
                        SessionEffect::None
                    }
                }
            },
        }
    }

    async fn run_effect(&self, effect: SessionEffect) {
        let result = match effect {
            SessionEffect::None => return,
            SessionEffect::PersistToken(token) => self.tokens.write(&token).await,
            SessionEffect::ClearToken => self.tokens.clear().await,
        };
        // The in-memory session stays authoritative for this process.
        if let Err(err) = result {
            error!(error = %err, "failed to update durable session token");
        }
    }
}

#[async_trait]
impl LifecycleSink for Engine {
    type Output = Payload;
    type Context = Option<String>;

    fn on_requested(&self, envelope: Envelope<Payload>) -> Option<String> {
        let mut state = self.lock_state();
        let token = state.session.token.clone();
        state.session.requested(envelope.kind, envelope.seq);
        state.content.requested(envelope.kind);
        self.publish(
            &state,
            ChangeCause::Operation {
                kind: envelope.kind,
                seq: envelope.seq,
                phase: Phase::Pending,
            },
        );
        token
    }

    async fn on_settled(&self, sent_with: Option<String>, envelope: Envelope<Payload>) {
        let _gate = self.settle_gate.lock().await;
        let (kind, seq, phase) = (envelope.kind, envelope.seq, envelope.phase);
        let effect = {
            let mut state = self.lock_state();
            let effect = self.reduce(&mut state, sent_with.as_deref(), envelope);
            debug_assert!(state.session.invariants_hold(), "session invariant violated");
            self.publish(&state, ChangeCause::Operation { kind, seq, phase });
            effect
        };
        debug!(operation = %kind, seq, ?phase, "operation settled");
        self.run_effect(effect).await;
    }
}

fn unit_of_work(
    backend: Arc<dyn BlogBackend>,
    operation: Operation,
    token: Option<String>,
    summary_len: usize,
) -> Work {
    Box::pin(async move {
        let token = token.as_deref();
        match operation {
            Operation::Register {
                name,
                email,
                password,
            } => backend
                .register(RegisterRequest {
                    name,
                    email,
                    password,
                })
                .await
                .map(Payload::SignedIn),
            Operation::Login { email, password } => backend
                .login(LoginRequest { email, password })
                .await
                .map(Payload::SignedIn),
            Operation::Logout => {
                if token.is_some() {
                    backend.logout(token).await?;
                } else {
                    debug!("no token held; signing out locally only");
                }
                Ok(Payload::SignedOut)
            }
            Operation::Whoami => {
                let token = token.ok_or_else(|| BackendError::Unauthorized {
                    message: Some("No stored session".to_string()),
                })?;
                backend.whoami(token).await.map(Payload::Identity)
            }
            Operation::ListPosts => backend.list_posts(token).await.map(Payload::Posts),
            Operation::FetchPost { id } => backend.fetch_post(token, &id).await.map(Payload::Fetched),
            Operation::CreatePost(draft) => backend
                .create_post(token, draft.into_request(summary_len))
                .await
                .map(Payload::Created),
            Operation::UpdatePost { id, patch } => backend
                .update_post(token, &id, patch)
                .await
                .map(Payload::Updated),
            Operation::DeletePost { id } => {
                backend.delete_post(token, &id).await?;
                Ok(Payload::Deleted(id))
            }
        }
    })
}

#[cfg(test)]
#[path = "tests/engine_tests.rs"]
mod tests;
