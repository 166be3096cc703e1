//! Session state machine: who the local device believes is signed in.
//!
//! Reducers here are synchronous and perform no I/O. Durable token writes are
//! returned as [`SessionEffect`]s for the engine to execute after the state
//! commit, which keeps the session the only writer of the token store.

use shared::{
    domain::{ContentItem, Identity},
    protocol::{AuthPayload, WhoamiPayload},
};
use tracing::{debug, info};

use crate::lifecycle::{OperationKind, Rejection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Anonymous,
    Authenticating,
    Authenticated,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    None,
    PersistToken(String),
    ClearToken,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub identity: Option<Identity>,
    pub token: Option<String>,
    pub status: SessionStatus,
    pub last_error: Option<String>,
    /// Posts returned alongside the identity by whoami, if the backend sent any.
    pub authored: Vec<ContentItem>,
    in_flight: usize,
    /// Seq of the newest register, login or logout request. Sign-in and
    /// sign-out settlements older than it are superseded.
    auth_seq: u64,
}

impl SessionState {
    /// Starts from whatever the durable store held. A stored token is not
    /// trusted until whoami confirms it.
    pub fn hydrated(token: Option<String>) -> Self {
        let status = if token.is_some() {
            SessionStatus::Authenticating
        } else {
            SessionStatus::Anonymous
        };
        Self {
            token,
            status,
            ..Self::default()
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    /// Authenticated iff token and identity are both present; Anonymous and
    /// Failed never hold a token.
    pub fn invariants_hold(&self) -> bool {
        match self.status {
            SessionStatus::Authenticated => self.token.is_some() && self.identity.is_some(),
            SessionStatus::Anonymous | SessionStatus::Failed => {
                self.token.is_none() && self.identity.is_none()
            }
            SessionStatus::Authenticating => self.identity.is_none(),
        }
    }

    pub fn requested(&mut self, kind: OperationKind, seq: u64) {
        match kind {
            OperationKind::Register | OperationKind::Login => {
                // Re-running sign-in while signed in overwrites the old session.
                self.reset();
                self.status = SessionStatus::Authenticating;
                self.last_error = None;
                self.auth_seq = seq;
            }
            OperationKind::Whoami => {
                if self.token.is_some() && !self.is_authenticated() {
                    self.status = SessionStatus::Authenticating;
                }
            }
            OperationKind::Logout => {
                self.last_error = None;
                self.auth_seq = seq;
            }
            _ => return,
        }
        self.in_flight += 1;
    }

    pub fn signed_in(&mut self, seq: u64, payload: AuthPayload) -> SessionEffect {
        self.settle();
        if self.superseded(seq) {
            debug!(seq, user_id = %payload.user.id, "ignoring superseded sign-in");
            return SessionEffect::None;
        }
        info!(user_id = %payload.user.id, "session authenticated");
        self.identity = Some(payload.user);
        self.token = Some(payload.token.clone());
        self.status = SessionStatus::Authenticated;
        self.last_error = None;
        SessionEffect::PersistToken(payload.token)
    }

    pub fn sign_in_failed(&mut self, seq: u64, rejection: Rejection) -> SessionEffect {
        self.settle();
        if self.superseded(seq) {
            debug!(seq, "ignoring superseded sign-in failure");
            return SessionEffect::None;
        }
        self.reset();
        self.status = SessionStatus::Failed;
        self.last_error = Some(rejection.message);
        SessionEffect::ClearToken
    }

    /// Local sign-out always happens; a remote failure is only recorded.
    pub fn signed_out(&mut self, seq: u64, rejection: Option<Rejection>) -> SessionEffect {
        self.settle();
        if self.superseded(seq) {
            debug!(seq, "ignoring superseded sign-out");
            return SessionEffect::None;
        }
        self.reset();
        self.status = SessionStatus::Anonymous;
        self.last_error = rejection.map(|rejection| rejection.message);
        info!("session signed out");
        SessionEffect::ClearToken
    }

    /// `sent_with` is the token the whoami request carried. An answer about a
    /// token the session no longer holds is dropped.
    pub fn identity_confirmed(
        &mut self,
        sent_with: Option<&str>,
        payload: WhoamiPayload,
    ) -> SessionEffect {
        self.settle();
        if sent_with.is_none() || self.token.as_deref() != sent_with {
            debug!(
                user_id = %payload.user.id,
                "ignoring identity for a token the session no longer holds"
            );
            return SessionEffect::None;
        }
        self.identity = Some(payload.user);
        if let Some(authored) = payload.blogs {
            self.authored = authored;
        }
        self.status = SessionStatus::Authenticated;
        SessionEffect::None
    }

    /// Whoami failed: the token it carried is treated as if it never existed.
    /// A newer token is left alone.
    pub fn identity_rejected(
        &mut self,
        sent_with: Option<&str>,
        rejection: Rejection,
    ) -> SessionEffect {
        self.settle();
        if self.token.as_deref() != sent_with {
            debug!("ignoring whoami rejection for a token the session no longer holds");
            return SessionEffect::None;
        }
        if sent_with.is_none() {
            self.last_error = Some(rejection.message);
            return SessionEffect::None;
        }
        self.reset();
        self.status = SessionStatus::Anonymous;
        self.last_error = Some(rejection.message);
        SessionEffect::ClearToken
    }

    /// Another authenticated call was refused because of the credential it
    /// carried. Only acts while the session still holds that credential.
    pub fn credentials_rejected(
        &mut self,
        sent_with: Option<&str>,
        message: &str,
    ) -> SessionEffect {
        if sent_with.is_none() || self.token.as_deref() != sent_with {
            return SessionEffect::None;
        }
        info!("credential rejected by backend; signing out locally");
        self.reset();
        self.status = SessionStatus::Anonymous;
        self.last_error = Some(message.to_string());
        SessionEffect::ClearToken
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    fn superseded(&self, seq: u64) -> bool {
        seq < self.auth_seq
    }

    fn settle(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    fn reset(&mut self) {
        self.identity = None;
        self.token = None;
        self.authored.clear();
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
