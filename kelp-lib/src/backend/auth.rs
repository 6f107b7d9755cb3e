//! Authentication contract.
//!
//! An [`AuthService`] owns the signed-in [`Session`] and announces every change to it
//! through [`AuthEvent`]s. Listeners hold an [`AuthSubscription`]; dropping it is what
//! unsubscribes.

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::Utc;
use futures::{Stream, stream};
use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

/// How many unread events a slow subscriber may fall behind before it starts missing some.
const EVENT_BUFFER: usize = 16;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{message}")]
    Response { status: u16, message: String },
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("Failed to persist session: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed session: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Invalid login credentials")]
    InvalidCredentials,
    #[error("User already registered")]
    AlreadyRegistered,
}

/// The identity claims carried by a [`Session`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// An authenticated user's token plus identity claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Unix timestamp (seconds) after which the access token is no longer accepted
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub user: Option<User>,
}

impl Session {
    /// The signed-in user's identifier, if the session carries a non-empty one.
    pub fn user_id(&self) -> Option<&str> {
        self.user
            .as_ref()
            .map(|user| user.id.as_str())
            .filter(|id| !id.is_empty())
    }

    pub fn email(&self) -> Option<&str> {
        self.user.as_ref().and_then(|user| user.email.as_deref())
    }

    /// Whether the access token has expired, allowing `margin_secs` of clock slack.
    pub fn is_expired(&self, margin_secs: i64) -> bool {
        let deadline = Utc::now().timestamp().saturating_add(margin_secs);
        self.expires_at.is_some_and(|expires_at| expires_at <= deadline)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthChangeEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// A change to the current session. The carried session replaces whatever the listener
/// held before.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub kind: AuthChangeEvent,
    pub session: Option<Session>,
}

impl AuthEvent {
    pub fn new(kind: AuthChangeEvent, session: Option<Session>) -> Self {
        Self { kind, session }
    }
}

/// Fan-out of [`AuthEvent`]s to every live [`AuthSubscription`].
#[derive(Debug, Clone)]
pub struct AuthEvents {
    sender: broadcast::Sender<AuthEvent>,
}

impl AuthEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        Self { sender }
    }

    pub fn subscribe(&self) -> AuthSubscription {
        AuthSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn emit(&self, kind: AuthChangeEvent, session: Option<Session>) {
        debug!("Auth state changed: {kind}");
        // Having nobody listening is fine
        let _ = self.sender.send(AuthEvent::new(kind, session));
    }

    /// Number of subscriptions currently alive.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// A live registration for [`AuthEvent`]s. Dropping it unsubscribes.
#[derive(Debug)]
pub struct AuthSubscription {
    receiver: broadcast::Receiver<AuthEvent>,
}

impl AuthSubscription {
    /// Wait for the next event. Returns `None` once the auth service has gone away.
    pub async fn next(&mut self) -> Option<AuthEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(missed)) => {
                    warn!("Auth subscriber fell behind, skipped {missed} events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Turn the subscription into a stream of events. Dropping the stream unsubscribes.
    pub fn into_stream(self) -> impl Stream<Item = AuthEvent> + Send + 'static {
        stream::unfold(self, |mut subscription| async move {
            let event = subscription.next().await?;
            Some((event, subscription))
        })
    }
}

#[async_trait]
pub trait AuthService: Send + Sync + Debug {
    /// One-shot read of the current session.
    async fn current_session(&self) -> Result<Option<Session>, Error>;

    /// Register for session changes until the returned handle is dropped.
    fn subscribe(&self) -> AuthSubscription;

    async fn sign_in_with_password(&self, email: &str, password: &str)
    -> Result<Session, Error>;

    /// Register a new user. Returns `None` when the backend holds the session back until
    /// the email address is confirmed.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, Error>;

    async fn sign_out(&self) -> Result<(), Error>;
}
