//! The root of the app: which screen to show for the current session.

use tracing::{debug, warn};

use crate::backend::{AuthEvent, AuthSubscription, Backend, Session};

/// What the root view should render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    SignIn,
    /// The profile editor for the user with this identifier. A different key means a
    /// fresh editor.
    Account { key: String },
}

/// Owns the current auth session and keeps it in step with the auth service.
///
/// Creating the controller subscribes it to session changes; the subscription lives
/// until the controller is dropped or [`SessionController::unmount`] is called. Events
/// and the initial fetch both replace the stored session, so whichever lands last wins.
#[derive(Debug)]
pub struct SessionController {
    backend: Backend,
    session: Option<Session>,
    subscription: Option<AuthSubscription>,
}

impl SessionController {
    pub fn new(backend: Backend) -> Self {
        let subscription = backend.auth().subscribe();

        Self {
            backend,
            session: None,
            subscription: Some(subscription),
        }
    }

    /// Subscribe and fetch the current session in one go.
    pub async fn mount(backend: Backend) -> Self {
        let mut controller = Self::new(backend.clone());
        controller.set_session(Self::fetch_session(backend).await);
        controller
    }

    /// One-shot read of the current session. A failed read counts as no session.
    pub async fn fetch_session(backend: Backend) -> Option<Session> {
        match backend.auth().current_session().await {
            Ok(session) => session,
            Err(err) => {
                warn!("Failed to fetch the current session: {err}");
                None
            }
        }
    }

    pub fn set_session(&mut self, session: Option<Session>) {
        self.session = session;
    }

    /// Apply a session change. The event's session replaces the stored one.
    pub fn apply(&mut self, event: AuthEvent) {
        debug!("Applying auth event {}", event.kind);
        self.set_session(event.session);
    }

    /// Hand the subscription to whoever drives the event loop. Dropping it, wherever it
    /// ends up, unsubscribes.
    pub fn take_subscription(&mut self) -> Option<AuthSubscription> {
        self.subscription.take()
    }

    /// Wait for the next session change on the held subscription and apply it.
    pub async fn next_event(&mut self) -> Option<AuthEvent> {
        let event = self.subscription.as_mut()?.next().await?;
        self.apply(event.clone());
        Some(event)
    }

    /// Release the subscription.
    pub fn unmount(&mut self) {
        self.subscription = None;
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn screen(&self) -> Screen {
        match self.session.as_ref().and_then(Session::user_id) {
            Some(id) => Screen::Account { key: id.to_string() },
            None => Screen::SignIn,
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }
}
