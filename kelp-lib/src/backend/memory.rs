//! A backend that keeps everything in process memory.
//!
//! It follows the same contracts as the hosted backend, including the not-found status
//! of single-row selects, so components behave identically against it. Tests use it to
//! script backend behavior and inspect what was written.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::backend::{
    auth::{self, AuthChangeEvent, AuthEvents, AuthService, AuthSubscription, Session, User},
    records::{NOT_FOUND_STATUS, ProfileFields, ProfileRecord, RecordStore, StoreError},
    storage::{self, ObjectStore},
};

#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    state: RwLock<State>,
    events: AuthEvents,
    select_calls: AtomicUsize,
    upsert_calls: AtomicUsize,
}

#[derive(Debug, Default)]
struct State {
    /// email -> (user, password)
    users: HashMap<String, (User, String)>,
    session: Option<Session>,
    require_confirmation: bool,
    profiles: HashMap<String, ProfileRecord>,
    objects: HashMap<(String, String), Vec<u8>>,
    next_select_error: Option<StoreError>,
    next_upsert_error: Option<StoreError>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user that can sign in with `email` and `password`.
    pub fn add_user(&self, email: &str, password: &str) -> User {
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: Some(email.to_string()),
        };
        self.inner
            .state
            .write()
            .users
            .insert(email.to_string(), (user.clone(), password.to_string()));
        user
    }

    /// Replace the current session without emitting an event, as if it had been restored
    /// from storage before anyone subscribed.
    pub fn restore_session(&self, session: Option<Session>) {
        self.inner.state.write().session = session;
    }

    /// Announce a session change to every subscriber, updating the current session.
    pub fn emit(&self, kind: AuthChangeEvent, session: Option<Session>) {
        self.inner.state.write().session = session.clone();
        self.inner.events.emit(kind, session);
    }

    /// Hold sessions back on sign-up until the (imaginary) email is confirmed.
    pub fn require_email_confirmation(&self, require: bool) {
        self.inner.state.write().require_confirmation = require;
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.events.subscriber_count()
    }

    pub fn profile(&self, user_id: &str) -> Option<ProfileRecord> {
        self.inner.state.read().profiles.get(user_id).cloned()
    }

    pub fn put_profile(&self, record: ProfileRecord) {
        self.inner
            .state
            .write()
            .profiles
            .insert(record.id.clone(), record);
    }

    pub fn object(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        self.inner
            .state
            .read()
            .objects
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
    }

    /// Make the next profile select fail with `err`.
    pub fn fail_next_select(&self, err: StoreError) {
        self.inner.state.write().next_select_error = Some(err);
    }

    /// Make the next profile upsert fail with `err`.
    pub fn fail_next_upsert(&self, err: StoreError) {
        self.inner.state.write().next_upsert_error = Some(err);
    }

    pub fn select_calls(&self) -> usize {
        self.inner.select_calls.load(Ordering::SeqCst)
    }

    pub fn upsert_calls(&self) -> usize {
        self.inner.upsert_calls.load(Ordering::SeqCst)
    }

    fn session_for(user: User) -> Session {
        Session {
            access_token: Uuid::new_v4().to_string(),
            refresh_token: Uuid::new_v4().to_string(),
            expires_at: None,
            user: Some(user),
        }
    }
}

#[async_trait]
impl AuthService for MemoryBackend {
    async fn current_session(&self) -> Result<Option<Session>, auth::Error> {
        Ok(self.inner.state.read().session.clone())
    }

    fn subscribe(&self) -> AuthSubscription {
        self.inner.events.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, auth::Error> {
        let user = match self.inner.state.read().users.get(email) {
            Some((user, expected)) if expected == password => user.clone(),
            _ => return Err(auth::Error::InvalidCredentials),
        };

        let session = Self::session_for(user);
        self.emit(AuthChangeEvent::SignedIn, Some(session.clone()));

        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, auth::Error> {
        if self.inner.state.read().users.contains_key(email) {
            return Err(auth::Error::AlreadyRegistered);
        }

        let user = self.add_user(email, password);
        if self.inner.state.read().require_confirmation {
            debug!("Holding back session for {email} until confirmation");
            return Ok(None);
        }

        let session = Self::session_for(user);
        self.emit(AuthChangeEvent::SignedIn, Some(session.clone()));

        Ok(Some(session))
    }

    async fn sign_out(&self) -> Result<(), auth::Error> {
        self.emit(AuthChangeEvent::SignedOut, None);
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryBackend {
    async fn select_profile(&self, user_id: &str) -> Result<ProfileFields, StoreError> {
        self.inner.select_calls.fetch_add(1, Ordering::SeqCst);

        let mut state = self.inner.state.write();
        if let Some(err) = state.next_select_error.take() {
            return Err(err);
        }

        state
            .profiles
            .get(user_id)
            .map(|record| record.fields.clone())
            .ok_or_else(|| StoreError::Response {
                status: NOT_FOUND_STATUS,
                message: "JSON object requested, multiple (or no) rows returned".into(),
            })
    }

    async fn upsert_profile(&self, record: &ProfileRecord) -> Result<(), StoreError> {
        self.inner.upsert_calls.fetch_add(1, Ordering::SeqCst);

        let mut state = self.inner.state.write();
        if let Some(err) = state.next_upsert_error.take() {
            return Err(err);
        }

        state.profiles.insert(record.id.clone(), record.clone());
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, storage::Error> {
        self.inner
            .state
            .write()
            .objects
            .insert((bucket.to_string(), path.to_string()), bytes);
        Ok(path.to_string())
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, storage::Error> {
        self.object(bucket, path)
            .ok_or_else(|| storage::Error::NotFound(format!("{bucket}/{path}")))
    }
}
