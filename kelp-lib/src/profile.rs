//! The account screen's state: the signed-in user's profile row and its edit buffer.
//!
//! Each operation comes in three steps so front ends can run the middle one wherever
//! they run async work:
//!
//! 1. `begin_*` flips the loading flag and builds the request, or fails fast with an
//!    [`Alert`] when the session has no user.
//! 2. An associated async fn talks to the backend. It never touches the editor.
//! 3. `finish_*` applies the outcome and clears the loading flag.
//!
//! [`ProfileEditor::load`] and [`ProfileEditor::save`] chain all three for callers that
//! can simply await. Nothing orders overlapping operations: whichever finishes last
//! leaves its mark, including on the loading flag.

use chrono::Utc;
use getset::{CopyGetters, Getters};
use tracing::{debug, info, warn};

use crate::{
    Alert,
    backend::{Backend, ProfileFields, ProfileRecord, Session, StoreError},
};

const NO_USER: &str = "No user on the session!";

/// What a profile fetch came back with.
pub type LoadOutcome = Result<ProfileFields, StoreError>;

/// What a profile upsert came back with.
pub type SaveOutcome = Result<(), StoreError>;

/// A pending profile fetch for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    user_id: String,
}

#[derive(Debug, Getters, CopyGetters)]
pub struct ProfileEditor {
    #[getset(get = "pub")]
    session: Session,
    #[getset(get = "pub")]
    first_name: String,
    #[getset(get = "pub")]
    last_name: String,
    #[getset(get = "pub")]
    avatar_url: String,
    #[getset(get_copy = "pub")]
    loading: bool,
}

impl ProfileEditor {
    /// Create an editor for `session`. It starts out loading, since the first thing any
    /// editor does is fetch its profile.
    pub fn new(session: Session) -> Self {
        Self {
            session,
            first_name: String::new(),
            last_name: String::new(),
            avatar_url: String::new(),
            loading: true,
        }
    }

    /// Hand the editor a newer session for the same user, e.g. after a token refresh.
    /// Returns whether anything changed, in which case the profile should be loaded again.
    pub fn set_session(&mut self, session: Session) -> bool {
        if self.session == session {
            return false;
        }

        self.session = session;
        true
    }

    pub fn set_first_name(&mut self, first_name: impl Into<String>) {
        self.first_name = first_name.into();
    }

    pub fn set_last_name(&mut self, last_name: impl Into<String>) {
        self.last_name = last_name.into();
    }

    /// The fields as they currently stand in the edit buffer.
    pub fn fields(&self) -> ProfileFields {
        ProfileFields {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }

    // Load

    pub fn begin_load(&mut self) -> Result<LoadRequest, Alert> {
        self.loading = true;

        match self.user_id() {
            Ok(user_id) => Ok(LoadRequest { user_id }),
            Err(alert) => Err(self.fail(alert)),
        }
    }

    pub async fn fetch(backend: Backend, request: LoadRequest) -> LoadOutcome {
        backend.records().select_profile(&request.user_id).await
    }

    /// Apply a fetched profile. A missing row is not an error: the buffer is simply left
    /// as it was.
    pub fn finish_load(&mut self, outcome: LoadOutcome) -> Option<Alert> {
        self.loading = false;

        match outcome {
            Ok(fields) => {
                self.first_name = fields.first_name;
                self.last_name = fields.last_name;
                self.avatar_url = fields.avatar_url;
                None
            }
            Err(err) if err.is_not_found() => {
                debug!("No profile row yet: {err}");
                None
            }
            Err(err) => Some(self.fail(Alert::from_error(&err))),
        }
    }

    pub async fn load(&mut self, backend: &Backend) -> Option<Alert> {
        match self.begin_load() {
            Ok(request) => {
                let outcome = Self::fetch(backend.clone(), request).await;
                self.finish_load(outcome)
            }
            Err(alert) => Some(alert),
        }
    }

    // Save

    /// Build the full row from the edit buffer as it is right now.
    pub fn begin_save(&mut self) -> Result<ProfileRecord, Alert> {
        self.loading = true;

        match self.user_id() {
            Ok(id) => Ok(ProfileRecord {
                id,
                fields: self.fields(),
                updated_at: Utc::now(),
            }),
            Err(alert) => Err(self.fail(alert)),
        }
    }

    pub async fn persist(backend: Backend, record: ProfileRecord) -> SaveOutcome {
        backend.records().upsert_profile(&record).await?;
        info!("Saved profile {}", record.id);
        Ok(())
    }

    pub fn finish_save(&mut self, outcome: SaveOutcome) -> Option<Alert> {
        self.loading = false;

        outcome
            .err()
            .map(|err| self.fail(Alert::from_error(&err)))
    }

    pub async fn save(&mut self, backend: &Backend) -> Option<Alert> {
        match self.begin_save() {
            Ok(record) => {
                let outcome = Self::persist(backend.clone(), record).await;
                self.finish_save(outcome)
            }
            Err(alert) => Some(alert),
        }
    }

    // Avatar

    /// Take the key of a freshly uploaded avatar and start saving the profile with it.
    ///
    /// The names are read from the buffer at this moment, so edits made while the upload
    /// was in flight are saved too.
    pub fn begin_avatar_save(
        &mut self,
        avatar_url: impl Into<String>,
    ) -> Result<ProfileRecord, Alert> {
        self.avatar_url = avatar_url.into();
        self.begin_save()
    }

    pub async fn avatar_uploaded(
        &mut self,
        backend: &Backend,
        avatar_url: impl Into<String>,
    ) -> Option<Alert> {
        match self.begin_avatar_save(avatar_url) {
            Ok(record) => {
                let outcome = Self::persist(backend.clone(), record).await;
                self.finish_save(outcome)
            }
            Err(alert) => Some(alert),
        }
    }

    fn user_id(&self) -> Result<String, Alert> {
        self.session
            .user_id()
            .map(str::to_string)
            .ok_or_else(|| Alert::new(NO_USER))
    }

    /// Settle a failed operation.
    fn fail(&mut self, alert: Alert) -> Alert {
        self.loading = false;
        warn!("Profile operation failed: {alert}");
        alert
    }
}
