//! HTTP client for a Supabase project.
//!
//! Covers the three APIs the app needs:
//! - `auth/v1` for password sign-in, sign-up, token refresh and sign-out
//! - `rest/v1` for the profile row
//! - `storage/v1` for avatar objects
//!
//! The signed-in session is kept in memory and mirrored to a JSON file, so a restarted
//! process picks it back up.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::RwLock;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};
use tracing::{debug, warn};

use crate::{
    backend::auth::{self, AuthEvents, AuthService, Session},
    config::CoreConfig,
};

mod auth_api;
mod rest_api;
mod storage_api;

/// Keys an error body may carry its message under, most specific first.
const MESSAGE_KEYS: [&str; 4] = ["message", "msg", "error_description", "error"];

/// The session file holds live tokens, so only its owner may read it.
#[cfg(unix)]
const SESSION_FILE_MODE: u32 = 0o600;

#[derive(Debug, Clone)]
pub struct SupabaseClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    profiles_table: String,
    session: RwLock<Option<Session>>,
    /// Held while a token refresh is in flight, so concurrent callers share one refresh
    refreshing: Mutex<()>,
    session_file: Option<PathBuf>,
    events: AuthEvents,
}

impl SupabaseClient {
    /// Create a client for the project in `cfg`. If `session_file` holds a session from an
    /// earlier run it becomes the current session.
    pub fn new(cfg: &CoreConfig, session_file: Option<PathBuf>) -> Result<Self, auth::Error> {
        let session = match &session_file {
            Some(path) => read_session(path)?,
            None => None,
        };

        Ok(Self {
            inner: Arc::new(Inner {
                http: reqwest::Client::new(),
                base_url: cfg.url.trim_end_matches('/').to_string(),
                anon_key: cfg.anon_key.clone(),
                profiles_table: cfg.profiles_table.clone(),
                session: RwLock::new(session),
                refreshing: Mutex::new(()),
                session_file,
                events: AuthEvents::new(),
            }),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.inner.base_url, path.trim_start_matches('/'))
    }

    /// Attach the API key and a bearer token for the current session, refreshing it first
    /// if it has expired. Requests made while signed out authenticate with the anon key.
    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = match self.current_session().await {
            Ok(session) => session.map(|session| session.access_token),
            Err(err) => {
                // Let the server reject whatever is left rather than failing here
                warn!("Unable to refresh the session: {err}");
                self.session().map(|session| session.access_token)
            }
        };

        self.authorize_with(request, token)
    }

    fn authorize_with(&self, request: RequestBuilder, token: Option<String>) -> RequestBuilder {
        let token = token.unwrap_or_else(|| self.inner.anon_key.clone());

        request
            .header("apikey", &self.inner.anon_key)
            .bearer_auth(token)
    }

    fn session(&self) -> Option<Session> {
        self.inner.session.read().clone()
    }

    /// Replace the current session and mirror it to disk.
    async fn store_session(&self, session: Option<Session>) -> Result<(), auth::Error> {
        *self.inner.session.write() = session.clone();

        let Some(path) = &self.inner.session_file else {
            return Ok(());
        };

        match session {
            Some(session) => write_session(path, &session).await?,
            None => match tokio::fs::remove_file(path).await {
                Err(err) if err.kind() != ErrorKind::NotFound => return Err(err.into()),
                _ => {}
            },
        }

        Ok(())
    }
}

async fn write_session(path: &Path, session: &Session) -> Result<(), auth::Error> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(SESSION_FILE_MODE);

    let mut file = options.open(path).await?;
    // Files left by older runs keep their mode on open
    #[cfg(unix)]
    {
        use std::{fs::Permissions, os::unix::fs::PermissionsExt};
        file.set_permissions(Permissions::from_mode(SESSION_FILE_MODE))
            .await?;
    }
    file.write_all(&serde_json::to_vec_pretty(session)?).await?;
    file.flush().await?;

    Ok(())
}

fn read_session(path: &Path) -> Result<Option<Session>, auth::Error> {
    match fs::read(path) {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(session) => {
                debug!("Restored session from {}", path.display());
                Ok(Some(session))
            }
            Err(err) => {
                // A corrupt file just means signing in again
                warn!("Ignoring unreadable session file {}: {err}", path.display());
                Ok(None)
            }
        },
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// A failed response, reduced to its status and the most useful message it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ApiFailure {
    pub status: u16,
    pub message: String,
}

/// Pass successful responses through and turn the rest into an [`ApiFailure`].
async fn check(response: Response) -> Result<Response, CheckError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.map_err(CheckError::Transport)?;
    Err(CheckError::Api(ApiFailure {
        status: status.as_u16(),
        message: error_message(status, &body),
    }))
}

async fn check_json<T: DeserializeOwned>(response: Response) -> Result<T, CheckError> {
    check(response)
        .await?
        .json()
        .await
        .map_err(CheckError::Transport)
}

#[derive(Debug)]
enum CheckError {
    Api(ApiFailure),
    Transport(reqwest::Error),
}

/// Pull a human readable message out of an error body.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            MESSAGE_KEYS
                .iter()
                .find_map(|key| value.get(key)?.as_str().map(str::to_string))
        });

    from_json
        .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        })
}
