use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::{CheckError, SupabaseClient, check, check_json};
use crate::backend::auth::{
    AuthChangeEvent, AuthService, AuthSubscription, Error, Session, User,
};

/// Refresh tokens this many seconds before they actually expire.
const EXPIRY_MARGIN_SECS: i64 = 10;

/// Statuses a logout may answer with when the token is already unusable.
const STALE_LOGOUT_STATUSES: [u16; 3] = [401, 403, 404];

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<User>,
}

impl From<TokenResponse> for Session {
    fn from(token: TokenResponse) -> Self {
        let expires_at = token.expires_at.or_else(|| {
            token
                .expires_in
                .map(|secs| Utc::now().timestamp().saturating_add(secs))
        });

        Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at,
            user: token.user,
        }
    }
}

impl From<CheckError> for Error {
    fn from(err: CheckError) -> Self {
        match err {
            CheckError::Api(failure) => Error::Response {
                status: failure.status,
                message: failure.message,
            },
            CheckError::Transport(err) => Error::Transport(err),
        }
    }
}

impl SupabaseClient {
    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<Session, Error> {
        let response = self
            .inner
            .http
            .post(self.endpoint("auth/v1/token"))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.inner.anon_key)
            .json(&body)
            .send()
            .await?;

        let token: TokenResponse = check_json(response).await?;
        Ok(token.into())
    }

    async fn refresh(&self, session: &Session) -> Result<Session, Error> {
        debug!("Refreshing access token");

        match self
            .token_grant(
                "refresh_token",
                json!({ "refresh_token": session.refresh_token }),
            )
            .await
        {
            Ok(refreshed) => {
                self.store_session(Some(refreshed.clone())).await?;
                self.inner
                    .events
                    .emit(AuthChangeEvent::TokenRefreshed, Some(refreshed.clone()));
                Ok(refreshed)
            }
            Err(err @ Error::Response { .. }) => {
                // The refresh token was rejected, so this session is over
                warn!("Token refresh rejected: {err}");
                self.store_session(None).await?;
                self.inner.events.emit(AuthChangeEvent::SignedOut, None);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }
}

fn needs_refresh(session: &Session) -> bool {
    session.is_expired(EXPIRY_MARGIN_SECS) && !session.refresh_token.is_empty()
}

#[async_trait]
impl AuthService for SupabaseClient {
    async fn current_session(&self) -> Result<Option<Session>, Error> {
        match self.session() {
            Some(session) if needs_refresh(&session) => {}
            session => return Ok(session),
        }

        let _refreshing = self.inner.refreshing.lock().await;

        // Another caller may have refreshed while this one waited
        match self.session() {
            Some(session) if needs_refresh(&session) => self.refresh(&session).await.map(Some),
            session => Ok(session),
        }
    }

    fn subscribe(&self) -> AuthSubscription {
        self.inner.events.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, Error> {
        let session = self
            .token_grant("password", json!({ "email": email, "password": password }))
            .await?;

        self.store_session(Some(session.clone())).await?;
        info!("Signed in as {email}");
        self.inner
            .events
            .emit(AuthChangeEvent::SignedIn, Some(session.clone()));

        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, Error> {
        let response = self
            .inner
            .http
            .post(self.endpoint("auth/v1/signup"))
            .header("apikey", &self.inner.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let body: serde_json::Value = check_json(response).await?;

        // Without an access token the project wants the address confirmed first
        if body.get("access_token").is_none() {
            info!("Signed up {email}, awaiting email confirmation");
            return Ok(None);
        }

        let session: Session = serde_json::from_value::<TokenResponse>(body)?.into();
        self.store_session(Some(session.clone())).await?;
        info!("Signed up and signed in as {email}");
        self.inner
            .events
            .emit(AuthChangeEvent::SignedIn, Some(session.clone()));

        Ok(Some(session))
    }

    async fn sign_out(&self) -> Result<(), Error> {
        if let Some(session) = self.session() {
            let response = self
                .authorize_with(
                    self.inner.http.post(self.endpoint("auth/v1/logout")),
                    Some(session.access_token),
                )
                .send()
                .await?;

            match check(response).await {
                Ok(_) => {}
                Err(CheckError::Api(failure))
                    if STALE_LOGOUT_STATUSES.contains(&failure.status) =>
                {
                    debug!("Server no longer knew the session: {}", failure.message);
                }
                Err(err) => return Err(err.into()),
            }
        }

        self.store_session(None).await?;
        info!("Signed out");
        self.inner.events.emit(AuthChangeEvent::SignedOut, None);

        Ok(())
    }
}
