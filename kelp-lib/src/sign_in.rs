//! The sign-in screen's state.
//!
//! A successful sign-in doesn't hand a session back to the form: the auth service
//! announces it, and the [`SessionController`](crate::SessionController) switches screens.

use getset::{CopyGetters, Getters};
use tracing::warn;

use crate::{Alert, Backend};

pub const CHECK_INBOX: &str = "Please check your inbox for email verification!";

/// Email and password as they were when an action started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    email: String,
    password: String,
}

/// How a sign-in or sign-up attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    SignedIn,
    /// Registered, but the session is held back until the email address is confirmed
    AwaitingConfirmation,
    Failed(Alert),
}

#[derive(Debug, Default, Getters, CopyGetters)]
pub struct SignInForm {
    #[getset(get = "pub")]
    email: String,
    #[getset(get = "pub")]
    password: String,
    #[getset(get_copy = "pub")]
    loading: bool,
}

impl SignInForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = email.into();
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = password.into();
    }

    pub fn begin(&mut self) -> Credentials {
        self.loading = true;

        Credentials {
            email: self.email.clone(),
            password: self.password.clone(),
        }
    }

    pub async fn sign_in(backend: Backend, credentials: Credentials) -> SignInOutcome {
        match backend
            .auth()
            .sign_in_with_password(&credentials.email, &credentials.password)
            .await
        {
            Ok(_) => SignInOutcome::SignedIn,
            Err(err) => SignInOutcome::Failed(Alert::from_error(&err)),
        }
    }

    pub async fn sign_up(backend: Backend, credentials: Credentials) -> SignInOutcome {
        match backend
            .auth()
            .sign_up(&credentials.email, &credentials.password)
            .await
        {
            Ok(Some(_)) => SignInOutcome::SignedIn,
            Ok(None) => SignInOutcome::AwaitingConfirmation,
            Err(err) => SignInOutcome::Failed(Alert::from_error(&err)),
        }
    }

    pub fn finish(&mut self, outcome: SignInOutcome) -> Option<Alert> {
        self.loading = false;

        match outcome {
            SignInOutcome::SignedIn => {
                self.password.clear();
                None
            }
            SignInOutcome::AwaitingConfirmation => Some(Alert::new(CHECK_INBOX)),
            SignInOutcome::Failed(alert) => {
                warn!("Authentication failed: {alert}");
                Some(alert)
            }
        }
    }
}
