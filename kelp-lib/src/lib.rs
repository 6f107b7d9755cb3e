//! Core of the Kelp account app.
//!
//! Kelp talks to a hosted backend (auth, row storage, object storage) through the
//! [`Backend`] handle and exposes the app's screens as plain state machines:
//! [`SessionController`] decides which screen is shown, [`ProfileEditor`] and
//! [`SignInForm`] hold the state of the account and sign-in screens. Front ends
//! drive them and render whatever they hold.

use thiserror::Error;

pub mod avatar;
pub mod backend;
pub mod config;
pub mod fs;
pub mod profile;
pub mod session;
pub mod sign_in;

mod alert;

pub use alert::Alert;
pub use backend::Backend;
pub use profile::ProfileEditor;
pub use session::{Screen, SessionController};
pub use sign_in::SignInForm;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] backend::auth::Error),
    #[error(transparent)]
    Store(#[from] backend::records::StoreError),
    #[error(transparent)]
    Storage(#[from] backend::storage::Error),
    #[error(transparent)]
    Config(#[from] config::Error),
    #[error("{0}")]
    Io(#[from] std::io::Error),
}
