use std::fmt::Display;

use derive_more::Display;

/// A message shown to the user when an action fails.
///
/// Every failed action produces at most one [`Alert`]. It carries the raw error
/// message and nothing else; front ends decide how to present it.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("{message}")]
pub struct Alert {
    message: String,
}

impl Alert {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Build an alert from any error, keeping only its message.
    pub fn from_error(err: &impl Display) -> Self {
        Self::new(err.to_string())
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<crate::Error> for Alert {
    fn from(err: crate::Error) -> Self {
        Self::from_error(&err)
    }
}
