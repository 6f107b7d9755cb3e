use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Status the row API answers with when a single-row select matches nothing.
pub const NOT_FOUND_STATUS: u16 = 406;

/// The editable columns, in the order they are selected.
pub const PROFILE_COLUMNS: [&str; 3] = ["first_name", "last_name", "avatar_url"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{message}")]
    Response { status: u16, message: String },
    #[error("{0}")]
    Transport(String),
}

impl StoreError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => Some(*status),
            Self::Transport(_) => None,
        }
    }

    /// Whether this error only says that the requested row doesn't exist.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(NOT_FOUND_STATUS)
    }
}

/// The editable part of a profile row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFields {
    #[serde(default, deserialize_with = "nullable")]
    pub first_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub last_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub avatar_url: String,
}

/// A complete profile row, as written by an upsert.
///
/// `id` is always the owning user's identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: String,
    #[serde(flatten)]
    pub fields: ProfileFields,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait RecordStore: Send + Sync + Debug {
    /// Fetch [`PROFILE_COLUMNS`] of the profile row keyed by `user_id`.
    ///
    /// A missing row is reported as a [`StoreError`] with [`NOT_FOUND_STATUS`].
    async fn select_profile(&self, user_id: &str) -> Result<ProfileFields, StoreError>;

    /// Insert the row, or replace it if one with the same `id` exists.
    async fn upsert_profile(&self, record: &ProfileRecord) -> Result<(), StoreError>;
}

fn nullable<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
