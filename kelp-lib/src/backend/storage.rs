use std::fmt::Debug;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("{message}")]
    Response { status: u16, message: String },
    #[error("{0}")]
    Transport(String),
    #[error("Object not found: {0}")]
    NotFound(String),
}

/// Bucketed blob storage, used for avatar images.
#[async_trait]
pub trait ObjectStore: Send + Sync + Debug {
    /// Store `bytes` at `path` inside `bucket` and return the key to reference it by.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, Error>;

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, Error>;
}
