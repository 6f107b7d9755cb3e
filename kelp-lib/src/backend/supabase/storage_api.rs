use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use super::{CheckError, SupabaseClient, check};
use crate::backend::storage::{Error, ObjectStore};

impl From<CheckError> for Error {
    fn from(err: CheckError) -> Self {
        match err {
            CheckError::Api(failure) if failure.status == 404 => Error::NotFound(failure.message),
            CheckError::Api(failure) => Error::Response {
                status: failure.status,
                message: failure.message,
            },
            CheckError::Transport(err) => Error::Transport(err.to_string()),
        }
    }
}

fn transport(err: reqwest::Error) -> Error {
    Error::Transport(err.to_string())
}

impl SupabaseClient {
    fn object_url(&self, bucket: &str, path: &str) -> String {
        self.endpoint(&format!(
            "storage/v1/object/{bucket}/{}",
            path.trim_start_matches('/')
        ))
    }
}

#[async_trait]
impl ObjectStore for SupabaseClient {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, Error> {
        debug!("Uploading {} bytes to {bucket}/{path}", bytes.len());

        let response = self
            .authorize(self.inner.http.post(self.object_url(bucket, path)))
            .await
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(transport)?;

        check(response).await?;
        Ok(path.to_string())
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, Error> {
        let response = self
            .authorize(self.inner.http.get(self.object_url(bucket, path)))
            .await
            .send()
            .await
            .map_err(transport)?;

        let bytes = check(response)
            .await?
            .bytes()
            .await
            .map_err(transport)?;

        Ok(bytes.to_vec())
    }
}
