use async_trait::async_trait;
use tracing::debug;

use super::{CheckError, SupabaseClient, check, check_json};
use crate::backend::records::{
    PROFILE_COLUMNS, ProfileFields, ProfileRecord, RecordStore, StoreError,
};

/// Makes the row API answer with a bare object, and with 406 when there isn't exactly one.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const UPSERT_PREFERENCE: &str = "resolution=merge-duplicates,return=minimal";

impl From<CheckError> for StoreError {
    fn from(err: CheckError) -> Self {
        match err {
            CheckError::Api(failure) => StoreError::Response {
                status: failure.status,
                message: failure.message,
            },
            CheckError::Transport(err) => StoreError::Transport(err.to_string()),
        }
    }
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Transport(err.to_string())
}

impl SupabaseClient {
    fn table(&self) -> String {
        self.endpoint(&format!("rest/v1/{}", self.inner.profiles_table))
    }
}

#[async_trait]
impl RecordStore for SupabaseClient {
    async fn select_profile(&self, user_id: &str) -> Result<ProfileFields, StoreError> {
        debug!("Selecting profile {user_id}");

        let response = self
            .authorize(self.inner.http.get(self.table()))
            .await
            .query(&[
                ("select", PROFILE_COLUMNS.join(",")),
                ("id", format!("eq.{user_id}")),
            ])
            .header("Accept", SINGLE_OBJECT)
            .send()
            .await
            .map_err(transport)?;

        Ok(check_json(response).await?)
    }

    async fn upsert_profile(&self, record: &ProfileRecord) -> Result<(), StoreError> {
        debug!("Upserting profile {}", record.id);

        let response = self
            .authorize(self.inner.http.post(self.table()))
            .await
            .header("Prefer", UPSERT_PREFERENCE)
            .json(record)
            .send()
            .await
            .map_err(transport)?;

        check(response).await?;
        Ok(())
    }
}
