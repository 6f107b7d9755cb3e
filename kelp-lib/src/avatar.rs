//! Avatar images in object storage.
//!
//! Avatars live in the configured bucket under `<user id>/<random>.<ext>`. The profile row
//! only stores that key, never the image itself.

use std::path::Path;

use tracing::{debug, info};
use uuid::Uuid;

use crate::{Backend, Result};

/// Storage key for a new avatar of `user_id`, keeping the extension of `file`.
pub fn avatar_key(user_id: &str, file: &Path) -> String {
    let name = Uuid::new_v4();
    match extension(file) {
        Some(ext) => format!("{user_id}/{name}.{ext}"),
        None => format!("{user_id}/{name}"),
    }
}

pub fn content_type(file: &Path) -> &'static str {
    match extension(file).as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

fn extension(file: &Path) -> Option<String> {
    file.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// Upload the image at `file` as a new avatar for `user_id` and return its key.
pub async fn upload_from_path(
    backend: Backend,
    user_id: String,
    file: impl AsRef<Path>,
) -> Result<String> {
    let file = file.as_ref();
    let bytes = tokio::fs::read(file).await?;
    let key = avatar_key(&user_id, file);
    let bucket = backend.cfg().read().avatar_bucket.clone();

    debug!("Uploading avatar {} as {key}", file.display());
    let key = backend
        .storage()
        .upload(&bucket, &key, bytes, content_type(file))
        .await?;
    info!("Uploaded avatar {key}");

    Ok(key)
}

/// Fetch the image stored under `key`.
pub async fn download(backend: Backend, key: String) -> Result<Vec<u8>> {
    let bucket = backend.cfg().read().avatar_bucket.clone();
    Ok(backend.storage().download(&bucket, &key).await?)
}
