use crate::config::Config;
use crate::helper::form_helpers::UploadedFile;
use crate::models::db_operations::baas_client::{BaasClient, BaasError};
use crate::models::db_operations::storage_operations::{self, UPLOADS_BUCKET};
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Unsupported file type: '{0}'. Please upload an image.")]
    DisallowedType(String),
    #[error("File is too large. Maximum size is {0}MB.")]
    TooLarge(u64),
    #[error("You can add at most {0} images.")]
    TooManyImages(usize),
    #[error("No file was uploaded.")]
    NoFile,
    #[error("Could not read the upload: {0}")]
    Multipart(String),
    #[error("Upload failed: {0}")]
    Storage(#[from] BaasError),
}

/// Maps a validated MIME type to the extension used in the object path.
/// Not configurable, so a misconfigured allow-list cannot produce odd paths.
pub fn mime_to_safe_extension(mime_type: &str) -> Option<&'static str> {
    let map: BTreeMap<&str, &str> = [
        ("image/avif", "avif"),
        ("image/gif", "gif"),
        ("image/jpeg", "jpg"),
        ("image/png", "png"),
        ("image/svg+xml", "svg"),
        ("image/webp", "webp"),
    ]
    .iter()
    .cloned()
    .collect();

    map.get(mime_type).cloned()
}

/// Checks applied to every file before it is sent to storage.
#[derive(Debug, Clone)]
pub struct UploadRules {
    allowed_mime_types: HashSet<String>,
    max_size_mb: u64,
}

impl UploadRules {
    pub fn new(allowed_mime_types: HashSet<String>, max_size_mb: u64) -> Self {
        Self { allowed_mime_types, max_size_mb }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.allowed_mime_set(), config.max_upload_size_mb)
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb * 1024 * 1024
    }

    pub fn check_type(&self, content_type: &str) -> Result<(), UploadError> {
        if self.allowed_mime_types.contains(content_type) {
            Ok(())
        } else {
            Err(UploadError::DisallowedType(content_type.to_string()))
        }
    }

    pub fn check_size(&self, size: u64) -> Result<(), UploadError> {
        if size > self.max_size_bytes() {
            Err(UploadError::TooLarge(self.max_size_mb))
        } else {
            Ok(())
        }
    }
}

/// `{user_id}/{unix_millis}-{random}.{ext}`
pub fn object_path(user_id: Uuid, extension: &str, unix_millis: i64, random: &str) -> String {
    format!("{}/{}-{}.{}", user_id, unix_millis, random, extension)
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

/// Uploads one file to the `uploads` bucket and returns its public URL.
pub async fn store_file(
    client: &BaasClient,
    access_token: &str,
    user_id: Uuid,
    file: UploadedFile,
) -> Result<String, UploadError> {
    let path = object_path(user_id, file.extension, Utc::now().timestamp_millis(), &random_suffix());
    log::info!(
        "Uploading '{}' ({} bytes, {}) to {}",
        file.original_filename,
        file.bytes.len(),
        file.content_type,
        path
    );
    storage_operations::upload_object(client, access_token, UPLOADS_BUCKET, &path, file.bytes, &file.content_type).await?;
    Ok(storage_operations::public_url(client, UPLOADS_BUCKET, &path))
}

/// Uploads several files in order; stops at the first failure.
pub async fn store_files(
    client: &BaasClient,
    access_token: &str,
    user_id: Uuid,
    files: Vec<UploadedFile>,
) -> Result<Vec<String>, UploadError> {
    let mut urls = Vec::with_capacity(files.len());
    for file in files {
        urls.push(store_file(client, access_token, user_id, file).await?);
    }
    Ok(urls)
}

/// Product galleries are capped; URLs and files count together.
pub fn check_image_count(existing: usize, added: usize, max: usize) -> Result<(), UploadError> {
    if existing + added > max {
        Err(UploadError::TooManyImages(max))
    } else {
        Ok(())
    }
}
