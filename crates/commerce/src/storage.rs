//! Object storage for product images.
//!
//! Talks to an HTTP object store that accepts `PUT` and `DELETE` on
//! `{endpoint}/{bucket}/{path}` with a bearer key. Uploaded objects are
//! served from `{public_url}/{path}`.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use uuid::Uuid;

use shopfront_core::ProductId;

use crate::env::StorageConfig;

/// Largest accepted image upload (5 MiB).
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Image extensions accepted for product images.
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "gif"];

/// Errors from the object store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with an unexpected status.
    #[error("storage returned {status}: {body}")]
    Api { status: StatusCode, body: String },

    /// The file extension is not an accepted image type.
    #[error("unsupported image type: {0}")]
    UnsupportedType(String),

    /// The file is larger than [`MAX_IMAGE_BYTES`].
    #[error("image too large ({0} bytes)")]
    TooLarge(usize),

    /// The upload was empty.
    #[error("image is empty")]
    Empty,
}

/// Lowercased extension of `filename` if it is an accepted image type.
///
/// # Errors
///
/// Returns `StorageError::UnsupportedType` for anything else.
pub fn image_extension(filename: &str) -> Result<String, StorageError> {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(StorageError::UnsupportedType(filename.to_string()))
    }
}

/// Content type for an accepted image extension.
#[must_use]
pub fn content_type_for(ext: &str) -> &'static str {
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Check an upload's size.
///
/// # Errors
///
/// Returns `StorageError::Empty` or `StorageError::TooLarge`.
pub const fn validate_image_size(len: usize) -> Result<(), StorageError> {
    if len == 0 {
        return Err(StorageError::Empty);
    }
    if len > MAX_IMAGE_BYTES {
        return Err(StorageError::TooLarge(len));
    }
    Ok(())
}

/// Object path for a new product image: `products/{id}/{uuid}.{ext}`.
///
/// # Errors
///
/// Returns `StorageError::UnsupportedType` if `filename` is not an image.
pub fn object_path_for(product_id: ProductId, filename: &str) -> Result<String, StorageError> {
    let ext = image_extension(filename)?;
    Ok(format!("products/{product_id}/{}.{ext}", Uuid::new_v4()))
}

/// Client for the object store.
#[derive(Clone)]
pub struct StorageClient {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    access_key: SecretString,
    public_url: String,
}

impl std::fmt::Debug for StorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageClient")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl StorageClient {
    /// Create a storage client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            bucket: config.bucket.clone(),
            access_key: config.access_key.clone(),
            public_url: config.public_url.clone(),
        })
    }

    /// Public URL of an object.
    #[must_use]
    pub fn public_url(&self, path: &str) -> String {
        format!("{}/{path}", self.public_url)
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/{}/{path}", self.endpoint, self.bucket)
    }

    /// Upload an object and return its public URL.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the store rejects it.
    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let response = self
            .client
            .put(self.object_url(path))
            .bearer_auth(self.access_key.expose_secret())
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Api { status, body });
        }

        tracing::info!(path, "Object uploaded");
        Ok(self.public_url(path))
    }

    /// Delete an object. Deleting a missing object succeeds.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the store rejects it.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let response = self
            .client
            .delete(self.object_url(path))
            .bearer_auth(self.access_key.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            tracing::info!(path, "Object deleted");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(StorageError::Api { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("Photo.JPG").unwrap(), "jpg");
        assert_eq!(image_extension("a.b.webp").unwrap(), "webp");
        assert!(matches!(
            image_extension("notes.pdf"),
            Err(StorageError::UnsupportedType(_))
        ));
        assert!(image_extension("no_extension").is_err());
    }

    #[test]
    fn test_object_path_for() {
        let path = object_path_for(ProductId::new(42), "mug.png").unwrap();
        let rest = path.strip_prefix("products/42/").unwrap();
        let (stem, ext) = rest.rsplit_once('.').unwrap();
        assert_eq!(ext, "png");
        assert!(Uuid::parse_str(stem).is_ok());

        let other = object_path_for(ProductId::new(42), "mug.png").unwrap();
        assert_ne!(path, other);
    }

    #[test]
    fn test_validate_image_size() {
        assert!(matches!(validate_image_size(0), Err(StorageError::Empty)));
        assert!(validate_image_size(1024).is_ok());
        assert!(validate_image_size(MAX_IMAGE_BYTES).is_ok());
        assert!(matches!(
            validate_image_size(MAX_IMAGE_BYTES + 1),
            Err(StorageError::TooLarge(_))
        ));
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("jpeg"), "image/jpeg");
        assert_eq!(content_type_for("gif"), "image/gif");
    }

    #[test]
    fn test_urls() {
        let client = StorageClient::new(&StorageConfig {
            endpoint: "https://store.test".to_string(),
            bucket: "images".to_string(),
            access_key: SecretString::from("k".repeat(40)),
            public_url: "https://cdn.test".to_string(),
        })
        .unwrap();

        assert_eq!(
            client.object_url("products/1/a.png"),
            "https://store.test/images/products/1/a.png"
        );
        assert_eq!(
            client.public_url("products/1/a.png"),
            "https://cdn.test/products/1/a.png"
        );
    }
}
