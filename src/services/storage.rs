use std::time::Duration;

use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use crate::error::{AppError, AppResult};

/// Object storage facade for charge attachments. Objects are private;
/// reads go through short-lived presigned URLs.
#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
    url_ttl: Duration,
}

impl Storage {
    pub fn new(client: Client, bucket: String, url_ttl: Duration) -> Self {
        Self {
            client,
            bucket,
            url_ttl,
        }
    }

    pub async fn put_object(&self, key: &str, content_type: &str, body: Vec<u8>) -> AppResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|error| {
                tracing::error!(key, error = %error, "Attachment upload failed");
                AppError::Dependency("Attachment upload failed.".to_string())
            })?;

        Ok(())
    }

    /// Removal failures are logged but not surfaced; the pointer in the
    /// database stays authoritative and an orphaned object is harmless.
    pub async fn delete_object_best_effort(&self, key: &str) {
        if let Err(error) = self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            tracing::warn!(key, error = %error, "Attachment delete failed");
        }
    }

    pub async fn presigned_get_url(&self, key: &str) -> AppResult<String> {
        let presigning = PresigningConfig::expires_in(self.url_ttl).map_err(|error| {
            tracing::error!(error = %error, "Invalid presigning TTL");
            AppError::Dependency("Attachment URL signing failed.".to_string())
        })?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|error| {
                tracing::error!(key, error = %error, "Attachment URL signing failed");
                AppError::Dependency("Attachment URL signing failed.".to_string())
            })?;

        Ok(request.uri().to_string())
    }
}
