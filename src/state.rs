use std::sync::Arc;
use std::time::Duration;

use aws_config::BehaviorVersion;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::services::storage::Storage;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db_pool: Option<PgPool>,
    pub storage: Option<Storage>,
}

impl AppState {
    pub async fn build(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let db_pool = match &config.database_url {
            Some(url) => Some(
                PgPoolOptions::new()
                    .max_connections(config.db_pool_max_connections)
                    .min_connections(config.db_pool_min_connections)
                    .acquire_timeout(Duration::from_secs(config.db_pool_acquire_timeout_seconds))
                    .idle_timeout(Duration::from_secs(config.db_pool_idle_timeout_seconds))
                    .connect_lazy(url)?,
            ),
            None => None,
        };

        let storage = match &config.attachments_bucket {
            Some(bucket) => {
                let shared = aws_config::defaults(BehaviorVersion::latest()).load().await;
                let mut builder = aws_sdk_s3::config::Builder::from(&shared);
                if let Some(endpoint) = &config.storage_endpoint_url {
                    // Supabase storage / MinIO style endpoints need path-style keys.
                    builder = builder.endpoint_url(endpoint).force_path_style(true);
                }
                Some(Storage::new(
                    aws_sdk_s3::Client::from_conf(builder.build()),
                    bucket.clone(),
                    Duration::from_secs(config.attachment_url_ttl_seconds),
                ))
            }
            None => None,
        };

        Ok(Self {
            config: Arc::new(config),
            db_pool,
            storage,
        })
    }

    pub fn db(&self) -> Result<&PgPool, AppError> {
        self.db_pool.as_ref().ok_or_else(|| {
            AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
        })
    }

    pub fn attachments(&self) -> Result<&Storage, AppError> {
        self.storage.as_ref().ok_or_else(|| {
            AppError::Dependency(
                "Attachment storage is not configured. Set ATTACHMENTS_BUCKET.".to_string(),
            )
        })
    }
}
