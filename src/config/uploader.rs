use crate::config::bucket::BucketConfig;
#[cfg(feature = "s3")]
use crate::config::bucket::S3Uploader;
use crate::config::local::InlineUploader;
use crate::domain::ports::Uploader;
use crate::utils::error::Result;
#[cfg(not(feature = "s3"))]
use crate::utils::error::WorkerError;
use crate::utils::validation::Validate;
use std::path::Path;

/// Uploader chosen at startup from the environment.
#[derive(Debug, Clone)]
pub enum ImageUploader {
    Inline(InlineUploader),
    #[cfg(feature = "s3")]
    S3(S3Uploader),
}

impl ImageUploader {
    /// Bucket upload when `BUCKET_*` is configured, inline data URLs otherwise.
    pub async fn from_env(upload_dir: &str) -> Result<Self> {
        match BucketConfig::from_env()? {
            Some(bucket) => Self::for_bucket(&bucket).await,
            None => {
                tracing::info!("No bucket configured, images are returned inline");
                Ok(ImageUploader::Inline(InlineUploader::new(upload_dir)))
            }
        }
    }

    #[cfg(feature = "s3")]
    async fn for_bucket(bucket: &BucketConfig) -> Result<Self> {
        bucket.validate()?;
        tracing::info!(
            "Uploading images to bucket {} at {}",
            bucket.bucket_name,
            bucket.endpoint_url
        );
        Ok(ImageUploader::S3(S3Uploader::from_config(bucket).await))
    }

    #[cfg(not(feature = "s3"))]
    async fn for_bucket(bucket: &BucketConfig) -> Result<Self> {
        bucket.validate()?;
        Err(WorkerError::ConfigError {
            message: "BUCKET_ENDPOINT_URL is set but this build lacks the `s3` feature"
                .to_string(),
        })
    }
}

impl Uploader for ImageUploader {
    async fn upload_image(&self, job_id: &str, path: &Path) -> Result<String> {
        match self {
            ImageUploader::Inline(uploader) => uploader.upload_image(job_id, path).await,
            #[cfg(feature = "s3")]
            ImageUploader::S3(uploader) => uploader.upload_image(job_id, path).await,
        }
    }
}
