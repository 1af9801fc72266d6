#[cfg(feature = "s3")]
use crate::domain::ports::Uploader;
use crate::utils::error::{Result, WorkerError};
#[cfg(feature = "s3")]
use aws_config::BehaviorVersion;
#[cfg(feature = "s3")]
use aws_sdk_s3::config::{Credentials, Region};
#[cfg(feature = "s3")]
use aws_sdk_s3::error::DisplayErrorContext;
#[cfg(feature = "s3")]
use aws_sdk_s3::presigning::PresigningConfig;
#[cfg(feature = "s3")]
use aws_sdk_s3::primitives::ByteStream;
#[cfg(feature = "s3")]
use aws_sdk_s3::Client as S3Client;
use std::env;
#[cfg(feature = "s3")]
use std::path::Path;
#[cfg(feature = "s3")]
use std::time::Duration;

/// Presigned download links stay valid for a week.
pub const PRESIGN_EXPIRY_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct BucketConfig {
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub bucket_name: String,
}

impl BucketConfig {
    /// `Ok(None)` when `BUCKET_ENDPOINT_URL` is not set.
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars<F>(lookup: F) -> Result<Option<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(endpoint_url) = lookup("BUCKET_ENDPOINT_URL") else {
            return Ok(None);
        };
        let required = |key: &str| {
            lookup(key).ok_or_else(|| WorkerError::MissingConfigError {
                field: key.to_string(),
            })
        };

        Ok(Some(Self {
            endpoint_url,
            access_key_id: required("BUCKET_ACCESS_KEY_ID")?,
            secret_access_key: required("BUCKET_SECRET_ACCESS_KEY")?,
            region: lookup("BUCKET_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            // month-year buckets, e.g. "10-26"
            bucket_name: lookup("BUCKET_NAME")
                .unwrap_or_else(|| chrono::Utc::now().format("%m-%y").to_string()),
        }))
    }
}

impl crate::utils::validation::Validate for BucketConfig {
    fn validate(&self) -> Result<()> {
        use crate::utils::validation::*;

        validate_url("BUCKET_ENDPOINT_URL", &self.endpoint_url)?;
        validate_non_empty_string("BUCKET_ACCESS_KEY_ID", &self.access_key_id)?;
        validate_non_empty_string("BUCKET_SECRET_ACCESS_KEY", &self.secret_access_key)?;
        validate_non_empty_string("BUCKET_REGION", &self.region)?;
        validate_bucket_name("BUCKET_NAME", &self.bucket_name)?;

        tracing::debug!("Bucket configuration validation passed");
        Ok(())
    }
}

fn validate_bucket_name(field_name: &str, bucket_name: &str) -> Result<()> {
    if bucket_name.len() < 3 || bucket_name.len() > 63 {
        return Err(WorkerError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: bucket_name.to_string(),
            reason: "Bucket name must be between 3 and 63 characters".to_string(),
        });
    }

    if !bucket_name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(WorkerError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: bucket_name.to_string(),
            reason: "Bucket name can only contain lowercase letters, numbers, hyphens, and dots"
                .to_string(),
        });
    }

    if bucket_name.starts_with('-') || bucket_name.ends_with('-') {
        return Err(WorkerError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: bucket_name.to_string(),
            reason: "Bucket name cannot start or end with a hyphen".to_string(),
        });
    }

    Ok(())
}

/// Puts images at `<job_id>/<file name>` and answers with a presigned GET URL.
#[cfg(feature = "s3")]
#[derive(Debug, Clone)]
pub struct S3Uploader {
    client: S3Client,
    bucket: String,
}

#[cfg(feature = "s3")]
impl S3Uploader {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    pub async fn from_config(config: &BucketConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "bucket-env",
        );
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .endpoint_url(&config.endpoint_url)
            .force_path_style(true)
            .build();

        Self::new(S3Client::from_conf(s3_config), config.bucket_name.clone())
    }
}

#[cfg(feature = "s3")]
impl Uploader for S3Uploader {
    async fn upload_image(&self, job_id: &str, path: &Path) -> Result<String> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| WorkerError::UploadError {
                message: format!("{} has no usable file name", path.display()),
            })?;
        let key = format!("{}/{}", job_id, file_name);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| WorkerError::UploadError {
                message: format!("Failed to read {}: {}", path.display(), e),
            })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type("image/png")
            .body(body)
            .send()
            .await
            .map_err(|e| WorkerError::UploadError {
                message: format!("Failed to write to S3: {}", DisplayErrorContext(&e)),
            })?;

        let presigning = PresigningConfig::expires_in(Duration::from_secs(PRESIGN_EXPIRY_SECS))
            .map_err(|e| WorkerError::UploadError {
                message: format!("Invalid presigning config: {}", e),
            })?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .presigned(presigning)
            .await
            .map_err(|e| WorkerError::UploadError {
                message: format!("Failed to presign {}: {}", key, DisplayErrorContext(&e)),
            })?;

        tracing::debug!("Uploaded s3://{}/{}", self.bucket, key);
        Ok(presigned.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::validation::Validate;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_no_endpoint_means_no_bucket() {
        assert!(BucketConfig::from_vars(lookup(&[])).unwrap().is_none());
    }

    #[test]
    fn test_bucket_from_vars() {
        let config = BucketConfig::from_vars(lookup(&[
            ("BUCKET_ENDPOINT_URL", "https://s3.example.com"),
            ("BUCKET_ACCESS_KEY_ID", "AKIA"),
            ("BUCKET_SECRET_ACCESS_KEY", "secret"),
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.bucket_name.len(), 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_credentials() {
        let result = BucketConfig::from_vars(lookup(&[
            ("BUCKET_ENDPOINT_URL", "https://s3.example.com"),
            ("BUCKET_ACCESS_KEY_ID", "AKIA"),
        ]));
        assert!(matches!(
            result,
            Err(WorkerError::MissingConfigError { field }) if field == "BUCKET_SECRET_ACCESS_KEY"
        ));
    }

    #[test]
    fn test_bucket_name_rules() {
        assert!(validate_bucket_name("BUCKET_NAME", "10-26").is_ok());
        assert!(validate_bucket_name("BUCKET_NAME", "ab").is_err());
        assert!(validate_bucket_name("BUCKET_NAME", "Images").is_err());
        assert!(validate_bucket_name("BUCKET_NAME", "-images").is_err());
    }
}
