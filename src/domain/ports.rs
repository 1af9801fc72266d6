use crate::domain::model::PredictRequest;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Image generation backend. Loaded once at startup and shared by every job.
#[async_trait]
pub trait Predictor: Send + Sync {
    async fn setup(&self) -> Result<()>;
    fn is_loaded(&self) -> bool;
    async fn predict(&self, request: &PredictRequest) -> Result<Vec<PathBuf>>;
}

/// Turns a generated file into a URL the caller can fetch.
pub trait Uploader: Send + Sync {
    fn upload_image(
        &self,
        job_id: &str,
        path: &Path,
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}
