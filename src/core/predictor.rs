use crate::domain::model::PredictRequest;
use crate::domain::ports::Predictor;
use crate::utils::error::{Result, WorkerError};
use async_trait::async_trait;
use base64::{prelude::BASE64_STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Serialize)]
struct SetupRequest<'a> {
    base_model: &'a str,
    model_url: Option<&'a str>,
}

/// Backend reply. Multi-image backends answer with `images`, single-image ones
/// with `image`.
#[derive(Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    images: Vec<String>,
    image: Option<String>,
}

impl GenerationResponse {
    fn into_images(self) -> Vec<String> {
        let mut images = self.images;
        if images.is_empty() {
            images.extend(self.image);
        }
        images
    }
}

/// Forwards predictions to an HTTP image-generation backend and stores the
/// returned PNGs under `output_dir`.
pub struct HttpPredictor {
    client: Client,
    endpoint: String,
    base_model: String,
    model_url: Option<String>,
    output_dir: PathBuf,
    loaded: AtomicBool,
}

impl HttpPredictor {
    pub fn new(
        endpoint: impl Into<String>,
        base_model: impl Into<String>,
        model_url: Option<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            base_model: base_model.into(),
            model_url,
            output_dir: output_dir.into(),
            loaded: AtomicBool::new(false),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    async fn ensure_success(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(WorkerError::PredictionError {
            message: format!("{} returned {}: {}", what, status, body.trim()),
        })
    }
}

#[async_trait]
impl Predictor for HttpPredictor {
    async fn setup(&self) -> Result<()> {
        tracing::debug!("Probing predictor backend at {}", self.endpoint);
        let response = self.client.get(self.url("/health")).send().await?;
        Self::ensure_success(response, "Backend health check").await?;

        tracing::info!(
            "⚙️ Loading {} (checkpoint: {})",
            self.base_model,
            self.model_url.as_deref().unwrap_or("none")
        );
        let response = self
            .client
            .post(self.url("/setup"))
            .json(&SetupRequest {
                base_model: &self.base_model,
                model_url: self.model_url.as_deref(),
            })
            .send()
            .await?;
        Self::ensure_success(response, "Model setup").await?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    async fn predict(&self, request: &PredictRequest) -> Result<Vec<PathBuf>> {
        if !self.is_loaded() {
            return Err(WorkerError::PredictionError {
                message: "model is not loaded".to_string(),
            });
        }

        let response = self
            .client
            .post(self.url("/v1/images/generations"))
            .json(request)
            .send()
            .await?;
        let response = Self::ensure_success(response, "Image generation").await?;
        let images = response.json::<GenerationResponse>().await?.into_images();

        if images.len() != request.num_outputs as usize {
            return Err(WorkerError::PredictionError {
                message: format!(
                    "backend returned {} image(s), expected {}",
                    images.len(),
                    request.num_outputs
                ),
            });
        }

        // decode everything before touching the disk
        let decoded = images
            .iter()
            .map(|encoded| BASE64_STANDARD.decode(encoded))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let batch = uuid::Uuid::new_v4();
        let mut paths: Vec<std::path::PathBuf> = Vec::with_capacity(decoded.len());
        for (index, bytes) in decoded.into_iter().enumerate() {
            let path = self.output_dir.join(format!("{}-{}.png", batch, index));
            if let Err(e) = tokio::fs::write(&path, bytes).await {
                for written in &paths {
                    if let Err(e) = tokio::fs::remove_file(written).await {
                        tracing::warn!("Failed to remove {}: {}", written.display(), e);
                    }
                }
                return Err(e.into());
            }
            paths.push(path);
        }

        tracing::debug!("Backend produced {} image(s)", paths.len());
        Ok(paths)
    }
}
