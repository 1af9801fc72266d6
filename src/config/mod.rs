pub mod bucket;
pub mod local;
pub mod serverless;
pub mod uploader;

#[cfg(feature = "cli")]
use clap::Parser;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_MODEL: &str = "runwayml/stable-diffusion-v1-5";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(Parser))]
#[cfg_attr(feature = "cli", command(name = "sd-worker"))]
#[cfg_attr(
    feature = "cli",
    command(about = "Serverless worker for Stable Diffusion text-to-image jobs")
)]
pub struct WorkerConfig {
    /// Direct URL to a safetensors checkpoint
    #[cfg_attr(feature = "cli", arg(long = "model_url"))]
    pub model_url: Option<String>,

    /// Base model to use (SD 1.5, SD 2.1, or SDXL)
    #[cfg_attr(feature = "cli", arg(long = "base_model", default_value = DEFAULT_BASE_MODEL))]
    pub base_model: String,

    #[cfg_attr(
        feature = "cli",
        arg(
            long = "predictor_endpoint",
            env = "PREDICTOR_ENDPOINT",
            default_value = "http://127.0.0.1:8000"
        )
    )]
    pub predictor_endpoint: String,

    #[cfg_attr(feature = "cli", arg(long = "output_dir", default_value = "./outputs"))]
    pub output_dir: String,

    /// Where simulated uploads land when no bucket is configured
    #[cfg_attr(feature = "cli", arg(long = "upload_dir", default_value = "."))]
    pub upload_dir: String,

    /// Run a single job from this JSON payload and exit
    #[cfg_attr(feature = "cli", arg(long = "test_input"))]
    pub test_input: Option<String>,

    #[cfg_attr(feature = "cli", arg(long = "no_cleanup", help = "Keep generated files after upload"))]
    pub no_cleanup: bool,

    #[cfg_attr(feature = "cli", arg(long, help = "Enable verbose output"))]
    pub verbose: bool,

    #[cfg_attr(feature = "cli", arg(long = "log_json", help = "Emit logs as JSON lines"))]
    pub log_json: bool,
}

impl crate::utils::validation::Validate for WorkerConfig {
    fn validate(&self) -> crate::utils::error::Result<()> {
        use crate::utils::validation::*;

        validate_non_empty_string("base_model", &self.base_model)?;
        if let Some(model_url) = &self.model_url {
            validate_url("model_url", model_url)?;
        }
        validate_url("predictor_endpoint", &self.predictor_endpoint)?;
        validate_path("output_dir", &self.output_dir)?;
        validate_path("upload_dir", &self.upload_dir)?;

        tracing::debug!("Worker configuration validation passed");
        Ok(())
    }
}
