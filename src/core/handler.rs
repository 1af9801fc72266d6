use crate::core::schema;
use crate::domain::model::{HandlerResponse, Job, OutputRecord, ValidatedInput};
use crate::domain::ports::{Predictor, Uploader};
use crate::utils::error::Result;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// Marshals one job through validation, prediction and upload.
pub struct JobHandler<U: Uploader> {
    predictor: Arc<dyn Predictor>,
    uploader: U,
    cleanup: bool,
}

impl<U: Uploader> JobHandler<U> {
    pub fn new(predictor: Arc<dyn Predictor>, uploader: U) -> Self {
        Self {
            predictor,
            uploader,
            cleanup: true,
        }
    }

    /// Remove generated files once they are uploaded.
    pub fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub async fn handle(&self, job: &Job) -> HandlerResponse {
        if is_health_check(&job.input) {
            tracing::debug!("Health check for job {}", job.id);
            return HandlerResponse::healthy(self.predictor.is_loaded());
        }

        let input = match schema::validate(&job.input) {
            Ok(input) => input,
            Err(errors) => {
                tracing::warn!("Job {} rejected: {}", job.id, errors.join(" "));
                return HandlerResponse::Errors { errors };
            }
        };

        tracing::info!(
            "🎨 Job {}: {} image(s) {}x{}, {} steps, {} scheduler, seed {}",
            job.id,
            input.num_outputs,
            input.width,
            input.height,
            input.num_inference_steps,
            input.scheduler,
            input.seed
        );

        let mut generated = Vec::new();
        let result = self.generate(&job.id, &input, &mut generated).await;

        if self.cleanup {
            remove_generated(&generated).await;
        }

        match result {
            Ok(records) => {
                tracing::info!("✅ Job {} produced {} image(s)", job.id, records.len());
                HandlerResponse::Outputs(records)
            }
            Err(e) => {
                tracing::error!("❌ Error during inference for job {}: {}", job.id, e);
                HandlerResponse::Error {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn generate(
        &self,
        job_id: &str,
        input: &ValidatedInput,
        generated: &mut Vec<PathBuf>,
    ) -> Result<Vec<OutputRecord>> {
        generated.extend(self.predictor.predict(input).await?);

        let mut records = Vec::with_capacity(generated.len());
        for (index, path) in generated.iter().enumerate() {
            let image_url = self.uploader.upload_image(job_id, path).await?;
            tracing::debug!("Uploaded {} for job {}", path.display(), job_id);
            records.push(OutputRecord::new(input, image_url, index));
        }

        Ok(records)
    }
}

/// Whether the input asks for a health check instead of a prediction.
pub fn is_health_check(input: &Value) -> bool {
    match input.get("health_check") {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(fields)) => !fields.is_empty(),
        Some(Value::Null) | None => false,
    }
}

async fn remove_generated(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::WorkerError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingPredictor {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Predictor for CountingPredictor {
        async fn setup(&self) -> Result<()> {
            Ok(())
        }

        fn is_loaded(&self) -> bool {
            true
        }

        async fn predict(&self, request: &ValidatedInput) -> Result<Vec<PathBuf>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(WorkerError::PredictionError {
                    message: "CUDA out of memory".to_string(),
                });
            }
            Ok((0..request.num_outputs)
                .map(|i| PathBuf::from(format!("/nonexistent/{}.png", i)))
                .collect())
        }
    }

    struct EchoUploader;

    impl Uploader for EchoUploader {
        async fn upload_image(&self, job_id: &str, path: &Path) -> Result<String> {
            Ok(format!("https://bucket/{}/{}", job_id, path.display()))
        }
    }

    fn handler(fail: bool) -> (Arc<CountingPredictor>, JobHandler<EchoUploader>) {
        let predictor = Arc::new(CountingPredictor {
            calls: AtomicUsize::new(0),
            fail,
        });
        let handler = JobHandler::new(predictor.clone(), EchoUploader).with_cleanup(false);
        (predictor, handler)
    }

    #[tokio::test]
    async fn test_health_check_short_circuits() {
        let (predictor, handler) = handler(false);
        // invalid fields would fail validation if it ran
        let job = Job {
            id: "job-1".to_string(),
            input: json!({"health_check": true, "width": 3}),
        };

        let response = handler.handle(&job).await;
        assert_eq!(response, HandlerResponse::healthy(true));
        assert_eq!(predictor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_validation_errors_skip_predictor() {
        let (predictor, handler) = handler(false);
        let job = Job {
            id: "job-2".to_string(),
            input: json!({"prompt": "p", "num_outputs": 4}),
        };

        match handler.handle(&job).await {
            HandlerResponse::Errors { errors } => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].starts_with("num_outputs"));
            }
            other => panic!("unexpected response: {:?}", other),
        }
        assert_eq!(predictor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_seeds_are_offset_per_output() {
        let (_, handler) = handler(false);
        let job = Job {
            id: "job-3".to_string(),
            input: json!({"prompt": "p", "num_outputs": 3, "seed": 100}),
        };

        let HandlerResponse::Outputs(records) = handler.handle(&job).await else {
            panic!("expected outputs");
        };
        let seeds: Vec<i64> = records.iter().map(|r| r.seed).collect();
        assert_eq!(seeds, vec![100, 101, 102]);
        assert_eq!(records[2].image, "https://bucket/job-3//nonexistent/2.png");
    }

    #[tokio::test]
    async fn test_predictor_failure_becomes_error_response() {
        let (predictor, handler) = handler(true);
        let job = Job {
            id: "job-4".to_string(),
            input: json!({"prompt": "p"}),
        };

        let response = handler.handle(&job).await;
        assert_eq!(
            response,
            HandlerResponse::Error {
                error: "Prediction failed: CUDA out of memory".to_string()
            }
        );
        assert_eq!(predictor.calls.load(Ordering::SeqCst), 1);
    }

    struct DiskPredictor {
        dir: PathBuf,
    }

    #[async_trait]
    impl Predictor for DiskPredictor {
        async fn setup(&self) -> Result<()> {
            Ok(())
        }

        fn is_loaded(&self) -> bool {
            true
        }

        async fn predict(&self, request: &ValidatedInput) -> Result<Vec<PathBuf>> {
            let mut paths = Vec::new();
            for i in 0..request.num_outputs {
                let path = self.dir.join(format!("out-{}.png", i));
                std::fs::write(&path, b"png")?;
                paths.push(path);
            }
            Ok(paths)
        }
    }

    struct RejectingUploader;

    impl Uploader for RejectingUploader {
        async fn upload_image(&self, _job_id: &str, _path: &Path) -> Result<String> {
            Err(WorkerError::UploadError {
                message: "bucket is read-only".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_upload_failure_becomes_error_and_cleans_up() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let predictor = Arc::new(DiskPredictor {
            dir: temp_dir.path().to_path_buf(),
        });
        let handler = JobHandler::new(predictor, RejectingUploader);
        let job = Job {
            id: "job-5".to_string(),
            input: json!({"prompt": "p", "num_outputs": 2}),
        };

        let response = handler.handle(&job).await;
        assert_eq!(
            response,
            HandlerResponse::Error {
                error: "Upload failed: bucket is read-only".to_string()
            }
        );
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_health_check_truthiness() {
        assert!(is_health_check(&json!({"health_check": true})));
        assert!(is_health_check(&json!({"health_check": 1})));
        assert!(is_health_check(&json!({"health_check": "yes"})));
        assert!(!is_health_check(&json!({"health_check": false})));
        assert!(!is_health_check(&json!({"health_check": 0})));
        assert!(!is_health_check(&json!({"health_check": ""})));
        assert!(!is_health_check(&json!({"health_check": null})));
        assert!(!is_health_check(&json!({"prompt": "p"})));
        assert!(!is_health_check(&json!("not an object")));
    }
}
