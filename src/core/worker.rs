//! Job dispatch loop against the platform's webhooks, plus the one-shot local
//! test mode.

use crate::config::serverless::ServerlessConfig;
use crate::core::handler::JobHandler;
use crate::domain::model::{HandlerResponse, Job};
use crate::domain::ports::Uploader;
use crate::utils::error::{Result, WorkerError};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::path::Path;
use tokio::sync::watch;

pub const LOCAL_JOB_ID: &str = "local_test";
pub const TEST_INPUT_FILE: &str = "test_input.json";

/// A job payload supplied on the command line or in `test_input.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct TestInput {
    #[serde(default)]
    pub id: Option<String>,
    pub input: serde_json::Value,
}

impl TestInput {
    /// Picks the local test payload, if any. The fallback file is only consulted
    /// outside the serverless platform.
    pub fn resolve(
        cli_arg: Option<&str>,
        fallback_file: &Path,
        serverless: bool,
    ) -> Result<Option<Self>> {
        if let Some(raw) = cli_arg {
            tracing::info!("Using test input from --test_input");
            return Ok(Some(serde_json::from_str(raw)?));
        }

        if !serverless && fallback_file.exists() {
            tracing::info!("Using test input from {}", fallback_file.display());
            let raw = std::fs::read_to_string(fallback_file)?;
            return Ok(Some(serde_json::from_str(&raw)?));
        }

        Ok(None)
    }

    pub fn into_job(self) -> Job {
        Job {
            id: self.id.unwrap_or_else(|| LOCAL_JOB_ID.to_string()),
            input: self.input,
        }
    }
}

/// Runs a single job locally and returns the handler's answer.
pub async fn run_local<U: Uploader>(handler: &JobHandler<U>, test_input: TestInput) -> HandlerResponse {
    let job = test_input.into_job();
    tracing::info!("🧪 Running local test job {}", job.id);
    handler.handle(&job).await
}

/// Body posted back to the platform for a finished job.
pub fn result_body(response: &HandlerResponse) -> serde_json::Value {
    match response {
        HandlerResponse::Error { error } => json!({ "error": error }),
        other => json!({ "output": other }),
    }
}

pub struct Worker<U: Uploader> {
    handler: JobHandler<U>,
    config: ServerlessConfig,
    client: Client,
    current_job: watch::Sender<Option<String>>,
}

impl<U: Uploader> Worker<U> {
    pub fn new(handler: JobHandler<U>, config: ServerlessConfig) -> Self {
        let (current_job, _) = watch::channel(None);
        Self {
            handler,
            config,
            client: Client::new(),
            current_job,
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.header(reqwest::header::AUTHORIZATION, key),
            None => request,
        }
    }

    /// Polls for jobs until Ctrl-C. A fetch or job that is already in flight is
    /// finished and reported before the loop exits.
    pub async fn run(&self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown requested");
        })
        .await
    }

    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tokio::pin!(shutdown);
        let heartbeat = self.spawn_heartbeat();
        let mut stopping = false;

        tracing::info!("🚀 Worker {} polling {}", self.config.pod_id, self.config.job_take_url());
        while !stopping {
            let fetch = self.fetch_job();
            tokio::pin!(fetch);

            // a job handed out by the platform must not be dropped mid-request
            let fetched = tokio::select! {
                fetched = &mut fetch => fetched,
                _ = &mut shutdown => {
                    stopping = true;
                    fetch.as_mut().await
                }
            };

            match fetched {
                Ok(Some(job)) => {
                    if let Err(e) = self.process(job).await {
                        tracing::error!("❌ Failed to report job result: {}", e);
                    }
                    continue;
                }
                Ok(None) => tracing::trace!("No job available"),
                Err(e) => tracing::warn!("Failed to fetch job: {}", e),
            }

            if stopping {
                break;
            }
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        if let Some(heartbeat) = heartbeat {
            heartbeat.abort();
        }
        tracing::info!("Worker stopped");
        Ok(())
    }

    /// `Ok(None)` when the platform has no work queued.
    pub async fn fetch_job(&self) -> Result<Option<Job>> {
        let response = self
            .authorized(self.client.get(self.config.job_take_url()))
            .send()
            .await?
            .error_for_status()?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }

        let job: Job = serde_json::from_str(&body)?;
        if job.id.is_empty() {
            return Err(WorkerError::ValidationError {
                message: "job payload has an empty id".to_string(),
            });
        }
        Ok(Some(job))
    }

    /// Handles one job and posts its result.
    pub async fn process(&self, job: Job) -> Result<HandlerResponse> {
        tracing::info!("📥 Received job {}", job.id);
        self.current_job.send_replace(Some(job.id.clone()));

        let response = self.handler.handle(&job).await;
        let posted = self.post_result(&job.id, &response).await;

        self.current_job.send_replace(None);
        posted?;
        Ok(response)
    }

    async fn post_result(&self, job_id: &str, response: &HandlerResponse) -> Result<()> {
        self.authorized(self.client.post(self.config.job_done_url(job_id)))
            .json(&result_body(response))
            .send()
            .await?
            .error_for_status()?;
        tracing::debug!("Posted result for job {}", job_id);
        Ok(())
    }

    fn spawn_heartbeat(&self) -> Option<tokio::task::JoinHandle<()>> {
        let url = self.config.heartbeat_url()?;
        let client = self.client.clone();
        let api_key = self.config.api_key.clone();
        let interval = self.config.ping_interval;
        let current_job = self.current_job.subscribe();

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let job_id = current_job.borrow().clone();

                let mut request = client.get(&url);
                if let Some(job_id) = &job_id {
                    request = request.query(&[("job_id", job_id)]);
                }
                if let Some(key) = &api_key {
                    request = request.header(reqwest::header::AUTHORIZATION, key);
                }

                if let Err(e) = request.send().await.and_then(|r| r.error_for_status()) {
                    tracing::warn!("Heartbeat failed: {}", e);
                }
            }
        }))
    }
}
