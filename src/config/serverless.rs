use crate::utils::error::{Result, WorkerError};
use crate::utils::validation::Validate;
use std::env;
use std::time::Duration;
use url::Url;

pub const JOB_ID_PLACEHOLDER: &str = "$ID";

/// Connection settings for the platform's job webhooks.
#[derive(Debug, Clone)]
pub struct ServerlessConfig {
    pub get_job_url: String,
    pub post_output_url: String,
    pub ping_url: Option<String>,
    pub api_key: Option<String>,
    pub pod_id: String,
    pub ping_interval: Duration,
    pub poll_interval: Duration,
}

impl ServerlessConfig {
    /// Whether the process runs inside the serverless platform.
    pub fn detected() -> bool {
        env::var("RUNPOD_WEBHOOK_GET_JOB").is_ok()
    }

    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| WorkerError::MissingConfigError {
                field: key.to_string(),
            })
        };
        let millis = |key: &str, default: u64| -> Result<Duration> {
            match lookup(key) {
                None => Ok(Duration::from_millis(default)),
                Some(raw) => raw.trim().parse().map(Duration::from_millis).map_err(|_| {
                    WorkerError::InvalidConfigValueError {
                        field: key.to_string(),
                        value: raw.clone(),
                        reason: "Expected a duration in milliseconds".to_string(),
                    }
                }),
            }
        };

        let config = Self {
            get_job_url: required("RUNPOD_WEBHOOK_GET_JOB")?,
            post_output_url: required("RUNPOD_WEBHOOK_POST_OUTPUT")?,
            ping_url: lookup("RUNPOD_WEBHOOK_PING"),
            api_key: lookup("RUNPOD_AI_API_KEY"),
            pod_id: lookup("RUNPOD_POD_ID").unwrap_or_else(|| "local".to_string()),
            ping_interval: millis("RUNPOD_PING_INTERVAL", 10_000)?,
            poll_interval: millis("RUNPOD_POLL_INTERVAL", 1_000)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn job_take_url(&self) -> String {
        substitute_id(&self.get_job_url, &self.pod_id)
    }

    pub fn job_done_url(&self, job_id: &str) -> String {
        substitute_id(&self.post_output_url, job_id)
    }

    pub fn heartbeat_url(&self) -> Option<String> {
        self.ping_url
            .as_ref()
            .map(|url| substitute_id(url, &self.pod_id))
    }
}

/// Replaces `$ID` with `id` encoded as a single URL path segment.
fn substitute_id(template: &str, id: &str) -> String {
    template.replace(JOB_ID_PLACEHOLDER, &encode_path_segment(id))
}

fn encode_path_segment(segment: &str) -> String {
    let Ok(mut scratch) = Url::parse("http://localhost/") else {
        return segment.to_string();
    };
    if let Ok(mut segments) = scratch.path_segments_mut() {
        segments.clear().push(segment);
    }
    scratch.path().trim_start_matches('/').to_string()
}

impl Validate for ServerlessConfig {
    fn validate(&self) -> Result<()> {
        use crate::utils::validation::*;

        validate_url("RUNPOD_WEBHOOK_GET_JOB", &self.get_job_url)?;
        validate_url("RUNPOD_WEBHOOK_POST_OUTPUT", &self.post_output_url)?;
        if let Some(ping_url) = &self.ping_url {
            validate_url("RUNPOD_WEBHOOK_PING", ping_url)?;
        }
        validate_non_empty_string("RUNPOD_POD_ID", &self.pod_id)?;
        validate_range(
            "RUNPOD_PING_INTERVAL",
            self.ping_interval.as_millis(),
            100,
            600_000,
        )?;
        validate_range(
            "RUNPOD_POLL_INTERVAL",
            self.poll_interval.as_millis(),
            1,
            600_000,
        )?;
        Ok(())
    }
}
