use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Image decode error: {0}")]
    DecodeError(#[from] base64::DecodeError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Prediction failed: {message}")]
    PredictionError { message: String },

    #[error("Upload failed: {message}")]
    UploadError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Storage,
    Inference,
    Input,
}

impl WorkerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            WorkerError::ConfigError { .. }
            | WorkerError::InvalidConfigValueError { .. }
            | WorkerError::MissingConfigError { .. } => ErrorCategory::Configuration,
            WorkerError::HttpError(_) => ErrorCategory::Network,
            WorkerError::IoError(_) | WorkerError::UploadError { .. } => ErrorCategory::Storage,
            WorkerError::PredictionError { .. } | WorkerError::DecodeError(_) => {
                ErrorCategory::Inference
            }
            WorkerError::SerializationError(_) | WorkerError::ValidationError { .. } => {
                ErrorCategory::Input
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Worker configuration is invalid: {}", self),
            ErrorCategory::Network => format!("Could not reach a remote service: {}", self),
            ErrorCategory::Storage => format!("Could not store generated images: {}", self),
            ErrorCategory::Inference => format!("Image generation failed: {}", self),
            ErrorCategory::Input => format!("Job payload could not be processed: {}", self),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the command-line flags and RUNPOD_*/BUCKET_* environment variables"
            }
            ErrorCategory::Network => {
                "Make sure the predictor backend is running and PREDICTOR_ENDPOINT points at it"
            }
            ErrorCategory::Storage => "Check disk space, output directory permissions and bucket credentials",
            ErrorCategory::Inference => "Inspect the predictor backend logs for the failing request",
            ErrorCategory::Input => "Fix the job payload and resubmit",
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_mapping() {
        let err = WorkerError::MissingConfigError {
            field: "RUNPOD_WEBHOOK_GET_JOB".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(err.user_friendly_message().contains("RUNPOD_WEBHOOK_GET_JOB"));

        let err = WorkerError::PredictionError {
            message: "CUDA out of memory".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Inference);
        assert_eq!(err.to_string(), "Prediction failed: CUDA out of memory");
    }
}
