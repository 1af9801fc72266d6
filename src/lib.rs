pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::{local::InlineUploader, uploader::ImageUploader, WorkerConfig};

#[cfg(feature = "s3")]
pub use config::bucket::S3Uploader;

pub use core::{handler::JobHandler, predictor::HttpPredictor, worker::Worker};
pub use utils::error::{Result, WorkerError};
