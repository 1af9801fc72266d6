pub mod handler;
pub mod predictor;
pub mod schema;
pub mod worker;

pub use crate::domain::model::{HandlerResponse, Job, OutputRecord, Scheduler, ValidatedInput};
pub use crate::domain::ports::{Predictor, Uploader};
pub use crate::utils::error::Result;
