// Domain layer: job/response models and the predictor/uploader ports.

pub mod model;
pub mod ports;
