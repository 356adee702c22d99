pub mod client;
pub mod features;
pub mod metrics;

pub use client::{HttpPredictionClient, Predictor};
pub use features::{FeatureAssembler, FeatureSet};
pub use metrics::{mean_squared_error, ClassificationReport};
