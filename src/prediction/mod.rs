//! Client side of the external prediction service.
//!
//! The service classifies a sentence a patient said into a problem category
//! and returns free-text advice for the therapist. It is reached over HTTP;
//! `Predictor` is the seam the therapy relay and the API depend on.

mod http;
#[cfg(test)]
pub(crate) mod mock;

pub use http::HttpPredictor;

use async_trait::async_trait;

use crate::models::Prediction;

#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    #[error("Nothing to classify: message is empty")]
    EmptyInput,

    #[error("Prediction service is not reachable at {0}")]
    Connection(String),

    #[error("Prediction request timed out after {0}s")]
    Timeout(u64),

    #[error("Prediction service returned error (status {status}): {message}")]
    Service { status: u16, message: String },

    #[error("Malformed prediction response: {0}")]
    MalformedResponse(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

#[async_trait]
pub trait Predictor: Send + Sync {
    /// Classify `text` and return a category with advice.
    async fn predict(&self, text: &str) -> Result<Prediction, PredictionError>;

    /// Cheap reachability check.
    async fn health(&self) -> Result<(), PredictionError>;
}
