use std::sync::Mutex;

use async_trait::async_trait;

use super::{PredictionError, Predictor};
use crate::models::Prediction;

/// Scripted predictor for tests. Records every text it was asked to classify.
pub(crate) struct MockPredictor {
    reply: Option<Prediction>,
    pub(crate) calls: Mutex<Vec<String>>,
}

impl MockPredictor {
    pub(crate) fn replying(category: &str, advice: &str) -> Self {
        Self {
            reply: Some(Prediction {
                category: category.into(),
                advice: advice.into(),
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails as if the service were down.
    pub(crate) fn failing() -> Self {
        Self {
            reply: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Predictor for MockPredictor {
    async fn predict(&self, text: &str) -> Result<Prediction, PredictionError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(text.to_string());
        }
        self.reply
            .clone()
            .ok_or_else(|| PredictionError::Connection("mock://down".into()))
    }

    async fn health(&self) -> Result<(), PredictionError> {
        match self.reply {
            Some(_) => Ok(()),
            None => Err(PredictionError::Connection("mock://down".into())),
        }
    }
}
