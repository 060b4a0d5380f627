use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{PredictionError, Predictor};
use crate::models::Prediction;

/// Request body for `POST /predict`. The service reads the sentence from `name`.
#[derive(Serialize)]
struct PredictRequest<'a> {
    name: &'a str,
}

/// Error body the service sends with 4xx/5xx, and sometimes with 200.
#[derive(Deserialize)]
struct ServiceErrorBody {
    error: String,
}

/// HTTP client for the prediction service.
pub struct HttpPredictor {
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpPredictor {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PredictionError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5).min(timeout))
            .timeout(timeout)
            .build()
            .map_err(|e| PredictionError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs: timeout.as_secs(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_send_error(&self, e: reqwest::Error) -> PredictionError {
        if e.is_timeout() {
            PredictionError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            PredictionError::Connection(self.base_url.clone())
        } else {
            PredictionError::HttpClient(e.to_string())
        }
    }
}

#[async_trait]
impl Predictor for HttpPredictor {
    async fn predict(&self, text: &str) -> Result<Prediction, PredictionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PredictionError::EmptyInput);
        }

        let url = format!("{}/predict", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&PredictRequest { name: text })
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ServiceErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            return Err(PredictionError::Service {
                status: status.as_u16(),
                message,
            });
        }

        if let Ok(err) = serde_json::from_str::<ServiceErrorBody>(&body) {
            return Err(PredictionError::Service {
                status: status.as_u16(),
                message: err.error,
            });
        }

        let prediction: Prediction = serde_json::from_str(&body)
            .map_err(|e| PredictionError::MalformedResponse(e.to_string()))?;

        tracing::debug!(category = %prediction.category, "Prediction received");
        Ok(prediction)
    }

    async fn health(&self) -> Result<(), PredictionError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PredictionError::Service {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    /// Serve `app` on an ephemeral localhost port and return its base URL.
    async fn spawn_stub(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    fn echo_service() -> Router {
        Router::new()
            .route(
                "/predict",
                post(|Json(body): Json<Value>| async move {
                    let sentence = body["name"].as_str().unwrap_or_default().to_string();
                    if sentence.is_empty() {
                        return (
                            StatusCode::BAD_REQUEST,
                            Json(json!({"error": "No sentence provided"})),
                        );
                    }
                    (
                        StatusCode::OK,
                        Json(json!({"message": "Anxiety", "advice": format!("About: {sentence}")})),
                    )
                }),
            )
            .route("/health", get(|| async { "Server Healthy" }))
    }

    fn client(base: &str) -> HttpPredictor {
        HttpPredictor::new(base, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn predict_sends_sentence_and_parses_category() {
        let base = spawn_stub(echo_service()).await;
        let prediction = client(&base).predict("  I can't sleep  ").await.unwrap();
        assert_eq!(prediction.category, "Anxiety");
        assert_eq!(prediction.advice, "About: I can't sleep");
    }

    #[tokio::test]
    async fn empty_input_is_rejected_locally() {
        let predictor = client("http://127.0.0.1:9");
        assert!(matches!(
            predictor.predict("   ").await,
            Err(PredictionError::EmptyInput)
        ));
    }

    #[tokio::test]
    async fn service_error_body_is_surfaced() {
        let app = Router::new().route(
            "/predict",
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "model not loaded"})),
                )
            }),
        );
        let base = spawn_stub(app).await;
        match client(&base).predict("hello").await {
            Err(PredictionError::Service { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "model not loaded");
            }
            other => panic!("expected service error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_fields_are_malformed() {
        let app = Router::new().route(
            "/predict",
            post(|| async { Json(json!({"category": "x"})) }),
        );
        let base = spawn_stub(app).await;
        assert!(matches!(
            client(&base).predict("hello").await,
            Err(PredictionError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_service_is_connection_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let predictor = client(&format!("http://{addr}"));
        assert!(matches!(
            predictor.predict("hello").await,
            Err(PredictionError::Connection(_))
        ));
        assert!(predictor.health().await.is_err());
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let app = Router::new().route(
            "/predict",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Json(json!({"message": "late", "advice": "late"}))
            }),
        );
        let base = spawn_stub(app).await;
        let predictor = HttpPredictor::new(&base, Duration::from_millis(200)).unwrap();
        assert!(matches!(
            predictor.predict("hello").await,
            Err(PredictionError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn health_ok_when_service_up() {
        let base = spawn_stub(echo_service()).await;
        assert!(client(&format!("{base}/")).health().await.is_ok());
    }
}
