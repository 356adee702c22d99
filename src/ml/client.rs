use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{ModelSelection, TimeoutSettings};
use crate::error::{EvalResult, EvaluationError};

use super::features::FeatureVector;

/// Remote model answering one predicted growth per feature vector.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Predictor: Send + Sync {
    async fn predict(&self, input: &[FeatureVector], selection: &ModelSelection) -> EvalResult<Vec<f64>>;
}

/// JSON body of a prediction call. Selectors are omitted when unset.
#[derive(Debug, Serialize)]
pub struct PredictionRequest<'a> {
    pub input: &'a [FeatureVector],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<&'a str>,
}

impl<'a> PredictionRequest<'a> {
    pub fn new(input: &'a [FeatureVector], selection: &'a ModelSelection) -> Self {
        Self {
            input,
            model: selection.model.as_ref().map(|m| m.as_str()),
            version: selection.version(),
            alias: selection.alias(),
        }
    }
}

/// Maps a non-success status to the run-aborting error.
pub fn status_error(status: StatusCode) -> EvaluationError {
    EvaluationError::PredictionService {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
    }
}

/// Checks the response carries exactly one prediction per input, in order.
pub fn check_predictions(expected: usize, predictions: Vec<f64>) -> EvalResult<Vec<f64>> {
    if predictions.len() != expected {
        return Err(EvaluationError::PredictionService {
            status: StatusCode::OK.as_u16(),
            reason: format!(
                "expected {} predictions, received {}",
                expected,
                predictions.len()
            ),
        });
    }
    Ok(predictions)
}

#[derive(Debug, Clone)]
pub struct HttpPredictionClient {
    client: Client,
    url: String,
}

impl HttpPredictionClient {
    pub fn new(url: impl Into<String>, timeouts: &TimeoutSettings) -> EvalResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Predictor for HttpPredictionClient {
    async fn predict(&self, input: &[FeatureVector], selection: &ModelSelection) -> EvalResult<Vec<f64>> {
        let body = PredictionRequest::new(input, selection);
        info!(
            "Requesting {} predictions from {} (model={:?}, version={:?}, alias={:?})",
            input.len(),
            self.url,
            body.model,
            body.version,
            body.alias
        );

        let resp = self.client.post(&self.url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            debug!("Prediction service body: {}", resp.text().await.unwrap_or_default());
            return Err(status_error(status));
        }

        let predictions: Vec<f64> = resp.json().await?;
        check_predictions(input.len(), predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelKind;
    use crate::ml::features::FEATURE_LEN;
    use serde_json::{json, Value};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answers one request on a local port with a canned response and
    /// hands back the request body it received.
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/predict", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            let request_body = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "connection closed before the request was complete");
                buf.extend_from_slice(&chunk[..n]);

                let Some(split) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                    continue;
                };
                let head = String::from_utf8_lossy(&buf[..split]).to_string();
                let length = head
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                let body_start = split + 4;
                if buf.len() >= body_start + length {
                    break String::from_utf8(buf[body_start..body_start + length].to_vec()).unwrap();
                }
            };

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            request_body
        });

        (url, server)
    }

    #[test]
    fn test_request_omits_unset_selectors() {
        let input = vec![FeatureVector([0.5; FEATURE_LEN])];
        let selection = ModelSelection {
            model: Some(ModelKind::Cbr),
            version: None,
            alias: Some("".into()),
        };
        let body = serde_json::to_value(PredictionRequest::new(&input, &selection)).unwrap();

        let object = body.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(body["model"], json!("CBR"));
        assert_eq!(body["input"][0].as_array().unwrap().len(), 32);
    }

    #[test]
    fn test_request_includes_all_selectors() {
        let input: Vec<FeatureVector> = Vec::new();
        let selection = ModelSelection {
            model: Some(ModelKind::Xgb),
            version: Some("3".into()),
            alias: Some("production".into()),
        };
        let body = serde_json::to_value(PredictionRequest::new(&input, &selection)).unwrap();
        assert_eq!(
            body,
            json!({"input": [], "model": "XGB", "version": "3", "alias": "production"})
        );
    }

    #[test]
    fn test_status_500_carries_code_and_reason() {
        let err = status_error(StatusCode::INTERNAL_SERVER_ERROR);
        let msg = err.to_string();
        assert!(matches!(err, EvaluationError::PredictionService { status: 500, .. }));
        assert!(msg.contains("500"));
        assert!(msg.contains("Internal Server Error"));
    }

    #[test]
    fn test_prediction_count_mismatch() {
        assert!(check_predictions(2, vec![0.1, 0.2]).is_ok());
        let err = check_predictions(3, vec![0.1]).unwrap_err();
        assert!(err.to_string().contains("expected 3 predictions"));
    }

    #[tokio::test]
    async fn test_predict_server_error_aborts_with_status() {
        let (url, server) = serve_once("500 Internal Server Error", "").await;
        let client = HttpPredictionClient::new(url, &TimeoutSettings::default()).unwrap();
        let input = vec![FeatureVector([0.5; FEATURE_LEN])];

        let err = client.predict(&input, &ModelSelection::default()).await.unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, EvaluationError::PredictionService { status: 500, .. }));
        assert!(msg.contains("500"));
        assert!(msg.contains("Internal Server Error"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_predict_posts_vectors_and_parses_response() {
        let (url, server) = serve_once("200 OK", "[0.1]").await;
        let client = HttpPredictionClient::new(url, &TimeoutSettings::default()).unwrap();
        let input = vec![FeatureVector([0.25; FEATURE_LEN])];

        let predictions = client.predict(&input, &ModelSelection::default()).await.unwrap();
        assert_eq!(predictions, vec![0.1]);

        let sent: Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        let vectors = sent["input"].as_array().unwrap();
        assert_eq!(vectors.len(), 1);
        let vector = vectors[0].as_array().unwrap();
        assert_eq!(vector.len(), 32);
        assert!(vector.iter().all(|v| v.as_f64() == Some(0.25)));
        assert_eq!(sent["model"], json!("CBR"));
        assert!(sent.get("version").is_none());
    }

    #[tokio::test]
    async fn test_predict_rejects_short_response() {
        let (url, server) = serve_once("200 OK", "[0.1]").await;
        let client = HttpPredictionClient::new(url, &TimeoutSettings::default()).unwrap();
        let input = vec![FeatureVector([0.25; FEATURE_LEN]); 2];

        let err = client.predict(&input, &ModelSelection::default()).await.unwrap_err();
        assert!(matches!(err, EvaluationError::PredictionService { status: 200, .. }));
        server.await.unwrap();
    }
}
