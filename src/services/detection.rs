use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;

use crate::models::record::Label;

/// Image label detection: bytes in, ordered `(label, confidence)` pairs out.
#[async_trait]
pub trait DetectionService: Send + Sync {
    async fn detect_labels(&self, image_bytes: &[u8]) -> Result<Vec<Label>, DetectionError>;
}

/// Client for the Cloudflare Workers AI ResNet-50 image classification model.
pub struct WorkersAiDetection {
    http: Client,
    account_id: String,
    api_token: String,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    #[serde(default)]
    result: Vec<Classification>,
    success: bool,
}

#[derive(Deserialize)]
struct Classification {
    label: String,
    score: f64,
}

impl WorkersAiDetection {
    pub fn new(account_id: &str, api_token: &str) -> Self {
        Self {
            http: Client::new(),
            account_id: account_id.to_string(),
            api_token: api_token.to_string(),
        }
    }
}

#[async_trait]
impl DetectionService for WorkersAiDetection {
    async fn detect_labels(&self, image_bytes: &[u8]) -> Result<Vec<Label>, DetectionError> {
        let url = format!(
            "https://api.cloudflare.com/client/v4/accounts/{}/ai/run/@cf/microsoft/resnet-50",
            self.account_id
        );

        let request_body = serde_json::json!({
            "image": base64::engine::general_purpose::STANDARD.encode(image_bytes),
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&request_body)
            .send()
            .await
            .map_err(DetectionError::Http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DetectionError::Service(format!(
                "classification request returned {status}"
            )));
        }

        let classify: ClassifyResponse = response.json().await.map_err(DetectionError::Http)?;
        if !classify.success {
            return Err(DetectionError::Service(
                "classification request was not successful".to_string(),
            ));
        }

        Ok(classify
            .result
            .into_iter()
            .map(|c| Label {
                name: c.label,
                confidence: c.score,
            })
            .collect())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Detection service error: {0}")]
    Service(String),
}
