/*!
 * HTTP text detection service client.
 *
 * The picture is posted as the raw request body; languages travel as a
 * comma-separated query parameter. The service answers with
 * `{"regions": [{"text": "..", "confidence": 0.93, "bbox": {"x":..,"y":..,"width":..,"height":..}}]}`.
 */

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{OcrEngine, TextRegion};
use crate::errors::OcrError;

#[derive(Debug, Deserialize)]
struct DetectionResponse {
    #[serde(default)]
    regions: Vec<TextRegion>,
}

/// Client for a remote detection endpoint
#[derive(Debug, Clone)]
pub struct RemoteOcrEngine {
    client: Client,
    endpoint: String,
}

impl RemoteOcrEngine {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();

        Self { client, endpoint: endpoint.into() }
    }
}

fn content_type(image: &[u8]) -> &'static str {
    match image::guess_format(image) {
        Ok(image::ImageFormat::Jpeg) => "image/jpeg",
        _ => "image/png",
    }
}

#[async_trait]
impl OcrEngine for RemoteOcrEngine {
    async fn detect(&self, image: &[u8], languages: &[String]) -> Result<Vec<TextRegion>, OcrError> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("languages", languages.join(","))])
            .header("Content-Type", content_type(image))
            .body(image.to_vec())
            .send()
            .await
            .map_err(|e| OcrError::Detection(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::Detection(format!("service returned {}: {}", status, body)));
        }

        let parsed: DetectionResponse = response
            .json()
            .await
            .map_err(|e| OcrError::Detection(format!("invalid response: {}", e)))?;

        debug!("{} regions detected", parsed.regions.len());
        Ok(parsed.regions)
    }

    fn name(&self) -> &str {
        "remote"
    }
}
