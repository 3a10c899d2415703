use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{VisionError, VisionService};
use crate::models::autoplot::{ArrowDetection, DetectArrowsRequest, DetectedArrow};

const DETECT_PATH: &str = "detect-arrows";

pub struct HttpVisionService {
    client: Client,
    base_url: Option<String>,
    api_key: Option<String>,
}

impl HttpVisionService {
    pub fn new(client: Client, base_url: Option<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.filter(|u| !u.trim().is_empty()),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub fn from_settings(client: Client, settings: &crate::config::VisionSettings) -> Self {
        Self::new(
            client,
            settings.base_url.clone(),
            settings.api_key.clone(),
        )
    }
}

fn build_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[derive(Default, Deserialize)]
struct RawDetection {
    #[serde(default)]
    arrows: Option<Vec<DetectedArrow>>,
    #[serde(default)]
    error: Option<String>,
}

fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<RawDetection>(body)
        .ok()
        .and_then(|raw| raw.error)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                "empty response".to_string()
            } else {
                body.trim().to_string()
            }
        })
}

#[async_trait]
impl VisionService for HttpVisionService {
    async fn detect_arrows(
        &self,
        request: &DetectArrowsRequest,
    ) -> Result<ArrowDetection, VisionError> {
        let base = self.base_url.as_deref().ok_or(VisionError::NotConfigured)?;
        let mut builder = self
            .client
            .post(build_url(base, DETECT_PATH))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        let status = response.status();
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            // The image was analysed but no usable target or arrows were found.
            let body = response.text().await.unwrap_or_default();
            return Ok(ArrowDetection::Rejected(extract_error_message(&body)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VisionError::UnexpectedStatus {
                status,
                message: extract_error_message(&body),
            });
        }

        let raw = response
            .json::<RawDetection>()
            .await
            .map_err(|err| VisionError::InvalidResponse(err.to_string()))?;
        match (raw.arrows, raw.error) {
            (Some(arrows), None) => Ok(ArrowDetection::Detected(arrows)),
            (_, Some(error)) => Ok(ArrowDetection::Rejected(error)),
            (None, None) => Err(VisionError::InvalidResponse(
                "response carried neither arrows nor error".into(),
            )),
        }
    }
}
