use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::models::autoplot::{ArrowDetection, DetectArrowsRequest};

mod http;
mod mock;

pub use http::HttpVisionService;
#[allow(unused_imports)]
pub use mock::MockVisionService;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("failed to reach vision service: {0}")]
    Http(#[from] reqwest::Error),
    #[error("vision service responded with status {status}: {message}")]
    UnexpectedStatus { status: StatusCode, message: String },
    #[error("vision service returned an invalid response: {0}")]
    InvalidResponse(String),
    #[error("vision service is not configured")]
    NotConfigured,
}

/// Image analysis collaborator behind the metered auto-plot feature.
#[async_trait]
pub trait VisionService: Send + Sync {
    async fn detect_arrows(
        &self,
        request: &DetectArrowsRequest,
    ) -> Result<ArrowDetection, VisionError>;
}
