use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArrowAppearance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fletch_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nock_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrap_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shaft_color: Option<String>,
}

/// Image analysis request for the metered auto-plot feature. Images are base64 JPEG payloads
/// passed through to the vision collaborator untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectArrowsRequest {
    #[serde(default)]
    pub shot_image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<String>,
    #[serde(default)]
    pub target_type: String,
    #[serde(default)]
    pub is_triple_spot: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrow_appearance: Option<ArrowAppearance>,
}

impl DetectArrowsRequest {
    pub fn missing_fields(&self) -> bool {
        self.shot_image.trim().is_empty() || self.target_type.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetectedArrow {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face: Option<u8>,
    #[serde(default = "full_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub is_line_cutter: bool,
    #[serde(default)]
    pub is_my_arrow: bool,
}

fn full_confidence() -> f64 {
    1.0
}

/// Outcome reported by the vision collaborator. Only `Detected` counts as a successful scan.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrowDetection {
    Detected(Vec<DetectedArrow>),
    Rejected(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetectArrowsResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrows: Option<Vec<DetectedArrow>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetectArrowsResponse {
    pub fn detected(arrows: Vec<DetectedArrow>) -> Self {
        Self {
            success: true,
            arrows: Some(arrows),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            arrows: None,
            error: Some(message.into()),
        }
    }
}
