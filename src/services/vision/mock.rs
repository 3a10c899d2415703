#![allow(dead_code)]
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::{VisionError, VisionService};
use crate::models::autoplot::{ArrowDetection, DetectArrowsRequest, DetectedArrow};

#[derive(Clone)]
pub struct MockVisionService {
    pub calls: Arc<Mutex<usize>>,
    pub outcome: Arc<Mutex<Option<ArrowDetection>>>,
}

impl Default for MockVisionService {
    fn default() -> Self {
        Self {
            calls: Arc::new(Mutex::new(0)),
            outcome: Arc::new(Mutex::new(Some(ArrowDetection::Detected(vec![
                DetectedArrow {
                    x: 0.05,
                    y: -0.1,
                    face: None,
                    confidence: 0.95,
                    is_line_cutter: false,
                    is_my_arrow: true,
                },
            ])))),
        }
    }
}

impl MockVisionService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(reason: &str) -> Self {
        let mock = Self::default();
        *mock.outcome.lock().unwrap() = Some(ArrowDetection::Rejected(reason.to_string()));
        mock
    }

    /// Every call fails as if the service were unreachable.
    pub fn failing() -> Self {
        let mock = Self::default();
        *mock.outcome.lock().unwrap() = None;
        mock
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl VisionService for MockVisionService {
    async fn detect_arrows(
        &self,
        _request: &DetectArrowsRequest,
    ) -> Result<ArrowDetection, VisionError> {
        *self.calls.lock().unwrap() += 1;
        self.outcome
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| VisionError::InvalidResponse("mock vision failure".into()))
    }
}
