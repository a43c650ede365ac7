use async_trait::async_trait;
use std::time::Duration;

use crate::application::ports::{DetectOptions, DetectionPort, ImagePayload};
use crate::domain::detection::{BoxMode, Detection, DetectionList};
use crate::domain::errors::DomainResult;

/// Detector de demostración: siempre devuelve las mismas tres detecciones normalizadas.
#[derive(Debug, Clone, Default)]
pub struct MockDetector {
    delay: Duration,
}

impl MockDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simula la latencia de un modelo real.
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn fixture() -> DetectionList {
        DetectionList::new(
            BoxMode::Normalized,
            vec![
                Detection::new(0, 0.92, [0.2, 0.3, 0.25, 0.4]),  // person
                Detection::new(2, 0.85, [0.5, 0.6, 0.3, 0.2]),   // car
                Detection::new(16, 0.78, [0.7, 0.7, 0.2, 0.15]), // dog
            ],
        )
    }
}

#[async_trait]
impl DetectionPort for MockDetector {
    fn name(&self) -> &str {
        "mock"
    }

    async fn detect(&self, _image: &ImagePayload, _options: &DetectOptions) -> DomainResult<DetectionList> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(Self::fixture())
    }
}
