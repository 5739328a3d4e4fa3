//! Narration synthesis
//!
//! Turns page text into playable audio through the synthesis
//! collaborator. While a request is outstanding the generator reports a
//! synthetic 0→90 progress ramp for UI feedback, jumping to 100 when the
//! response arrives. Progress is cosmetic only; it is never used as a
//! correctness signal.

pub mod cache;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::PipelineError;

/// Synthesis collaborator contract.
#[async_trait]
pub trait SynthesisService: Send + Sync {
    /// Synthesize speech for `text` and return a playable audio handle.
    async fn synthesize(&self, text: &str) -> Result<SynthesisResponse, PipelineError>;
}

/// Response from the synthesis collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisResponse {
    pub audio_url: String,
    #[serde(default)]
    pub voice_id: Option<String>,
}

/// HTTP synthesis client (`POST {base}/tts/generate`).
pub struct HttpSynthesisClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
}

impl HttpSynthesisClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl SynthesisService for HttpSynthesisClient {
    async fn synthesize(&self, text: &str) -> Result<SynthesisResponse, PipelineError> {
        let url = format!("{}/tts/generate", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&SynthesisRequest { text })
            .send()
            .await?
            .error_for_status()
            .map_err(|e| PipelineError::Synthesis(e.to_string()))?;

        Ok(response.json().await?)
    }
}

/// Placeholder used when no synthesis backend is configured. Every page
/// degrades to image-only instead of the reader failing to open.
pub struct StubSynthesis;

#[async_trait]
impl SynthesisService for StubSynthesis {
    async fn synthesize(&self, _text: &str) -> Result<SynthesisResponse, PipelineError> {
        tracing::warn!("no synthesis backend configured, narration unavailable");
        Err(PipelineError::Synthesis("no synthesis backend".into()))
    }
}

/// Interval between synthetic progress steps while awaiting synthesis.
const PROGRESS_TICK: Duration = Duration::from_millis(150);
/// Ceiling of the synthetic ramp; 100 is reported only on arrival.
const PROGRESS_RAMP_MAX: u8 = 90;

/// Drives the synthesis collaborator and reports coarse progress.
pub struct NarrationGenerator {
    service: Arc<dyn SynthesisService>,
}

impl NarrationGenerator {
    pub fn new(service: Arc<dyn SynthesisService>) -> Self {
        Self { service }
    }

    /// Generate narration audio for `text`.
    ///
    /// When a progress channel is supplied, a 0→90 ramp is published
    /// while the request is in flight and 100 on completion (success or
    /// failure; the indicator must not be left hanging).
    pub async fn generate(
        &self,
        text: &str,
        progress: Option<watch::Sender<u8>>,
    ) -> Result<String, PipelineError> {
        let ticker = progress.clone().map(|tx| {
            tokio::spawn(async move {
                let mut percent = 0u8;
                while percent < PROGRESS_RAMP_MAX {
                    tokio::time::sleep(PROGRESS_TICK).await;
                    percent = (percent + 10).min(PROGRESS_RAMP_MAX);
                    if tx.send(percent).is_err() {
                        break;
                    }
                }
            })
        });

        let result = self.service.synthesize(text).await;

        if let Some(handle) = ticker {
            handle.abort();
        }
        if let Some(tx) = progress {
            let _ = tx.send(100);
        }

        match result {
            Ok(response) => Ok(response.audio_url),
            Err(e) => {
                tracing::warn!(error = %e, "narration synthesis failed");
                Err(e)
            }
        }
    }
}
