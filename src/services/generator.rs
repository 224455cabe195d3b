use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;

use crate::models::brand::LogoAsset;

/// A candidate image produced by one generation step.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl GeneratedImage {
    /// Inline encoding used for the transient `current_image_url` before
    /// finalization.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// Image-generation capability.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Render a candidate for the prompt. `reference_assets` carries the
    /// brand logos when the continuity resolver requires them, and is empty
    /// otherwise.
    async fn generate(
        &self,
        prompt: &str,
        reference_assets: &[LogoAsset],
    ) -> Result<GeneratedImage, GeneratorError>;
}

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("image provider returned status {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("provider returned an undecodable image payload: {0}")]
    Decode(String),
}

impl GeneratorError {
    /// Transport errors, provider 5xx, rate limits, and garbled payloads are
    /// worth another attempt; a rejected request is not.
    pub fn is_retriable(&self) -> bool {
        match self {
            GeneratorError::Http(_) => true,
            GeneratorError::Provider { status, .. } => *status >= 500 || *status == 429,
            GeneratorError::Decode(_) => true,
        }
    }
}

/// Client for the Cloudflare Workers AI image model.
pub struct WorkersAiGenerator {
    http: Client,
    account_id: String,
    api_token: String,
}

const IMAGE_MODEL: &str = "@cf/black-forest-labs/flux-1-schnell";

#[derive(Deserialize)]
struct ImageResponse {
    result: ImageResult,
}

#[derive(Deserialize)]
struct ImageResult {
    /// Base64-encoded image payload.
    image: String,
}

impl WorkersAiGenerator {
    pub fn new(account_id: &str, api_token: &str) -> Self {
        Self {
            http: Client::new(),
            account_id: account_id.to_string(),
            api_token: api_token.to_string(),
        }
    }
}

#[async_trait]
impl ImageGenerator for WorkersAiGenerator {
    async fn generate(
        &self,
        prompt: &str,
        reference_assets: &[LogoAsset],
    ) -> Result<GeneratedImage, GeneratorError> {
        let url = format!(
            "https://api.cloudflare.com/client/v4/accounts/{}/ai/run/{}",
            self.account_id, IMAGE_MODEL
        );

        let references: Vec<String> = reference_assets
            .iter()
            .map(|asset| base64::engine::general_purpose::STANDARD.encode(&asset.data))
            .collect();

        let request_body = serde_json::json!({
            "prompt": prompt,
            "reference_images": references,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&request_body)
            .send()
            .await
            .map_err(GeneratorError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let image_resp: ImageResponse = response.json().await.map_err(GeneratorError::Http)?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(image_resp.result.image.as_bytes())
            .map_err(|e| GeneratorError::Decode(e.to_string()))?;

        // Sniff the format rather than trusting the provider blindly.
        let format = image::guess_format(&bytes)
            .map_err(|e| GeneratorError::Decode(e.to_string()))?;

        Ok(GeneratedImage {
            bytes,
            content_type: format.to_mime_type().to_string(),
        })
    }
}
