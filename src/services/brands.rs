use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::brand::{BrandContext, BrandGuidelines, LogoAsset};

/// Read-only access to brand guidelines and logo assets. Brand CRUD lives in
/// a separate service; the engine only consumes.
#[async_trait]
pub trait BrandStore: Send + Sync {
    async fn fetch(&self, brand_id: Uuid) -> Result<BrandContext, BrandStoreError>;

    /// Reachability probe for the health endpoint.
    async fn health_check(&self) -> Result<(), BrandStoreError> {
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BrandStoreError {
    #[error("brand {0} not found")]
    NotFound(Uuid),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("brand service returned status {0}")]
    Status(u16),
}

/// HTTP client for the brand guideline service.
pub struct BrandServiceClient {
    http: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct BrandPayload {
    #[serde(flatten)]
    guidelines: BrandGuidelines,
    #[serde(default)]
    logos: Vec<LogoRef>,
}

#[derive(Deserialize)]
struct LogoRef {
    name: String,
    url: String,
    content_type: String,
}

impl BrandServiceClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl BrandStore for BrandServiceClient {
    async fn fetch(&self, brand_id: Uuid) -> Result<BrandContext, BrandStoreError> {
        let url = format!("{}/api/v1/brands/{}", self.base_url, brand_id);
        let response = self.http.get(&url).send().await?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(BrandStoreError::NotFound(brand_id));
        }
        if !status.is_success() {
            return Err(BrandStoreError::Status(status.as_u16()));
        }

        let payload: BrandPayload = response.json().await?;

        let mut logos = Vec::with_capacity(payload.logos.len());
        for logo in payload.logos {
            let bytes = self
                .http
                .get(&logo.url)
                .send()
                .await?
                .error_for_status()
                .map_err(BrandStoreError::Http)?
                .bytes()
                .await?;
            logos.push(LogoAsset {
                name: logo.name,
                content_type: logo.content_type,
                data: bytes.to_vec(),
            });
        }

        Ok(BrandContext {
            guidelines: payload.guidelines,
            logos,
        })
    }

    async fn health_check(&self) -> Result<(), BrandStoreError> {
        let url = format!("{}/health", self.base_url);
        let response = self.http.get(&url).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(BrandStoreError::Status(response.status().as_u16()))
        }
    }
}
