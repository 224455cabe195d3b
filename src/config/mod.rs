use serde::Deserialize;
use std::time::Duration;

use crate::engine::EngineSettings;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Cloudflare account ID
    pub cf_account_id: String,

    /// Cloudflare Workers AI API token
    pub cf_api_token: String,

    /// Base URL of the brand guideline service
    pub brand_service_url: String,

    /// R2 bucket name
    pub r2_bucket: String,

    /// R2 access key ID (S3-compatible)
    pub r2_access_key: String,

    /// R2 secret access key (S3-compatible)
    pub r2_secret_key: String,

    /// R2 endpoint URL
    pub r2_endpoint: String,

    /// Public base URL under which finalized assets resolve
    pub r2_public_base_url: String,

    /// Generation-attempt ceiling per job
    #[serde(default = "default_max_generation_attempts")]
    pub max_generation_attempts: u32,

    /// Approval bar as a ratio (0.80 = weighted score of 80/100)
    #[serde(default = "default_compliance_threshold")]
    pub compliance_threshold: f64,

    /// HTTP attempts per webhook delivery cycle
    #[serde(default = "default_webhook_retry_max")]
    pub webhook_retry_max: u32,

    /// Hours a terminal job is kept before the sweeper drops it
    #[serde(default = "default_job_expiry_hours")]
    pub job_expiry_hours: i64,

    /// Timeout for one generation or audit call, in seconds
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_max_generation_attempts() -> u32 {
    3
}

fn default_compliance_threshold() -> f64 {
    0.80
}

fn default_webhook_retry_max() -> u32 {
    5
}

fn default_job_expiry_hours() -> i64 {
    24
}

fn default_step_timeout_secs() -> u64 {
    60
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            max_attempts: self.max_generation_attempts,
            compliance_threshold: self.compliance_threshold,
            webhook_retry_max: self.webhook_retry_max,
            job_expiry_hours: self.job_expiry_hours,
            step_timeout: Duration::from_secs(self.step_timeout_secs),
        }
    }
}
