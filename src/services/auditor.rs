use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;

use crate::models::audit::RawAudit;
use crate::models::brand::BrandGuidelines;
use crate::services::generator::GeneratedImage;

/// Compliance-audit capability. Returns unweighted per-category findings;
/// the engine applies weights and the approval threshold.
#[async_trait]
pub trait ComplianceAuditor: Send + Sync {
    async fn audit(
        &self,
        image: &GeneratedImage,
        guidelines: &BrandGuidelines,
    ) -> Result<RawAudit, AuditorError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AuditorError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("audit provider returned status {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("failed to parse audit response as category findings: {0}")]
    Parse(#[from] serde_json::Error),
}

impl AuditorError {
    pub fn is_retriable(&self) -> bool {
        match self {
            AuditorError::Http(_) => true,
            AuditorError::Provider { status, .. } => *status >= 500 || *status == 429,
            // Vision models occasionally emit malformed JSON; retry.
            AuditorError::Parse(_) => true,
        }
    }
}

/// Client for the Cloudflare Workers AI LLaVA vision model.
pub struct WorkersAiAuditor {
    http: Client,
    account_id: String,
    api_token: String,
}

const AUDIT_MODEL: &str = "@cf/llava-hf/llava-1.5-7b-hf";

#[derive(Deserialize)]
struct LlavaResponse {
    result: LlavaResult,
}

#[derive(Deserialize)]
struct LlavaResult {
    description: String,
}

impl WorkersAiAuditor {
    pub fn new(account_id: &str, api_token: &str) -> Self {
        Self {
            http: Client::new(),
            account_id: account_id.to_string(),
            api_token: api_token.to_string(),
        }
    }

    fn audit_prompt(guidelines: &BrandGuidelines) -> String {
        format!(
            concat!(
                "Audit this image against the brand guidelines for {brand}. ",
                "Guidelines: color palette {colors:?}; typography rules {typo:?}; ",
                "layout rules {layout:?}; logo rules {logo:?}. ",
                "Score each dimension 0-100 and list concrete violations. ",
                "Return ONLY valid JSON of the form ",
                "{{\"findings\": [{{\"category\": \"colors|typography|layout|logo_usage\", ",
                "\"score\": 0, \"violations\": []}}], \"summary\": \"...\"}}."
            ),
            brand = guidelines.name,
            colors = guidelines.color_palette,
            typo = guidelines.typography_rules,
            layout = guidelines.layout_rules,
            logo = guidelines.logo_rules,
        )
    }
}

#[async_trait]
impl ComplianceAuditor for WorkersAiAuditor {
    async fn audit(
        &self,
        image: &GeneratedImage,
        guidelines: &BrandGuidelines,
    ) -> Result<RawAudit, AuditorError> {
        let url = format!(
            "https://api.cloudflare.com/client/v4/accounts/{}/ai/run/{}",
            self.account_id, AUDIT_MODEL
        );

        let request_body = serde_json::json!({
            "image": base64::engine::general_purpose::STANDARD.encode(&image.bytes),
            "prompt": Self::audit_prompt(guidelines),
            "max_tokens": 1024,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&request_body)
            .send()
            .await
            .map_err(AuditorError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AuditorError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let llava_resp: LlavaResponse = response.json().await.map_err(AuditorError::Http)?;

        serde_json::from_str(&llava_resp.result.description).map_err(AuditorError::Parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_raw_audit_wire_format_parses() {
        let raw: RawAudit = serde_json::from_str(
            r#"{
                "findings": [
                    {"category": "colors", "score": 72.5, "violations": ["off-palette teal"]},
                    {"category": "logo_usage", "score": 95}
                ],
                "summary": "Mostly on brand."
            }"#,
        )
        .unwrap();
        assert_eq!(raw.findings.len(), 2);
        assert_eq!(raw.findings[1].violations.len(), 0);
        assert_eq!(raw.summary.as_deref(), Some("Mostly on brand."));
    }

    #[test]
    fn test_audit_prompt_mentions_all_rule_sets() {
        let guidelines = BrandGuidelines {
            brand_id: Uuid::new_v4(),
            name: "Acme".to_string(),
            color_palette: vec!["#FF0000".to_string()],
            typography_rules: vec!["Inter".to_string()],
            layout_rules: vec!["grid".to_string()],
            logo_rules: vec!["clearspace".to_string()],
        };
        let prompt = WorkersAiAuditor::audit_prompt(&guidelines);
        assert!(prompt.contains("Acme"));
        assert!(prompt.contains("#FF0000"));
        assert!(prompt.contains("clearspace"));
        assert!(prompt.contains("logo_usage"));
    }
}
