use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::audit::GuidelineCategory;

/// Brand guidelines as consumed by the engine. The audit step only needs to
/// know which rule dimensions exist; the rule text itself is passed through
/// to the audit model verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandGuidelines {
    pub brand_id: Uuid,
    pub name: String,
    /// Approved palette, hex values.
    #[serde(default)]
    pub color_palette: Vec<String>,
    #[serde(default)]
    pub typography_rules: Vec<String>,
    #[serde(default)]
    pub layout_rules: Vec<String>,
    #[serde(default)]
    pub logo_rules: Vec<String>,
}

impl BrandGuidelines {
    /// Whether the brand defines any rules for the given audit dimension.
    /// Categories without rules are excluded from scoring and their weight
    /// is redistributed.
    pub fn has_rules_for(&self, category: GuidelineCategory) -> bool {
        match category {
            GuidelineCategory::Colors => !self.color_palette.is_empty(),
            GuidelineCategory::Typography => !self.typography_rules.is_empty(),
            GuidelineCategory::Layout => !self.layout_rules.is_empty(),
            GuidelineCategory::LogoUsage => !self.logo_rules.is_empty(),
        }
    }
}

/// A brand logo image supplied to the generator as a reference asset.
#[derive(Debug, Clone)]
pub struct LogoAsset {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Everything the engine needs about a brand for one job: guidelines for
/// auditing, logo assets for generation.
#[derive(Debug, Clone)]
pub struct BrandContext {
    pub guidelines: BrandGuidelines,
    pub logos: Vec<LogoAsset>,
}

impl BrandContext {
    pub fn has_logos(&self) -> bool {
        !self.logos.is_empty()
    }
}
