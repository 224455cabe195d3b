use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Guideline dimensions a candidate image is audited against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GuidelineCategory {
    Colors,
    Typography,
    Layout,
    LogoUsage,
}

/// Raw per-category finding as returned by the audit capability, before
/// weighting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryFinding {
    pub category: GuidelineCategory,
    /// 0–100.
    pub score: f64,
    #[serde(default)]
    pub violations: Vec<String>,
}

/// Unweighted auditor output for one candidate image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAudit {
    pub findings: Vec<CategoryFinding>,
    /// Free-text assessment from the audit model, if any.
    #[serde(default)]
    pub summary: Option<String>,
}

/// Weighted category outcome within an [`AuditResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryDetail {
    pub category: GuidelineCategory,
    /// 0–100, as reported by the auditor.
    pub score: f64,
    /// Renormalized weight this category contributed to the overall score.
    pub weight: f64,
    pub passed: bool,
    pub violations: Vec<String>,
}

/// Output of one audit step. Appended to the job's audit history and never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditResult {
    /// 1-based attempt this audit belongs to.
    pub attempt: u32,
    /// Weighted sum over applicable categories, 0–100.
    pub overall_score: f64,
    pub approved: bool,
    pub category_details: Vec<CategoryDetail>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl AuditResult {
    pub fn failed_categories(&self) -> impl Iterator<Item = &CategoryDetail> {
        self.category_details.iter().filter(|c| !c.passed)
    }
}
