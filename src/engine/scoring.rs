use crate::models::audit::{
    AuditResult, CategoryDetail, GuidelineCategory, RawAudit,
};
use crate::models::brand::BrandGuidelines;

/// Fixed category weights. Categories a brand has no rules for are excluded
/// and their weight redistributed proportionally among the rest.
pub const CATEGORY_WEIGHTS: &[(GuidelineCategory, f64)] = &[
    (GuidelineCategory::Colors, 0.30),
    (GuidelineCategory::Typography, 0.25),
    (GuidelineCategory::Layout, 0.25),
    (GuidelineCategory::LogoUsage, 0.20),
];

/// Weigh a raw audit into the recorded result.
///
/// `threshold_pct` is the approval bar on the 0–100 scale, applied both per
/// category (the `passed` flag) and to the weighted overall score. An
/// applicable category the auditor failed to report scores zero rather than
/// silently passing.
pub fn weigh(
    raw: &RawAudit,
    guidelines: &BrandGuidelines,
    threshold_pct: f64,
    attempt: u32,
) -> AuditResult {
    let applicable: Vec<(GuidelineCategory, f64)> = CATEGORY_WEIGHTS
        .iter()
        .copied()
        .filter(|(category, _)| guidelines.has_rules_for(*category))
        .collect();

    let total_weight: f64 = applicable.iter().map(|(_, w)| w).sum();

    if applicable.is_empty() || total_weight <= 0.0 {
        return AuditResult {
            attempt,
            overall_score: 0.0,
            approved: false,
            category_details: Vec::new(),
            summary: raw.summary.clone(),
        };
    }

    let mut details = Vec::with_capacity(applicable.len());
    let mut overall = 0.0;

    for (category, base_weight) in applicable {
        let finding = raw.findings.iter().find(|f| f.category == category);
        let score = finding.map(|f| f.score.clamp(0.0, 100.0)).unwrap_or(0.0);
        let violations = finding.map(|f| f.violations.clone()).unwrap_or_default();

        let weight = base_weight / total_weight;
        overall += score * weight;

        details.push(CategoryDetail {
            category,
            score,
            weight,
            passed: score >= threshold_pct,
            violations,
        });
    }

    AuditResult {
        attempt,
        overall_score: overall,
        approved: overall >= threshold_pct,
        category_details: details,
        summary: raw.summary.clone(),
    }
}
