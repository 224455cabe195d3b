//! Test fixtures: brand contexts, audit scripts, and image payloads.

use uuid::Uuid;

use brandgen::models::audit::{CategoryFinding, GuidelineCategory, RawAudit};
use brandgen::models::brand::{BrandContext, BrandGuidelines, LogoAsset};
use brandgen::services::generator::GeneratedImage;

/// Minimal PNG payload (magic bytes only; the fakes never decode it).
pub const PNG_BYTES: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

pub fn png_image() -> GeneratedImage {
    GeneratedImage {
        bytes: PNG_BYTES.to_vec(),
        content_type: "image/png".to_string(),
    }
}

/// A brand with rules in every category and one logo asset.
pub fn brand_with_logos() -> BrandContext {
    BrandContext {
        guidelines: BrandGuidelines {
            brand_id: Uuid::new_v4(),
            name: "Northwind Trading".to_string(),
            color_palette: vec!["#0B3D91".to_string(), "#F2A900".to_string()],
            typography_rules: vec!["Headlines in Archivo Black".to_string()],
            layout_rules: vec!["Keep a 12-column grid".to_string()],
            logo_rules: vec!["Clearspace of 2x the mark height".to_string()],
        },
        logos: vec![LogoAsset {
            name: "northwind-primary".to_string(),
            content_type: "image/png".to_string(),
            data: PNG_BYTES.to_vec(),
        }],
    }
}

/// A brand with no logo assets and no logo rules.
pub fn brand_without_logos() -> BrandContext {
    BrandContext {
        guidelines: BrandGuidelines {
            brand_id: Uuid::new_v4(),
            name: "Plaintext Press".to_string(),
            color_palette: vec!["#222222".to_string()],
            typography_rules: vec!["Body copy in Literata".to_string()],
            layout_rules: vec!["Wide margins".to_string()],
            logo_rules: vec![],
        },
        logos: vec![],
    }
}

/// Raw audit where every category reports the same score. Failing
/// categories carry a violation so the correction synthesizer has material
/// to work with.
pub fn scripted_audit(score: f64) -> RawAudit {
    let violations = |category: &str| {
        if score < 80.0 {
            vec![format!("Bring {category} in line with the guidelines.")]
        } else {
            vec![]
        }
    };

    RawAudit {
        findings: vec![
            CategoryFinding {
                category: GuidelineCategory::Colors,
                score,
                violations: violations("the palette"),
            },
            CategoryFinding {
                category: GuidelineCategory::Typography,
                score,
                violations: violations("the typography"),
            },
            CategoryFinding {
                category: GuidelineCategory::Layout,
                score,
                violations: violations("the layout"),
            },
            CategoryFinding {
                category: GuidelineCategory::LogoUsage,
                score,
                violations: violations("the logo placement"),
            },
        ],
        summary: None,
    }
}
