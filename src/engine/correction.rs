use crate::models::audit::AuditResult;

/// Marker inserted between the prompt and the synthesized fix.
const CORRECTION_MARKER: &str = ". IMPORTANT CORRECTION: ";

/// At most this many violation descriptions feed one correction.
const MAX_VIOLATIONS: usize = 3;

/// Derive a prompt amendment from the latest audit.
///
/// Takes up to the first three violation descriptions across failed
/// categories, in category order, joined with single spaces. When the audit
/// reported no violations the free-text summary is used instead, but only
/// if it actually suggests something; otherwise there is nothing actionable
/// and the prompt is retried unchanged.
pub fn synthesize(audit: &AuditResult) -> Option<String> {
    let fixes: Vec<&str> = audit
        .failed_categories()
        .flat_map(|c| c.violations.iter().map(String::as_str))
        .take(MAX_VIOLATIONS)
        .collect();

    if !fixes.is_empty() {
        return Some(fixes.join(" "));
    }

    audit
        .summary
        .as_deref()
        .filter(|s| s.to_lowercase().contains("suggest"))
        .map(str::to_string)
}

/// Apply a fix to the current prompt. Amendments accumulate across retries;
/// `original_prompt` stays pristine.
pub fn amend_prompt(prompt: &str, fix: &str) -> String {
    format!("{prompt}{CORRECTION_MARKER}{fix}")
}
