use crate::models::job::Job;

/// Instruction keywords that signal the user is talking about the brand
/// mark. Matched as lowercase substrings.
pub const LOGO_KEYWORDS: &[&str] = &["logo", "brand mark", "icon", "symbol", "emblem"];

/// Whether a tweak instruction mentions the logo.
pub fn instruction_mentions_logo(instruction: &str) -> bool {
    let lowered = instruction.to_lowercase();
    LOGO_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}

/// Decide whether brand logo assets must be supplied to the generator for
/// the upcoming attempt. Evaluated before the attempt counter is
/// incremented.
///
/// First attempts of a fresh conversation always get full brand context.
/// Continuing attempts (a retry within the job, or a tweak refining a
/// previous image) inherit the frozen `original_had_logos` anchor, with the
/// tweak instruction able to pull logos back in by mentioning them. The
/// anchor itself is captured once on the first attempt and never recomputed,
/// so a later tweak can never silently drop the brand mark.
pub fn needs_logos(job: &Job) -> bool {
    let continuing =
        job.attempt_count > 0 || (job.is_tweak && job.current_image_url.is_some());

    if !continuing {
        return true;
    }

    let mentioned = job
        .user_tweak_instruction
        .as_deref()
        .map(instruction_mentions_logo)
        .unwrap_or(false);

    job.original_had_logos.unwrap_or(false) || mentioned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::NewJob;
    use uuid::Uuid;

    fn fresh_job() -> Job {
        Job::create(NewJob {
            brand_id: Uuid::new_v4(),
            prompt: "launch banner".to_string(),
            max_attempts: 3,
            is_tweak: false,
            user_tweak_instruction: None,
            session_id: None,
            webhook_url: None,
            expiry_hours: 24,
            inherited_had_logos: None,
            inherited_image_url: None,
        })
    }

    fn tweak_job(instruction: &str, inherited: Option<bool>) -> Job {
        Job::create(NewJob {
            brand_id: Uuid::new_v4(),
            prompt: "launch banner".to_string(),
            max_attempts: 3,
            is_tweak: true,
            user_tweak_instruction: Some(instruction.to_string()),
            session_id: Some("sess-1".to_string()),
            webhook_url: None,
            expiry_hours: 24,
            inherited_had_logos: inherited,
            inherited_image_url: Some("data:image/png;base64,xxxx".to_string()),
        })
    }

    #[test]
    fn test_first_attempt_always_needs_logos() {
        assert!(needs_logos(&fresh_job()));
    }

    #[test]
    fn test_retry_inherits_frozen_anchor() {
        let mut job = fresh_job();
        job.mark_had_logos(true);
        job.attempt_count = 1;
        assert!(needs_logos(&job));

        let mut job = fresh_job();
        job.mark_had_logos(false);
        job.attempt_count = 1;
        assert!(!needs_logos(&job));
    }

    #[test]
    fn test_tweak_without_keyword_inherits_anchor() {
        assert!(needs_logos(&tweak_job("make it blue", Some(true))));
        assert!(!needs_logos(&tweak_job("make it blue", Some(false))));
    }

    #[test]
    fn test_tweak_keyword_pulls_logos_back_in() {
        assert!(needs_logos(&tweak_job("put the LOGO top right", Some(false))));
        assert!(needs_logos(&tweak_job("shrink the brand mark", Some(false))));
        assert!(needs_logos(&tweak_job("use the emblem style", Some(false))));
    }

    #[test]
    fn test_tweak_without_previous_image_is_a_fresh_start() {
        let mut job = tweak_job("make it blue", None);
        job.current_image_url = None;
        assert!(needs_logos(&job));
    }

    #[test]
    fn test_keyword_scan_is_case_insensitive_substring() {
        assert!(instruction_mentions_logo("Center the Logo please"));
        assert!(instruction_mentions_logo("iconography feels off"));
        assert!(!instruction_mentions_logo("brighter background"));
    }
}
