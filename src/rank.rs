//! Deterministic ranking of candidate images.
//!
//! Pure and stable: re-running with identical input yields identical output,
//! and candidates that compare equal keep their original relative order.
//! Width is ranked first to prioritize HD versions, then language affinity,
//! then community rating, then vote count.

use crate::catalog::ImageKind;
use crate::provider::ImageCandidate;

/// Order candidates of one image slot best-first.
///
/// Sort keys, each descending:
/// 1. width (missing counts as 0)
/// 2. language score -- exact match with `preferred_language` scores 3; an
///    untagged candidate scores 3 when the preference is "en", otherwise 2;
///    an "en" candidate under a non-"en" preference scores 2; anything else 0
/// 3. community rating (missing counts as 0)
/// 4. vote count (missing counts as 0)
///
/// Candidates whose `kind` differs from `slot` are filtered out.
pub fn rank(
    candidates: &[ImageCandidate],
    preferred_language: &str,
    slot: ImageKind,
) -> Vec<ImageCandidate> {
    let mut out: Vec<ImageCandidate> = candidates
        .iter()
        .filter(|c| c.kind == slot)
        .cloned()
        .collect();

    // Vec::sort_by is stable, so equal keys keep input order.
    out.sort_by(|a, b| {
        let key_a = sort_key(a, preferred_language);
        let key_b = sort_key(b, preferred_language);
        key_b
            .partial_cmp(&key_a)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    out
}

fn sort_key(candidate: &ImageCandidate, preferred_language: &str) -> (u32, u8, f64, u32) {
    // A NaN rating would poison the tuple's partial_cmp and mask the
    // vote-count tiebreak; normalize it to the missing-value default.
    let rating = candidate.community_rating.unwrap_or(0.0);
    (
        candidate.width.unwrap_or(0),
        language_score(candidate.language.as_deref(), preferred_language),
        if rating.is_nan() { 0.0 } else { rating },
        candidate.vote_count.unwrap_or(0),
    )
}

fn language_score(candidate_language: Option<&str>, preferred_language: &str) -> u8 {
    let preferred_is_en = preferred_language.eq_ignore_ascii_case("en");

    match candidate_language {
        Some(lang) if !lang.is_empty() => {
            if lang.eq_ignore_ascii_case(preferred_language) {
                3
            } else if !preferred_is_en && lang.eq_ignore_ascii_case("en") {
                2
            } else {
                0
            }
        }
        // Untagged images suit an English-preferring viewer best, and are
        // still second-best for everyone else.
        _ => {
            if preferred_is_en {
                3
            } else {
                2
            }
        }
    }
}
