//! Helpers for provider fields obfuscated with a mask character.
//!
//! Providers hide parts of sensitive strings behind `*` runs, e.g. an
//! account name of `mus***frau` or an image link of
//! `https://cdn.example.com/***.jpg`.

/// Mask character used by providers.
pub const MASK: char = '*';

/// Returns `true` when `value` contains at least one mask character.
#[must_use]
pub fn is_masked(value: &str) -> bool {
    value.contains(MASK)
}

/// Removes every mask character and trims surrounding whitespace.
#[must_use]
pub fn strip_mask(value: &str) -> String {
    value.chars().filter(|c| *c != MASK).collect::<String>().trim().to_owned()
}

/// Recovers a masked value using a known candidate.
///
/// When `hint` is consistent with `masked` (every visible segment appears in
/// order, the first anchored at the start and the last at the end,
/// compared case-insensitively), the hint is returned. Otherwise the mask is
/// stripped. Unmasked values are returned trimmed and unchanged.
#[must_use]
pub fn reconstruct_masked(masked: &str, hint: Option<&str>) -> String {
    let masked = masked.trim();
    if !is_masked(masked) {
        return masked.to_owned();
    }
    match hint.map(str::trim).filter(|h| !h.is_empty()) {
        Some(hint) if matches_mask(masked, hint) => hint.to_owned(),
        _ => strip_mask(masked),
    }
}

/// Returns `true` when `candidate` could be the unmasked form of `masked`.
///
/// A fully masked value (no visible segments) matches any candidate.
#[must_use]
pub fn matches_mask(masked: &str, candidate: &str) -> bool {
    let pattern = masked.to_lowercase();
    let candidate = candidate.to_lowercase();
    let segments: Vec<&str> = pattern.split(MASK).collect();

    // split always yields at least one element
    let Some((first, rest)) = segments.split_first() else {
        return true;
    };
    let Some(mut remaining) = candidate.strip_prefix(first) else {
        return false;
    };

    let Some((last, middle)) = rest.split_last() else {
        // no mask present: exact match only
        return remaining.is_empty();
    };

    for segment in middle.iter().filter(|s| !s.is_empty()) {
        match remaining.find(segment) {
            Some(pos) => remaining = &remaining[pos + segment.len()..],
            None => return false,
        }
    }

    remaining.len() >= last.len() && remaining.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_mask_removes_every_mask_char() {
        assert_eq!(strip_mask("mus***frau"), "musfrau");
        assert_eq!(strip_mask("***"), "");
        assert_eq!(strip_mask(" plain "), "plain");
    }

    #[test]
    fn reconstruct_uses_hint_that_fits_the_mask() {
        assert_eq!(
            reconstruct_masked("mus***frau", Some("musterfrau")),
            "musterfrau"
        );
    }

    #[test]
    fn reconstruct_matches_hint_case_insensitively() {
        assert_eq!(
            reconstruct_masked("MUS***frau", Some("musterfrau")),
            "musterfrau"
        );
    }

    #[test]
    fn reconstruct_strips_when_hint_does_not_fit() {
        assert_eq!(
            reconstruct_masked("mus***frau", Some("someoneelse")),
            "musfrau"
        );
        assert_eq!(reconstruct_masked("mus***frau", None), "musfrau");
    }

    #[test]
    fn reconstruct_leaves_unmasked_values_alone() {
        assert_eq!(reconstruct_masked("anna.fit", Some("other")), "anna.fit");
    }

    #[test]
    fn matches_mask_requires_anchored_segments() {
        assert!(matches_mask("mus***frau", "musterfrau"));
        assert!(!matches_mask("mus***frau", "xmusterfrau"));
        assert!(!matches_mask("mus***frau", "musterfrauen"));
        assert!(matches_mask("***", "anything"));
        assert!(matches_mask("a*b*c", "axxbyyc"));
        assert!(!matches_mask("a*c*b", "axxbyyc"));
    }

    #[test]
    fn matches_mask_rejects_overlapping_prefix_and_suffix() {
        // "ab*ba" needs at least four characters
        assert!(!matches_mask("ab*ba", "aba"));
        assert!(matches_mask("ab*ba", "abba"));
    }

    #[test]
    fn matches_mask_handles_multibyte_text() {
        assert!(matches_mask("mü***er", "müller"));
        assert!(!matches_mask("mü***er", "muller"));
    }
}
