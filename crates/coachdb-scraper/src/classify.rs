//! Language-scope check and niche assignment from free-text profile fields.
//!
//! Pure string matching over `bio + " " + full_name`, lowercased. No network
//! and no state.

use coachdb_core::{Niche, Profile};

/// Substrings that mark a profile as German-speaking.
///
/// Matching is a plain substring test, so short tokens such as `de` are
/// deliberately broad.
const LOCALE_TOKENS: &[&str] = &[
    "deutschland",
    "germany",
    "deutsch",
    "berlin",
    "münchen",
    "hamburg",
    "köln",
    "frankfurt",
    "stuttgart",
    "düsseldorf",
    "de",
    "🇩🇪",
    "german",
    "deutsche",
    "deutscher",
    "deutschsprachig",
    "wien",
    "zürich",
    "schweiz",
    "österreich",
    "🇦🇹",
    "🇨🇭",
];

/// Ordered keyword table; the first niche with any matching keyword wins.
const NICHE_KEYWORDS: &[(Niche, &[&str])] = &[
    (
        Niche::Fitness,
        &[
            "fitness",
            "gym",
            "workout",
            "training",
            "trainer",
            "bodybuilding",
            "crossfit",
            "muskel",
        ],
    ),
    (
        Niche::Nutrition,
        &["nutrition", "ernährung", "diet", "diät", "abnehmen", "meal"],
    ),
    (
        Niche::HealthWellness,
        &["health", "gesundheit", "wellness", "yoga", "physio"],
    ),
    (
        Niche::Mindfulness,
        &["mindfulness", "meditation", "achtsamkeit"],
    ),
    (
        Niche::Finance,
        &[
            "finance", "finanzen", "invest", "trading", "krypto", "crypto", "geld", "money",
        ],
    ),
    (
        Niche::Marketing,
        &["marketing", "social media", "werbung", "agentur", "agency"],
    ),
    (
        Niche::Entrepreneurship,
        &["entrepreneur", "unternehmer", "gründer", "founder", "startup"],
    ),
    (Niche::Business, &["business", "sales", "vertrieb", "ceo"]),
    (
        Niche::PersonalDevelopment,
        &[
            "mindset",
            "persönlichkeitsentwicklung",
            "personal development",
            "life coach",
            "motivation",
            "erfolg",
        ],
    ),
];

/// Outcome of classifying one profile's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub in_scope: bool,
    pub niche: Niche,
}

/// Classifies a profile by its bio and display name.
///
/// With both inputs empty or absent the profile is out of scope and gets the
/// default niche.
#[must_use]
pub fn classify(bio: Option<&str>, full_name: Option<&str>) -> Classification {
    let bio = bio.map(str::trim).unwrap_or_default();
    let name = full_name.map(str::trim).unwrap_or_default();
    if bio.is_empty() && name.is_empty() {
        return Classification {
            in_scope: false,
            niche: Niche::default(),
        };
    }

    let text = format!("{bio} {name}").to_lowercase();
    let in_scope = LOCALE_TOKENS.iter().any(|token| text.contains(token));
    let niche = NICHE_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map_or_else(Niche::default, |(niche, _)| *niche);

    Classification { in_scope, niche }
}

/// Applies [`classify`] to a normalized profile.
///
/// Returns `None` for out-of-scope profiles; otherwise the profile with its
/// niche set.
#[must_use]
pub fn screen(mut profile: Profile) -> Option<Profile> {
    let bio = profile.bio.as_deref().or(profile.biography.as_deref());
    let result = classify(bio, profile.full_name.as_deref());
    if !result.in_scope {
        tracing::debug!(username = %profile.username, "profile out of scope, skipping");
        return None;
    }
    profile.niche = result.niche.to_string();
    Some(profile)
}
