use serde::{Deserialize, Serialize};

/// Category assigned to a profile from its bio and display name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Niche {
    Fitness,
    Business,
    #[default]
    Lifestyle,
    #[serde(rename = "Health & Wellness")]
    HealthWellness,
    Marketing,
    Finance,
    #[serde(rename = "Personal Development")]
    PersonalDevelopment,
    Nutrition,
    Mindfulness,
    Entrepreneurship,
}

impl Niche {
    pub const ALL: [Niche; 10] = [
        Niche::Fitness,
        Niche::Business,
        Niche::Lifestyle,
        Niche::HealthWellness,
        Niche::Marketing,
        Niche::Finance,
        Niche::PersonalDevelopment,
        Niche::Nutrition,
        Niche::Mindfulness,
        Niche::Entrepreneurship,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Niche::Fitness => "Fitness",
            Niche::Business => "Business",
            Niche::Lifestyle => "Lifestyle",
            Niche::HealthWellness => "Health & Wellness",
            Niche::Marketing => "Marketing",
            Niche::Finance => "Finance",
            Niche::PersonalDevelopment => "Personal Development",
            Niche::Nutrition => "Nutrition",
            Niche::Mindfulness => "Mindfulness",
            Niche::Entrepreneurship => "Entrepreneurship",
        }
    }

    /// Case-insensitive lookup by display name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Niche> {
        let name = name.trim();
        Niche::ALL
            .into_iter()
            .find(|n| n.as_str().eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for Niche {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
