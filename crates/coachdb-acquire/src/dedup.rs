//! Username-keyed deduplication. Identity is the lowercase username and the
//! first occurrence wins.

use std::collections::HashSet;

use coachdb_core::{normalize_username, Profile};

/// Ordered collection of profiles with unique usernames.
#[derive(Debug, Default, Clone)]
pub struct ProfileSet {
    seen: HashSet<String>,
    profiles: Vec<Profile>,
}

impl ProfileSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `profile` unless its username is already present. Returns whether
    /// it was added.
    pub fn insert(&mut self, profile: Profile) -> bool {
        if self.seen.insert(normalize_username(&profile.username)) {
            self.profiles.push(profile);
            true
        } else {
            false
        }
    }

    /// Marks a username as taken without storing a profile for it.
    pub fn reserve(&mut self, username: &str) {
        self.seen.insert(normalize_username(username));
    }

    #[must_use]
    pub fn contains(&self, username: &str) -> bool {
        self.seen.contains(&normalize_username(username))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Profile> {
        self.profiles
    }
}

/// Concatenates `first` and `second`, dropping later duplicates.
#[must_use]
pub fn merge_unique(first: Vec<Profile>, second: Vec<Profile>) -> Vec<Profile> {
    let mut set = ProfileSet::new();
    for profile in first.into_iter().chain(second) {
        set.insert(profile);
    }
    set.into_vec()
}
