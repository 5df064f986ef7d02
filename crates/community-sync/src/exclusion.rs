//! Per-account exclusion lists
//!
//! Exclusions are bare community names (`memes`, not `https://x/c/memes`), so
//! one entry blocks a community of that name from every instance.

use std::collections::HashSet;

use lemmy_client::local_name;

/// Set of community local names that must never be followed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exclusions(HashSet<String>);

impl Exclusions {
    /// Parse a comma-separated list. Whitespace around names and empty
    /// entries are ignored.
    pub fn parse(list: &str) -> Self {
        list.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// Whether the community behind `actor_id` is excluded.
    pub fn excludes(&self, actor_id: &str) -> bool {
        local_name(actor_id).is_some_and(|name| self.0.contains(name))
    }
}

impl FromIterator<String> for Exclusions {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
