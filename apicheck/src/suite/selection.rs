use super::{Marker, Scenario};

/// Chooses scenarios by marker and name.
///
/// A scenario is selected when it carries any included marker (or no
/// markers are included), carries none of the excluded markers, and its
/// full name contains the filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    include: Vec<Marker>,
    exclude: Vec<Marker>,
    filter: Option<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, marker: Marker) -> Self {
        if !self.include.contains(&marker) {
            self.include.push(marker);
        }
        self
    }

    pub fn exclude(mut self, marker: Marker) -> Self {
        if !self.exclude.contains(&marker) {
            self.exclude.push(marker);
        }
        self
    }

    pub fn filter(mut self, pattern: impl Into<String>) -> Self {
        self.filter = Some(pattern.into());
        self
    }

    pub fn matches(&self, scenario: &Scenario) -> bool {
        if !self.include.is_empty() && !self.include.iter().any(|m| scenario.has(*m)) {
            return false;
        }
        if self.exclude.iter().any(|m| scenario.has(*m)) {
            return false;
        }
        match &self.filter {
            Some(pattern) => scenario.full_name().contains(pattern.as_str()),
            None => true,
        }
    }

    pub fn apply(&self, scenarios: Vec<Scenario>) -> Vec<Scenario> {
        scenarios.into_iter().filter(|s| self.matches(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::all;

    #[test]
    fn test_empty_selection_matches_everything() {
        assert_eq!(Selection::new().apply(all()).len(), all().len());
    }

    #[test]
    fn test_include_is_any_of() {
        let selected = Selection::new()
            .include(Marker::Auth)
            .include(Marker::ClerkIntegration)
            .apply(all());
        assert!(!selected.is_empty());
        assert!(
            selected
                .iter()
                .all(|s| s.has(Marker::Auth) || s.has(Marker::ClerkIntegration))
        );
    }

    #[test]
    fn test_exclude_wins() {
        let selected = Selection::new()
            .include(Marker::RequiresBackend)
            .exclude(Marker::Slow)
            .exclude(Marker::RateLimit)
            .apply(all());
        assert!(selected.iter().all(|s| !s.has(Marker::Slow)));
        assert!(selected.iter().all(|s| !s.has(Marker::RateLimit)));
        assert!(selected.len() < all().len());
    }

    #[test]
    fn test_filter_by_name() {
        let selected = Selection::new().filter("webhook").apply(all());
        assert!(!selected.is_empty());
        assert!(selected.iter().all(|s| s.full_name().contains("webhook")));

        let selected = Selection::new().filter("authentication::").apply(all());
        assert!(selected.iter().all(|s| s.module == "authentication"));
    }
}
