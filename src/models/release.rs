// src/models/release.rs

//! Release and scrape candidate data structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::TitleId;

/// The raw result of a single scrape attempt for a title.
///
/// Never persisted; it lives for the duration of one ingestion pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeCandidate {
    pub release_number: u32,
    pub sub_release_number: Option<u32>,
    pub url: String,
}

impl ScrapeCandidate {
    pub fn new(release_number: u32, sub_release_number: Option<u32>, url: impl Into<String>) -> Self {
        Self {
            release_number,
            sub_release_number,
            url: url.into(),
        }
    }

    /// `(release_number, sub_release_number)` with an absent sub-number as 0.
    pub fn ordinal(&self) -> (u32, u32) {
        (self.release_number, self.sub_release_number.unwrap_or(0))
    }
}

/// One published installment of a title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub title: TitleId,

    /// Major ordinal (chapter number)
    pub release_number: u32,

    /// Minor ordinal, 0 when the chapter has no sub-number
    #[serde(default)]
    pub sub_release_number: u32,

    /// Link to the chapter on the source site
    pub url: String,

    /// Set once fan-out has been attempted; never reverted
    #[serde(default)]
    pub notified: bool,

    pub discovered_at: DateTime<Utc>,
}

impl Release {
    /// Build a fresh, not yet notified release from a scrape candidate.
    pub fn from_candidate(title: TitleId, candidate: &ScrapeCandidate) -> Self {
        let (release_number, sub_release_number) = candidate.ordinal();
        Self {
            title,
            release_number,
            sub_release_number,
            url: candidate.url.clone(),
            notified: false,
            discovered_at: Utc::now(),
        }
    }

    pub fn ordinal(&self) -> (u32, u32) {
        (self.release_number, self.sub_release_number)
    }

    /// Whether both releases identify the same chapter of the same title.
    pub fn same_release(&self, other: &Release) -> bool {
        self.title == other.title && self.ordinal() == other.ordinal()
    }

    /// Chapter label such as `179` or `179.5`.
    pub fn label(&self) -> String {
        if self.sub_release_number == 0 {
            self.release_number.to_string()
        } else {
            format!("{}.{}", self.release_number, self.sub_release_number)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_candidate_defaults_sub_number() {
        let candidate = ScrapeCandidate::new(179, None, "u1");
        let release = Release::from_candidate(TitleId::new("solo"), &candidate);

        assert_eq!(release.ordinal(), (179, 0));
        assert!(!release.notified);
        assert_eq!(release.url, "u1");
    }

    #[test]
    fn test_label() {
        let mut release = Release::from_candidate(
            TitleId::new("solo"),
            &ScrapeCandidate::new(12, Some(3), "u"),
        );
        assert_eq!(release.label(), "12.3");
        release.sub_release_number = 0;
        assert_eq!(release.label(), "12");
    }

    #[test]
    fn test_same_release_ignores_url_and_flag() {
        let a = Release::from_candidate(TitleId::new("x"), &ScrapeCandidate::new(5, Some(1), "a"));
        let mut b = Release::from_candidate(TitleId::new("X"), &ScrapeCandidate::new(5, Some(1), "b"));
        b.notified = true;
        assert!(a.same_release(&b));
    }
}
