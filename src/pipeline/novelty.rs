// src/pipeline/novelty.rs

//! Novelty filter.
//!
//! Decides whether a scraped chapter supersedes the newest stored release.
//! Releases are totally ordered by `(release_number, sub_release_number)`,
//! with an absent sub-number counted as 0.

use crate::models::{Release, ScrapeCandidate};

/// Anything with a position in the release order.
pub trait Ordinal {
    fn ordinal(&self) -> (u32, u32);
}

impl Ordinal for Release {
    fn ordinal(&self) -> (u32, u32) {
        Release::ordinal(self)
    }
}

impl Ordinal for ScrapeCandidate {
    fn ordinal(&self) -> (u32, u32) {
        ScrapeCandidate::ordinal(self)
    }
}

/// Whether `candidate` is newer than `current_newest`.
///
/// A higher release number wins; on equal release numbers the higher
/// sub-number wins. With no current release every candidate is newer.
pub fn is_newer<C, N>(candidate: &C, current_newest: Option<&N>) -> bool
where
    C: Ordinal + ?Sized,
    N: Ordinal + ?Sized,
{
    let Some(current) = current_newest else {
        return true;
    };

    let (number, sub) = candidate.ordinal();
    let (current_number, current_sub) = current.ordinal();

    number > current_number || (number == current_number && sub > current_sub)
}
