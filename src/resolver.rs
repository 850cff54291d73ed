//! Vocabulary resolution
//!
//! Matches a raw transcript against the candidate set of the current step.
//! Matching is case-insensitive substring containment on either the
//! candidate's id or its localized alias, first match in declared order wins.
//!
//! The policy is deliberately permissive: a short alias can match inside an
//! unrelated longer utterance. Declaration order is the only tie-break.

use serde::Serialize;

/// Something the user can pick at a step: an item, option value or payment method
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    /// Stable id (item id, option code, payment method id)
    pub id: String,
    /// Localized alias spoken in prompts
    pub alias: String,
}

impl Candidate {
    /// Create a candidate
    #[must_use]
    pub fn new(id: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            alias: alias.into(),
        }
    }

    /// Check whether a lowercased transcript mentions this candidate
    fn matches(&self, normalized: &str) -> bool {
        [&self.id, &self.alias].into_iter().any(|needle| {
            let needle = needle.trim().to_lowercase();
            // An empty needle is contained in every string
            !needle.is_empty() && normalized.contains(&needle)
        })
    }
}

/// Resolve a transcript to the first matching candidate
///
/// Returns `None` for an empty transcript or when nothing matches.
#[must_use]
pub fn resolve<'a>(transcript: &str, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
    let normalized = transcript.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }

    let found = candidates.iter().find(|c| c.matches(&normalized));
    match found {
        Some(candidate) => tracing::debug!(transcript, candidate = %candidate.id, "resolved"),
        None => tracing::debug!(transcript, candidates = candidates.len(), "no match"),
    }
    found
}
