//! Entry matching.
//!
//! Finds the Scopus record behind a bibliography entry. Identifier priority is DOI, then
//! EID, then a title search whose candidates are compared by normalized title.

use crate::error::{ScopusBibError, Result};
use crate::provider::{CitationProvider, ExternalRecord, IdKind};
use crate::record::BibliographyRecord;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Candidates fetched by a title search (one Scopus result page).
pub const TITLE_SEARCH_LIMIT: usize = 25;

/// What to do when no title-search candidate has the same normalized title.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TitleMismatchPolicy {
    /// Report no match
    #[default]
    Reject,
    /// Take the first candidate anyway and warn
    Warn,
}

/// Outcome of matching one record.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Matched(ExternalRecord),
    /// The provider answered but nothing corresponds to the record
    NoMatch,
}

/// Lower-case `title` and keep only ASCII letters.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .collect()
}

/// Scopus query selecting documents by title.
pub fn title_query(title: &str) -> String {
    // Braces make Scopus match the phrase literally; inner braces would end it early.
    let cleaned: String = title.chars().filter(|c| *c != '{' && *c != '}').collect();
    format!("TITLE({{{}}})", cleaned.trim())
}

/// Resolves bibliography records to Scopus records.
pub struct EntryMatcher<'a, P: CitationProvider + ?Sized> {
    provider: &'a P,
    policy: TitleMismatchPolicy,
}

impl<'a, P: CitationProvider + ?Sized> EntryMatcher<'a, P> {
    pub fn new(provider: &'a P, policy: TitleMismatchPolicy) -> Self {
        Self { provider, policy }
    }

    /// Find the external record for `record`.
    ///
    /// Provider failures are returned as errors; the caller decides how to count them.
    pub async fn find(&self, record: &BibliographyRecord) -> Result<MatchOutcome> {
        if let Some(doi) = record.doi() {
            debug!(key = %record.key, doi = doi, "Matching by DOI");
            return self
                .provider
                .retrieve(doi, IdKind::Doi)
                .await
                .map(MatchOutcome::Matched);
        }

        if let Some(eid) = record.eid() {
            debug!(key = %record.key, eid = eid, "Matching by EID");
            return self
                .provider
                .retrieve(eid, IdKind::Eid)
                .await
                .map(MatchOutcome::Matched);
        }

        match record.title() {
            Some(title) => self.find_by_title(&record.key, title).await,
            None => Err(ScopusBibError::Validation(format!(
                "Entry {} has no DOI, EID or title",
                record.key
            ))),
        }
    }

    async fn find_by_title(&self, key: &str, title: &str) -> Result<MatchOutcome> {
        debug!(key = key, title = title, "Matching by title search");

        let wanted = normalize_title(title);
        let candidates = self
            .provider
            .search(&title_query(title), TITLE_SEARCH_LIMIT)
            .await?;

        let chosen = match select_candidate(&candidates, &wanted) {
            Some(candidate) => candidate,
            None => {
                let found = candidates
                    .first()
                    .and_then(|c| c.title.as_deref())
                    .map(normalize_title)
                    .unwrap_or_default();
                warn!(
                    key = key,
                    expected = %wanted,
                    found = %found,
                    candidates = candidates.len(),
                    "Potential error due to title mismatch"
                );

                match (self.policy, candidates.first()) {
                    (TitleMismatchPolicy::Warn, Some(first)) => first,
                    _ => return Ok(MatchOutcome::NoMatch),
                }
            }
        };

        let Some(eid) = chosen.eid.as_deref() else {
            warn!(key = key, "Title search candidate has no EID");
            return Ok(MatchOutcome::NoMatch);
        };

        let full = self.provider.retrieve(eid, IdKind::Eid).await?;

        let fetched = full.title.as_deref().map(normalize_title).unwrap_or_default();
        if fetched != wanted {
            warn!(
                key = key,
                expected = %wanted,
                found = %fetched,
                title = title,
                "Potential error due to title mismatch"
            );
        }

        Ok(MatchOutcome::Matched(full))
    }
}

/// First candidate whose normalized title equals `wanted`.
fn select_candidate<'c>(candidates: &'c [ExternalRecord], wanted: &str) -> Option<&'c ExternalRecord> {
    candidates.iter().find(|c| {
        c.title
            .as_deref()
            .is_some_and(|t| normalize_title(t) == wanted)
    })
}
