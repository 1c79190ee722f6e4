//! Field reconciliation.
//!
//! Derives the replacement value of every tracked field from a Scopus record. All values,
//! including the citation table, are fetched before the local record is touched, so a
//! failure part way leaves the record as it was.

use crate::error::{ScopusBibError, Result};
use crate::provider::{Author, CitationProvider, ExternalRecord, IdKind};
use crate::record::BibliographyRecord;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which identifier the citation-count query uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CitationIdPolicy {
    /// DOI when present, otherwise the Scopus ID
    #[default]
    PreferDoi,
    /// Scopus ID when present, otherwise the DOI
    ScopusId,
}

impl CitationIdPolicy {
    /// Identifier and kind to query citations for.
    pub fn identifier<'r>(&self, record: &'r ExternalRecord) -> Option<(&'r str, IdKind)> {
        let doi = record.doi.as_deref().map(|d| (d, IdKind::Doi));
        let scopus_id = record.scopus_id().map(|s| (s, IdKind::ScopusId));
        match self {
            CitationIdPolicy::PreferDoi => doi.or(scopus_id),
            CitationIdPolicy::ScopusId => scopus_id.or(doi),
        }
    }
}

/// Replacement values for the tracked fields of one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciledFields {
    pub doi: String,
    pub author: String,
    pub title: String,
    pub year: String,
    pub author_keywords: String,
    pub index_terms: String,
    pub subject_areas: String,
    pub per_year_citations: String,
}

impl ReconciledFields {
    /// Overwrite every tracked field of `record`. Prior values are discarded.
    pub fn apply(&self, record: &mut BibliographyRecord) {
        record.doi = Some(self.doi.clone());
        record.author = Some(self.author.clone());
        record.title = Some(self.title.clone());
        record.year = Some(self.year.clone());
        record.author_keywords = Some(self.author_keywords.clone());
        record.index_terms = Some(self.index_terms.clone());
        record.subject_areas = Some(self.subject_areas.clone());
        record.per_year_citations = Some(self.per_year_citations.clone());
    }
}

/// `"Surname, Given"` pairs joined by `" and "`. Incomplete names are dropped.
pub fn format_authors(authors: &[Author]) -> String {
    authors
        .iter()
        .filter_map(|a| {
            let surname = a.surname.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
            let given = a.given_name.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
            Some(format!("{}, {}", surname, given))
        })
        .collect::<Vec<_>>()
        .join(" and ")
}

/// `"YYYY: N, YYYY: N"`.
pub fn format_citations(counts: &[(i32, u64)]) -> String {
    counts
        .iter()
        .map(|(year, count)| format!("{}: {}", year, count))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Derives replacement fields, querying citation counts through the provider.
pub struct FieldReconciler<'a, P: CitationProvider + ?Sized> {
    provider: &'a P,
    policy: CitationIdPolicy,
    current_year: i32,
}

impl<'a, P: CitationProvider + ?Sized> FieldReconciler<'a, P> {
    pub fn new(provider: &'a P, policy: CitationIdPolicy) -> Self {
        Self {
            provider,
            policy,
            current_year: chrono::Local::now().year(),
        }
    }

    /// Fix the end of the citation range (the current year by default).
    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = year;
        self
    }

    /// Compute every tracked field for `external`.
    ///
    /// Fails with [`ScopusBibError::MissingPublicationDate`] when the record has no usable
    /// cover date, and with the provider error when the citation query fails.
    pub async fn reconcile(&self, external: &ExternalRecord) -> Result<ReconciledFields> {
        let label = external
            .eid
            .clone()
            .or_else(|| external.doi.clone())
            .unwrap_or_else(|| "unknown record".to_string());

        let start_year = external
            .publication_year()
            .ok_or_else(|| ScopusBibError::MissingPublicationDate(label.clone()))?;

        let (identifier, kind) = self
            .policy
            .identifier(external)
            .ok_or_else(|| ScopusBibError::Validation(format!("{} has no DOI or EID", label)))?;

        let end_year = self.current_year.max(start_year);
        debug!(
            identifier = identifier,
            kind = kind.as_str(),
            start_year = start_year,
            end_year = end_year,
            "Querying citation overview"
        );
        let table = self
            .provider
            .citation_counts(identifier, kind, start_year, end_year)
            .await?;

        Ok(ReconciledFields {
            doi: external.doi.clone().unwrap_or_default(),
            author: format_authors(&external.authors),
            title: external.title.clone().unwrap_or_default(),
            year: external
                .cover_date
                .as_deref()
                .and_then(|d| d.get(..4))
                .unwrap_or_default()
                .to_string(),
            author_keywords: external.author_keywords.join(", "),
            index_terms: external.index_terms.join(", "),
            subject_areas: external
                .subject_areas
                .iter()
                .map(|sa| sa.area.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            per_year_citations: format_citations(&table.counts),
        })
    }
}
