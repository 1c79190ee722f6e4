//! Citation provider interface.
//!
//! The matcher, reconciler and enrichment driver only talk to Scopus through
//! [`CitationProvider`], so tests can substitute an in-memory provider.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Prefix Scopus puts in front of the numeric Scopus ID to form an EID.
pub const EID_PREFIX: &str = "2-s2.0-";

/// How a record is addressed in a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdKind {
    Doi,
    Eid,
    ScopusId,
}

impl IdKind {
    /// Path segment / query parameter name used by the Scopus API.
    pub fn as_str(&self) -> &'static str {
        match self {
            IdKind::Doi => "doi",
            IdKind::Eid => "eid",
            IdKind::ScopusId => "scopus_id",
        }
    }
}

/// Author name as reported by Scopus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub surname: Option<String>,
    pub given_name: Option<String>,
}

impl Author {
    pub fn new(surname: &str, given_name: &str) -> Self {
        Self {
            surname: Some(surname.to_string()),
            given_name: Some(given_name.to_string()),
        }
    }
}

/// ASJC subject area.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectArea {
    /// Display name (e.g. "Computer Science Applications")
    pub area: String,
    pub abbreviation: String,
    pub code: String,
}

/// Bibliographic record returned by the provider. Read-only snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRecord {
    pub eid: Option<String>,
    pub doi: Option<String>,
    pub title: Option<String>,
    pub authors: Vec<Author>,
    /// Cover date, `YYYY-MM-DD`
    pub cover_date: Option<String>,
    pub publication_name: Option<String>,
    pub author_keywords: Vec<String>,
    pub index_terms: Vec<String>,
    pub subject_areas: Vec<SubjectArea>,
}

impl ExternalRecord {
    /// Publication year parsed from the cover date.
    pub fn publication_year(&self) -> Option<i32> {
        self.cover_date
            .as_deref()
            .and_then(|d| d.get(..4))
            .and_then(|y| y.parse().ok())
    }

    /// Scopus ID: the EID without its vendor prefix.
    pub fn scopus_id(&self) -> Option<&str> {
        self.eid.as_deref().map(strip_eid_prefix)
    }
}

/// Strip the `2-s2.0-` prefix from an EID, if present.
pub fn strip_eid_prefix(eid: &str) -> &str {
    eid.strip_prefix(EID_PREFIX).unwrap_or(eid)
}

/// Per-year citation counts for one identifier, in year order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationYearTable {
    pub identifier: String,
    pub counts: Vec<(i32, u64)>,
}

/// Operations consumed from the citation database.
#[async_trait]
pub trait CitationProvider: Send + Sync {
    /// Run a free-text Scopus query and return at most `limit` candidates in provider order.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ExternalRecord>>;

    /// Fetch the full record for a DOI or EID.
    async fn retrieve(&self, identifier: &str, kind: IdKind) -> Result<ExternalRecord>;

    /// Citation counts per year over `[start_year, end_year]`.
    async fn citation_counts(
        &self,
        identifier: &str,
        kind: IdKind,
        start_year: i32,
        end_year: i32,
    ) -> Result<CitationYearTable>;
}
