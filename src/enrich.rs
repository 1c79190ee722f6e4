//! Enrichment driver.
//!
//! Walks every loaded record in order, matches it against Scopus, reconciles the tracked
//! fields and tallies the outcome. No per-record failure escapes: every record ends up
//! counted exactly once and stays in the collection.

use crate::error::ScopusBibError;
use crate::matcher::{EntryMatcher, MatchOutcome, TitleMismatchPolicy};
use crate::provider::CitationProvider;
use crate::reconcile::{CitationIdPolicy, FieldReconciler};
use crate::record::BibliographyRecord;
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

/// Policies applied while enriching.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnrichOptions {
    pub title_mismatch: TitleMismatchPolicy,
    pub citation_id: CitationIdPolicy,
    /// End of the citation range; the current year when `None`
    pub current_year: Option<i32>,
}

/// What happened to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Fixed,
    /// Nothing to look up, or no publication date to compute citations from
    Ignored,
    /// No match or a provider failure
    Errored,
}

/// Outcome counts of one enrichment run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentSummary {
    pub fixed: usize,
    pub ignored: usize,
    pub errored: usize,
}

impl EnrichmentSummary {
    pub fn total(&self) -> usize {
        self.fixed + self.ignored + self.errored
    }

    fn count(&mut self, status: RecordStatus) {
        match status {
            RecordStatus::Fixed => self.fixed += 1,
            RecordStatus::Ignored => self.ignored += 1,
            RecordStatus::Errored => self.errored += 1,
        }
    }
}

impl fmt::Display for EnrichmentSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Entries fixed: {}", self.fixed)?;
        writeln!(f, "Ignored entries: {}", self.ignored)?;
        write!(f, "Could not fix {} entries due to Scopus errors", self.errored)
    }
}

/// Enriches bibliography records from a citation provider.
pub struct Enricher<'a, P: CitationProvider + ?Sized> {
    matcher: EntryMatcher<'a, P>,
    reconciler: FieldReconciler<'a, P>,
}

impl<'a, P: CitationProvider + ?Sized> Enricher<'a, P> {
    pub fn new(provider: &'a P, options: EnrichOptions) -> Self {
        let mut reconciler = FieldReconciler::new(provider, options.citation_id);
        if let Some(year) = options.current_year {
            reconciler = reconciler.with_current_year(year);
        }

        Self {
            matcher: EntryMatcher::new(provider, options.title_mismatch),
            reconciler,
        }
    }

    /// Enrich one record in place. The record is untouched unless it is fixed.
    pub async fn enrich_record(&self, record: &mut BibliographyRecord) -> RecordStatus {
        if !record.is_identifiable() {
            info!(key = %record.key, "No DOI, EID or title, ignoring");
            return RecordStatus::Ignored;
        }

        let external = match self.matcher.find(record).await {
            Ok(MatchOutcome::Matched(external)) => external,
            Ok(MatchOutcome::NoMatch) => {
                warn!(key = %record.key, "No matching Scopus record");
                return RecordStatus::Errored;
            }
            Err(e) => {
                warn!(key = %record.key, error = %e, "Scopus search failed");
                return RecordStatus::Errored;
            }
        };

        match self.reconciler.reconcile(&external).await {
            Ok(fields) => {
                fields.apply(record);
                info!(key = %record.key, "Entry fixed");
                RecordStatus::Fixed
            }
            Err(ScopusBibError::MissingPublicationDate(id)) => {
                warn!(key = %record.key, record = %id, "No publication date, cannot compute citations");
                RecordStatus::Ignored
            }
            Err(e) => {
                warn!(key = %record.key, error = %e, "Citation overview failed");
                RecordStatus::Errored
            }
        }
    }

    /// Enrich every record, sequentially and in order.
    pub async fn enrich_all(&self, records: &mut [BibliographyRecord]) -> EnrichmentSummary {
        let mut summary = EnrichmentSummary::default();
        let total = records.len();

        for (idx, record) in records.iter_mut().enumerate() {
            let status = self.enrich_record(record).await;
            summary.count(status);

            if (idx + 1) % 50 == 0 {
                info!(processed = idx + 1, total = total, "Enrichment progress");
            }
        }

        info!(
            fixed = summary.fixed,
            ignored = summary.ignored,
            errored = summary.errored,
            "Enrichment complete"
        );
        summary
    }
}
