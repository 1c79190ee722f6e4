//! Search export.
//!
//! Runs a raw Scopus query and converts every hit into an `@article` record keyed by EID.

use crate::error::Result;
use crate::provider::{CitationProvider, ExternalRecord};
use crate::record::BibliographyRecord;
use tracing::{info, warn};

/// Convert one search hit into a bibliography record.
///
/// Returns `None` for hits without an EID, since the EID is the citation key.
pub fn to_record(result: &ExternalRecord) -> Option<BibliographyRecord> {
    let eid = result.eid.as_deref()?;

    let mut record = BibliographyRecord::new("article", eid);
    record.set_field("doi", result.doi.clone().unwrap_or_default());
    record.set_field("eid", eid);
    record.set_field("title", result.title.clone().unwrap_or_default());
    record.set_field("journal", result.publication_name.clone().unwrap_or_default());
    record.set_field(
        "year",
        result
            .cover_date
            .as_deref()
            .and_then(|d| d.get(..4))
            .unwrap_or_default(),
    );
    Some(record)
}

/// Search Scopus and return up to `max_results` hits as records, in result order.
pub async fn search_records<P: CitationProvider + ?Sized>(
    provider: &P,
    query: &str,
    max_results: usize,
) -> Result<Vec<BibliographyRecord>> {
    let results = provider.search(query, max_results).await?;

    let records: Vec<BibliographyRecord> = results
        .iter()
        .filter_map(|r| {
            let record = to_record(r);
            if record.is_none() {
                warn!(title = ?r.title, "Search result without EID, skipping");
            }
            record
        })
        .collect();

    info!(query = query, results = results.len(), records = records.len(), "Converted search results");
    Ok(records)
}
