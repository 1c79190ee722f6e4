//! Keyword citation analytics.
//!
//! Aggregates the fields written by `fix` across a set of records: every index term,
//! author keyword and subject area becomes a keyword carrying the papers that use it and
//! the sum of their per-year citations.

use crate::error::{ScopusBibError, Result};
use crate::record::BibliographyRecord;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Which field a keyword came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordKind {
    IndexTerm,
    AuthorKeyword,
    SubjectArea,
}

/// Parse a `per_year_citations` value (`"2019: 3, 2020: 5"`) into `(year, count)` pairs.
pub fn parse_citations(text: &str) -> Result<Vec<(i32, u64)>> {
    text.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (year, count) = part
                .split_once(':')
                .ok_or_else(|| ScopusBibError::Parse(format!("Invalid citation pair: {}", part)))?;
            let year = year
                .trim()
                .parse()
                .map_err(|_| ScopusBibError::Parse(format!("Invalid citation year: {}", part)))?;
            let count = count
                .trim()
                .parse()
                .map_err(|_| ScopusBibError::Parse(format!("Invalid citation count: {}", part)))?;
            Ok((year, count))
        })
        .collect()
}

/// Split a comma-separated keyword field into lower-case, trimmed keywords.
pub fn split_keywords(text: &str) -> Vec<String> {
    text.split(',')
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

/// Citation data of one paper.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaperCitations {
    /// DOI, or the citation key when the record has none
    pub paper: String,
    pub per_year: Vec<(i32, u64)>,
    pub total: u64,
    pub keywords: BTreeMap<String, BTreeSet<KeywordKind>>,
}

impl PaperCitations {
    pub fn from_record(record: &BibliographyRecord) -> Result<Self> {
        let per_year = match record.per_year_citations.as_deref() {
            Some(text) => parse_citations(text)?,
            None => Vec::new(),
        };
        let total = per_year.iter().map(|(_, count)| count).sum();

        let mut keywords: BTreeMap<String, BTreeSet<KeywordKind>> = BTreeMap::new();
        let sources = [
            (&record.index_terms, KeywordKind::IndexTerm),
            (&record.author_keywords, KeywordKind::AuthorKeyword),
            (&record.subject_areas, KeywordKind::SubjectArea),
        ];
        for (field, kind) in sources {
            for keyword in field.as_deref().map(split_keywords).unwrap_or_default() {
                keywords.entry(keyword).or_default().insert(kind);
            }
        }

        Ok(Self {
            paper: record.doi().unwrap_or(&record.key).to_string(),
            per_year,
            total,
            keywords,
        })
    }
}

/// Aggregated citations of one keyword.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeywordStats {
    pub keyword: String,
    pub kinds: BTreeSet<KeywordKind>,
    pub papers: BTreeSet<String>,
    pub per_year: BTreeMap<i32, u64>,
    pub total_citations: u64,
}

/// Keyword statistics over a set of records.
#[derive(Debug, Clone, Default)]
pub struct KeywordIndex {
    stats: BTreeMap<String, KeywordStats>,
}

impl KeywordIndex {
    /// Aggregate `records`. A paper counts once per keyword even when the keyword
    /// appears in several of its fields. Records with an unreadable citation field are
    /// skipped.
    pub fn build(records: &[BibliographyRecord]) -> Self {
        let mut stats: BTreeMap<String, KeywordStats> = BTreeMap::new();
        let mut skipped = 0;

        for record in records {
            let paper = match PaperCitations::from_record(record) {
                Ok(paper) => paper,
                Err(e) => {
                    warn!(key = %record.key, error = %e, "Skipping entry with unreadable citations");
                    skipped += 1;
                    continue;
                }
            };

            for (keyword, kinds) in paper.keywords {
                let entry = stats.entry(keyword.clone()).or_insert_with(|| KeywordStats {
                    keyword,
                    ..Default::default()
                });
                // Repeated entries of one paper count once
                if !entry.papers.insert(paper.paper.clone()) {
                    entry.kinds.extend(kinds);
                    continue;
                }
                entry.kinds.extend(kinds);
                for (year, count) in &paper.per_year {
                    *entry.per_year.entry(*year).or_default() += count;
                }
                entry.total_citations += paper.total;
            }
        }

        info!(
            records = records.len(),
            skipped = skipped,
            keywords = stats.len(),
            "Built keyword index"
        );
        Self { stats }
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Statistics for one keyword, compared case-insensitively.
    pub fn get(&self, keyword: &str) -> Option<&KeywordStats> {
        let found = self.stats.get(&keyword.trim().to_lowercase());
        if found.is_none() {
            debug!(keyword = keyword, "No citations found for keyword");
        }
        found
    }

    /// All keywords, most cited first, ties by name.
    pub fn ranked(&self) -> Vec<&KeywordStats> {
        let mut all: Vec<&KeywordStats> = self.stats.values().collect();
        all.sort_by(|a, b| {
            b.total_citations
                .cmp(&a.total_citations)
                .then_with(|| a.keyword.cmp(&b.keyword))
        });
        all
    }

    /// Keywords containing a match for `pattern`, in [`KeywordIndex::ranked`] order.
    pub fn search(&self, pattern: &str) -> Result<Vec<&KeywordStats>> {
        let re = Regex::new(pattern)
            .map_err(|e| ScopusBibError::Validation(format!("Invalid regex {}: {}", pattern, e)))?;
        Ok(self
            .ranked()
            .into_iter()
            .filter(|s| re.is_match(&s.keyword))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(key: &str, doi: &str, citations: &str, index: &str, auth: &str, areas: &str) -> BibliographyRecord {
        let mut record = BibliographyRecord::new("article", key);
        record.set_field("doi", doi);
        record.set_field("per_year_citations", citations);
        record.set_field("index_terms", index);
        record.set_field("author_keywords", auth);
        record.set_field("subject_areas", areas);
        record
    }

    fn sample() -> Vec<BibliographyRecord> {
        vec![
            paper("a", "10.1/a", "2019: 3, 2020: 5", "Graph theory", "graphs, Trees", "Mathematics"),
            paper("b", "10.1/b", "2020: 2, 2021: 1", "Graph theory, Networks", "graphs", "Computer Science"),
            paper("c", "", "", "", "trees", "Mathematics"),
        ]
    }

    #[test]
    fn test_parse_citations() {
        assert_eq!(
            parse_citations("2019: 3, 2020: 5").expect("parse"),
            vec![(2019, 3), (2020, 5)]
        );
        assert_eq!(parse_citations("2024:7").expect("parse"), vec![(2024, 7)]);
        assert!(parse_citations("").expect("parse").is_empty());
        assert!(matches!(parse_citations("2019 3"), Err(ScopusBibError::Parse(_))));
        assert!(matches!(parse_citations("2019: many"), Err(ScopusBibError::Parse(_))));
    }

    #[test]
    fn test_split_keywords() {
        assert_eq!(split_keywords("Graphs,  Trees , ,x"), vec!["graphs", "trees", "x"]);
        assert!(split_keywords("").is_empty());
    }

    #[test]
    fn test_paper_uses_key_without_doi() {
        let record = &sample()[2];
        let paper = PaperCitations::from_record(record).expect("paper");
        assert_eq!(paper.paper, "c");
        assert_eq!(paper.total, 0);
        assert!(paper.keywords.contains_key("trees"));
    }

    #[test]
    fn test_aggregates_per_year_and_totals() {
        let index = KeywordIndex::build(&sample());

        let graphs = index.get("Graphs").expect("graphs");
        assert_eq!(graphs.total_citations, 11);
        assert_eq!(graphs.per_year, BTreeMap::from([(2019, 3), (2020, 7), (2021, 1)]));
        assert_eq!(graphs.papers.len(), 2);
        assert_eq!(graphs.kinds, BTreeSet::from([KeywordKind::AuthorKeyword]));

        let maths = index.get("mathematics").expect("mathematics");
        assert_eq!(maths.total_citations, 8);
        assert_eq!(maths.papers, BTreeSet::from(["10.1/a".to_string(), "c".to_string()]));
        assert_eq!(maths.kinds, BTreeSet::from([KeywordKind::SubjectArea]));

        assert!(index.get("biology").is_none());
    }

    #[test]
    fn test_keyword_in_two_fields_counts_paper_once() {
        let records = vec![paper("a", "10.1/a", "2020: 4", "Graphs", "graphs", "")];
        let index = KeywordIndex::build(&records);

        let graphs = index.get("graphs").expect("graphs");
        assert_eq!(graphs.total_citations, 4);
        assert_eq!(
            graphs.kinds,
            BTreeSet::from([KeywordKind::IndexTerm, KeywordKind::AuthorKeyword])
        );
    }

    #[test]
    fn test_unreadable_citations_skip_record() {
        let mut records = sample();
        records.push(paper("bad", "10.1/bad", "soon", "Lattices", "", ""));
        let index = KeywordIndex::build(&records);
        assert!(index.get("lattices").is_none());
        assert!(index.get("graphs").is_some());
    }

    #[test]
    fn test_ranked_and_search() -> Result<()> {
        let index = KeywordIndex::build(&sample());
        assert_eq!(index.len(), 6);

        let ranked: Vec<&str> = index.ranked().iter().map(|s| s.keyword.as_str()).collect();
        assert_eq!(ranked[0], "graph theory");
        assert_eq!(ranked[1], "graphs");

        let found: Vec<&str> = index
            .search("^(graph|tree)")?
            .iter()
            .map(|s| s.keyword.as_str())
            .collect();
        assert_eq!(found, vec!["graph theory", "graphs", "trees"]);

        assert!(matches!(index.search("("), Err(ScopusBibError::Validation(_))));
        Ok(())
    }
}
