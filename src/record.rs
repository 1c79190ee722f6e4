//! Bibliography records.
//!
//! A [`BibliographyRecord`] is one BibTeX entry. The fields the reconciler owns are
//! typed; everything else is carried through untouched in [`BibliographyRecord::other`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field names owned by the reconciler, in the order they are rewritten.
pub const TRACKED_FIELDS: &[&str] = &[
    "doi",
    "author",
    "title",
    "year",
    "author_keywords",
    "index_terms",
    "subject_areas",
    "per_year_citations",
];

/// A single bibliography entry.
///
/// `None` means the field is absent from the entry, `Some("")` means it is present but blank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BibliographyRecord {
    /// Entry type without the `@` (e.g. `article`)
    pub entry_type: String,
    /// Citation key
    pub key: String,
    pub doi: Option<String>,
    /// Scopus EID (`2-s2.0-...`)
    pub eid: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<String>,
    pub author_keywords: Option<String>,
    pub index_terms: Option<String>,
    pub subject_areas: Option<String>,
    pub per_year_citations: Option<String>,
    /// Every other field, keyed by lower-case field name
    pub other: BTreeMap<String, String>,
}

impl BibliographyRecord {
    /// Create an empty record with the given entry type and key.
    pub fn new(entry_type: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            entry_type: entry_type.into(),
            key: key.into(),
            ..Default::default()
        }
    }

    /// Set a field by name. Tracked names go to their typed slot.
    pub fn set_field(&mut self, name: &str, value: impl Into<String>) {
        let name = name.to_lowercase();
        let value = value.into();
        match self.tracked_slot(&name) {
            Some(slot) => *slot = Some(value),
            None => {
                self.other.insert(name, value);
            }
        }
    }

    /// Get a field by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        let slot = match name.as_str() {
            "doi" => &self.doi,
            "eid" => &self.eid,
            "title" => &self.title,
            "author" => &self.author,
            "year" => &self.year,
            "author_keywords" => &self.author_keywords,
            "index_terms" => &self.index_terms,
            "subject_areas" => &self.subject_areas,
            "per_year_citations" => &self.per_year_citations,
            _ => return self.other.get(&name).map(String::as_str),
        };
        slot.as_deref()
    }

    fn tracked_slot(&mut self, name: &str) -> Option<&mut Option<String>> {
        match name {
            "doi" => Some(&mut self.doi),
            "eid" => Some(&mut self.eid),
            "title" => Some(&mut self.title),
            "author" => Some(&mut self.author),
            "year" => Some(&mut self.year),
            "author_keywords" => Some(&mut self.author_keywords),
            "index_terms" => Some(&mut self.index_terms),
            "subject_areas" => Some(&mut self.subject_areas),
            "per_year_citations" => Some(&mut self.per_year_citations),
            _ => None,
        }
    }

    /// All present fields as `(name, value)` pairs, sorted by field name.
    pub fn fields(&self) -> Vec<(&str, &str)> {
        let typed = [
            ("author", &self.author),
            ("author_keywords", &self.author_keywords),
            ("doi", &self.doi),
            ("eid", &self.eid),
            ("index_terms", &self.index_terms),
            ("per_year_citations", &self.per_year_citations),
            ("subject_areas", &self.subject_areas),
            ("title", &self.title),
            ("year", &self.year),
        ];

        let mut fields: Vec<(&str, &str)> = typed
            .into_iter()
            .filter_map(|(name, value)| value.as_deref().map(|v| (name, v)))
            .chain(self.other.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));
        fields
    }

    /// Non-empty DOI, if any.
    pub fn doi(&self) -> Option<&str> {
        non_empty(self.doi.as_deref())
    }

    /// Non-empty Scopus EID, if any.
    pub fn eid(&self) -> Option<&str> {
        non_empty(self.eid.as_deref())
    }

    /// Non-empty title, if any.
    pub fn title(&self) -> Option<&str> {
        non_empty(self.title.as_deref())
    }

    /// Whether the record carries anything the matcher can look up.
    pub fn is_identifiable(&self) -> bool {
        self.doi().is_some() || self.eid().is_some() || self.title().is_some()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
