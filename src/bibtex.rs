//! BibTeX reading and writing.
//!
//! Parsing goes through the `biblatex` crate; each field's chunks are flattened back into
//! BibTeX source text so untouched fields survive a read/write cycle. Writing emits one
//! `field = {value}` line per field, sorted by field name.

use crate::error::{ScopusBibError, Result};
use crate::record::BibliographyRecord;
use biblatex::{Bibliography, Chunk, Entry, ParseError, ParseErrorKind, RawBibliography, Spanned};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Fields written without escaping.
const VERBATIM_FIELDS: &[&str] = &["doi", "eid", "url", "file"];

/// Parse BibTeX source into records, in source order.
///
/// Entries sharing a citation key are all kept.
pub fn parse_str(source: &str, origin: &str) -> Result<Vec<BibliographyRecord>> {
    let bibtex_error = |e: ParseError| ScopusBibError::Bibtex {
        path: origin.to_string(),
        message: e.to_string(),
    };

    let raw = RawBibliography::parse(source).map_err(bibtex_error)?;
    let entries: Vec<Entry> = match Bibliography::from_raw(raw.clone()) {
        Ok(bibliography) => bibliography.into_iter().collect(),
        Err(ParseError {
            kind: ParseErrorKind::DuplicateKey(key),
            ..
        }) => {
            warn!(path = origin, key = %key, "Duplicate citation key, parsing entries one by one");
            parse_entries_separately(raw).map_err(bibtex_error)?
        }
        Err(e) => return Err(bibtex_error(e)),
    };

    let mut records = Vec::new();
    for entry in entries {
        let mut record = BibliographyRecord::new(entry.entry_type.to_string(), entry.key.clone());
        for (name, chunks) in &entry.fields {
            record.set_field(name, flatten_chunks(chunks));
        }
        records.push(record);
    }

    Ok(records)
}

/// Resolve each raw entry on its own so repeated keys do not collide.
///
/// Cross-references between entries are not resolved on this path.
fn parse_entries_separately(raw: RawBibliography<'_>) -> std::result::Result<Vec<Entry>, ParseError> {
    let mut entries = Vec::with_capacity(raw.entries.len());
    for entry in raw.entries {
        let single = RawBibliography {
            preamble: String::new(),
            entries: vec![entry],
            abbreviations: raw.abbreviations.clone(),
        };
        entries.extend(Bibliography::from_raw(single)?);
    }
    Ok(entries)
}

/// Turn parsed chunks back into field source text.
fn flatten_chunks(chunks: &[Spanned<Chunk>]) -> String {
    if let [single] = chunks {
        if let Chunk::Verbatim(s) = &single.v {
            return s.clone();
        }
    }

    chunks
        .iter()
        .map(|spanned| match &spanned.v {
            Chunk::Normal(s) => s.clone(),
            Chunk::Verbatim(s) => format!("{{{}}}", s),
            Chunk::Math(s) => format!("${}$", s),
        })
        .collect()
}

/// Expand the inputs into a list of `.bib` files.
///
/// Directories contribute every `*.bib` file directly inside them, sorted by name.
/// Missing paths are reported and skipped.
pub fn collect_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = match std::fs::read_dir(input) {
                Ok(entries) => entries
                    .filter_map(|e| e.ok().map(|e| e.path()))
                    .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "bib"))
                    .collect(),
                Err(e) => {
                    warn!(path = %input.display(), error = %e, "Cannot read directory");
                    continue;
                }
            };
            found.sort();
            debug!(path = %input.display(), files = found.len(), "Expanded directory");
            files.extend(found);
        } else if input.exists() {
            files.push(input.clone());
        } else {
            warn!(path = %input.display(), "File not found, skipping");
            println!("Warning: File not found: {}", input.display());
        }
    }

    files
}

/// Load and concatenate the records of all inputs.
pub fn read_files(inputs: &[PathBuf]) -> Result<Vec<BibliographyRecord>> {
    let mut records = Vec::new();

    for path in collect_inputs(inputs) {
        let source = std::fs::read_to_string(&path)?;
        let parsed = parse_str(&source, &path.display().to_string())?;
        info!(path = %path.display(), entries = parsed.len(), "Loaded bibliography");
        records.extend(parsed);
    }

    Ok(records)
}

/// Serialise records as BibTeX.
pub fn to_string(records: &[BibliographyRecord]) -> String {
    let mut out = String::new();

    for (idx, record) in records.iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        out.push('@');
        out.push_str(&record.entry_type);
        out.push('{');
        out.push_str(&record.key);
        out.push_str(",\n");

        for (name, value) in record.fields() {
            let value = if VERBATIM_FIELDS.contains(&name) {
                value.to_string()
            } else {
                escape_bibtex(value)
            };
            out.push_str(&format!(" {} = {{{}}},\n", name, value));
        }
        out.push_str("}\n");
    }

    out
}

/// Write records to `path`, replacing any existing file.
pub fn write_file(path: &Path, records: &[BibliographyRecord]) -> Result<()> {
    std::fs::write(path, to_string(records))?;
    info!(path = %path.display(), entries = records.len(), "Wrote bibliography");
    Ok(())
}

/// Escape characters that are special in BibTeX text. Already escaped ones are kept.
fn escape_bibtex(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev = '\0';
    for c in s.chars() {
        if matches!(c, '&' | '%' | '#') && prev != '\\' {
            out.push('\\');
        }
        out.push(c);
        prev = c;
    }
    out
}
