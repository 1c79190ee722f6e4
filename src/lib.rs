//! # scopusbib
//!
//! Build and enrich BibTeX bibliographies from Scopus.
//!
//! ## Modules
//!
//! - [`scopus`] - Scopus API client (search, abstract retrieval, citation overview)
//! - [`provider`] - Citation provider trait and record types
//! - [`bibtex`] - BibTeX reading and writing
//! - [`matcher`] - Matching bibliography entries to Scopus records
//! - [`reconcile`] - Deriving corrected fields from a Scopus record
//! - [`enrich`] - Batch enrichment driver
//! - [`search`] - Exporting search results as BibTeX records
//! - [`keywords`] - Per-keyword citation analytics over enriched records
//! - [`config`] - Stored credentials and policies
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scopusbib::{bibtex, enrich::{EnrichOptions, Enricher}, scopus::{ClientOptions, ScopusClient}};
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ScopusClient::new(ClientOptions::new("my-api-key"))?;
//!     let mut records = bibtex::read_files(&[PathBuf::from("refs.bib")])?;
//!     let summary = Enricher::new(&client, EnrichOptions::default())
//!         .enrich_all(&mut records)
//!         .await;
//!     bibtex::write_file("fixed.bib".as_ref(), &records)?;
//!     println!("{}", summary);
//!     Ok(())
//! }
//! ```

pub mod bibtex;
pub mod config;
pub mod enrich;
pub mod error;
pub mod keywords;
pub mod matcher;
pub mod provider;
pub mod reconcile;
pub mod record;
pub mod scopus;
pub mod search;

pub use error::{Result, ScopusBibError};
