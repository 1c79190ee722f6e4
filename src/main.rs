//! scopusbib - Scopus BibTeX export and enrichment
//!
//! ## Usage
//!
//! ### Export search results
//! ```bash
//! scopusbib search --query 'TITLE-ABS-KEY("graph neural network")' --out results.bib
//! ```
//!
//! ### Fix existing bibliographies
//! ```bash
//! scopusbib fix --in refs.bib more_refs/ --out fixed.bib
//! ```
//!
//! ### Citations per keyword
//! ```bash
//! scopusbib keywords --in fixed.bib --filter '^graph'
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scopusbib::bibtex;
use scopusbib::config::{ConfigStore, Overrides, ScopusConfig};
use scopusbib::enrich::{EnrichOptions, Enricher};
use scopusbib::keywords::{KeywordIndex, KeywordKind, KeywordStats};
use scopusbib::matcher::TitleMismatchPolicy;
use scopusbib::reconcile::CitationIdPolicy;
use scopusbib::scopus::{ScopusClient, MAX_SEARCH_RESULTS};
use scopusbib::search;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Build and enrich BibTeX bibliographies from Scopus
#[derive(Parser)]
#[command(name = "scopusbib")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Scopus API key (overrides the stored key)
    #[arg(long, global = true, env = "SCOPUS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Institutional token for off-campus access
    #[arg(long, global = true, env = "SCOPUS_INST_TOKEN", hide_env_values = true)]
    inst_token: Option<String>,

    /// Elsevier API base URL
    #[arg(long, global = true, env = "SCOPUS_BASE_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search Scopus and save the results to a bib file
    Search {
        /// Scopus search string (e.g. 'TITLE-ABS-KEY(graphs) AND PUBYEAR > 2019')
        #[arg(short, long)]
        query: String,

        /// Output bib file
        #[arg(short, long, default_value = "results.bib")]
        out: PathBuf,

        /// Maximum number of results to save
        #[arg(long, default_value_t = MAX_SEARCH_RESULTS)]
        max_results: usize,
    },

    /// Look up every entry in Scopus and rewrite its metadata
    Fix {
        /// Input bib files or directories of bib files
        #[arg(short = 'i', long = "in", visible_alias = "input", required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        /// Output bib file
        #[arg(short, long, visible_alias = "output")]
        out: PathBuf,

        /// What to do when a title search finds no exact title match
        #[arg(long, value_enum)]
        title_mismatch: Option<TitleMismatchPolicy>,

        /// Identifier used for per-year citation counts
        #[arg(long, value_enum)]
        citation_id: Option<CitationIdPolicy>,
    },

    /// Sum per-year citations by index term, author keyword and subject area
    Keywords {
        /// Fixed bib files or directories of bib files
        #[arg(short = 'i', long = "in", visible_alias = "input", required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        /// Only show keywords matching this regular expression
        #[arg(short, long)]
        filter: Option<String>,

        /// Show at most this many keywords
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Manage stored credentials and defaults
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show config file path
    Path,
    /// Show stored settings (key masked)
    Show,
    /// Store the API key (and optionally the institutional token)
    SetKey {
        key: String,
        #[arg(long = "token")]
        token: Option<String>,
    },
    /// Store default policies for `fix`
    SetPolicy {
        #[arg(long, value_enum)]
        title_mismatch: Option<TitleMismatchPolicy>,
        #[arg(long, value_enum)]
        citation_id: Option<CitationIdPolicy>,
    },
    /// Delete stored settings
    Clear,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    let store = ConfigStore::default();
    let overrides = Overrides {
        api_key: cli.api_key,
        inst_token: cli.inst_token,
        base_url: cli.base_url,
    };

    match cli.command {
        Commands::Search {
            query,
            out,
            max_results,
        } => run_search(&store, &overrides, &query, out, max_results).await,
        Commands::Fix {
            inputs,
            out,
            title_mismatch,
            citation_id,
        } => run_fix(&store, &overrides, inputs, out, title_mismatch, citation_id).await,
        Commands::Keywords {
            inputs,
            filter,
            limit,
            json,
        } => run_keywords(inputs, filter.as_deref(), limit, json),
        Commands::Config { action } => handle_config(&store, action),
    }
}

// ============================================================================
// Commands
// ============================================================================

fn build_client(config: &ScopusConfig, overrides: &Overrides) -> Result<ScopusClient> {
    let options = config
        .client_options(overrides)
        .context("Cannot configure Scopus client")?;
    ScopusClient::new(options).context("Failed to create Scopus client")
}

async fn run_search(
    store: &ConfigStore,
    overrides: &Overrides,
    query: &str,
    out: PathBuf,
    max_results: usize,
) -> Result<()> {
    let config = store.load();
    let client = build_client(&config, overrides)?;

    let records = search::search_records(&client, query, max_results)
        .await
        .context("Scopus search failed")?;
    println!("Found {} results.", records.len());

    bibtex::write_file(&out, &records)
        .with_context(|| format!("Failed to write {}", out.display()))?;
    println!("Results saved to {}", out.display());
    Ok(())
}

async fn run_fix(
    store: &ConfigStore,
    overrides: &Overrides,
    inputs: Vec<PathBuf>,
    out: PathBuf,
    title_mismatch: Option<TitleMismatchPolicy>,
    citation_id: Option<CitationIdPolicy>,
) -> Result<()> {
    let config = store.load();
    let client = build_client(&config, overrides)?;

    let options = EnrichOptions {
        title_mismatch: title_mismatch.unwrap_or(config.title_mismatch),
        citation_id: citation_id.unwrap_or(config.citation_id),
        current_year: None,
    };
    info!(
        title_mismatch = ?options.title_mismatch,
        citation_id = ?options.citation_id,
        "Enrichment policies"
    );

    let mut records = bibtex::read_files(&inputs).context("Failed to load input bibliographies")?;
    println!("Loaded {} entries.", records.len());

    let summary = Enricher::new(&client, options).enrich_all(&mut records).await;

    bibtex::write_file(&out, &records)
        .with_context(|| format!("Failed to write {}", out.display()))?;

    println!("{}", summary);
    Ok(())
}

fn run_keywords(inputs: Vec<PathBuf>, filter: Option<&str>, limit: Option<usize>, json: bool) -> Result<()> {
    let records = bibtex::read_files(&inputs).context("Failed to load input bibliographies")?;
    let index = KeywordIndex::build(&records);

    let mut selected = match filter {
        Some(pattern) => index.search(pattern)?,
        None => index.ranked(),
    };
    if let Some(limit) = limit {
        selected.truncate(limit);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&selected)?);
        return Ok(());
    }

    println!("{:<40} {:>9} {:>6}  kinds", "keyword", "citations", "papers");
    for stats in &selected {
        println!("{}", keyword_row(stats));
    }
    println!("{} of {} keywords", selected.len(), index.len());
    Ok(())
}

fn keyword_row(stats: &KeywordStats) -> String {
    let kinds: Vec<&str> = stats
        .kinds
        .iter()
        .map(|k| match k {
            KeywordKind::IndexTerm => "index",
            KeywordKind::AuthorKeyword => "author",
            KeywordKind::SubjectArea => "area",
        })
        .collect();
    format!(
        "{:<40} {:>9} {:>6}  {}",
        stats.keyword,
        stats.total_citations,
        stats.papers.len(),
        kinds.join(",")
    )
}

fn handle_config(store: &ConfigStore, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => {
            println!("Config file: {:?}", store.path());
        }
        ConfigAction::Show => {
            let mut config = store.load();
            config.api_key = config.api_key.map(|k| mask(&k));
            config.inst_token = config.inst_token.map(|t| mask(&t));
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::SetKey { key, token } => {
            let mut config = store.load();
            config.api_key = Some(key);
            if token.is_some() {
                config.inst_token = token;
            }
            store.save(&config)?;
            println!("API key saved to {:?}", store.path());
        }
        ConfigAction::SetPolicy {
            title_mismatch,
            citation_id,
        } => {
            let mut config = store.load();
            if let Some(policy) = title_mismatch {
                config.title_mismatch = policy;
            }
            if let Some(policy) = citation_id {
                config.citation_id = policy;
            }
            store.save(&config)?;
            println!("Policies saved to {:?}", store.path());
        }
        ConfigAction::Clear => {
            store.clear()?;
            println!("Config cleared.");
        }
    }

    Ok(())
}

/// Keep the last four characters of a secret.
fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    let visible = chars.len().min(4);
    let tail: String = chars[chars.len() - visible..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - visible), tail)
}
