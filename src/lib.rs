//! # PubMed Harvester
//!
//! Incremental keyword harvester for PubMed. For every search term it asks
//! ESearch for matching articles, remembers which identifiers each term
//! returned, fetches the abstract XML of articles not yet stored, flattens it
//! into a fixed set of columns, and persists everything in SQLite.
//!
//! ## Features
//!
//! - **Resumable**: hits and records are append-only, so an interrupted run
//!   picks up exactly the identifiers that are still pending
//! - **Polite**: one request at a time with a fixed pause after each fetch
//! - **Flat records**: EFetch XML collapses onto one row per article
//! - **Export**: both tables can be dumped as CSV
//!
//! ## Quick Start
//!
//! ```no_run
//! use pubmed_harvester::{HarvestProfile, Harvester, PubMedClient, ReconciliationStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = ReconciliationStore::open("pubmed.db")?;
//!     let mut harvester = Harvester::new(PubMedClient::new(), store, HarvestProfile::debug());
//!
//!     let summary = harvester.run(["bullying", "school violence"]).await?;
//!     println!("Stored {} new records", summary.stored());
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Flattening a single article
//!
//! ```no_run
//! use pubmed_harvester::{PubMedClient, PubMedId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = PubMedClient::new();
//!     let record = client.fetch_and_flatten(PubMedId::parse("31978945")?).await?;
//!
//!     println!("Title: {}", record.article_title);
//!     println!("Journal: {}", record.title);
//!
//!     Ok(())
//! }
//! ```

pub mod common;
pub mod config;
pub mod error;
pub mod export;
pub mod harvest;
pub mod pubmed;
pub mod rate_limit;
pub mod report;
pub mod retry;
pub mod store;
pub mod terms;

// Re-export main types for convenience
pub use common::PubMedId;
pub use config::{ClientConfig, HarvestProfile};
pub use error::{HarvestError, Result};
pub use export::export_tables;
pub use harvest::{HarvestSummary, Harvester, TermOutcome};
pub use pubmed::{ArticleRecord, Flattener, OccurrencePolicy, PubMedClient};
pub use rate_limit::RateLimiter;
pub use retry::RetryConfig;
pub use store::ReconciliationStore;
pub use terms::load_terms;
