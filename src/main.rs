use anyhow::{Context, Result};
use clap::Parser;
use pubmed_harvester::report::{DEFAULT_BAR_WIDTH, render_term_counts};
use pubmed_harvester::{
    ClientConfig, HarvestProfile, Harvester, PubMedClient, ReconciliationStore, export_tables,
    load_terms,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(
    name = "pubmed-harvester",
    about = "Incrementally harvest PubMed articles for a list of keywords",
    long_about = "Searches PubMed for every keyword in a CSV file, fetches abstracts \
                  that are not stored yet, and keeps everything in a SQLite database"
)]
struct Cli {
    /// Debug profile: only the first term, ten results
    #[arg(long)]
    debug: bool,

    /// CSV file with a `keyword` column
    #[arg(long, default_value = "data/raw/searchterms.csv")]
    terms: PathBuf,

    /// SQLite database file (created if missing)
    #[arg(long, default_value = "data/external/pubmed/pubmed.db")]
    database: PathBuf,

    /// Export both tables as CSV into this directory after the run
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// API key for NCBI E-utilities
    #[arg(long, env = "NCBI_API_KEY")]
    api_key: Option<String>,

    /// Email for NCBI requests (recommended)
    #[arg(long, env = "NCBI_EMAIL")]
    email: Option<String>,

    /// Tool name for NCBI requests
    #[arg(long, env = "NCBI_TOOL", default_value = "pubmed-harvester")]
    tool: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let terms = load_terms(&cli.terms)
        .with_context(|| format!("Failed to load search terms from {}", cli.terms.display()))?;
    let store = ReconciliationStore::open(&cli.database)
        .with_context(|| format!("Failed to open database {}", cli.database.display()))?;

    let mut config = ClientConfig::new().with_tool(cli.tool.clone());
    if let Some(key) = &cli.api_key {
        config = config.with_api_key(key);
    }
    if let Some(email) = &cli.email {
        config = config.with_email(email);
    }

    let profile = HarvestProfile::from_debug_flag(cli.debug);
    info!(
        debug = cli.debug,
        terms = terms.len(),
        max_results = profile.max_results_per_term,
        "Starting harvest"
    );

    let mut harvester = Harvester::new(PubMedClient::with_config(config), store, profile);
    let summary = harvester.run(&terms).await.context("Harvest aborted")?;
    if !summary.skipped_terms.is_empty() {
        info!(skipped = ?summary.skipped_terms, "Some terms were skipped");
    }

    let store = harvester.into_store();
    let counts = store.all_search_term_counts()?;
    let unique = store.unique_article_count()?;
    println!("{}", render_term_counts(&counts, unique, DEFAULT_BAR_WIDTH));

    if let Some(dir) = &cli.export_dir {
        let paths = export_tables(&store, dir)
            .with_context(|| format!("Failed to export tables to {}", dir.display()))?;
        for path in paths {
            println!("Wrote {}", path.display());
        }
    }

    store.close()?;
    Ok(())
}
