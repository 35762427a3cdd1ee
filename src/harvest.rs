//! Orchestration loop: search → record hits → fetch pending → store
//!
//! Runs strictly sequentially. Every store call is atomic, so an interrupted
//! run leaves a consistent database and the next run resumes from whatever
//! is still pending.

use tracing::{info, instrument, warn};

use crate::config::HarvestProfile;
use crate::error::{HarvestError, Result};
use crate::pubmed::PubMedClient;
use crate::rate_limit::RateLimiter;
use crate::store::ReconciliationStore;

/// What happened while harvesting one term
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermOutcome {
    pub term: String,
    /// Identifiers returned by the search
    pub hits: usize,
    /// (identifier, term) pairs not seen before this run
    pub new_hits: usize,
    /// Identifiers that needed a detail fetch
    pub pending: usize,
    /// Records fetched and stored
    pub stored: usize,
    /// Fetches that failed in transport; these stay pending
    pub failed: usize,
}

/// Totals for a harvest run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestSummary {
    pub terms: Vec<TermOutcome>,
    /// Terms whose search failed and were skipped
    pub skipped_terms: Vec<String>,
}

impl HarvestSummary {
    pub fn stored(&self) -> usize {
        self.terms.iter().map(|t| t.stored).sum()
    }

    pub fn failed(&self) -> usize {
        self.terms.iter().map(|t| t.failed).sum()
    }

    pub fn new_hits(&self) -> usize {
        self.terms.iter().map(|t| t.new_hits).sum()
    }
}

/// Drives the incremental harvest for a list of terms
pub struct Harvester {
    client: PubMedClient,
    store: ReconciliationStore,
    profile: HarvestProfile,
    limiter: RateLimiter,
}

impl Harvester {
    pub fn new(client: PubMedClient, store: ReconciliationStore, profile: HarvestProfile) -> Self {
        let limiter = RateLimiter::new(profile.fetch_delay);
        Self {
            client,
            store,
            profile,
            limiter,
        }
    }

    pub fn store(&self) -> &ReconciliationStore {
        &self.store
    }

    pub fn profile(&self) -> &HarvestProfile {
        &self.profile
    }

    /// Give back the store, e.g. for export after the run
    pub fn into_store(self) -> ReconciliationStore {
        self.store
    }

    /// Harvest every term allowed by the profile
    ///
    /// A term whose search fails is logged and skipped. Database errors
    /// abort the run.
    pub async fn run<I, S>(&mut self, terms: I) -> Result<HarvestSummary>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let limit = self.profile.max_terms.unwrap_or(usize::MAX);
        let mut summary = HarvestSummary::default();

        self.log_store_state("before run")?;

        for term in terms.into_iter().take(limit) {
            let term = term.as_ref();
            match self.harvest_term(term).await {
                Ok(outcome) => summary.terms.push(outcome),
                Err(e @ HarvestError::DatabaseError(_)) => return Err(e),
                Err(e) => {
                    warn!(term = %term, error = %e, "Search failed, skipping term");
                    summary.skipped_terms.push(term.to_string());
                }
            }
        }

        self.log_store_state("after run")?;
        info!(
            terms = summary.terms.len(),
            skipped = summary.skipped_terms.len(),
            stored = summary.stored(),
            failed = summary.failed(),
            "Harvest finished"
        );

        Ok(summary)
    }

    /// Harvest a single term
    ///
    /// Search errors are returned to the caller. Transport failures while
    /// fetching individual records are logged and counted; the identifier
    /// stays pending and the remaining ones are still processed.
    #[instrument(skip(self), fields(term = %term))]
    pub async fn harvest_term(&mut self, term: &str) -> Result<TermOutcome> {
        info!("Downloading");
        let hits = self
            .client
            .search(term, self.profile.max_results_per_term)
            .await?;

        let new_hits = self.store.record_hits(term, &hits)?;
        let pending = self.store.pending_identifiers(term)?;
        info!(
            pending = pending.len(),
            "Number of new articles to query for search term"
        );

        let mut outcome = TermOutcome {
            term: term.to_string(),
            hits: hits.len(),
            new_hits,
            pending: pending.len(),
            ..TermOutcome::default()
        };

        for (count, pmid) in pending.into_iter().enumerate() {
            if count % 10 == 0 {
                info!(downloaded = count, "Number of summaries downloaded");
            }

            match self.client.fetch_and_flatten(pmid).await {
                Ok(record) => {
                    if self.store.upsert_record(&record)? {
                        outcome.stored += 1;
                    }
                }
                Err(e) => {
                    warn!(pmid = %pmid, error = %e, "Fetch failed, leaving identifier pending");
                    outcome.failed += 1;
                }
            }

            self.limiter.pause().await;
        }

        Ok(outcome)
    }

    fn log_store_state(&self, stage: &str) -> Result<()> {
        info!(
            stage,
            searchterms = self.store.hit_count()?,
            pubmeddata = self.store.record_count()?,
            "Entries in tables"
        );
        Ok(())
    }
}
