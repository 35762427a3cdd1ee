use crate::common::PubMedId;
use crate::config::ClientConfig;
use crate::error::{HarvestError, Result};
use crate::pubmed::flatten::{Flattener, OccurrencePolicy};
use crate::pubmed::record::ArticleRecord;
use crate::pubmed::responses::ESearchResult;
use crate::retry::with_retry;
use reqwest::{Client, Response};
use tracing::{debug, info, instrument, warn};

/// ESearch cannot return more than this many identifiers for one query
const MAX_RETRIEVABLE: usize = 9999;

/// Client for the PubMed ESearch and EFetch endpoints
///
/// Both operations issue exactly one logical request; retries of transient
/// failures happen inside [`PubMedClient::make_request`]. The client never
/// sleeps between calls: pacing is the caller's job.
#[derive(Clone)]
pub struct PubMedClient {
    client: Client,
    base_url: String,
    config: ClientConfig,
    flattener: Flattener,
}

impl PubMedClient {
    /// Create a new PubMed client with default configuration
    ///
    /// # Example
    ///
    /// ```
    /// use pubmed_harvester::PubMedClient;
    ///
    /// let client = PubMedClient::new();
    /// ```
    pub fn new() -> Self {
        Self::with_config(ClientConfig::new())
    }

    /// Create a new PubMed client with custom configuration
    ///
    /// # Example
    ///
    /// ```
    /// use pubmed_harvester::{ClientConfig, PubMedClient};
    ///
    /// let config = ClientConfig::new()
    ///     .with_api_key("your_api_key_here")
    ///     .with_email("researcher@university.edu");
    ///
    /// let client = PubMedClient::with_config(config);
    /// ```
    pub fn with_config(config: ClientConfig) -> Self {
        let client = Client::builder()
            .user_agent(config.effective_user_agent())
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                Client::new()
            });

        Self::with_client(client, config)
    }

    /// Create a PubMed client around an existing reqwest client
    pub fn with_client(client: Client, config: ClientConfig) -> Self {
        let base_url = config.effective_base_url().to_string();

        Self {
            client,
            base_url,
            config,
            flattener: Flattener::default(),
        }
    }

    /// Choose how repeated XML tags collapse onto a single column
    pub fn with_occurrence_policy(mut self, policy: OccurrencePolicy) -> Self {
        self.flattener = Flattener::new(policy);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Search PubMed for articles carrying `term` as a keyword
    ///
    /// The term is restricted to the keyword field (`[KYWD]`) and multi-word
    /// terms are joined with `+` so every word must match. Identifiers are
    /// returned in the order ESearch ranks them.
    ///
    /// # Errors
    ///
    /// * `HarvestError::InvalidTerm` - if the term is blank
    /// * `HarvestError::InvalidLimit` - if `max_results` is 0 or above 9999
    /// * `HarvestError::RequestError` / `ApiError` - if the request fails
    /// * `HarvestError::JsonError` - if the response is not ESearch JSON
    ///
    /// # Example
    ///
    /// ```no_run
    /// use pubmed_harvester::PubMedClient;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let client = PubMedClient::new();
    ///     let pmids = client.search("school violence", 20).await?;
    ///     println!("Found {} articles", pmids.len());
    ///     Ok(())
    /// }
    /// ```
    #[instrument(skip(self), fields(term = %term, max_results = max_results))]
    pub async fn search(&self, term: &str, max_results: usize) -> Result<Vec<PubMedId>> {
        if max_results == 0 || max_results > MAX_RETRIEVABLE {
            return Err(HarvestError::InvalidLimit {
                requested: max_results,
                maximum: MAX_RETRIEVABLE,
            });
        }

        let query = keyword_query(term)?;
        let url = format!(
            "{}/esearch.fcgi?db=pubmed&term={}&retmax={}&retmode=json",
            self.base_url,
            urlencoding::encode(&query),
            max_results
        );

        debug!("Making ESearch API request");
        let response = self.make_request(&url).await?;
        let search_result: ESearchResult = response.json().await?;

        // NCBI sometimes returns 200 OK with an ERROR field
        if let Some(error_msg) = &search_result.esearchresult.error {
            return Err(HarvestError::ApiError {
                status: 200,
                message: format!("NCBI ESearch API error: {}", error_msg),
            });
        }

        let total_count: usize = search_result
            .esearchresult
            .count
            .as_deref()
            .and_then(|c| c.parse().ok())
            .unwrap_or(0);

        if total_count > max_results {
            info!(
                total_count,
                max_results, "More matches exist than requested, keeping the top results"
            );
        }

        let pmids: Vec<PubMedId> = search_result
            .esearchresult
            .idlist
            .iter()
            .filter_map(|raw| match PubMedId::parse(raw) {
                Ok(pmid) => Some(pmid),
                Err(_) => {
                    warn!(raw_id = %raw, "Skipping invalid identifier in ESearch response");
                    None
                }
            })
            .collect();

        info!(found = pmids.len(), "Search completed");
        Ok(pmids)
    }

    /// Fetch the abstract-format XML for one article and flatten it
    ///
    /// Transport failures are returned as errors and nothing should be
    /// stored for the identifier. A response that arrives but cannot be
    /// parsed yields a blank record, so a permanently broken identifier is
    /// not fetched again on the next run.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use pubmed_harvester::{PubMedClient, PubMedId};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let client = PubMedClient::new();
    ///     let record = client.fetch_and_flatten(PubMedId::parse("31978945")?).await?;
    ///     println!("{}: {}", record.pmid, record.article_title);
    ///     Ok(())
    /// }
    /// ```
    #[instrument(skip(self), fields(pmid = %pmid))]
    pub async fn fetch_and_flatten(&self, pmid: PubMedId) -> Result<ArticleRecord> {
        let url = format!(
            "{}/efetch.fcgi?db=pubmed&id={}&rettype=abstract&retmode=xml",
            self.base_url, pmid
        );

        debug!("Making EFetch API request");
        let response = self.make_request(&url).await?;
        let xml_text = response.text().await?;

        Ok(self.flattener.flatten_lossy(pmid, &xml_text))
    }

    /// Internal helper method for making HTTP requests with retry logic.
    /// Automatically appends API parameters (api_key, email, tool) to the URL.
    pub(crate) async fn make_request(&self, url: &str) -> Result<Response> {
        let mut final_url = url.to_string();
        let api_params = self.config.build_api_params();

        if !api_params.is_empty() {
            let separator = if url.contains('?') { '&' } else { '?' };
            final_url.push(separator);

            let param_strings: Vec<String> = api_params
                .into_iter()
                .map(|(key, value)| format!("{}={}", key, urlencoding::encode(&value)))
                .collect();
            final_url.push_str(&param_strings.join("&"));
        }

        let response = with_retry(
            || async {
                debug!("Making API request to: {}", final_url);
                let response = self
                    .client
                    .get(&final_url)
                    .send()
                    .await
                    .map_err(HarvestError::from)?;

                // Server errors and throttling are retryable
                if response.status().is_server_error() || response.status().as_u16() == 429 {
                    return Err(HarvestError::ApiError {
                        status: response.status().as_u16(),
                        message: response
                            .status()
                            .canonical_reason()
                            .unwrap_or("Unknown error")
                            .to_string(),
                    });
                }

                Ok(response)
            },
            &self.config.retry_config,
            "NCBI API request",
        )
        .await?;

        if !response.status().is_success() {
            warn!("API request failed with status: {}", response.status());
            return Err(HarvestError::ApiError {
                status: response.status().as_u16(),
                message: response
                    .status()
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string(),
            });
        }

        Ok(response)
    }
}

impl Default for PubMedClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the ESearch term for a keyword: words joined by `+`, keyword field
fn keyword_query(term: &str) -> Result<String> {
    let words: Vec<&str> = term.split_whitespace().collect();
    if words.is_empty() {
        return Err(HarvestError::InvalidTerm(term.to_string()));
    }
    Ok(format!("{}[KYWD]", words.join("+")))
}
