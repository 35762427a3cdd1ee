//! Client and run-profile configuration

use std::time::Duration;

use crate::retry::RetryConfig;

/// Default base URL for NCBI E-utilities
pub const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Minimum pause between detail fetches required by the NCBI fair-use policy
pub const DEFAULT_FETCH_DELAY: Duration = Duration::from_secs(3);

/// Configuration for the E-utilities HTTP client
///
/// # Example
///
/// ```
/// use pubmed_harvester::ClientConfig;
///
/// let config = ClientConfig::new()
///     .with_api_key("your_api_key_here")
///     .with_email("researcher@university.edu")
///     .with_tool("school-violence-harvest");
///
/// assert_eq!(config.effective_tool(), "school-violence-harvest");
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// NCBI API key, sent as `api_key`
    pub api_key: Option<String>,
    /// Contact email, sent as `email`
    pub email: Option<String>,
    /// Tool name, sent as `tool`
    pub tool: Option<String>,
    /// Override for the E-utilities base URL (used by tests)
    pub base_url: Option<String>,
    /// Override for the HTTP User-Agent header
    pub user_agent: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Retry policy for transient transport failures
    pub retry_config: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            email: None,
            tool: None,
            base_url: None,
            user_agent: None,
            timeout: Duration::from_secs(30),
            retry_config: RetryConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_email<S: Into<String>>(mut self, email: S) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_tool<S: Into<String>>(mut self, tool: S) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn effective_user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("pubmed-harvester/{}", env!("CARGO_PKG_VERSION")))
    }

    pub fn effective_tool(&self) -> &str {
        self.tool.as_deref().unwrap_or("pubmed-harvester")
    }

    /// Identification parameters appended to every E-utilities request
    pub fn build_api_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();

        if let Some(api_key) = &self.api_key {
            params.push(("api_key".to_string(), api_key.clone()));
        }
        if let Some(email) = &self.email {
            params.push(("email".to_string(), email.clone()));
        }
        params.push(("tool".to_string(), self.effective_tool().to_string()));

        params
    }
}

/// Run profile selected by the debug flag
///
/// The debug profile exists for fast iteration: it processes only the first
/// term and asks for ten results. Production walks every term with a cap of
/// one thousand results each.
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestProfile {
    /// Maximum number of terms processed, `None` for all of them
    pub max_terms: Option<usize>,
    /// `retmax` passed to ESearch for each term
    pub max_results_per_term: usize,
    /// Pause after every detail fetch
    pub fetch_delay: Duration,
}

impl HarvestProfile {
    pub fn debug() -> Self {
        Self {
            max_terms: Some(1),
            max_results_per_term: 10,
            fetch_delay: DEFAULT_FETCH_DELAY,
        }
    }

    pub fn production() -> Self {
        Self {
            max_terms: None,
            max_results_per_term: 1000,
            fetch_delay: DEFAULT_FETCH_DELAY,
        }
    }

    pub fn from_debug_flag(debug: bool) -> Self {
        if debug {
            Self::debug()
        } else {
            Self::production()
        }
    }

    pub fn with_fetch_delay(mut self, fetch_delay: Duration) -> Self {
        self.fetch_delay = fetch_delay;
        self
    }

    pub fn with_max_results_per_term(mut self, max_results: usize) -> Self {
        self.max_results_per_term = max_results;
        self
    }
}

impl Default for HarvestProfile {
    fn default() -> Self {
        Self::production()
    }
}
