//! Explicit configuration for each pipeline stage.
//!
//! No process-wide state: every component takes its configuration as a
//! value at construction time. Defaults carry the constants the pipeline
//! is specified against (page size 250, 100 ms throttle, 50k-char prompt
//! cap, clustering batches of 500).

use std::fmt;

use secrecy::{ExposeSecret, SecretBox};

use crate::error::PipelineError;

/// A secret string that won't be logged or displayed.
///
/// Wraps `secrecy::SecretBox` so API keys never leak through `Debug`,
/// `Display`, or error messages.
pub struct SecretString(SecretBox<str>);

impl SecretString {
    /// Create a new secret string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(Box::from(value.into().as_str())))
    }

    /// Expose the secret value for use in a request.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for SecretString {
    fn clone(&self) -> Self {
        Self::new(self.expose().to_string())
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// API credentials for the two external services.
#[derive(Clone)]
pub struct Credentials {
    /// regulations.gov API key.
    pub regulations_api_key: SecretString,

    /// OpenAI-compatible inference service key.
    pub openai_api_key: SecretString,
}

impl Credentials {
    /// Create credentials from explicit values.
    pub fn new(
        regulations_api_key: impl Into<String>,
        openai_api_key: impl Into<String>,
    ) -> Self {
        Self {
            regulations_api_key: SecretString::new(regulations_api_key),
            openai_api_key: SecretString::new(openai_api_key),
        }
    }

    /// Load credentials from `REGULATIONS_API_KEY` and `OPENAI_API_KEY`.
    ///
    /// Reads a `.env` file first when one is present. A missing key is the
    /// one fatal error in the pipeline: nothing runs without credentials.
    pub fn from_env() -> Result<Self, PipelineError> {
        let _ = dotenvy::dotenv();

        let regulations = std::env::var("REGULATIONS_API_KEY")
            .map_err(|_| PipelineError::Config("REGULATIONS_API_KEY not set".to_string()))?;
        let openai = std::env::var("OPENAI_API_KEY")
            .map_err(|_| PipelineError::Config("OPENAI_API_KEY not set".to_string()))?;

        Ok(Self::new(regulations, openai))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("regulations_api_key", &"[REDACTED]")
            .field("openai_api_key", &"[REDACTED]")
            .finish()
    }
}

/// Configuration for the paginated ingestor.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Comments requested per page. The upstream maximum.
    pub page_size: usize,

    /// Sleep inserted after each full-record fetch, in milliseconds.
    pub rate_limit_ms: u64,

    /// Skip comments whose id already appears in page files on disk for
    /// the same target. Off by default: re-running appends, it does not
    /// merge.
    pub dedupe_by_comment_id: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            page_size: 250,
            rate_limit_ms: 100,
            dedupe_by_comment_id: false,
        }
    }
}

impl IngestConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page size.
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Set the per-comment throttle.
    pub fn with_rate_limit_ms(mut self, ms: u64) -> Self {
        self.rate_limit_ms = ms;
        self
    }

    /// Enable cross-run deduplication by comment id.
    pub fn with_dedupe(mut self) -> Self {
        self.dedupe_by_comment_id = true;
        self
    }
}

/// Configuration for the structured extractor.
#[derive(Debug, Clone)]
pub struct ClassifyConfig {
    /// Maximum comment characters embedded in the prompt before the
    /// "[TRUNCATED]" marker is appended.
    pub max_comment_chars: usize,

    /// Sampling temperature. Zero: determinism over creativity for
    /// extraction.
    pub temperature: f32,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            max_comment_chars: 50_000,
            temperature: 0.0,
        }
    }
}

impl ClassifyConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the truncation threshold.
    pub fn with_max_comment_chars(mut self, max: usize) -> Self {
        self.max_comment_chars = max;
        self
    }
}

/// Configuration for the issue clusterer.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Distinct issues per grouping request, bounding prompt size.
    pub batch_size: usize,

    /// Cap on member issues ingested per category per batch response,
    /// bounding LLM over-generation.
    pub max_members_per_category: usize,

    /// Sampling temperature for the grouping and consolidation calls.
    pub temperature: f32,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            max_members_per_category: 200,
            temperature: 0.2,
        }
    }
}

impl ClusterConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the per-category member cap.
    pub fn with_member_cap(mut self, cap: usize) -> Self {
        self.max_members_per_category = cap;
        self
    }
}
