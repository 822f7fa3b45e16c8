//! Typed errors for the comment pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can match
//! on the failure class. The governing policy lives at the call sites: no
//! single comment, attachment, or batch failure aborts a run — each wrapper
//! returns a `Result` and the caller maps the error kind to a fallback
//! value. Only configuration failures are fatal.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from the comment-repository API and attachment downloads.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Non-success status from the repository API.
    #[error("API returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not match the expected shape.
    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),

    /// Writing a downloaded attachment failed.
    #[error("failed to write attachment to {path}")]
    Download {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the language-model inference service.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Transport-level failure reaching the service.
    #[error("LLM request failed: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Non-success status from the service.
    #[error("LLM service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response carried no choices/content.
    #[error("LLM response contained no content")]
    Empty,

    /// No JSON payload could be located in the response text.
    #[error("no JSON payload found in LLM response")]
    NoJsonPayload,

    /// The located JSON payload failed to parse or violated the schema.
    #[error("malformed JSON in LLM response: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Errors from the external PDF/OCR toolchain.
#[derive(Debug, Error)]
pub enum PdfError {
    /// Required external tool is not installed.
    #[error("external tool not found: {0}")]
    ToolNotFound(String),

    /// The tool ran but exited unsuccessfully.
    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    /// Scratch-space or file I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Umbrella error for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Repository API failure.
    #[error("repository API error: {0}")]
    Api(#[from] ApiError),

    /// Language-model service failure.
    #[error("language model error: {0}")]
    Llm(#[from] LlmError),

    /// PDF/OCR toolchain failure.
    #[error("PDF extraction error: {0}")]
    Pdf(#[from] PdfError),

    /// A comment link that matches neither the document nor docket shape.
    #[error("invalid link format: {link}")]
    InvalidLinkFormat { link: String },

    /// Missing or invalid configuration. The only fatal class: raised at
    /// startup, before any processing.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON (de)serialization failure outside the LLM path.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Tabular output failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Result alias for repository API calls.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Result alias for language-model calls.
pub type LlmResult<T> = std::result::Result<T, LlmError>;
