//! Public-Comment Analysis Pipeline
//!
//! Fetches public comments for a regulations.gov document or docket,
//! extracts text from their PDF attachments, classifies each comment
//! into structured attributes with a language model, and clusters the
//! extracted issues into consolidated high-level categories.
//!
//! # Pipeline stages
//!
//! 1. Resolve a pasted comment link to a [`resolver::Target`].
//! 2. Ingest comment pages and attachments ([`ingest::Ingestor`]),
//!    persisting each page as its own JSON file.
//! 3. Extract attachment text ([`extract::PdfExtractor`]) and classify
//!    each comment ([`extract::Classifier`]) into a flat record.
//! 4. Cluster issues in two passes ([`cluster::IssueClusterer`]) and
//!    emit categorized and exploded CSVs.
//!
//! Failure policy throughout: one comment, attachment, or batch failing
//! never aborts a run. Failures degrade into logged sentinel values;
//! only missing configuration is fatal.
//!
//! # Usage
//!
//! ```rust,ignore
//! use regcomments::{
//!     resolver, Classifier, CommentProcessor, Credentials, Ingestor,
//!     IssueClusterer, OpenAiChat, PdfExtractor, RegulationsClient,
//! };
//!
//! let creds = Credentials::from_env()?;
//! let target = resolver::parse_comment_link(&link)?;
//!
//! let ingestor = Ingestor::new(RegulationsClient::from_credentials(&creds));
//! ingestor.ingest(&target, pages_dir, attachments_dir, None).await?;
//!
//! let chat = OpenAiChat::from_credentials(&creds);
//! let processor = CommentProcessor::new(Classifier::new(chat.clone()), PdfExtractor::new());
//! let records = processor.process_dir(pages_dir, attachments_dir).await?;
//!
//! let outcome = IssueClusterer::new(chat).cluster(&records, logs_dir).await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Core trait abstractions (ChatModel, CommentRepository, AttachmentText)
//! - [`resolver`] - Comment-link parsing
//! - [`ingest`] - Paginated comment and attachment ingestion
//! - [`extract`] - Attachment text extraction and per-comment classification
//! - [`process`] - Page files to flat classified records
//! - [`cluster`] - Two-pass issue clustering
//! - [`lenient_json`] - JSON payload recovery from model replies
//! - [`testing`] - Mock implementations for testing

pub mod ai;
pub mod cluster;
pub mod config;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod lenient_json;
pub mod process;
pub mod resolver;
pub mod testing;
pub mod traits;

// Re-export core types at crate root
pub use ai::OpenAiChat;
pub use cluster::{CategorizedRecord, ClusterOutcome, ExplodedRow, IssueClusterer};
pub use config::{ClassifyConfig, ClusterConfig, Credentials, IngestConfig, SecretString};
pub use error::{ApiError, LlmError, PdfError, PipelineError, Result};
pub use extract::{
    Classifier, ExtractedAttributes, ExtractedText, PdfExtractor, Support, WhoType,
};
pub use ingest::{IngestOutcome, Ingestor, RegulationsClient, StoredAttachment, StoredComment};
pub use process::{CommentProcessor, FlatRecord};
pub use resolver::{parse_comment_link, Target, TargetKind};
pub use traits::{AttachmentText, ChatModel, CommentRepository};
