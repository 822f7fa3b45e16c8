//! Paginated comment ingestion.
//!
//! [`api::RegulationsClient`] implements [`crate::traits::CommentRepository`]
//! against the regulations.gov v4 API; [`run::Ingestor`] drives the page
//! loop and persists each page incrementally; [`pages`] owns the on-disk
//! page-file format.

pub mod api;
pub mod pages;
pub mod run;

pub use api::RegulationsClient;
pub use pages::{StoredAttachment, StoredComment};
pub use run::{IngestOutcome, Ingestor};
