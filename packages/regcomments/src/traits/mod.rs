//! Trait abstractions at the pipeline's external seams.
//!
//! - [`ChatModel`] - the language-model inference service
//! - [`CommentRepository`] - the comment-repository HTTP API
//! - [`AttachmentText`] - local attachment text extraction
//!
//! Production implementations live in [`crate::ai`], [`crate::ingest`],
//! and [`crate::extract`]; mocks in [`crate::testing`].

pub mod chat;
pub mod repository;
pub mod text;

pub use chat::ChatModel;
pub use repository::{AttachmentFile, CommentRepository, CommentSummary, FullComment};
pub use text::AttachmentText;
