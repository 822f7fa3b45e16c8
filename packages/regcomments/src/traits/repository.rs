//! Comment-repository trait for the upstream regulations API.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::ApiResult;

/// One comment row from a paginated listing.
#[derive(Debug, Clone)]
pub struct CommentSummary {
    /// The comment id.
    pub id: String,
    /// The "self" link to the full record, when present.
    pub self_link: Option<String>,
}

/// A dereferenced full comment record.
#[derive(Debug, Clone)]
pub struct FullComment {
    /// The comment id.
    pub id: String,
    /// The body text, when present.
    pub text: Option<String>,
}

/// One downloadable file attached to a comment.
///
/// The upstream groups files under attachments; files belonging to the
/// same attachment share `attachment_index`, which names the local file.
#[derive(Debug, Clone)]
pub struct AttachmentFile {
    /// Download URL.
    pub url: String,
    /// Index of the owning attachment within the comment.
    pub attachment_index: usize,
}

/// The comment-repository API surface the ingestor consumes.
///
/// Every method returns `Result`; the ingestor maps each error to "absent
/// data" for that call, so one failed fetch never aborts a page.
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Dereference a document id to the object-id its comments hang off.
    ///
    /// `Ok(None)` means the document exists but exposes no object-id.
    async fn object_id_for_document(&self, document_id: &str) -> ApiResult<Option<String>>;

    /// Fetch one page of comment summaries for an object-id, sorted by
    /// last-modified time (the explicit sort key keeps page contents
    /// stable across calls).
    async fn comment_page(
        &self,
        object_id: &str,
        page_size: usize,
        page_number: usize,
    ) -> ApiResult<Vec<CommentSummary>>;

    /// Dereference a summary's self link to the full comment record.
    async fn full_comment(&self, self_link: &str) -> ApiResult<Option<FullComment>>;

    /// List the downloadable files for a comment's attachments.
    async fn attachment_files(&self, comment_id: &str) -> ApiResult<Vec<AttachmentFile>>;

    /// Download one attachment file into `dest_dir`, named
    /// `{comment_id}_{attachment_index}.{ext}` with the extension inferred
    /// from the response content type. Returns the local path.
    async fn download_attachment(
        &self,
        url: &str,
        dest_dir: &Path,
        comment_id: &str,
        attachment_index: usize,
    ) -> ApiResult<PathBuf>;
}
