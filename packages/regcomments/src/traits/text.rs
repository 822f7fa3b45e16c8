//! Attachment text-extraction trait.

use std::path::Path;

use crate::extract::text::ExtractedText;

/// Extracts text from a local attachment file.
///
/// Infallible by contract: failures surface as the typed sentinels in
/// [`ExtractedText`], which downstream treats as usable text.
pub trait AttachmentText: Send + Sync {
    /// Extract text from the file at `path`.
    fn extract(&self, path: &Path) -> ExtractedText;
}
