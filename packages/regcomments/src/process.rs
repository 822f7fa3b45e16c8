//! Turns ingested page files into flat per-comment records.
//!
//! For each stored comment the body text and the extracted text of its
//! PDF attachments are combined into one prompt input, classified, and
//! emitted as a [`FlatRecord`]. A comment is dropped only when it has no
//! usable text at all; every other failure degrades into sentinel field
//! values on the row.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Result;
use crate::extract::{Classifier, ExtractedAttributes};
use crate::ingest::{StoredAttachment, StoredComment};
use crate::ingest::pages;
use crate::traits::{AttachmentText, ChatModel};

/// Comment bodies that only point at the attachments carry no signal of
/// their own and are excluded from the combined text.
const BOILERPLATE_BODIES: [&str; 2] = ["see attached file(s)", "see attached"];

/// One classified comment, flattened for tabular output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatRecord {
    pub comment_id: String,
    pub comment_link: String,
    pub who_type: String,
    pub who_name: String,
    pub what: String,
    pub why: String,
    /// Issue strings, stored joined with `", "` in CSV cells.
    #[serde(
        serialize_with = "serialize_joined",
        deserialize_with = "deserialize_joined"
    )]
    pub issues: Vec<String>,
    pub scientific_legal_support: String,
    pub pdf_attachments_present: bool,
    pub pdf_attachments_count: usize,
}

fn serialize_joined<S: Serializer>(issues: &[String], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&issues.join(", "))
}

fn deserialize_joined<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<String>, D::Error> {
    let joined = String::deserialize(deserializer)?;
    if joined.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(joined.split(", ").map(|s| s.to_string()).collect())
}

impl FlatRecord {
    fn from_attributes(
        comment_id: &str,
        attributes: ExtractedAttributes,
        pdf_count: usize,
    ) -> Self {
        Self {
            comment_id: comment_id.to_string(),
            comment_link: comment_link(comment_id),
            who_type: attributes.who_type.as_str().to_string(),
            who_name: attributes.who_name,
            what: attributes.what,
            why: attributes.why,
            issues: attributes.issues,
            scientific_legal_support: attributes.scientific_legal_support.as_str().to_string(),
            pdf_attachments_present: pdf_count > 0,
            pdf_attachments_count: pdf_count,
        }
    }
}

/// Canonical public link for a comment id.
pub fn comment_link(comment_id: &str) -> String {
    format!("https://www.regulations.gov/comment/{}", comment_id)
}

/// Classifies stored comments into flat records.
pub struct CommentProcessor<M, T> {
    classifier: Classifier<M>,
    text_extractor: T,
}

impl<M: ChatModel, T: AttachmentText> CommentProcessor<M, T> {
    pub fn new(classifier: Classifier<M>, text_extractor: T) -> Self {
        Self {
            classifier,
            text_extractor,
        }
    }

    /// Process every page file under `pages_dir` in file-name order.
    pub async fn process_dir(
        &self,
        pages_dir: &Path,
        attachments_dir: &Path,
    ) -> Result<Vec<FlatRecord>> {
        let mut records = Vec::new();
        for path in pages::list_page_files(pages_dir)? {
            let comments = match pages::read_page_file(&path) {
                Ok(comments) => comments,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "unreadable page file");
                    continue;
                }
            };
            tracing::info!(path = %path.display(), comments = comments.len(), "processing page file");
            for comment in &comments {
                if let Some(record) = self.process_comment(comment, attachments_dir).await {
                    records.push(record);
                }
            }
        }
        Ok(records)
    }

    /// Process one stored comment. `None` means it had no usable text.
    pub async fn process_comment(
        &self,
        comment: &StoredComment,
        attachments_dir: &Path,
    ) -> Option<FlatRecord> {
        let pdf_count = comment
            .attachments
            .iter()
            .filter(|a| is_pdf(a))
            .count();

        let mut parts: Vec<String> = Vec::new();
        let body = comment.text.trim();
        if !body.is_empty() && !is_boilerplate(body) {
            parts.push(format!("Comment Text: {}", body));
        }

        for attachment in comment.attachments.iter().filter(|a| is_pdf(a)) {
            if let Some(text) = self.attachment_text(attachment, attachments_dir) {
                parts.push(format!("Extracted PDF Text: {}", text));
            }
        }

        let combined = parts.join("\n\n");
        if combined.trim().is_empty() {
            tracing::info!(comment = %comment.comment_id, "no usable text, skipping");
            return None;
        }

        let attributes = self.classifier.classify(&combined, pdf_count > 0).await;
        Some(FlatRecord::from_attributes(
            &comment.comment_id,
            attributes,
            pdf_count,
        ))
    }

    /// Resolve a stored attachment against the attachments directory and
    /// extract its text. Sentinel values pass through as text.
    fn attachment_text(
        &self,
        attachment: &StoredAttachment,
        attachments_dir: &Path,
    ) -> Option<String> {
        let stored_path = attachment.file_path.as_deref()?;
        let file_name = Path::new(stored_path).file_name()?;
        let local = attachments_dir.join(file_name);
        if !local.exists() {
            tracing::warn!(path = %local.display(), "attachment file missing on disk");
            return None;
        }
        Some(self.text_extractor.extract(&local).into_text())
    }
}

fn is_pdf(attachment: &StoredAttachment) -> bool {
    attachment
        .file_path
        .as_deref()
        .map(|p| p.to_ascii_lowercase().ends_with(".pdf"))
        .unwrap_or(false)
}

fn is_boilerplate(body: &str) -> bool {
    let lowered = body.to_ascii_lowercase();
    BOILERPLATE_BODIES.iter().any(|b| lowered == *b)
}

/// Write flat records as CSV.
pub fn write_flat_records(path: &Path, records: &[FlatRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    tracing::info!(rows = records.len(), path = %path.display(), "flat records written");
    Ok(())
}

/// Read flat records back from CSV.
pub fn read_flat_records(path: &Path) -> Result<Vec<FlatRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}
