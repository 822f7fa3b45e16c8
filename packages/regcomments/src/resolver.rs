//! Resolves a regulations.gov link into a typed ingestion target.
//!
//! Two shapes are recognized: `.../document/<ID>-<seq>` and
//! `.../docket/<ID>`. A document id must later be dereferenced through the
//! API to obtain its object-id; a docket id is used as the object-id
//! directly.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::PipelineError;

/// What kind of object a link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// A single document open for comment.
    Document,
    /// A docket aggregating multiple documents.
    Docket,
}

/// A parsed ingestion target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// The extracted identifier, e.g. `FSIS-2011-0012-0001`.
    pub id: String,
    /// Whether the identifier names a document or a docket.
    pub kind: TargetKind,
}

impl Target {
    /// Create a document target.
    pub fn document(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: TargetKind::Document,
        }
    }

    /// Create a docket target.
    pub fn docket(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: TargetKind::Docket,
        }
    }
}

fn document_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"document/([A-Z0-9-]+-\d+)").expect("valid regex"))
}

fn docket_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"docket/([A-Z0-9-]+)").expect("valid regex"))
}

/// Parse a regulations.gov link into a [`Target`].
///
/// Returns [`PipelineError::InvalidLinkFormat`] when neither shape matches
/// or the embedded identifier is malformed. The failure is reported, not
/// fatal: the caller decides whether to proceed.
pub fn parse_comment_link(link: &str) -> Result<Target, PipelineError> {
    if link.contains("document") {
        if let Some(caps) = document_re().captures(link) {
            return Ok(Target::document(&caps[1]));
        }
    } else if link.contains("docket") {
        if let Some(caps) = docket_re().captures(link) {
            return Ok(Target::docket(&caps[1]));
        }
    }

    tracing::warn!(link = %link, "could not extract a docket or document id");
    Err(PipelineError::InvalidLinkFormat {
        link: link.to_string(),
    })
}
