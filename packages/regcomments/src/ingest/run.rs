//! The paginated ingest loop.
//!
//! Fetches comment pages for a target, dereferences each summary to its
//! full record, downloads attachments, and persists every completed page
//! immediately. Strictly sequential: one request at a time, with a fixed
//! sleep after each full-record fetch to respect upstream rate limits.
//!
//! Failure policy: any non-success repository result is logged and treated
//! as absent data for that call. One failed attachment or full-record
//! dereference yields fewer fields for that comment; it never aborts the
//! page or the run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::IngestConfig;
use crate::error::Result;
use crate::ingest::pages::{self, StoredAttachment, StoredComment};
use crate::resolver::{Target, TargetKind};
use crate::traits::CommentRepository;

/// What an ingest run produced.
#[derive(Debug, Default)]
pub struct IngestOutcome {
    /// Comments fetched and persisted across all pages.
    pub comments_fetched: usize,
    /// Page files written, in page order.
    pub page_files: Vec<PathBuf>,
}

/// Drives paginated ingestion against a [`CommentRepository`].
pub struct Ingestor<R> {
    repo: R,
    config: IngestConfig,
}

impl<R: CommentRepository> Ingestor<R> {
    /// Create an ingestor with default configuration.
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            config: IngestConfig::default(),
        }
    }

    /// Create an ingestor with explicit configuration.
    pub fn with_config(repo: R, config: IngestConfig) -> Self {
        Self { repo, config }
    }

    /// Ingest up to `limit` comments for `target` (`None` = everything).
    ///
    /// Page files land in `pages_dir`, attachment files in
    /// `attachments_dir`. Stops when the limit is reached or a page comes
    /// back shorter than the page size (end of data).
    pub async fn ingest(
        &self,
        target: &Target,
        pages_dir: &Path,
        attachments_dir: &Path,
        limit: Option<usize>,
    ) -> Result<IngestOutcome> {
        let mut outcome = IngestOutcome::default();

        // A document must be dereferenced to its object-id; a docket id is
        // the object-id directly. Upstream asymmetry, preserved.
        let object_id = match target.kind {
            TargetKind::Docket => target.id.clone(),
            TargetKind::Document => {
                match self.repo.object_id_for_document(&target.id).await {
                    Ok(Some(object_id)) => object_id,
                    Ok(None) => {
                        tracing::warn!(document = %target.id, "document exposes no object-id");
                        return Ok(outcome);
                    }
                    Err(e) => {
                        tracing::warn!(document = %target.id, error = %e, "document lookup failed");
                        return Ok(outcome);
                    }
                }
            }
        };

        let mut seen_ids = if self.config.dedupe_by_comment_id {
            self.previously_ingested_ids(pages_dir)?
        } else {
            HashSet::new()
        };

        let mut page_number = 1usize;
        loop {
            tracing::info!(page = page_number, object_id = %object_id, "fetching comment page");

            let summaries = match self
                .repo
                .comment_page(&object_id, self.config.page_size, page_number)
                .await
            {
                Ok(summaries) => summaries,
                Err(e) => {
                    tracing::warn!(page = page_number, error = %e, "comment page fetch failed");
                    break;
                }
            };

            if summaries.is_empty() {
                break;
            }
            let rows_in_page = summaries.len();

            let mut cleaned: Vec<StoredComment> = Vec::new();
            for summary in summaries {
                if limit.is_some_and(|n| outcome.comments_fetched >= n) {
                    break;
                }
                if self.config.dedupe_by_comment_id && !seen_ids.insert(summary.id.clone()) {
                    tracing::debug!(comment = %summary.id, "already ingested, skipping");
                    continue;
                }

                if let Some(comment) = self.fetch_one(&summary.id, summary.self_link.as_deref(), attachments_dir).await {
                    cleaned.push(comment);
                    outcome.comments_fetched += 1;
                }

                tokio::time::sleep(std::time::Duration::from_millis(self.config.rate_limit_ms))
                    .await;
            }

            // A page whose comments all failed or were all deduped writes
            // no file: an empty array would clobber an earlier run's page
            // file of the same number.
            if !cleaned.is_empty() {
                let path = pages::write_page_file(pages_dir, &target.id, page_number, &cleaned)?;
                outcome.page_files.push(path);
            }

            if limit.is_some_and(|n| outcome.comments_fetched >= n)
                || rows_in_page < self.config.page_size
            {
                break;
            }
            page_number += 1;
        }

        tracing::info!(
            comments = outcome.comments_fetched,
            pages = outcome.page_files.len(),
            target = %target.id,
            "ingest complete"
        );
        Ok(outcome)
    }

    /// Fetch one comment's full record and its attachments. `None` means
    /// the full record could not be obtained; the comment is skipped.
    async fn fetch_one(
        &self,
        comment_id: &str,
        self_link: Option<&str>,
        attachments_dir: &Path,
    ) -> Option<StoredComment> {
        let link = match self_link {
            Some(link) => link,
            None => {
                tracing::warn!(comment = %comment_id, "summary carries no self link");
                return None;
            }
        };

        let full = match self.repo.full_comment(link).await {
            Ok(Some(full)) => full,
            Ok(None) => {
                tracing::warn!(comment = %comment_id, "full record came back empty");
                return None;
            }
            Err(e) => {
                tracing::warn!(comment = %comment_id, error = %e, "full record fetch failed");
                return None;
            }
        };

        let attachments = self.fetch_attachments(&full.id, attachments_dir).await;

        Some(StoredComment {
            comment_id: full.id,
            text: full.text.unwrap_or_default(),
            attachments,
        })
    }

    /// List and download a comment's attachment files. Failures shrink the
    /// result, they never propagate.
    async fn fetch_attachments(
        &self,
        comment_id: &str,
        attachments_dir: &Path,
    ) -> Vec<StoredAttachment> {
        let files = match self.repo.attachment_files(comment_id).await {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(comment = %comment_id, error = %e, "attachment listing failed");
                return Vec::new();
            }
        };

        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            let local_path = match self
                .repo
                .download_attachment(&file.url, attachments_dir, comment_id, file.attachment_index)
                .await
            {
                Ok(path) => Some(path.to_string_lossy().into_owned()),
                Err(e) => {
                    tracing::warn!(url = %file.url, error = %e, "attachment download failed");
                    None
                }
            };
            stored.push(StoredAttachment {
                url: file.url,
                file_path: local_path,
            });
        }
        stored
    }

    /// Comment ids already present in page files on disk.
    fn previously_ingested_ids(&self, pages_dir: &Path) -> Result<HashSet<String>> {
        let mut ids = HashSet::new();
        if !pages_dir.exists() {
            return Ok(ids);
        }
        for path in pages::list_page_files(pages_dir)? {
            match pages::read_page_file(&path) {
                Ok(comments) => ids.extend(comments.into_iter().map(|c| c.comment_id)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "unreadable page file");
                }
            }
        }
        Ok(ids)
    }
}
