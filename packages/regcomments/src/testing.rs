//! Hand-rolled test doubles for the trait seams.
//!
//! Available outside `cfg(test)` so integration tests can drive the
//! pipeline without the network or external binaries.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{ApiError, ApiResult, LlmError, LlmResult};
use crate::extract::ExtractedText;
use crate::traits::{
    AttachmentFile, AttachmentText, ChatModel, CommentRepository, CommentSummary, FullComment,
};

const MOCK_LINK_PREFIX: &str = "mock://comments/";

/// In-memory [`CommentRepository`] seeded through builders.
#[derive(Debug, Default)]
pub struct MockRepository {
    object_ids: HashMap<String, String>,
    comments: HashMap<String, Vec<String>>,
    attachments: HashMap<String, Vec<String>>,
    failing_full: HashSet<String>,
    failing_pages: HashSet<usize>,
}

impl MockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a document id to its object-id.
    pub fn with_object_id(
        mut self,
        document_id: impl Into<String>,
        object_id: impl Into<String>,
    ) -> Self {
        self.object_ids.insert(document_id.into(), object_id.into());
        self
    }

    /// Seed the comment ids served for an object-id, in order.
    pub fn with_comments<I>(mut self, object_id: impl Into<String>, comment_ids: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.comments.insert(
            object_id.into(),
            comment_ids.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Seed one attachment download URL for a comment.
    pub fn with_attachment(
        mut self,
        comment_id: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        self.attachments
            .entry(comment_id.into())
            .or_default()
            .push(url.into());
        self
    }

    /// Make the full-record fetch for one comment fail.
    pub fn fail_full_comment(mut self, comment_id: impl Into<String>) -> Self {
        self.failing_full.insert(comment_id.into());
        self
    }

    /// Make one page fetch fail.
    pub fn fail_page(mut self, page_number: usize) -> Self {
        self.failing_pages.insert(page_number);
        self
    }

    fn server_error(context: &str) -> ApiError {
        ApiError::Status {
            status: 500,
            body: format!("mock failure: {}", context),
        }
    }
}

#[async_trait]
impl CommentRepository for MockRepository {
    async fn object_id_for_document(&self, document_id: &str) -> ApiResult<Option<String>> {
        Ok(self.object_ids.get(document_id).cloned())
    }

    async fn comment_page(
        &self,
        object_id: &str,
        page_size: usize,
        page_number: usize,
    ) -> ApiResult<Vec<CommentSummary>> {
        if self.failing_pages.contains(&page_number) {
            return Err(Self::server_error("page fetch"));
        }
        let all = match self.comments.get(object_id) {
            Some(ids) => ids,
            None => return Ok(Vec::new()),
        };
        let start = (page_number - 1) * page_size;
        Ok(all
            .iter()
            .skip(start)
            .take(page_size)
            .map(|id| CommentSummary {
                id: id.clone(),
                self_link: Some(format!("{}{}", MOCK_LINK_PREFIX, id)),
            })
            .collect())
    }

    async fn full_comment(&self, self_link: &str) -> ApiResult<Option<FullComment>> {
        let id = match self_link.strip_prefix(MOCK_LINK_PREFIX) {
            Some(id) => id,
            None => return Ok(None),
        };
        if self.failing_full.contains(id) {
            return Err(Self::server_error("full comment"));
        }
        Ok(Some(FullComment {
            id: id.to_string(),
            text: Some(format!("Comment body for {}", id)),
        }))
    }

    async fn attachment_files(&self, comment_id: &str) -> ApiResult<Vec<AttachmentFile>> {
        Ok(self
            .attachments
            .get(comment_id)
            .into_iter()
            .flatten()
            .enumerate()
            .map(|(index, url)| AttachmentFile {
                url: url.clone(),
                attachment_index: index,
            })
            .collect())
    }

    async fn download_attachment(
        &self,
        url: &str,
        dest_dir: &Path,
        comment_id: &str,
        attachment_index: usize,
    ) -> ApiResult<PathBuf> {
        std::fs::create_dir_all(dest_dir).map_err(|e| ApiError::Download {
            path: dest_dir.to_path_buf(),
            source: e,
        })?;
        let path = dest_dir.join(format!("{}_{}.pdf", comment_id, attachment_index));
        std::fs::write(&path, format!("mock download of {}", url)).map_err(|e| {
            ApiError::Download {
                path: path.clone(),
                source: e,
            }
        })?;
        Ok(path)
    }
}

#[derive(Debug, Default)]
struct MockChatState {
    responses: VecDeque<String>,
    last: Option<String>,
    prompts: Vec<String>,
    fail: bool,
}

/// Scripted [`ChatModel`]. Replies are served in the order queued; once
/// the queue runs dry the last reply repeats. Every user prompt is
/// captured for assertions.
#[derive(Debug, Clone, Default)]
pub struct MockChat {
    state: Arc<Mutex<MockChatState>>,
}

impl MockChat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one reply.
    pub fn with_response(self, response: impl Into<String>) -> Self {
        self.state
            .lock()
            .unwrap()
            .responses
            .push_back(response.into());
        self
    }

    /// Make every call fail.
    pub fn failing(self) -> Self {
        self.state.lock().unwrap().fail = true;
        self
    }

    /// User prompts seen so far, in call order.
    pub fn captured_prompts(&self) -> Vec<String> {
        self.state.lock().unwrap().prompts.clone()
    }

    /// Number of chat calls made.
    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().prompts.len()
    }
}

#[async_trait]
impl ChatModel for MockChat {
    async fn chat(&self, _system: &str, user: &str, _temperature: f32) -> LlmResult<String> {
        let mut state = self.state.lock().unwrap();
        state.prompts.push(user.to_string());
        if state.fail {
            return Err(LlmError::Status {
                status: 500,
                body: "mock failure".to_string(),
            });
        }
        match state.responses.pop_front() {
            Some(reply) => {
                state.last = Some(reply.clone());
                Ok(reply)
            }
            None => state.last.clone().ok_or(LlmError::Empty),
        }
    }
}

/// [`AttachmentText`] serving canned extractions by path.
#[derive(Debug, Default)]
pub struct MockAttachmentText {
    texts: HashMap<PathBuf, ExtractedText>,
}

impl MockAttachmentText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `text` for `path`. Unseeded paths come back unreadable.
    pub fn with_text(mut self, path: impl Into<PathBuf>, text: ExtractedText) -> Self {
        self.texts.insert(path.into(), text);
        self
    }
}

impl AttachmentText for MockAttachmentText {
    fn extract(&self, path: &Path) -> ExtractedText {
        self.texts
            .get(path)
            .cloned()
            .unwrap_or(ExtractedText::Unreadable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_repository_paginates() {
        let repo = MockRepository::new().with_comments("obj", ["C-1", "C-2", "C-3"]);
        let page1 = repo.comment_page("obj", 2, 1).await.unwrap();
        let page2 = repo.comment_page("obj", 2, 2).await.unwrap();
        assert_eq!(page1.len(), 2);
        assert_eq!(page2.len(), 1);
        assert_eq!(page2[0].id, "C-3");
    }

    #[tokio::test]
    async fn test_mock_chat_repeats_last_reply() {
        let chat = MockChat::new().with_response("first").with_response("second");
        assert_eq!(chat.chat("s", "a", 0.0).await.unwrap(), "first");
        assert_eq!(chat.chat("s", "b", 0.0).await.unwrap(), "second");
        assert_eq!(chat.chat("s", "c", 0.0).await.unwrap(), "second");
        assert_eq!(chat.call_count(), 3);
        assert_eq!(chat.captured_prompts(), ["a", "b", "c"]);
    }
}
