//! HTTP client for the regulations.gov v4 API.
//!
//! Endpoints consumed: document lookup (for the object-id), paginated
//! comment listing sorted by last-modified time, per-comment full-record
//! fetch via the summary's self link, attachment listing, and file
//! download. Every method maps a non-success status to [`ApiError`]; the
//! ingest loop decides what "absent data" means for each call.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::{Credentials, SecretString};
use crate::error::{ApiError, ApiResult};
use crate::traits::{AttachmentFile, CommentRepository, CommentSummary, FullComment};

const DEFAULT_BASE_URL: &str = "https://api.regulations.gov/v4";

/// Client for the regulations.gov comment repository.
#[derive(Clone)]
pub struct RegulationsClient {
    client: Client,
    api_key: SecretString,
    base_url: String,
}

impl RegulationsClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from pipeline credentials.
    pub fn from_credentials(credentials: &Credentials) -> Self {
        Self::new(credentials.regulations_api_key.clone())
    }

    /// Set a custom base URL (for tests or mirrors).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> ApiResult<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .query(query)
            .query(&[("api_key", self.api_key.expose())])
            .send()
            .await
            .map_err(|e| ApiError::Http(Box::new(e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl CommentRepository for RegulationsClient {
    async fn object_id_for_document(&self, document_id: &str) -> ApiResult<Option<String>> {
        let url = format!("{}/documents/{}", self.base_url, document_id);
        let response = self.get(&url, &[]).await?;
        let body: DocumentResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Http(Box::new(e)))?;

        Ok(body.data.attributes.object_id)
    }

    async fn comment_page(
        &self,
        object_id: &str,
        page_size: usize,
        page_number: usize,
    ) -> ApiResult<Vec<CommentSummary>> {
        let url = format!("{}/comments", self.base_url);
        let size = page_size.to_string();
        let number = page_number.to_string();
        // The explicit sort key keeps page contents stable across calls;
        // without it resumption would re-fetch shuffled pages.
        let query = [
            ("filter[commentOnId]", object_id),
            ("page[size]", size.as_str()),
            ("page[number]", number.as_str()),
            ("sort", "lastModifiedDate"),
        ];

        let response = self.get(&url, &query).await?;
        let body: CommentListResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Http(Box::new(e)))?;

        Ok(body
            .data
            .into_iter()
            .map(|row| CommentSummary {
                id: row.id,
                self_link: row.links.and_then(|l| l.self_link),
            })
            .collect())
    }

    async fn full_comment(&self, self_link: &str) -> ApiResult<Option<FullComment>> {
        let response = self.get(self_link, &[]).await?;
        let body: FullCommentResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Http(Box::new(e)))?;

        Ok(body.data.map(|data| FullComment {
            id: data.id,
            text: data.attributes.comment,
        }))
    }

    async fn attachment_files(&self, comment_id: &str) -> ApiResult<Vec<AttachmentFile>> {
        let url = format!("{}/comments/{}/attachments", self.base_url, comment_id);
        let response = self.get(&url, &[]).await?;
        let body: AttachmentListResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Http(Box::new(e)))?;

        let mut files = Vec::new();
        for (attachment_index, attachment) in body.data.into_iter().enumerate() {
            for format in attachment.attributes.file_formats.into_vec() {
                if let Some(url) = format.file_url {
                    files.push(AttachmentFile {
                        url,
                        attachment_index,
                    });
                }
            }
        }

        Ok(files)
    }

    async fn download_attachment(
        &self,
        url: &str,
        dest_dir: &Path,
        comment_id: &str,
        attachment_index: usize,
    ) -> ApiResult<PathBuf> {
        let response = self.get(url, &[]).await?;

        let extension = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(extension_for_content_type)
            .unwrap_or("dat");

        let path = dest_dir.join(format!("{}_{}.{}", comment_id, attachment_index, extension));
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Http(Box::new(e)))?;

        std::fs::create_dir_all(dest_dir).map_err(|e| ApiError::Download {
            path: path.clone(),
            source: e,
        })?;
        std::fs::write(&path, &bytes).map_err(|e| ApiError::Download {
            path: path.clone(),
            source: e,
        })?;

        tracing::debug!(url = %url, path = %path.display(), "attachment downloaded");
        Ok(path)
    }
}

/// Map a declared content type to a file extension, `dat` for anything
/// unrecognized.
pub fn extension_for_content_type(content_type: &str) -> &'static str {
    match content_type.split(';').next().unwrap_or("").trim() {
        "application/pdf" => "pdf",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "application/zip" => "zip",
        _ => "dat",
    }
}

// Response shapes (JSON:API subset the pipeline reads)

#[derive(Deserialize)]
struct DocumentResponse {
    data: DocumentData,
}

#[derive(Deserialize)]
struct DocumentData {
    attributes: DocumentAttributes,
}

#[derive(Deserialize)]
struct DocumentAttributes {
    #[serde(rename = "objectId")]
    object_id: Option<String>,
}

#[derive(Deserialize)]
struct CommentListResponse {
    #[serde(default)]
    data: Vec<CommentRow>,
}

#[derive(Deserialize)]
struct CommentRow {
    id: String,
    links: Option<CommentLinks>,
}

#[derive(Deserialize)]
struct CommentLinks {
    #[serde(rename = "self")]
    self_link: Option<String>,
}

#[derive(Deserialize)]
struct FullCommentResponse {
    data: Option<FullCommentData>,
}

#[derive(Deserialize)]
struct FullCommentData {
    id: String,
    attributes: FullCommentAttributes,
}

#[derive(Deserialize)]
struct FullCommentAttributes {
    comment: Option<String>,
}

#[derive(Deserialize)]
struct AttachmentListResponse {
    #[serde(default)]
    data: Vec<AttachmentRow>,
}

#[derive(Deserialize)]
struct AttachmentRow {
    attributes: AttachmentAttributes,
}

#[derive(Deserialize)]
struct AttachmentAttributes {
    #[serde(rename = "fileFormats", default)]
    file_formats: MaybeList<FileFormat>,
}

#[derive(Deserialize)]
struct FileFormat {
    #[serde(rename = "fileUrl")]
    file_url: Option<String>,
}

/// The upstream sometimes returns a non-list `fileFormats` value; anything
/// that is not a list normalizes to empty.
#[derive(Deserialize)]
#[serde(untagged)]
enum MaybeList<T> {
    List(Vec<T>),
    Other(serde_json::Value),
}

impl<T> Default for MaybeList<T> {
    fn default() -> Self {
        MaybeList::List(Vec::new())
    }
}

impl<T> MaybeList<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            MaybeList::List(items) => items,
            MaybeList::Other(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_mapping() {
        assert_eq!(extension_for_content_type("application/pdf"), "pdf");
        assert_eq!(extension_for_content_type("image/jpeg"), "jpg");
        assert_eq!(extension_for_content_type("image/png"), "png");
        assert_eq!(extension_for_content_type("application/zip"), "zip");
        assert_eq!(extension_for_content_type("application/msword"), "dat");
        assert_eq!(
            extension_for_content_type("application/pdf; charset=binary"),
            "pdf"
        );
    }

    #[test]
    fn test_file_formats_tolerates_non_list() {
        let json = r#"{"attributes": {"fileFormats": "none"}}"#;
        let row: AttachmentRow = serde_json::from_str(json).unwrap();
        assert!(row.attributes.file_formats.into_vec().is_empty());

        let json = r#"{"attributes": {}}"#;
        let row: AttachmentRow = serde_json::from_str(json).unwrap();
        assert!(row.attributes.file_formats.into_vec().is_empty());
    }

    #[test]
    fn test_comment_list_decodes() {
        let json = r#"{
            "data": [
                {"id": "ABC-1", "links": {"self": "https://api.example/comments/ABC-1"}},
                {"id": "ABC-2"}
            ]
        }"#;
        let body: CommentListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.data.len(), 2);
        assert_eq!(
            body.data[0].links.as_ref().unwrap().self_link.as_deref(),
            Some("https://api.example/comments/ABC-1")
        );
        assert!(body.data[1].links.is_none());
    }
}
