//! On-disk page files.
//!
//! Each page of cleaned comments is written to its own JSON file,
//! `comments_{target}_page_{n}.json`, as soon as the page completes. A
//! page file is the complete and only record of the comments fetched in
//! that page: no cross-page ordering dependency, so partial runs keep all
//! completed pages. Writes are a single atomic creation (temp file +
//! rename) so a reader never observes a half-written page.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One attachment file reference as persisted in a page file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredAttachment {
    /// The upstream download URL.
    pub url: String,
    /// The local path the file was saved to; `null` when the download
    /// failed. Never mutated after the page is written.
    pub file_path: Option<String>,
}

/// One cleaned comment as persisted in a page file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredComment {
    /// The comment id.
    pub comment_id: String,
    /// The body text from the full record (may be empty).
    #[serde(default)]
    pub text: String,
    /// Attachment references in listing order.
    #[serde(default)]
    pub attachments: Vec<StoredAttachment>,
}

/// File name for one page of a target's comments.
pub fn page_file_name(target_id: &str, page_number: usize) -> String {
    format!("comments_{}_page_{}.json", target_id, page_number)
}

/// Write one page of comments atomically and return the final path.
pub fn write_page_file(
    dir: &Path,
    target_id: &str,
    page_number: usize,
    comments: &[StoredComment],
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(page_file_name(target_id, page_number));

    // Stage in the destination directory so the rename stays on one
    // filesystem.
    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(tmp.as_file(), comments)?;
    tmp.persist(&path).map_err(|e| e.error)?;

    tracing::info!(
        page = page_number,
        comments = comments.len(),
        path = %path.display(),
        "page file written"
    );
    Ok(path)
}

/// Read one page file back into comments.
pub fn read_page_file(path: &Path) -> Result<Vec<StoredComment>> {
    let file = std::fs::File::open(path)?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

/// All `.json` page files in a directory, sorted by file name.
pub fn list_page_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().map(|ext| ext == "json").unwrap_or(false))
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_comments() -> Vec<StoredComment> {
        vec![
            StoredComment {
                comment_id: "ABC-1".to_string(),
                text: "First comment".to_string(),
                attachments: vec![StoredAttachment {
                    url: "https://downloads.example/f1".to_string(),
                    file_path: Some("attachments/ABC-1_0.pdf".to_string()),
                }],
            },
            StoredComment {
                comment_id: "ABC-2".to_string(),
                text: String::new(),
                attachments: vec![],
            },
        ]
    }

    #[test]
    fn test_page_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let comments = sample_comments();

        let path = write_page_file(dir.path(), "ABC-2024-0001", 1, &comments).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "comments_ABC-2024-0001_page_1.json"
        );

        let loaded = read_page_file(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].comment_id, "ABC-1");
        assert_eq!(
            loaded[0].attachments[0].file_path.as_deref(),
            Some("attachments/ABC-1_0.pdf")
        );
        assert!(loaded[1].attachments.is_empty());
    }

    #[test]
    fn test_missing_fields_default() {
        let loaded: Vec<StoredComment> =
            serde_json::from_str(r#"[{"comment_id": "X-1"}]"#).unwrap();
        assert_eq!(loaded[0].text, "");
        assert!(loaded[0].attachments.is_empty());
    }

    #[test]
    fn test_list_page_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        write_page_file(dir.path(), "T", 2, &[]).unwrap();
        write_page_file(dir.path(), "T", 1, &[]).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let files = list_page_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].file_name().unwrap().to_str().unwrap().contains("page_1"));
    }
}
