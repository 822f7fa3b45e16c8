//! Two-pass issue clustering.
//!
//! Pass one groups the distinct issue strings, in batches, into broad
//! categories. Pass two consolidates the category names produced across
//! batches into a final set. Raw model replies are appended to log files
//! so a bad run can be diagnosed after the fact. Issues the model never
//! assigns (a failed batch, or simply left out of every group) stay
//! uncategorized: they are absent from the final map, and a record whose
//! issues were all uncategorized carries no categories and contributes
//! no exploded rows. The identity fallback applies only to pass two,
//! where a failed consolidation keeps the raw category names.

use std::io::Write as _;
use std::path::Path;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::ClusterConfig;
use crate::error::Result;
use crate::extract::prompts;
use crate::lenient_json::{first_json_array, first_json_object, strip_code_fences};
use crate::process::FlatRecord;
use crate::traits::ChatModel;

/// Raw grouping reply log, one block per batch.
pub const GROUPING_RAW_LOG: &str = "issue_grouping_raw.txt";
/// Dump of the last batch reply that failed to parse.
pub const GROUPING_FAILED_LOG: &str = "issue_grouping_failed_batch.txt";
/// Raw consolidation reply log.
pub const CONSOLIDATION_RAW_LOG: &str = "category_consolidation.txt";

/// One category with its member issues, as returned by the model.
#[derive(Debug, Clone, Deserialize)]
struct CategoryGroup {
    category: String,
    #[serde(default)]
    related_issues: Vec<String>,
}

/// A flat record plus its consolidated categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorizedRecord {
    pub comment_id: String,
    pub comment_link: String,
    pub who_type: String,
    pub who_name: String,
    pub what: String,
    pub why: String,
    #[serde(
        serialize_with = "serialize_comma_joined",
        deserialize_with = "deserialize_comma_joined"
    )]
    pub issues: Vec<String>,
    pub scientific_legal_support: String,
    pub pdf_attachments_present: bool,
    pub pdf_attachments_count: usize,
    /// Consolidated categories, deduplicated and sorted. Joined with
    /// `"; "` in CSV cells.
    #[serde(
        serialize_with = "serialize_semicolon_joined",
        deserialize_with = "deserialize_semicolon_joined"
    )]
    pub high_level_issues: Vec<String>,
}

/// One (category, comment) pair from exploding categorized records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplodedRow {
    pub issue_category: String,
    pub comment_id: String,
    pub comment_link: String,
    pub who_type: String,
    pub who_name: String,
    pub what: String,
    pub why: String,
    pub scientific_legal_support: String,
}

/// Everything a clustering run produced.
#[derive(Debug)]
pub struct ClusterOutcome {
    /// Final mapping from issue to consolidated category. Issues the
    /// model never assigned are absent.
    pub issue_to_category: IndexMap<String, String>,
    pub categorized: Vec<CategorizedRecord>,
    /// One row per (category, comment), sorted by category then comment.
    pub exploded: Vec<ExplodedRow>,
}

fn serialize_comma_joined<S: Serializer>(
    values: &[String],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&values.join(", "))
}

fn deserialize_comma_joined<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<String>, D::Error> {
    let joined = String::deserialize(deserializer)?;
    if joined.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(joined.split(", ").map(|s| s.to_string()).collect())
}

fn serialize_semicolon_joined<S: Serializer>(
    values: &[String],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&values.join("; "))
}

fn deserialize_semicolon_joined<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<String>, D::Error> {
    let joined = String::deserialize(deserializer)?;
    if joined.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(joined.split("; ").map(|s| s.to_string()).collect())
}

/// Runs the two clustering passes over classified records.
pub struct IssueClusterer<M> {
    model: M,
    config: ClusterConfig,
}

impl<M: ChatModel> IssueClusterer<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            config: ClusterConfig::default(),
        }
    }

    pub fn with_config(model: M, config: ClusterConfig) -> Self {
        Self { model, config }
    }

    /// Cluster the issues across `records`. Raw model replies land under
    /// `logs_dir`.
    pub async fn cluster(&self, records: &[FlatRecord], logs_dir: &Path) -> Result<ClusterOutcome> {
        std::fs::create_dir_all(logs_dir)?;

        let distinct: IndexSet<String> = records
            .iter()
            .flat_map(|r| r.issues.iter().cloned())
            .collect();
        tracing::info!(issues = distinct.len(), records = records.len(), "clustering issues");

        let (issue_to_raw_category, raw_categories) =
            self.group_issues(&distinct, logs_dir).await?;
        let consolidation = self
            .consolidate_categories(&raw_categories, logs_dir)
            .await?;

        // Compose the passes. Issues the model never assigned stay out of
        // the map; they must not become singleton categories.
        let mut issue_to_category: IndexMap<String, String> = IndexMap::new();
        for issue in &distinct {
            if let Some(raw) = issue_to_raw_category.get(issue) {
                let category = consolidation.get(raw).cloned().unwrap_or_else(|| raw.clone());
                issue_to_category.insert(issue.clone(), category);
            }
        }

        let categorized = categorize_records(records, &issue_to_category);
        let exploded = explode_records(&categorized);

        Ok(ClusterOutcome {
            issue_to_category,
            categorized,
            exploded,
        })
    }

    /// Pass one: group distinct issues into categories, batch by batch.
    /// Returns the issue assignments and every category name the model
    /// emitted, including categories whose member lists came back empty.
    async fn group_issues(
        &self,
        distinct: &IndexSet<String>,
        logs_dir: &Path,
    ) -> Result<(IndexMap<String, String>, IndexSet<String>)> {
        let issues: Vec<&str> = distinct.iter().map(|s| s.as_str()).collect();
        let mut mapping: IndexMap<String, String> = IndexMap::new();
        let mut categories: IndexSet<String> = IndexSet::new();

        for (batch_number, batch) in issues.chunks(self.config.batch_size).enumerate() {
            let batch_number = batch_number + 1;
            let prompt = prompts::format_grouping_prompt(batch);
            let reply = match self
                .model
                .chat(prompts::GROUPING_SYSTEM, &prompt, self.config.temperature)
                .await
            {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!(batch = batch_number, error = %e, "grouping call failed");
                    continue;
                }
            };

            append_log(
                &logs_dir.join(GROUPING_RAW_LOG),
                &format!("--- Batch {} ---\n{}\n\n", batch_number, reply),
            )?;

            let groups = match parse_groups(&reply) {
                Some(groups) => groups,
                None => {
                    tracing::warn!(batch = batch_number, "grouping reply unparseable, skipping batch");
                    std::fs::write(logs_dir.join(GROUPING_FAILED_LOG), &reply)?;
                    continue;
                }
            };

            for group in groups {
                categories.insert(group.category.clone());
                for issue in group
                    .related_issues
                    .into_iter()
                    .take(self.config.max_members_per_category)
                {
                    // First assignment wins when the model lists an issue
                    // under several categories.
                    mapping.entry(issue).or_insert_with(|| group.category.clone());
                }
            }
        }
        Ok((mapping, categories))
    }

    /// Pass two: merge near-duplicate category names. On any failure the
    /// identity mapping is used.
    async fn consolidate_categories(
        &self,
        categories: &IndexSet<String>,
        logs_dir: &Path,
    ) -> Result<IndexMap<String, String>> {
        if categories.is_empty() {
            return Ok(IndexMap::new());
        }
        let listing: Vec<&str> = categories.iter().map(|s| s.as_str()).collect();
        let prompt = prompts::format_consolidation_prompt(&listing);

        let reply = match self
            .model
            .chat(
                prompts::CONSOLIDATION_SYSTEM,
                &prompt,
                self.config.temperature,
            )
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "consolidation call failed, keeping raw categories");
                return Ok(identity_mapping(categories));
            }
        };

        append_log(&logs_dir.join(CONSOLIDATION_RAW_LOG), &reply)?;

        match parse_consolidation(&reply) {
            Some(mapping) => Ok(mapping),
            None => {
                tracing::warn!("consolidation reply unparseable, keeping raw categories");
                Ok(identity_mapping(categories))
            }
        }
    }
}

fn identity_mapping(categories: &IndexSet<String>) -> IndexMap<String, String> {
    categories
        .iter()
        .map(|c| (c.clone(), c.clone()))
        .collect()
}

fn parse_groups(reply: &str) -> Option<Vec<CategoryGroup>> {
    let stripped = strip_code_fences(reply);
    let payload = first_json_array(&stripped)?;
    serde_json::from_str(payload).ok()
}

fn parse_consolidation(reply: &str) -> Option<IndexMap<String, String>> {
    let stripped = strip_code_fences(reply);
    let payload = first_json_object(&stripped)?;
    serde_json::from_str(payload).ok()
}

fn append_log(path: &Path, block: &str) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(block.as_bytes())?;
    Ok(())
}

/// Attach consolidated categories to each record.
fn categorize_records(
    records: &[FlatRecord],
    issue_to_category: &IndexMap<String, String>,
) -> Vec<CategorizedRecord> {
    records
        .iter()
        .map(|record| {
            let mut categories: Vec<String> = record
                .issues
                .iter()
                .filter_map(|issue| issue_to_category.get(issue).cloned())
                .collect();
            categories.sort_unstable();
            categories.dedup();

            CategorizedRecord {
                comment_id: record.comment_id.clone(),
                comment_link: record.comment_link.clone(),
                who_type: record.who_type.clone(),
                who_name: record.who_name.clone(),
                what: record.what.clone(),
                why: record.why.clone(),
                issues: record.issues.clone(),
                scientific_legal_support: record.scientific_legal_support.clone(),
                pdf_attachments_present: record.pdf_attachments_present,
                pdf_attachments_count: record.pdf_attachments_count,
                high_level_issues: categories,
            }
        })
        .collect()
}

/// One row per (category, comment), sorted by category then comment id.
/// Records with no categories contribute no rows.
fn explode_records(categorized: &[CategorizedRecord]) -> Vec<ExplodedRow> {
    let mut rows: Vec<ExplodedRow> = categorized
        .iter()
        .flat_map(|record| {
            record.high_level_issues.iter().map(|category| ExplodedRow {
                issue_category: category.clone(),
                comment_id: record.comment_id.clone(),
                comment_link: record.comment_link.clone(),
                who_type: record.who_type.clone(),
                who_name: record.who_name.clone(),
                what: record.what.clone(),
                why: record.why.clone(),
                scientific_legal_support: record.scientific_legal_support.clone(),
            })
        })
        .collect();
    rows.sort_by(|a, b| {
        (a.issue_category.as_str(), a.comment_id.as_str())
            .cmp(&(b.issue_category.as_str(), b.comment_id.as_str()))
    });
    rows
}

/// Write categorized records as CSV.
pub fn write_categorized(path: &Path, records: &[CategorizedRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write exploded rows as CSV.
pub fn write_exploded(path: &Path, rows: &[ExplodedRow]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::comment_link;
    use crate::testing::MockChat;

    fn record(comment_id: &str, issues: &[&str]) -> FlatRecord {
        FlatRecord {
            comment_id: comment_id.to_string(),
            comment_link: comment_link(comment_id),
            who_type: "individual".to_string(),
            who_name: "Unknown".to_string(),
            what: "W".to_string(),
            why: "Y".to_string(),
            issues: issues.iter().map(|s| s.to_string()).collect(),
            scientific_legal_support: "No".to_string(),
            pdf_attachments_present: false,
            pdf_attachments_count: 0,
        }
    }

    const GROUPING_REPLY: &str = r#"```json
[
  {"category": "Water Quality", "related_issues": ["PCB contamination", "Runoff"]},
  {"category": "Tribal Rights", "related_issues": ["Tribal fishing access"]}
]
```"#;

    const CONSOLIDATION_REPLY: &str = r#"{
  "Water Quality": "Water Quality",
  "Tribal Rights": "Tribal and Subsistence Rights"
}"#;

    #[tokio::test]
    async fn test_two_pass_clustering_maps_covered_issues_only() {
        let model = MockChat::new()
            .with_response(GROUPING_REPLY)
            .with_response(CONSOLIDATION_REPLY);
        let clusterer = IssueClusterer::new(model);
        let dir = tempfile::tempdir().unwrap();

        let records = vec![
            record("C-1", &["PCB contamination", "Tribal fishing access"]),
            record("C-2", &["Runoff", "Unlisted issue"]),
        ];
        let outcome = clusterer.cluster(&records, dir.path()).await.unwrap();

        assert_eq!(outcome.issue_to_category["PCB contamination"], "Water Quality");
        assert_eq!(
            outcome.issue_to_category["Tribal fishing access"],
            "Tribal and Subsistence Rights"
        );
        // Never grouped by the model: left uncategorized, not promoted to
        // a singleton category.
        assert!(outcome.issue_to_category.get("Unlisted issue").is_none());
        assert_eq!(outcome.issue_to_category.len(), 3);
        let c2 = outcome
            .categorized
            .iter()
            .find(|r| r.comment_id == "C-2")
            .unwrap();
        assert_eq!(c2.high_level_issues, ["Water Quality"]);
    }

    #[tokio::test]
    async fn test_categorized_records_dedup_and_sort_categories() {
        let model = MockChat::new()
            .with_response(
                r#"[{"category": "Water Quality",
                     "related_issues": ["PCB contamination", "Runoff"]}]"#,
            )
            .with_response(r#"{"Water Quality": "Water Quality"}"#);
        let clusterer = IssueClusterer::new(model);
        let dir = tempfile::tempdir().unwrap();

        let records = vec![record("C-1", &["Runoff", "PCB contamination"])];
        let outcome = clusterer.cluster(&records, dir.path()).await.unwrap();

        // Both issues map to the same category; it appears once.
        assert_eq!(outcome.categorized[0].high_level_issues, ["Water Quality"]);
    }

    #[tokio::test]
    async fn test_exploded_rows_sorted_by_category_then_comment() {
        let model = MockChat::new()
            .with_response(
                r#"[{"category": "B cat", "related_issues": ["b"]},
                    {"category": "A cat", "related_issues": ["a"]}]"#,
            )
            .with_response(r#"{"A cat": "A cat", "B cat": "B cat"}"#);
        let clusterer = IssueClusterer::new(model);
        let dir = tempfile::tempdir().unwrap();

        let records = vec![record("C-2", &["a", "b"]), record("C-1", &["a"])];
        let outcome = clusterer.cluster(&records, dir.path()).await.unwrap();

        let keys: Vec<(String, String)> = outcome
            .exploded
            .iter()
            .map(|r| (r.issue_category.clone(), r.comment_id.clone()))
            .collect();
        assert_eq!(
            keys,
            [
                ("A cat".to_string(), "C-1".to_string()),
                ("A cat".to_string(), "C-2".to_string()),
                ("B cat".to_string(), "C-2".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_unparseable_batch_leaves_issues_uncategorized() {
        let model = MockChat::new()
            .with_response("no json here at all")
            .with_response(r#"{"x": "x"}"#);
        let clusterer = IssueClusterer::new(model);
        let dir = tempfile::tempdir().unwrap();

        let records = vec![record("C-1", &["orphan issue"])];
        let outcome = clusterer.cluster(&records, dir.path()).await.unwrap();

        // The failed batch's issues stay out of the map entirely; they do
        // not come back as themselves.
        assert!(outcome.issue_to_category.get("orphan issue").is_none());
        assert!(outcome.issue_to_category.is_empty());
        assert_eq!(outcome.categorized.len(), 1);
        assert!(outcome.categorized[0].high_level_issues.is_empty());
        assert!(outcome.exploded.is_empty());
        assert!(dir.path().join(GROUPING_FAILED_LOG).exists());
    }

    #[tokio::test]
    async fn test_record_with_only_uncovered_issues_has_no_exploded_rows() {
        let model = MockChat::new()
            .with_response(r#"[{"category": "Covered", "related_issues": ["a"]}]"#)
            .with_response(r#"{"Covered": "Covered"}"#);
        let clusterer = IssueClusterer::new(model);
        let dir = tempfile::tempdir().unwrap();

        let records = vec![record("C-1", &["b"]), record("C-2", &["a"])];
        let outcome = clusterer.cluster(&records, dir.path()).await.unwrap();

        let c1 = outcome
            .categorized
            .iter()
            .find(|r| r.comment_id == "C-1")
            .unwrap();
        assert!(c1.high_level_issues.is_empty());
        // Only C-2 surfaces in the exploded table.
        assert_eq!(outcome.exploded.len(), 1);
        assert_eq!(outcome.exploded[0].comment_id, "C-2");
        assert_eq!(outcome.exploded[0].issue_category, "Covered");
    }

    #[tokio::test]
    async fn test_empty_member_category_still_consolidated() {
        let model = MockChat::new()
            .with_response(
                r#"[{"category": "Empty Cat", "related_issues": []},
                    {"category": "Full Cat", "related_issues": ["i1"]}]"#,
            )
            .with_response(r#"{"Empty Cat": "Merged", "Full Cat": "Merged"}"#);
        let clusterer = IssueClusterer::new(model.clone());
        let dir = tempfile::tempdir().unwrap();

        let records = vec![record("C-1", &["i1"])];
        let outcome = clusterer.cluster(&records, dir.path()).await.unwrap();

        // Both emitted category names reach the consolidation prompt, even
        // the one whose member list came back empty.
        let prompts = model.captured_prompts();
        assert!(prompts[1].contains("- Empty Cat"));
        assert!(prompts[1].contains("- Full Cat"));
        assert_eq!(outcome.issue_to_category["i1"], "Merged");
    }

    #[tokio::test]
    async fn test_consolidation_failure_keeps_raw_categories() {
        let model = MockChat::new()
            .with_response(r#"[{"category": "Raw Cat", "related_issues": ["i1"]}]"#)
            .with_response("not a json dict");
        let clusterer = IssueClusterer::new(model);
        let dir = tempfile::tempdir().unwrap();

        let records = vec![record("C-1", &["i1"])];
        let outcome = clusterer.cluster(&records, dir.path()).await.unwrap();
        assert_eq!(outcome.issue_to_category["i1"], "Raw Cat");
    }

    #[tokio::test]
    async fn test_first_assignment_wins_for_duplicated_issue() {
        let model = MockChat::new()
            .with_response(
                r#"[{"category": "First", "related_issues": ["dup"]},
                    {"category": "Second", "related_issues": ["dup"]}]"#,
            )
            .with_response(r#"{"First": "First", "Second": "Second"}"#);
        let clusterer = IssueClusterer::new(model);
        let dir = tempfile::tempdir().unwrap();

        let records = vec![record("C-1", &["dup"])];
        let outcome = clusterer.cluster(&records, dir.path()).await.unwrap();
        assert_eq!(outcome.issue_to_category["dup"], "First");
    }

    #[tokio::test]
    async fn test_member_cap_limits_category_size() {
        let many: Vec<String> = (0..5).map(|i| format!("issue {}", i)).collect();
        let reply = format!(
            r#"[{{"category": "Big", "related_issues": {}}}]"#,
            serde_json::to_string(&many).unwrap()
        );
        let model = MockChat::new()
            .with_response(reply)
            .with_response(r#"{"Big": "Big"}"#);
        let config = ClusterConfig::default().with_member_cap(3);
        let clusterer = IssueClusterer::with_config(model, config);
        let dir = tempfile::tempdir().unwrap();

        let records: Vec<FlatRecord> = many
            .iter()
            .enumerate()
            .map(|(i, issue)| record(&format!("C-{}", i), &[issue.as_str()]))
            .collect();
        let outcome = clusterer.cluster(&records, dir.path()).await.unwrap();

        // The two capped-off issues are uncategorized, not self-mapped.
        assert_eq!(outcome.issue_to_category.len(), 3);
        assert!(outcome.issue_to_category.values().all(|c| c == "Big"));
    }
}
