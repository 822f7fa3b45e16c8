//! Structured attribute extraction from comment text.
//!
//! One chat call per comment at temperature 0.0. The classifier never
//! fails: any transport error or unparseable reply collapses into a
//! review-sentinel record so a bad comment costs one flagged row, not
//! the run.

use serde::{Deserialize, Deserializer, Serialize};

use crate::config::ClassifyConfig;
use crate::extract::prompts;
use crate::lenient_json::first_json_object;
use crate::traits::ChatModel;

/// Who authored a comment, as inferred by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WhoType {
    Individual,
    Organization,
    Anonymous,
    /// Anything the model returned outside the expected set.
    Unknown,
}

// Tolerant of casing and out-of-set values; the model does not always
// honor the enum it was given.
impl<'de> Deserialize<'de> for WhoType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(match value.trim().to_ascii_lowercase().as_str() {
            "individual" => WhoType::Individual,
            "organization" => WhoType::Organization,
            "anonymous" => WhoType::Anonymous,
            _ => WhoType::Unknown,
        })
    }
}

impl WhoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WhoType::Individual => "individual",
            WhoType::Organization => "organization",
            WhoType::Anonymous => "anonymous",
            WhoType::Unknown => "Unknown",
        }
    }
}

/// Whether the comment cites scientific or legal support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Support {
    Yes,
    No,
}

impl<'de> Deserialize<'de> for Support {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(if value.trim().eq_ignore_ascii_case("yes") {
            Support::Yes
        } else {
            Support::No
        })
    }
}

impl Support {
    pub fn as_str(&self) -> &'static str {
        match self {
            Support::Yes => "Yes",
            Support::No => "No",
        }
    }
}

/// Structured attributes extracted from one comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedAttributes {
    pub who_type: WhoType,
    pub who_name: String,
    pub what: String,
    pub why: String,
    pub issues: Vec<String>,
    pub scientific_legal_support: Support,
}

impl ExtractedAttributes {
    /// The record emitted when extraction fails outright. Every field is
    /// an explicit unknown and the issues list flags the row for a human.
    pub fn needs_review() -> Self {
        Self {
            who_type: WhoType::Unknown,
            who_name: "Unknown".to_string(),
            what: "Unknown".to_string(),
            why: "Unknown".to_string(),
            issues: vec!["Needs manual review".to_string()],
            scientific_legal_support: Support::No,
        }
    }

    /// Whether this record is the failure sentinel.
    pub fn is_review_sentinel(&self) -> bool {
        self.issues.as_slice() == ["Needs manual review"]
            && self.who_name == "Unknown"
            && self.what == "Unknown"
    }
}

/// The model's reply, with every field optional and issues accepted as
/// either an array or a bare scalar.
#[derive(Debug, Deserialize)]
struct RawAttributes {
    who_type: Option<WhoType>,
    who_name: Option<String>,
    what: Option<String>,
    why: Option<String>,
    #[serde(default)]
    issues: RawIssues,
    scientific_legal_support: Option<Support>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawIssues {
    Many(Vec<String>),
    One(String),
    Missing(serde_json::Value),
}

impl Default for RawIssues {
    fn default() -> Self {
        RawIssues::Many(Vec::new())
    }
}

impl RawIssues {
    fn normalize(self) -> Vec<String> {
        match self {
            RawIssues::Many(issues) => issues,
            RawIssues::One(issue) => vec![issue],
            RawIssues::Missing(_) => Vec::new(),
        }
    }
}

impl From<RawAttributes> for ExtractedAttributes {
    fn from(raw: RawAttributes) -> Self {
        let unknown = || "Unknown".to_string();
        Self {
            who_type: raw.who_type.unwrap_or(WhoType::Unknown),
            who_name: raw.who_name.unwrap_or_else(unknown),
            what: raw.what.unwrap_or_else(unknown),
            why: raw.why.unwrap_or_else(unknown),
            issues: raw.issues.normalize(),
            scientific_legal_support: raw.scientific_legal_support.unwrap_or(Support::No),
        }
    }
}

/// Runs structured extraction over comment text.
pub struct Classifier<M> {
    model: M,
    config: ClassifyConfig,
}

impl<M: ChatModel> Classifier<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            config: ClassifyConfig::default(),
        }
    }

    pub fn with_config(model: M, config: ClassifyConfig) -> Self {
        Self { model, config }
    }

    /// Extract attributes from one comment's combined text.
    ///
    /// Infallible: errors and unparseable replies produce
    /// [`ExtractedAttributes::needs_review`].
    pub async fn classify(&self, text: &str, pdf_attached: bool) -> ExtractedAttributes {
        let truncated = truncate_text(text, self.config.max_comment_chars);
        let prompt = prompts::format_classify_prompt(&truncated, pdf_attached);

        let reply = match self
            .model
            .chat(prompts::CLASSIFY_SYSTEM, &prompt, self.config.temperature)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "extraction call failed");
                return ExtractedAttributes::needs_review();
            }
        };

        match parse_reply(&reply) {
            Some(attributes) => attributes,
            None => {
                tracing::warn!("extraction reply carried no parseable JSON object");
                ExtractedAttributes::needs_review()
            }
        }
    }
}

/// Pull the first JSON object out of a reply and map it to attributes.
fn parse_reply(reply: &str) -> Option<ExtractedAttributes> {
    let payload = first_json_object(reply)?;
    let raw: RawAttributes = serde_json::from_str(payload).ok()?;
    Some(raw.into())
}

/// Truncate to at most `max_chars` characters, marking the cut.
fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{} [TRUNCATED]", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockChat;

    #[tokio::test]
    async fn test_parses_well_formed_reply() {
        let model = MockChat::new().with_response(
            r#"{"who_type": "organization", "who_name": "River Alliance",
               "what": "Requests stricter limits", "why": "Contamination concerns",
               "issues": ["PCB contamination", "Tribal fishing"],
               "scientific_legal_support": "Yes"}"#,
        );
        let classifier = Classifier::new(model);

        let attrs = classifier.classify("We urge stricter limits.", false).await;
        assert_eq!(attrs.who_type, WhoType::Organization);
        assert_eq!(attrs.who_name, "River Alliance");
        assert_eq!(attrs.issues.len(), 2);
        assert_eq!(attrs.scientific_legal_support, Support::Yes);
    }

    #[tokio::test]
    async fn test_scalar_issue_becomes_single_element_list() {
        let model = MockChat::new().with_response(
            r#"{"who_type": "individual", "who_name": "Jane Doe",
               "what": "X", "why": "Y",
               "issues": "Water quality", "scientific_legal_support": "No"}"#,
        );
        let classifier = Classifier::new(model);

        let attrs = classifier.classify("text", false).await;
        assert_eq!(attrs.issues, vec!["Water quality".to_string()]);
    }

    #[tokio::test]
    async fn test_json_embedded_in_prose_is_found() {
        let model = MockChat::new().with_response(
            "Here is the analysis you asked for:\n\
             {\"who_type\": \"anonymous\", \"who_name\": \"Unknown\", \"what\": \"W\",\n\
             \"why\": \"Y\", \"issues\": [], \"scientific_legal_support\": \"No\"}\n\
             Let me know if you need more.",
        );
        let classifier = Classifier::new(model);

        let attrs = classifier.classify("text", false).await;
        assert_eq!(attrs.who_type, WhoType::Anonymous);
        assert!(!attrs.is_review_sentinel());
    }

    #[tokio::test]
    async fn test_no_json_yields_review_sentinel() {
        let model = MockChat::new().with_response("I cannot analyze this comment.");
        let classifier = Classifier::new(model);

        let attrs = classifier.classify("text", false).await;
        assert!(attrs.is_review_sentinel());
        assert_eq!(attrs.who_type, WhoType::Unknown);
    }

    #[tokio::test]
    async fn test_transport_error_yields_review_sentinel() {
        let model = MockChat::new().failing();
        let classifier = Classifier::new(model);

        let attrs = classifier.classify("text", true).await;
        assert!(attrs.is_review_sentinel());
        assert_eq!(attrs.scientific_legal_support, Support::No);
    }

    #[tokio::test]
    async fn test_unrecognized_who_type_maps_to_unknown() {
        let model = MockChat::new().with_response(
            r#"{"who_type": "government", "who_name": "N", "what": "W",
               "why": "Y", "issues": [], "scientific_legal_support": "No"}"#,
        );
        let classifier = Classifier::new(model);

        let attrs = classifier.classify("text", false).await;
        assert_eq!(attrs.who_type, WhoType::Unknown);
    }

    #[test]
    fn test_truncation_marks_the_cut() {
        let text = "a".repeat(60);
        let truncated = truncate_text(&text, 50);
        assert!(truncated.ends_with(" [TRUNCATED]"));
        assert_eq!(truncated.chars().count(), 50 + " [TRUNCATED]".len());
    }

    #[test]
    fn test_short_text_untouched() {
        assert_eq!(truncate_text("short", 50), "short");
    }
}
