//! LLM prompts for structured extraction and issue clustering.
//!
//! The extraction prompt embeds a rigid schema description; parsing stays
//! lenient anyway, since models wrap JSON in prose or fences.

/// System message for per-comment structured extraction.
pub const CLASSIFY_SYSTEM: &str = "You are an expert policy analyst.";

/// System message for issue grouping.
pub const GROUPING_SYSTEM: &str = "You are a policy analyst categorizing public issues.";

/// System message for category-name consolidation.
pub const CONSOLIDATION_SYSTEM: &str = "You are an expert in data cleanup.";

/// Build the structured-extraction prompt for one comment.
pub fn format_classify_prompt(comment_text: &str, pdf_attached: bool) -> String {
    format!(
        r#"You are an expert policy analyst analyzing public comments. Your task is to extract detailed information from the comment provided.

INSTRUCTIONS:
1. Identify who is making the comment:
   - "who_type": one of ["individual", "organization", "anonymous"].
     If not explicitly stated, infer from context. Otherwise, use "anonymous".
   - "who_name": if it's specified or can be inferred (e.g., "John Doe," "National Tribal Fisheries Association").
     If no name is given and you cannot infer, return "Unknown."

2. For "what": Provide a detailed explanation of what the commenter is requesting.
   If the commenter has multiple requests, list them all in one string (comma- or semicolon-delimited).

3. For "why": Provide a detailed explanation of the reasons for this request
   or the concerns they raise. Reflect each concern with nuance, rather than a brief phrase.

4. For "issues": List all specific issues the commenter addresses in an array of strings.
   - Avoid overly broad categories like "Water Quality" if the comment references something more specific
     (e.g., "PCB contamination in local waterways," "Impacts on tribal fishers," etc.).
   - If multiple distinct issues are raised, include each as a separate element in the array.

5. For "scientific_legal_support":
   - Return "Yes" if the text or attachments reference research data, footnotes, official legal citations (e.g., 40 CFR, USC),
     case law references, or bracketed footnote markers (e.g., "[1]", "[2]").
   - Return "Yes" if {pdf_attached} is True and the text suggests the PDF may contain references or citations.
   - Otherwise, return "No."

RESPONSE FORMAT (valid JSON):
{{
  "who_type": "organization",
  "who_name": "National Tribal Fisheries Association",
  "what": "Requests stricter limits on PCB discharge; Requests additional funding for water testing",
  "why": "Concerned about contamination of fish consumed by tribal communities; Believes current policy does not adequately protect subsistence fishers",
  "issues": ["PCB contamination", "Impacts on tribal fishers", "Public health risks"],
  "scientific_legal_support": "Yes"
}}

COMMENT TO ANALYZE:
"""{comment_text}""""#,
        pdf_attached = pdf_attached,
        comment_text = comment_text,
    )
}

/// Build the issue-grouping prompt for one batch of distinct issues.
///
/// The 8-15 range is a soft target communicated to the model, not locally
/// enforced.
pub fn format_grouping_prompt(issues: &[&str]) -> String {
    let mut sorted: Vec<&str> = issues.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let listing: String = sorted
        .iter()
        .map(|issue| format!("- {}", issue))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are helping organize public policy comment data.

Here is a list of issues extracted from public comments. Your task is to group closely related issues into meaningful, broader categories.

INSTRUCTIONS:
- Return only 8-15 categories TOTAL.
- Merge any similar or overlapping terms (e.g., "worker safety", "worker safety and health", "workplace conditions") into a single category.
- If in doubt, consolidate - avoid creating overly granular or redundant categories.
- Categories should reflect common themes across many issues.

Format the result as JSON like this:
[
  {{
    "category": "Broad Issue Category",
    "related_issues": ["Exact issue string 1", "Exact issue string 2"]
  }},
  ...
]

ISSUES:
{listing}"#,
    )
}

/// Build the category-consolidation prompt from the distinct category
/// names produced across all batches.
pub fn format_consolidation_prompt(categories: &[&str]) -> String {
    let mut sorted: Vec<&str> = categories.to_vec();
    sorted.sort_unstable();

    let listing: String = sorted
        .iter()
        .map(|category| format!("- {}", category))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are helping to clean and consolidate category names from a public policy comment analysis.
Below is a list of categories that may contain overlaps or near-duplicates. Your task is to merge similar ones.

Return the output as a JSON dictionary where the keys are original category names, and the values are the merged category names.
Example:
{{
  "Worker Safety and Health": "Worker Safety",
  "Worker Safety and Conditions": "Worker Safety"
}}

CATEGORIES:
{listing}"#,
    )
}
