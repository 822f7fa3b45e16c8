//! Lenient JSON extraction from free-form model text.
//!
//! Models wrap JSON payloads in prose or code fences. These helpers locate
//! the first balanced object or array span in a string — or nothing. They
//! are deliberately isolated so a strict structured-output mode of the
//! inference service could replace them without touching callers.

/// Strip Markdown code-fence markers (```` ``` ```` and ```` ```json ````)
/// and surrounding backticks/whitespace.
pub fn strip_code_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim_matches(|c: char| c == '`' || c.is_whitespace())
        .to_string()
}

/// The first balanced `{ ... }` span in `text`, or `None`.
pub fn first_json_object(text: &str) -> Option<&str> {
    first_balanced_span(text, '{', '}')
}

/// The first balanced `[ ... ]` span in `text`, or `None`.
pub fn first_json_array(text: &str) -> Option<&str> {
    first_balanced_span(text, '[', ']')
}

/// Scan for the first balanced `open`..`close` span, ignoring brackets
/// inside JSON string literals and honoring backslash escapes.
fn first_balanced_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_embedded_in_prose() {
        let text = r#"Sure! Here is the result: {"a": 1, "b": {"c": 2}} Hope that helps."#;
        assert_eq!(
            first_json_object(text),
            Some(r#"{"a": 1, "b": {"c": 2}}"#)
        );
    }

    #[test]
    fn test_braces_inside_strings_ignored() {
        let text = r#"{"note": "a } inside", "x": 1}"#;
        assert_eq!(first_json_object(text), Some(text));
    }

    #[test]
    fn test_escaped_quote_inside_string() {
        let text = r#"{"note": "she said \"hi}\"", "x": 1} trailing"#;
        assert_eq!(
            first_json_object(text),
            Some(r#"{"note": "she said \"hi}\"", "x": 1}"#)
        );
    }

    #[test]
    fn test_no_object_returns_none() {
        assert_eq!(first_json_object("no json here"), None);
        assert_eq!(first_json_object("unterminated { \"a\": 1"), None);
    }

    #[test]
    fn test_array_of_objects() {
        let text = "```json\n[{\"category\": \"A\"}, {\"category\": \"B\"}]\n```";
        let stripped = strip_code_fences(text);
        assert_eq!(
            first_json_array(&stripped),
            Some(r#"[{"category": "A"}, {"category": "B"}]"#)
        );
    }

    #[test]
    fn test_strip_code_fences_plain_text() {
        assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
    }
}
