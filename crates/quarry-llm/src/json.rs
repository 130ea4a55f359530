//! JSON extraction from oracle replies

use serde_json::Value;

/// Strip a Markdown code fence around a JSON body, if present
///
/// Models sometimes wrap JSON in ```` ```json ```` blocks even in JSON mode.
pub fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }

    // Skip the opening fence line and the closing fence
    let body = match trimmed.find('\n') {
        Some(idx) => &trimmed[idx + 1..],
        None => return "",
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// Parse the oracle's text content as a JSON value
pub fn parse_content(response: &str) -> Result<Value, String> {
    let body = strip_code_fence(response);
    if body.is_empty() {
        return Err("Empty response body".to_string());
    }
    serde_json::from_str(body).map_err(|e| format!("JSON parse error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_json() {
        assert_eq!(parse_content(r#" {"a": 1} "#).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_fenced_json() {
        let fenced = "```json\n{\"products\": []}\n```";
        assert_eq!(parse_content(fenced).unwrap(), json!({"products": []}));
    }

    #[test]
    fn test_bare_fence_without_language() {
        let fenced = "```\n[1, 2]\n```\n";
        assert_eq!(strip_code_fence(fenced), "[1, 2]");
    }

    #[test]
    fn test_not_json() {
        assert!(parse_content("Sorry, I cannot help with that").is_err());
        assert!(parse_content("```").is_err());
        assert!(parse_content("   ").is_err());
    }
}
