//! Decodes model output into JSON, tolerating markdown code fences.

use serde_json::Value;

/// Strip a surrounding markdown code fence, with or without a language tag.
fn strip_code_fence(text: &str) -> &str {
    let mut content = text.trim();

    if let Some(rest) = content.strip_prefix("```") {
        // Drop the info string (e.g. `json`) up to the end of the opening line.
        content = match rest.find('\n') {
            Some(newline) if !rest[..newline].trim().starts_with(['{', '[']) => {
                &rest[newline + 1..]
            }
            _ => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
        };
    }
    if let Some(rest) = content.trim_end().strip_suffix("```") {
        content = rest;
    }

    content.trim()
}

/// Parse a completion response as JSON.
///
/// Fails with the underlying decode error when the (fence-stripped) text is
/// not valid JSON. There is no repair or retry.
pub fn parse_json_response(raw: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(strip_code_fence(raw))
}
