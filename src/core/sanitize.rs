//! Task description validation at the submission boundary.

use crate::core::error::ValidationError;

pub const MAX_DESCRIPTION_CHARS: usize = 10_000;

/// Substrings that reject a description outright. Script-tag screening is
/// handled separately so `<script>` variants with attributes also match.
const DISALLOWED_PATTERNS: [&str; 4] = ["javascript:", "data:text/html", "eval(", "function("];

/// Trim and validate a task description. Returns the trimmed text.
pub fn sanitize_description(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyDescription);
    }

    let len = trimmed.chars().count();
    if len > MAX_DESCRIPTION_CHARS {
        return Err(ValidationError::DescriptionTooLong {
            len,
            max: MAX_DESCRIPTION_CHARS,
        });
    }

    let lower = trimmed.to_lowercase();
    if lower.contains("<script") {
        return Err(ValidationError::SuspiciousDescription { pattern: "<script" });
    }
    for pattern in DISALLOWED_PATTERNS {
        if lower.contains(pattern) {
            return Err(ValidationError::SuspiciousDescription { pattern });
        }
    }

    Ok(trimmed.to_string())
}
