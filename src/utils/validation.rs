use crate::error::{AppError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

// 用户名只能包含字母、数字、下划线和点
static USERNAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_.]+$").expect("username pattern compiles"));

/// 验证用户名格式
pub fn validate_username(username: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(AppError::validation("Username cannot be empty"));
    }

    if username.len() < 3 {
        return Err(AppError::validation("Username must be at least 3 characters"));
    }

    if username.len() > 30 {
        return Err(AppError::validation("Username cannot exceed 30 characters"));
    }

    if !USERNAME_PATTERN.is_match(username) {
        return Err(AppError::validation(
            "Username may only contain letters, digits, underscores and dots",
        ));
    }

    Ok(())
}

/// 验证文本内容非空且不超过长度限制
pub fn validate_text(field: &str, value: &str, max_chars: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} cannot be empty", field)));
    }

    if value.chars().count() > max_chars {
        return Err(AppError::Validation(format!(
            "{} cannot exceed {} characters",
            field, max_chars
        )));
    }

    Ok(())
}

/// Cuts `text` to at most `max_chars` characters, appending "..." only when
/// something was removed.
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}...", &text[..byte_index]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_validate_username() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("bob_99").is_ok());
        assert!(validate_username("j.doe").is_ok());

        assert!(validate_username("").is_err());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("user@name").is_err());
        assert!(validate_username(&"a".repeat(31)).is_err());
    }

    #[test]
    fn test_validate_text() {
        assert!(validate_text("Comment", "nice!", 10).is_ok());
        assert!(validate_text("Comment", "   ", 10).is_err());
        assert!(validate_text("Comment", "ééééé", 5).is_ok());
        assert!(validate_text("Comment", "ééééé!", 5).is_err());
    }

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!(truncate_with_ellipsis("nice!", 50), "nice!");
        assert_eq!(truncate_with_ellipsis(&"a".repeat(50), 50), "a".repeat(50));
        assert_eq!(
            truncate_with_ellipsis(&"a".repeat(51), 50),
            format!("{}...", "a".repeat(50))
        );
    }

    proptest! {
        #[test]
        fn truncation_never_exceeds_limit(text in "\\PC{0,120}", limit in 0usize..80) {
            let out = truncate_with_ellipsis(&text, limit);
            let count = text.chars().count();
            if count <= limit {
                prop_assert_eq!(out, text);
            } else {
                prop_assert!(out.ends_with("..."));
                prop_assert_eq!(out.chars().count(), limit + 3);
                prop_assert!(text.starts_with(out.trim_end_matches("...")));
            }
        }
    }
}
