use chrono::NaiveDate;

use crate::error::ValidationError;

/// Utility functions for the timesheet client

// ===== STRING UTILITIES =====

/// Masks an API token for safe logging (shows first 4 characters, masks the rest)
pub fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    let hidden = token.chars().count().saturating_sub(4);
    if hidden == 0 {
        "*".repeat(visible.chars().count())
    } else {
        format!("{}{}", visible, "*".repeat(hidden))
    }
}

/// Truncates a string to a maximum number of characters, adding "..." if truncated
pub fn truncate_string(s: &str, max_length: usize) -> String {
    if s.chars().count() <= max_length {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_length.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Checks if a string is empty or contains only whitespace
pub fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// `None` for blank input, the trimmed text otherwise
pub fn non_blank(s: &str) -> Option<String> {
    (!is_blank(s)).then(|| s.trim().to_string())
}

// ===== DATE UTILITIES =====

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y.%m.%d", "%Y/%m/%d"];

/// Parses a date in YYYY-MM-DD, YYYY.MM.DD or YYYY/MM/DD format
pub fn parse_date(date_str: &str) -> Result<NaiveDate, ValidationError> {
    let date_str = date_str.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_str, format).ok())
        .ok_or_else(|| ValidationError::InvalidDateFormat(date_str.to_string()))
}

/// Short weekday and ISO date, e.g. "Fri 2024-03-01"
pub fn format_day(date: NaiveDate) -> String {
    date.format("%a %Y-%m-%d").to_string()
}
