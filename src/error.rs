//! Custom error types for the timesheet client
//!
//! Every failure path of a user action ends in one of these variants: a field
//! message (validation), a refusal raised before any network call, or a remote
//! failure carrying whatever the server said.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::policy::Action;

/// Main error type for the timesheet client
#[derive(Error, Debug)]
pub enum TimesheetError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Remote failures (server-rejected write, network failure)
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Single-value validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Form validation, one message per offending field
    #[error("Validation failed: {0}")]
    Form(#[from] FieldErrors),

    /// Policy refusals raised before any network call
    #[error("Not allowed: {0}")]
    Refused(#[from] Refusal),

    /// At least one call of a multi-entry batch failed
    #[error("{failed} of {total} operations failed; data has been refreshed")]
    Batch { failed: usize, total: usize },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Date/time parsing errors
    #[error("Date/time error: {0}")]
    DateTime(String),

    #[error("{0}")]
    Other(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("API token not found. Run `timesheet config` to set up your credentials")]
    TokenNotFound,

    #[error("API token is empty or invalid")]
    InvalidToken,

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    #[error("Could not determine the {0} directory")]
    NoDirectory(&'static str),

    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration file: {0}")]
    SaveFailed(String),
}

/// Remote failures
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Authentication failed. Please check your API token")]
    AuthenticationFailed,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Validation errors for single values
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid date format: {0}. Expected YYYY-MM-DD, YYYY.MM.DD, or YYYY/MM/DD")]
    InvalidDateFormat(String),

    #[error("Invalid month: {0}. Expected YYYY-MM")]
    InvalidMonth(String),

    #[error("Invalid time: {0}. Expected HH:MM with hours 0-23 and minutes 0-59")]
    InvalidTime(String),

    #[error("Duration must be greater than 00:00")]
    ZeroDuration,

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Per-field validation messages, shown next to the offending input
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldErrors {
    errors: BTreeMap<&'static str, String>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.errors.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// `Ok(())` when nothing was collected
    pub fn into_result(self) -> std::result::Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for FieldErrors {}

/// Refusals raised by the lock and capability policy
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Refusal {
    #[error("this entry belongs to a submitted month and can no longer be changed")]
    Locked,

    #[error("you can only change your own entries")]
    NotOwner,

    #[error("your role is not permitted to {0}")]
    NotPermitted(Action),

    #[error("{blocked} selected entries are locked; nothing was deleted")]
    LockedSelection { blocked: usize },

    #[error("this month has already been submitted for approval")]
    MonthLocked,

    #[error("no entries are selected")]
    NothingSelected,

    #[error("there is no pending status change to confirm")]
    NoPendingChange,

    #[error("entry {0} is not in the current data set")]
    UnknownEntry(String),
}

/// Result type alias for the timesheet client
pub type Result<T> = std::result::Result<T, TimesheetError>;

impl From<chrono::ParseError> for TimesheetError {
    fn from(err: chrono::ParseError) -> Self {
        TimesheetError::DateTime(err.to_string())
    }
}

impl TimesheetError {
    /// Remote failures leave local state stale and call for a refetch
    pub fn is_remote(&self) -> bool {
        matches!(self, TimesheetError::Api(_) | TimesheetError::Batch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TimesheetError::Config(ConfigError::TokenNotFound);
        assert!(err.to_string().contains("API token not found"));

        let err = TimesheetError::Refused(Refusal::LockedSelection { blocked: 2 });
        assert!(err.to_string().contains("2 selected entries are locked"));
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TimesheetError = io_err.into();
        assert!(matches!(err, TimesheetError::Io(_)));

        let err: TimesheetError = Refusal::NotOwner.into();
        assert!(matches!(err, TimesheetError::Refused(Refusal::NotOwner)));
    }

    #[test]
    fn test_field_errors_keep_first_message_per_field() {
        let mut errors = FieldErrors::new();
        errors.add("time", "Time is required");
        errors.add("time", "second message");
        errors.add("project", "Project is required");

        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("time"), Some("Time is required"));
        assert_eq!(
            errors.to_string(),
            "project: Project is required; time: Time is required"
        );
        assert!(errors.into_result().is_err());
        assert!(FieldErrors::new().into_result().is_ok());
    }

    #[test]
    fn test_remote_classification() {
        let err = TimesheetError::Api(ApiError::Unavailable("offline".to_string()));
        assert!(err.is_remote());
        assert!(TimesheetError::Batch { failed: 1, total: 3 }.is_remote());
        assert!(!TimesheetError::Refused(Refusal::Locked).is_remote());
    }
}
