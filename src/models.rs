//! Wire and domain types shared by the whole client

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

/// Role of the authenticated user.
///
/// `Consultant` is the only owner-restricted role; the others see every user's
/// entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Manager,
    Consultant,
}

impl Role {
    pub fn is_owner_restricted(self) -> bool {
        matches!(self, Role::Consultant)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Consultant => "consultant",
        };
        f.write_str(name)
    }
}

/// The authenticated user, as returned by `GET /auth/me`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    #[serde(deserialize_with = "deserialize_string_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "deserialize_string_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(deserialize_with = "deserialize_string_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub client_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    Pending,
    Approved,
    Rejected,
}

impl EntryStatus {
    pub const ALL: [EntryStatus; 3] = [
        EntryStatus::Pending,
        EntryStatus::Approved,
        EntryStatus::Rejected,
    ];

    /// Approval and rejection record who decided and when
    pub fn records_approver(self) -> bool {
        matches!(self, EntryStatus::Approved | EntryStatus::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntryStatus::Pending => "PENDING",
            EntryStatus::Approved => "APPROVED",
            EntryStatus::Rejected => "REJECTED",
        }
    }

    /// Next status in display order, used to cycle a status selector
    pub fn next(self) -> EntryStatus {
        match self {
            EntryStatus::Pending => EntryStatus::Approved,
            EntryStatus::Approved => EntryStatus::Rejected,
            EntryStatus::Rejected => EntryStatus::Pending,
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Ok(EntryStatus::Pending),
            "APPROVED" | "APPROVE" => Ok(EntryStatus::Approved),
            "REJECTED" | "REJECT" => Ok(EntryStatus::Rejected),
            _ => Err(ValidationError::InvalidStatus(s.to_string())),
        }
    }
}

/// One unit of work logged by a user on a project on a date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    #[serde(deserialize_with = "deserialize_string_id")]
    pub id: String,
    #[serde(deserialize_with = "deserialize_string_id")]
    pub user_id: String,
    #[serde(deserialize_with = "deserialize_string_id")]
    pub project_id: String,
    #[serde(deserialize_with = "deserialize_calendar_date")]
    pub date: NaiveDate,
    #[serde(deserialize_with = "deserialize_hours")]
    pub hours: f64,
    pub activity_type: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub status: EntryStatus,
    #[serde(default)]
    pub status_description: Option<String>,
    #[serde(default)]
    pub approver_id: Option<String>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub submission_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimeEntry {
    /// An empty string counts as no association
    pub fn has_submission(&self) -> bool {
        self.submission_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty())
    }

    pub fn month(&self) -> YearMonth {
        YearMonth::from_date(self.date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Draft,
    Submitted,
    ChangesRequested,
    Approved,
}

impl SubmissionStatus {
    /// Statuses that freeze the month for its owner
    pub fn locks_month(self) -> bool {
        matches!(
            self,
            SubmissionStatus::Submitted
                | SubmissionStatus::ChangesRequested
                | SubmissionStatus::Approved
        )
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubmissionStatus::Draft => "DRAFT",
            SubmissionStatus::Submitted => "SUBMITTED",
            SubmissionStatus::ChangesRequested => "CHANGES_REQUESTED",
            SubmissionStatus::Approved => "APPROVED",
        };
        f.write_str(name)
    }
}

/// One user's claim for one calendar month of entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(deserialize_with = "deserialize_string_id")]
    pub id: String,
    #[serde(deserialize_with = "deserialize_string_id")]
    pub user_id: String,
    pub year: i32,
    pub month: u32,
    pub status: SubmissionStatus,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Submission {
    pub fn period(&self) -> Option<YearMonth> {
        YearMonth::new(self.year, self.month)
    }
}

/// A calendar month, the unit of filtering and submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(YearMonth { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        YearMonth {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn current() -> Self {
        Self::from_date(Local::now().date_naive())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Month name and year, e.g. "March 2024"
    pub fn label(&self) -> String {
        self.first_day().format("%B %Y").to_string()
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            YearMonth {
                year: self.year - 1,
                month: 12,
            }
        } else {
            YearMonth {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            YearMonth {
                year: self.year + 1,
                month: 1,
            }
        } else {
            YearMonth {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidMonth(s.to_string());
        let (year, month) = s.trim().split_once(['-', '/', '.']).ok_or_else(invalid)?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        YearMonth::new(year, month).ok_or_else(invalid)
    }
}

/// Body of `POST /timesheet-entries`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntry {
    pub user_id: String,
    pub project_id: String,
    pub date: NaiveDate,
    pub hours: f64,
    pub activity_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: EntryStatus,
}

/// Body of `PATCH /timesheet-entries/{id}`; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EntryStatus>,
    /// `Some(None)` is sent as `null` and clears the field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
}

impl EntryPatch {
    /// Status change payload. Approval metadata is set on APPROVED/REJECTED
    /// and explicitly cleared for every other status, as is a missing message.
    pub fn status_change(
        status: EntryStatus,
        message: Option<String>,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let message = message.filter(|m| !m.trim().is_empty());
        let (approver_id, approved_at) = if status.records_approver() {
            (Some(actor_id.to_string()), Some(now))
        } else {
            (None, None)
        };
        EntryPatch {
            status: Some(status),
            status_description: Some(message),
            approver_id: Some(approver_id),
            approved_at: Some(approved_at),
            ..Default::default()
        }
    }

    pub fn associate(submission_id: &str) -> Self {
        EntryPatch {
            submission_id: Some(submission_id.to_string()),
            ..Default::default()
        }
    }
}

/// Body of `POST /timesheet-submissions`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubmission {
    pub user_id: String,
    pub year: i32,
    pub month: u32,
    pub status: SubmissionStatus,
    pub submitted_at: DateTime<Utc>,
}

/// Body of `PATCH /timesheet-submissions/{id}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPatch {
    pub status: SubmissionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}

// Ids may arrive as numbers or strings
fn deserialize_string_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;

    match value {
        Value::Number(num) => Ok(num.to_string()),
        Value::String(s) => Ok(s),
        _ => Err(serde::de::Error::custom("ID must be a string or number")),
    }
}

// Decimal columns are serialized as strings by some backends
fn deserialize_hours<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;

    match value {
        Value::Number(num) => num
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("Invalid hours value")),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("Invalid hours value: {}", s))),
        _ => Err(serde::de::Error::custom("Hours must be a number or string")),
    }
}

// Only the calendar component is kept; "2024-03-01T00:00:00.000Z" is March 1st
// whatever the local offset is.
fn deserialize_calendar_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_calendar_date(&raw).ok_or_else(|| serde::de::Error::custom(format!("Invalid date: {}", raw)))
}

/// Parses the leading `YYYY-MM-DD` of a date or datetime string
pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let head = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_deserializes_datetime_date_and_string_hours() {
        let raw = json!({
            "id": 42,
            "userId": "u1",
            "projectId": "p1",
            "date": "2024-03-01T23:30:00.000Z",
            "hours": "7.50",
            "activityType": "Development",
            "status": "PENDING",
            "createdAt": "2024-03-01T10:00:00Z",
            "updatedAt": "2024-03-01T10:00:00Z"
        });

        let entry: TimeEntry = serde_json::from_value(raw).unwrap();
        assert_eq!(entry.id, "42");
        assert_eq!(entry.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(entry.hours, 7.5);
        assert_eq!(entry.notes, None);
        assert!(!entry.has_submission());
    }

    #[test]
    fn test_empty_submission_id_is_no_association() {
        let raw = json!({
            "id": "e1", "userId": "u1", "projectId": "p1", "date": "2024-03-01",
            "hours": 1, "activityType": "x", "status": "APPROVED", "submissionId": "",
            "createdAt": "2024-03-01T10:00:00Z", "updatedAt": "2024-03-01T10:00:00Z"
        });
        let entry: TimeEntry = serde_json::from_value(raw).unwrap();
        assert!(!entry.has_submission());
    }

    #[test]
    fn test_status_change_payload() {
        let now = Utc::now();
        let patch = EntryPatch::status_change(EntryStatus::Approved, None, "admin-1", now);
        let body = serde_json::to_value(&patch).unwrap();
        assert_eq!(
            body,
            json!({
                "status": "APPROVED",
                "statusDescription": null,
                "approverId": "admin-1",
                "approvedAt": serde_json::to_value(now).unwrap()
            })
        );

        let patch = EntryPatch::status_change(
            EntryStatus::Pending,
            Some("back to you".to_string()),
            "admin-1",
            now,
        );
        let body = serde_json::to_value(&patch).unwrap();
        assert_eq!(
            body,
            json!({
                "status": "PENDING",
                "statusDescription": "back to you",
                "approverId": null,
                "approvedAt": null
            })
        );
    }

    #[test]
    fn test_pending_payload_clears_approval_metadata() {
        let patch = EntryPatch::status_change(EntryStatus::Pending, None, "admin-1", Utc::now());
        let body = serde_json::to_value(&patch).unwrap();
        assert_eq!(
            body,
            json!({
                "status": "PENDING",
                "statusDescription": null,
                "approverId": null,
                "approvedAt": null
            })
        );

        let untouched = serde_json::to_value(EntryPatch::associate("s1")).unwrap();
        assert_eq!(untouched, json!({"submissionId": "s1"}));
    }

    #[test]
    fn test_blank_message_is_absent() {
        let patch =
            EntryPatch::status_change(EntryStatus::Rejected, Some("  ".into()), "a", Utc::now());
        assert_eq!(patch.status_description, Some(None));
    }

    #[test]
    fn test_year_month_parsing_and_navigation() {
        let ym: YearMonth = "2024-03".parse().unwrap();
        assert_eq!(ym, YearMonth { year: 2024, month: 3 });
        assert_eq!(ym.to_string(), "2024-03");
        assert_eq!(ym.label(), "March 2024");
        assert!("2024-13".parse::<YearMonth>().is_err());
        assert_eq!(YearMonth::new(2024, 1).unwrap().previous(), YearMonth::new(2023, 12).unwrap());
        assert_eq!(YearMonth::new(2024, 12).unwrap().next(), YearMonth::new(2025, 1).unwrap());
        assert!(ym.contains(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()));
        assert!(!ym.contains(NaiveDate::from_ymd_opt(2023, 3, 31).unwrap()));
    }

    #[test]
    fn test_submission_lock_statuses() {
        assert!(!SubmissionStatus::Draft.locks_month());
        assert!(SubmissionStatus::Submitted.locks_month());
        assert!(SubmissionStatus::ChangesRequested.locks_month());
        assert!(SubmissionStatus::Approved.locks_month());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("approve".parse::<EntryStatus>().unwrap(), EntryStatus::Approved);
        assert_eq!("REJECTED".parse::<EntryStatus>().unwrap(), EntryStatus::Rejected);
        assert!("done".parse::<EntryStatus>().is_err());
    }
}
