//! Builders for unit tests

use chrono::{Duration, NaiveDate, TimeZone, Utc};

use crate::models::{Actor, EntryStatus, Role, Submission, SubmissionStatus, TimeEntry};

pub fn actor(id: &str, role: Role) -> Actor {
    Actor {
        id: id.to_string(),
        name: format!("User {}", id),
        email: format!("{}@example.com", id),
        role,
    }
}

/// Pending entry on project `p1`; `created_at` grows with the numeric suffix of
/// the id so creation order is predictable.
pub fn entry(id: &str, user_id: &str, date: &str, hours: f64) -> TimeEntry {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
    let offset: i64 = id
        .trim_start_matches(|c: char| !c.is_ascii_digit())
        .parse()
        .unwrap_or(0);
    let created = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap() + Duration::minutes(offset);
    TimeEntry {
        id: id.to_string(),
        user_id: user_id.to_string(),
        project_id: "p1".to_string(),
        date,
        hours,
        activity_type: "Development".to_string(),
        notes: None,
        status: EntryStatus::Pending,
        status_description: None,
        approver_id: None,
        approved_at: None,
        submission_id: None,
        created_at: created,
        updated_at: created,
    }
}

pub fn submission(id: &str, user_id: &str, year: i32, month: u32, status: SubmissionStatus) -> Submission {
    Submission {
        id: id.to_string(),
        user_id: user_id.to_string(),
        year,
        month,
        status,
        submitted_at: None,
    }
}
