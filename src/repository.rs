//! Persistence port for entries, submissions and their reference data

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    Actor, EntryPatch, NewEntry, NewSubmission, Project, Submission, SubmissionPatch, TimeEntry,
    User, YearMonth,
};

/// Everything the timesheet workflow needs from its backend.
///
/// Every call is independent; nothing is batched or made atomic across calls.
#[async_trait]
pub trait TimesheetRepository: Send + Sync {
    /// The authenticated user
    async fn current_actor(&self) -> Result<Actor>;

    async fn list_entries(&self) -> Result<Vec<TimeEntry>>;
    async fn list_users(&self) -> Result<Vec<User>>;
    async fn list_projects(&self) -> Result<Vec<Project>>;

    async fn create_entry(&self, entry: &NewEntry) -> Result<TimeEntry>;
    async fn update_entry(&self, id: &str, patch: &EntryPatch) -> Result<TimeEntry>;
    async fn delete_entry(&self, id: &str) -> Result<()>;

    /// `Ok(None)` when the user has no submission for the month yet
    async fn find_submission(&self, user_id: &str, month: YearMonth)
        -> Result<Option<Submission>>;
    async fn create_submission(&self, submission: &NewSubmission) -> Result<Submission>;
    async fn update_submission(&self, id: &str, patch: &SubmissionPatch) -> Result<Submission>;
}
