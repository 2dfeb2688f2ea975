//! In-process backend used by `--demo` mode and the workflow tests
//!
//! Every call is recorded, so callers can assert that a refused action never
//! reached the backend. `toggle_offline` and `fail_writes_to` simulate remote
//! failures.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDate, Utc};
use tokio::sync::RwLock;

use crate::error::{ApiError, Result};
use crate::models::{
    Actor, EntryPatch, EntryStatus, NewEntry, NewSubmission, Project, Role, Submission,
    SubmissionPatch, SubmissionStatus, TimeEntry, User, YearMonth,
};
use crate::repository::TimesheetRepository;

/// One backend call, as seen by the in-memory adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CurrentActor,
    ListEntries,
    ListUsers,
    ListProjects,
    CreateEntry,
    UpdateEntry(String),
    DeleteEntry(String),
    FindSubmission(YearMonth),
    CreateSubmission,
    UpdateSubmission(String),
}

impl Call {
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Call::CreateEntry
                | Call::UpdateEntry(_)
                | Call::DeleteEntry(_)
                | Call::CreateSubmission
                | Call::UpdateSubmission(_)
        )
    }
}

#[derive(Debug, Default)]
struct Store {
    entries: Vec<TimeEntry>,
    users: Vec<User>,
    projects: Vec<Project>,
    submissions: Vec<Submission>,
    next_id: u64,
}

impl Store {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, 1000 + self.next_id)
    }
}

pub struct InMemoryRepository {
    actor: Actor,
    store: RwLock<Store>,
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<String>>,
    is_offline: AtomicBool,
}

impl InMemoryRepository {
    pub fn new(actor: Actor) -> Self {
        InMemoryRepository {
            actor,
            store: RwLock::new(Store::default()),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            is_offline: AtomicBool::new(false),
        }
    }

    pub fn with_entries(mut self, entries: Vec<TimeEntry>) -> Self {
        self.store.get_mut().entries = entries;
        self
    }

    pub fn with_users(mut self, users: Vec<User>) -> Self {
        self.store.get_mut().users = users;
        self
    }

    pub fn with_projects(mut self, projects: Vec<Project>) -> Self {
        self.store.get_mut().projects = projects;
        self
    }

    pub fn with_submissions(mut self, submissions: Vec<Submission>) -> Self {
        self.store.get_mut().submissions = submissions;
        self
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    /// Makes every following call fail until toggled back
    pub fn toggle_offline(&self) {
        self.is_offline.fetch_xor(true, Ordering::SeqCst);
    }

    /// Makes updates and deletes of one entry fail with a server error
    pub fn fail_writes_to(&self, entry_id: &str) {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(entry_id.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn write_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Snapshot of the stored entries
    pub async fn entries(&self) -> Vec<TimeEntry> {
        self.store.read().await.entries.clone()
    }

    pub async fn submissions(&self) -> Vec<Submission> {
        self.store.read().await.submissions.clone()
    }

    fn record(&self, call: Call) -> Result<()> {
        tracing::debug!(?call, "in-memory call");
        let failing = match &call {
            Call::UpdateEntry(id) | Call::DeleteEntry(id) => self
                .failing
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .contains(id),
            _ => false,
        };
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);

        if self.is_offline.load(Ordering::SeqCst) {
            return Err(ApiError::Unavailable("in-memory backend is offline".to_string()).into());
        }
        if failing {
            return Err(ApiError::Rejected {
                status: 500,
                message: "simulated write failure".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// A consultant, a manager and an admin with two months of entries; the
    /// consultant's previous month is already submitted.
    pub fn seeded_demo(role: Role) -> Self {
        let users = vec![
            demo_user("u-admin", "Ada Admin", Role::Admin),
            demo_user("u-manager", "Max Manager", Role::Manager),
            demo_user("u-consultant", "Cleo Consultant", Role::Consultant),
            demo_user("u-contractor", "Chris Contractor", Role::Consultant),
        ];
        let actor_user = match role {
            Role::Admin => &users[0],
            Role::Manager => &users[1],
            Role::Consultant => &users[2],
        };
        let actor = Actor {
            id: actor_user.id.clone(),
            name: actor_user.name.clone(),
            email: actor_user.email.clone(),
            role,
        };

        let projects = vec![
            demo_project("p-portal", "Customer Portal", "Acme Corp"),
            demo_project("p-mobile", "Mobile App", "Globex"),
            demo_project("p-internal", "Internal Tooling", "In-house"),
        ];

        let current = YearMonth::current();
        let previous = current.previous();
        let today = Local::now().date_naive();
        let in_current = |day: u32| {
            let date = current.first_day() + Duration::days(i64::from(day) - 1);
            date.min(today).max(current.first_day())
        };
        let in_previous = |day: u32| previous.first_day() + Duration::days(i64::from(day) - 1);

        let submission = Submission {
            id: "s-1".to_string(),
            user_id: "u-consultant".to_string(),
            year: previous.year,
            month: previous.month,
            status: SubmissionStatus::Submitted,
            submitted_at: Some(Utc::now() - Duration::days(3)),
        };

        let mut seq = 0;
        let mut entry = |user: &str, project: &str, date: NaiveDate, hours: f64, activity: &str| {
            seq += 1;
            let created = Utc::now() - Duration::days(40) + Duration::minutes(seq * 7);
            TimeEntry {
                id: format!("e-{}", seq),
                user_id: user.to_string(),
                project_id: project.to_string(),
                date,
                hours,
                activity_type: activity.to_string(),
                notes: None,
                status: EntryStatus::Pending,
                status_description: None,
                approver_id: None,
                approved_at: None,
                submission_id: None,
                created_at: created,
                updated_at: created,
            }
        };

        let mut entries = vec![
            entry("u-consultant", "p-portal", in_previous(3), 7.5, "Development"),
            entry("u-consultant", "p-portal", in_previous(4), 8.0, "Development"),
            entry("u-consultant", "p-mobile", in_previous(4), 0.5, "Meeting"),
            entry("u-contractor", "p-mobile", in_previous(10), 6.0, "Testing"),
            entry("u-consultant", "p-portal", in_current(1), 4.0, "Code review"),
            entry("u-consultant", "p-internal", in_current(1), 3.25, "Documentation"),
            entry("u-consultant", "p-mobile", in_current(2), 8.0, "Development"),
            entry("u-contractor", "p-portal", in_current(2), 7.0, "Development"),
            entry("u-contractor", "p-mobile", in_current(3), 1.75, "Support"),
            entry("u-manager", "p-internal", in_current(3), 2.0, "Planning"),
        ];
        for e in entries.iter_mut().take(3) {
            e.submission_id = Some(submission.id.clone());
        }
        entries[3].status = EntryStatus::Approved;
        entries[3].approver_id = Some("u-admin".to_string());
        entries[3].approved_at = Some(Utc::now() - Duration::days(2));

        InMemoryRepository::new(actor)
            .with_users(users)
            .with_projects(projects)
            .with_entries(entries)
            .with_submissions(vec![submission])
    }
}

fn demo_user(id: &str, name: &str, role: Role) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        email: format!("{}@example.com", id.trim_start_matches("u-")),
        role: Some(role),
    }
}

fn demo_project(id: &str, name: &str, client: &str) -> Project {
    Project {
        id: id.to_string(),
        name: name.to_string(),
        client_name: Some(client.to_string()),
    }
}

fn not_found(what: &str, id: &str) -> ApiError {
    ApiError::NotFound(format!("{} {}", what, id))
}

#[async_trait]
impl TimesheetRepository for InMemoryRepository {
    async fn current_actor(&self) -> Result<Actor> {
        self.record(Call::CurrentActor)?;
        Ok(self.actor.clone())
    }

    async fn list_entries(&self) -> Result<Vec<TimeEntry>> {
        self.record(Call::ListEntries)?;
        Ok(self.store.read().await.entries.clone())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.record(Call::ListUsers)?;
        Ok(self.store.read().await.users.clone())
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        self.record(Call::ListProjects)?;
        Ok(self.store.read().await.projects.clone())
    }

    async fn create_entry(&self, entry: &NewEntry) -> Result<TimeEntry> {
        self.record(Call::CreateEntry)?;
        if entry.hours <= 0.0 {
            return Err(ApiError::Rejected {
                status: 400,
                message: "hours must be positive".to_string(),
            }
            .into());
        }

        let mut store = self.store.write().await;
        let now = Utc::now();
        let created = TimeEntry {
            id: store.next_id("entry"),
            user_id: entry.user_id.clone(),
            project_id: entry.project_id.clone(),
            date: entry.date,
            hours: entry.hours,
            activity_type: entry.activity_type.clone(),
            notes: entry.notes.clone(),
            status: entry.status,
            status_description: None,
            approver_id: None,
            approved_at: None,
            submission_id: None,
            created_at: now,
            updated_at: now,
        };
        store.entries.push(created.clone());
        Ok(created)
    }

    async fn update_entry(&self, id: &str, patch: &EntryPatch) -> Result<TimeEntry> {
        self.record(Call::UpdateEntry(id.to_string()))?;
        let mut store = self.store.write().await;
        let entry = store
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| not_found("entry", id))?;

        let patch = patch.clone();
        if let Some(user_id) = patch.user_id {
            entry.user_id = user_id;
        }
        if let Some(project_id) = patch.project_id {
            entry.project_id = project_id;
        }
        if let Some(date) = patch.date {
            entry.date = date;
        }
        if let Some(hours) = patch.hours {
            entry.hours = hours;
        }
        if let Some(activity_type) = patch.activity_type {
            entry.activity_type = activity_type;
        }
        if patch.notes.is_some() {
            entry.notes = patch.notes;
        }
        if let Some(status) = patch.status {
            entry.status = status;
        }
        if let Some(description) = patch.status_description {
            entry.status_description = description;
        }
        if let Some(approver_id) = patch.approver_id {
            entry.approver_id = approver_id;
        }
        if let Some(approved_at) = patch.approved_at {
            entry.approved_at = approved_at;
        }
        if patch.submission_id.is_some() {
            entry.submission_id = patch.submission_id;
        }
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn delete_entry(&self, id: &str) -> Result<()> {
        self.record(Call::DeleteEntry(id.to_string()))?;
        let mut store = self.store.write().await;
        let before = store.entries.len();
        store.entries.retain(|e| e.id != id);
        if store.entries.len() == before {
            return Err(not_found("entry", id).into());
        }
        Ok(())
    }

    async fn find_submission(
        &self,
        user_id: &str,
        month: YearMonth,
    ) -> Result<Option<Submission>> {
        self.record(Call::FindSubmission(month))?;
        let store = self.store.read().await;
        Ok(store
            .submissions
            .iter()
            .find(|s| s.user_id == user_id && s.period() == Some(month))
            .cloned())
    }

    async fn create_submission(&self, submission: &NewSubmission) -> Result<Submission> {
        self.record(Call::CreateSubmission)?;
        let mut store = self.store.write().await;
        let exists = store.submissions.iter().any(|s| {
            s.user_id == submission.user_id
                && s.year == submission.year
                && s.month == submission.month
        });
        if exists {
            return Err(ApiError::Rejected {
                status: 409,
                message: "a submission already exists for this month".to_string(),
            }
            .into());
        }

        let created = Submission {
            id: store.next_id("submission"),
            user_id: submission.user_id.clone(),
            year: submission.year,
            month: submission.month,
            status: submission.status,
            submitted_at: Some(submission.submitted_at),
        };
        store.submissions.push(created.clone());
        Ok(created)
    }

    async fn update_submission(&self, id: &str, patch: &SubmissionPatch) -> Result<Submission> {
        self.record(Call::UpdateSubmission(id.to_string()))?;
        let mut store = self.store.write().await;
        let submission = store
            .submissions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| not_found("submission", id))?;
        submission.status = patch.status;
        if patch.submitted_at.is_some() {
            submission.submitted_at = patch.submitted_at;
        }
        Ok(submission.clone())
    }
}
