//! Page-level controller for the timesheet month view
//!
//! A session owns the fetched collections, the filter state, the selection and
//! any pending status change. Local collections only ever change through a
//! full refetch after a write, never by patching them in place.

use chrono::{Local, NaiveDate};

use crate::entry_form::{duplicate_of, EntryForm, FormMode};
use crate::error::{Refusal, Result, TimesheetError};
use crate::filters::{FilterState, FilterStore, TIMESHEET_PAGE};
use crate::grouping::{self, visible_entries, DayGroup, MonthOption, ViewCache};
use crate::models::{Actor, EntryStatus, Project, Submission, TimeEntry, User, YearMonth};
use crate::policy::{self, can, check_entry_action, require, Action};
use crate::repository::TimesheetRepository;
use crate::selection::{GroupToggle, SelectionSet};
use crate::transitions::PendingChange;

pub struct TimesheetSession<R, S> {
    pub(crate) repo: R,
    store: S,
    pub(crate) actor: Actor,
    pub(crate) entries: Vec<TimeEntry>,
    users: Vec<User>,
    projects: Vec<Project>,
    /// Bumped on every refetch; keys the memoized view
    generation: u64,
    pub(crate) filters: FilterState,
    pub(crate) selection: SelectionSet,
    pub(crate) submission: Option<Submission>,
    pub(crate) pending: Option<PendingChange>,
    view: ViewCache,
}

impl<R: TimesheetRepository, S: FilterStore> TimesheetSession<R, S> {
    /// Identifies the actor, restores saved filters and loads the data
    pub async fn open(repo: R, store: S) -> Result<Self> {
        let actor = repo.current_actor().await?;
        tracing::info!(user = %actor.id, role = %actor.role, "session opened");

        let filters = match store.load(TIMESHEET_PAGE) {
            Ok(Some(saved)) => FilterState::restored(saved),
            Ok(None) => FilterState::default(),
            Err(e) => {
                tracing::warn!(error = %e, "could not load saved filters");
                FilterState::default()
            }
        };

        let mut session = TimesheetSession {
            repo,
            store,
            actor,
            entries: Vec::new(),
            users: Vec::new(),
            projects: Vec::new(),
            generation: 0,
            filters,
            selection: SelectionSet::new(),
            submission: None,
            pending: None,
            view: ViewCache::new(),
        };
        session.refresh().await?;
        Ok(session)
    }

    /// Refetches entries, users, projects and the active month's submission.
    ///
    /// Drops any pending status change and any selected id that is no longer
    /// visible.
    pub async fn refresh(&mut self) -> Result<()> {
        let repo = &self.repo;
        let list_users = can(self.actor.role, Action::ViewAllUsers);
        let lookup_submission = can(self.actor.role, Action::RequestApproval);
        let month = self.filters.month;
        let actor_id = self.actor.id.as_str();

        let (entries, users, projects, submission) = tokio::try_join!(
            repo.list_entries(),
            async {
                if list_users {
                    repo.list_users().await
                } else {
                    Ok(Vec::new())
                }
            },
            repo.list_projects(),
            async {
                if lookup_submission {
                    repo.find_submission(actor_id, month).await
                } else {
                    Ok(None)
                }
            },
        )?;

        tracing::debug!(
            entries = entries.len(),
            users = users.len(),
            projects = projects.len(),
            "data refreshed"
        );
        self.entries = entries;
        self.users = users;
        self.projects = projects;
        self.submission = submission;
        self.generation += 1;
        self.pending = None;
        self.reconcile_selection();
        Ok(())
    }

    /// Looks the active month's submission up again (owner-restricted roles only)
    pub(crate) async fn refresh_submission(&mut self) -> Result<()> {
        self.submission = if can(self.actor.role, Action::RequestApproval) {
            self.repo
                .find_submission(&self.actor.id, self.filters.month)
                .await?
        } else {
            None
        };
        Ok(())
    }

    /// Refreshes after a write, successful or not, and hands the write's
    /// outcome back
    pub(crate) async fn settle<T>(&mut self, outcome: Result<T>) -> Result<T> {
        if let Err(e) = &outcome {
            if e.is_remote() {
                tracing::warn!(error = %e, "remote call failed");
            }
        }
        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "refresh after write failed");
        }
        outcome
    }

    fn reconcile_selection(&mut self) {
        let visible: Vec<String> = visible_entries(self.view())
            .map(|e| e.id.clone())
            .collect();
        let dropped = self.selection.reconcile(visible.iter().map(String::as_str));
        if dropped > 0 {
            tracing::debug!(dropped, "dropped stale selections");
        }
    }

    // ===== ACCESSORS =====

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Every fetched entry, unfiltered
    pub fn entries(&self) -> &[TimeEntry] {
        &self.entries
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn submission(&self) -> Option<&Submission> {
        self.submission.as_ref()
    }

    pub fn pending_change(&self) -> Option<&PendingChange> {
        self.pending.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn can(&self, action: Action) -> bool {
        can(self.actor.role, action)
    }

    pub fn find_entry(&self, id: &str) -> Option<&TimeEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Display name of a user, falling back to the id
    pub fn user_name<'a>(&'a self, id: &'a str) -> &'a str {
        if id == self.actor.id {
            return &self.actor.name;
        }
        self.users
            .iter()
            .find(|u| u.id == id)
            .map_or(id, |u| u.name.as_str())
    }

    pub fn project_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.projects
            .iter()
            .find(|p| p.id == id)
            .map_or(id, |p| p.name.as_str())
    }

    // ===== VIEW =====

    /// Grouped month view for the current filters
    pub fn view(&mut self) -> &[DayGroup] {
        self.view.get(
            self.generation,
            &self.entries,
            &self.filters,
            self.actor.role,
            &self.actor.id,
        )
    }

    pub fn available_months(&self) -> Vec<MonthOption> {
        grouping::available_months(&self.entries)
    }

    /// Whether the active month is frozen for the actor
    pub fn month_locked(&self) -> bool {
        policy::is_month_locked(self.actor.role, self.submission.as_ref())
    }

    pub fn entry_locked(&self, entry: &TimeEntry) -> bool {
        policy::is_entry_locked(self.actor.role, entry)
    }

    // ===== FILTERS =====

    pub async fn select_month(&mut self, month: YearMonth) -> Result<()> {
        self.filters.select_month(month);
        self.filters_changed();
        self.refresh_submission().await
    }

    pub async fn reset_month(&mut self) -> Result<()> {
        self.select_month(YearMonth::current()).await
    }

    /// The nearest month with entries before (`older`) or after the active one
    pub fn adjacent_month(&self, older: bool) -> Option<YearMonth> {
        let active = self.filters.month;
        let months = self.available_months();
        if older {
            months.iter().map(|m| m.month).find(|m| *m < active)
        } else {
            months.iter().rev().map(|m| m.month).find(|m| *m > active)
        }
    }

    pub fn set_user_filter(&mut self, user_id: Option<String>) -> Result<()> {
        require(self.actor.role, Action::ViewAllUsers)?;
        self.filters.user_id = user_id;
        self.filters_changed();
        Ok(())
    }

    pub fn set_project_filter(&mut self, project_id: Option<String>) -> Result<()> {
        require(self.actor.role, Action::ViewAllUsers)?;
        self.filters.project_id = project_id;
        self.filters_changed();
        Ok(())
    }

    pub fn set_status_filter(&mut self, status: Option<EntryStatus>) -> Result<()> {
        require(self.actor.role, Action::ViewAllUsers)?;
        self.filters.status = status;
        self.filters_changed();
        Ok(())
    }

    /// Exact-date filter; also moves the active month to the date's month
    pub fn set_date_filter(&mut self, date: Option<NaiveDate>) -> Result<()> {
        require(self.actor.role, Action::FilterByDate)?;
        self.filters.set_date(date);
        self.filters_changed();
        Ok(())
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear_optional();
        self.filters_changed();
    }

    fn filters_changed(&mut self) {
        if let Err(e) = self.store.save(TIMESHEET_PAGE, &self.filters) {
            tracing::warn!(error = %e, "could not save filters");
        }
        self.reconcile_selection();
    }

    // ===== ENTRIES =====

    /// The entry, if present and the actor may change it
    pub fn guard_entry(&self, id: &str) -> std::result::Result<&TimeEntry, Refusal> {
        let entry = self
            .find_entry(id)
            .ok_or_else(|| Refusal::UnknownEntry(id.to_string()))?;
        check_entry_action(&self.actor, entry)?;
        Ok(entry)
    }

    /// Blank form dated today when the active month is the current one, the
    /// first of the active month otherwise
    pub fn new_entry_form(&self) -> EntryForm {
        let today = Local::now().date_naive();
        let date = self.filters.date.unwrap_or_else(|| {
            if self.filters.month.contains(today) {
                today
            } else {
                self.filters.month.first_day()
            }
        });
        EntryForm::new(&self.actor, date)
    }

    pub fn edit_entry_form(&self, id: &str) -> Result<EntryForm> {
        let entry = self.guard_entry(id)?;
        Ok(EntryForm::for_edit(&self.actor, entry))
    }

    /// Refuses writes dated into a month the actor has already submitted
    async fn guard_month(&self, date: NaiveDate) -> Result<()> {
        if !self.actor.role.is_owner_restricted() {
            return Ok(());
        }
        let month = YearMonth::from_date(date);
        let locked = if month == self.filters.month {
            self.month_locked()
        } else {
            let submission = self.repo.find_submission(&self.actor.id, month).await?;
            policy::is_month_locked(self.actor.role, submission.as_ref())
        };
        if locked {
            tracing::info!(%month, "refused: month already submitted");
            return Err(Refusal::MonthLocked.into());
        }
        Ok(())
    }

    pub async fn create_entry(&mut self, form: &EntryForm) -> Result<TimeEntry> {
        let new = form.to_new_entry(&self.actor)?;
        self.guard_month(new.date).await?;
        tracing::debug!(user = %new.user_id, date = %new.date, "creating entry");
        let outcome = self.repo.create_entry(&new).await;
        self.settle(outcome).await
    }

    pub async fn edit_entry(&mut self, form: &EntryForm) -> Result<TimeEntry> {
        let FormMode::Edit { entry_id, .. } = &form.mode else {
            return Err(TimesheetError::Other(
                "form does not belong to an existing entry".to_string(),
            ));
        };
        self.guard_entry(entry_id)?;
        let patch = form.to_patch(&self.actor, chrono::Utc::now())?;
        if let Some(date) = patch.date {
            self.guard_month(date).await?;
        }
        let outcome = self.repo.update_entry(entry_id, &patch).await;
        self.settle(outcome).await
    }

    pub async fn delete_entry(&mut self, id: &str) -> Result<()> {
        self.guard_entry(id)?;
        let outcome = self.repo.delete_entry(id).await;
        self.settle(outcome).await
    }

    pub async fn duplicate_entry(&mut self, id: &str) -> Result<TimeEntry> {
        let copy = duplicate_of(self.guard_entry(id)?);
        self.guard_month(copy.date).await?;
        let outcome = self.repo.create_entry(&copy).await;
        self.settle(outcome).await
    }

    // ===== SELECTION =====

    /// Returns whether the entry is now selected
    pub fn toggle_selection(&mut self, id: &str) -> Result<bool> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| Refusal::UnknownEntry(id.to_string()))?;
        Ok(self.selection.toggle(&self.actor, entry)?)
    }

    pub fn toggle_group(&mut self, date: NaiveDate) -> GroupToggle {
        let groups = self.view.get(
            self.generation,
            &self.entries,
            &self.filters,
            self.actor.role,
            &self.actor.id,
        );
        match groups.iter().find(|g| g.date == date) {
            Some(group) => self.selection.toggle_group(&self.actor, group),
            None => GroupToggle::Nothing,
        }
    }

    pub fn toggle_all(&mut self) -> GroupToggle {
        let groups = self.view.get(
            self.generation,
            &self.entries,
            &self.filters,
            self.actor.role,
            &self.actor.id,
        );
        self.selection.toggle_all(&self.actor, groups)
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::filters::MemoryFilterStore;
    use crate::memory::{Call, InMemoryRepository};
    use crate::models::Role;
    use crate::test_data::{actor, entry};

    fn current_day(day: u32) -> String {
        let month = YearMonth::current();
        let today = Local::now().date_naive();
        let date = month.first_day() + chrono::Duration::days(i64::from(day) - 1);
        date.min(today).format("%Y-%m-%d").to_string()
    }

    async fn session(
        role: Role,
        entries: Vec<TimeEntry>,
    ) -> TimesheetSession<InMemoryRepository, MemoryFilterStore> {
        let repo = InMemoryRepository::new(actor("c1", role)).with_entries(entries);
        TimesheetSession::open(repo, MemoryFilterStore::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_loads_current_month() {
        let mut s = session(
            Role::Consultant,
            vec![
                entry("e1", "c1", &current_day(1), 1.0),
                entry("e2", "c2", &current_day(1), 1.0),
                entry("e3", "c1", "2020-01-10", 1.0),
            ],
        )
        .await;

        assert_eq!(s.filters().month, YearMonth::current());
        assert_eq!(visible_entries(s.view()).count(), 1);
        assert_eq!(s.available_months().len(), 2);
        assert!(s
            .repository()
            .calls()
            .contains(&Call::FindSubmission(YearMonth::current())));
        assert!(!s.repository().calls().contains(&Call::ListUsers));
    }

    #[tokio::test]
    async fn test_filters_are_saved_and_restored() {
        let store = MemoryFilterStore::new();
        let repo = InMemoryRepository::new(actor("a1", Role::Admin));
        let mut s = TimesheetSession::open(repo, store).await.unwrap();
        s.set_project_filter(Some("p9".to_string())).unwrap();
        s.select_month(YearMonth::new(2020, 5).unwrap()).await.unwrap();

        let TimesheetSession { store, .. } = s;
        let repo = InMemoryRepository::new(actor("a1", Role::Admin));
        let reopened = TimesheetSession::open(repo, store).await.unwrap();
        assert_eq!(reopened.filters().project_id.as_deref(), Some("p9"));
        assert_eq!(reopened.filters().month, YearMonth::current());
    }

    #[tokio::test]
    async fn test_consultant_cannot_set_elevated_filters() {
        let mut s = session(Role::Consultant, Vec::new()).await;
        assert!(matches!(
            s.set_user_filter(Some("c2".to_string())),
            Err(TimesheetError::Refused(Refusal::NotPermitted(Action::ViewAllUsers)))
        ));

        let mut s = session(Role::Manager, Vec::new()).await;
        assert!(s.set_status_filter(Some(EntryStatus::Approved)).is_ok());
        assert!(s.set_date_filter(NaiveDate::from_ymd_opt(2024, 3, 1)).is_err());
    }

    #[tokio::test]
    async fn test_adjacent_month_skips_empty_months() {
        let mut s = session(
            Role::Admin,
            vec![
                entry("e1", "u1", "2023-11-02", 1.0),
                entry("e2", "u1", "2024-02-02", 1.0),
            ],
        )
        .await;
        s.select_month(YearMonth::new(2024, 2).unwrap()).await.unwrap();
        assert_eq!(s.adjacent_month(true), YearMonth::new(2023, 11));
        assert_eq!(s.adjacent_month(false), None);
    }

    #[tokio::test]
    async fn test_refresh_drops_selection_of_deleted_entries() {
        let mut s = session(
            Role::Consultant,
            vec![
                entry("e1", "c1", &current_day(1), 1.0),
                entry("e2", "c1", &current_day(1), 1.0),
            ],
        )
        .await;
        s.toggle_selection("e1").unwrap();
        s.toggle_selection("e2").unwrap();

        s.delete_entry("e2").await.unwrap();
        assert_eq!(s.selection().ids().collect::<Vec<_>>(), vec!["e1"]);
    }

    #[tokio::test]
    async fn test_failed_write_still_refreshes() {
        let mut s = session(Role::Consultant, vec![entry("e1", "c1", &current_day(1), 1.0)]).await;
        let before = s.generation();
        s.repository().fail_writes_to("e1");

        let err = s.delete_entry("e1").await.unwrap_err();
        assert!(matches!(err, TimesheetError::Api(ApiError::Rejected { .. })));
        assert!(s.generation() > before);
        assert!(s.find_entry("e1").is_some());
    }

    #[tokio::test]
    async fn test_create_entry_validation_never_reaches_backend() {
        let mut s = session(Role::Consultant, Vec::new()).await;
        s.repository().clear_calls();

        let form = s.new_entry_form();
        let err = s.create_entry(&form).await.unwrap_err();
        assert!(matches!(err, TimesheetError::Form(_)));
        assert!(s.repository().calls().is_empty());
    }
}
