//! Application state and key handling for the interactive UI

use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEvent};
use tui_input::backend::crossterm::EventHandler as InputEventHandler;
use tui_input::Input;

use timesheet::entry_form::{EntryForm, FormField};
use timesheet::error::TimesheetError;
use timesheet::filters::FilterStore;
use timesheet::grouping::visible_entries;
use timesheet::models::{EntryStatus, TimeEntry};
use timesheet::policy::Action;
use timesheet::selection::GroupToggle;
use timesheet::transitions::{BulkAction, Proposal};
use timesheet::{TimesheetRepository, TimesheetSession};

use super::messages::{Message, MessageType};

const MAX_MESSAGES: usize = 20;

/// Application mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// Navigating the month view
    Browse,
    /// Adding or editing an entry
    Form,
    /// A status change is proposed and waits for confirmation
    ConfirmStatus,
    /// Confirming deletion of the highlighted entry
    ConfirmDelete,
    /// Confirming a bulk action on the selection
    ConfirmBulk(BulkAction),
    /// Confirming the approval request for the month
    ConfirmSubmit,
    /// Help screen
    Help,
}

/// Main application state
pub struct App<R, S> {
    pub session: TimesheetSession<R, S>,
    pub mode: AppMode,
    /// Index of the highlighted entry among the visible ones
    pub cursor: usize,
    pub form: Option<EntryForm>,
    /// Optional message for status changes and bulk approvals
    pub message_input: Input,
    pub messages: Vec<Message>,
}

impl<R: TimesheetRepository, S: FilterStore> App<R, S> {
    pub fn new(session: TimesheetSession<R, S>) -> Self {
        let greeting = format!(
            "Signed in as {} ({}). Press ? for help",
            session.actor().name,
            session.actor().role
        );
        App {
            session,
            mode: AppMode::Browse,
            cursor: 0,
            form: None,
            message_input: Input::default(),
            messages: vec![Message::new(MessageType::Info, greeting)],
        }
    }

    /// Ids of the visible entries in display order
    pub fn visible_ids(&mut self) -> Vec<String> {
        visible_entries(self.session.view())
            .map(|e| e.id.clone())
            .collect()
    }

    /// The highlighted entry, if any
    pub fn current_entry(&mut self) -> Option<TimeEntry> {
        let id = self.visible_ids().get(self.cursor).cloned()?;
        self.session.find_entry(&id).cloned()
    }

    pub fn notify(&mut self, message_type: MessageType, text: impl Into<String>) {
        self.messages.push(Message::new(message_type, text.into()));
        if self.messages.len() > MAX_MESSAGES {
            self.messages.remove(0);
        }
    }

    fn notify_error(&mut self, context: &str, err: &TimesheetError) {
        let message_type = match err {
            TimesheetError::Refused(_) | TimesheetError::Form(_) | TimesheetError::Validation(_) => {
                MessageType::Warning
            }
            _ => MessageType::Error,
        };
        self.notify(message_type, format!("{}: {}", context, err));
    }

    fn clamp_cursor(&mut self) {
        let count = self.visible_ids().len();
        self.cursor = self.cursor.min(count.saturating_sub(1));
    }

    /// Handle keyboard events; returns false to quit
    pub async fn handle_event(&mut self, event: KeyEvent) -> Result<bool> {
        match self.mode {
            AppMode::Browse => return self.handle_browse_mode(event).await,
            AppMode::Form => self.handle_form_mode(event).await,
            AppMode::ConfirmStatus => self.handle_status_mode(event).await,
            AppMode::ConfirmDelete => self.handle_delete_mode(event).await,
            AppMode::ConfirmBulk(action) => self.handle_bulk_mode(event, action).await,
            AppMode::ConfirmSubmit => self.handle_submit_mode(event).await,
            AppMode::Help => self.mode = AppMode::Browse,
        }
        Ok(true)
    }

    async fn handle_browse_mode(&mut self, event: KeyEvent) -> Result<bool> {
        match event.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => return Ok(false),
            KeyCode::Char('?') => self.mode = AppMode::Help,
            KeyCode::Left => self.step_month(true).await,
            KeyCode::Right => self.step_month(false).await,
            KeyCode::Home => {
                if let Err(e) = self.session.reset_month().await {
                    self.notify_error("Failed to load the current month", &e);
                }
                self.cursor = 0;
            }
            KeyCode::Up => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Down => {
                if self.cursor + 1 < self.visible_ids().len() {
                    self.cursor += 1;
                }
            }
            KeyCode::Char(' ') => self.toggle_current(),
            KeyCode::Char('g') => self.toggle_group(),
            KeyCode::Char('A') => {
                let outcome = self.session.toggle_all();
                self.report_toggle(outcome);
            }
            KeyCode::Char('a') => self.start_add(),
            KeyCode::Char('e') | KeyCode::Enter => self.start_edit(),
            KeyCode::Char('c') => self.duplicate_current().await,
            KeyCode::Char('d') => self.start_delete(),
            KeyCode::Char('s') => self.propose_next_status(),
            KeyCode::Char('b') => self.start_bulk(BulkAction::Approve),
            KeyCode::Char('x') => self.start_bulk(BulkAction::Reject),
            KeyCode::Char('D') => self.start_bulk(BulkAction::Delete),
            KeyCode::Char('r') => self.start_submit(),
            KeyCode::Char('u') => {
                match self.session.refresh().await {
                    Ok(()) => self.notify(MessageType::Success, "Data refreshed"),
                    Err(e) => self.notify_error("Refresh failed", &e),
                }
                self.clamp_cursor();
            }
            KeyCode::Char('f') => self.cycle_status_filter(),
            KeyCode::Char('p') => self.cycle_project_filter(),
            KeyCode::Char('o') => self.cycle_user_filter(),
            KeyCode::Char('F') => {
                self.session.clear_filters();
                self.cursor = 0;
                self.notify(MessageType::Info, "Filters cleared");
            }
            _ => {}
        }
        Ok(true)
    }

    async fn step_month(&mut self, older: bool) {
        let Some(month) = self.session.adjacent_month(older) else {
            let direction = if older { "older" } else { "newer" };
            self.notify(MessageType::Info, format!("No {} month with entries", direction));
            return;
        };
        if let Err(e) = self.session.select_month(month).await {
            self.notify_error("Failed to load the month", &e);
        }
        self.cursor = 0;
    }

    fn toggle_current(&mut self) {
        let Some(entry) = self.current_entry() else {
            return;
        };
        if let Err(e) = self.session.toggle_selection(&entry.id) {
            self.notify_error("Cannot select entry", &e);
        }
    }

    fn toggle_group(&mut self) {
        let Some(entry) = self.current_entry() else {
            return;
        };
        let outcome = self.session.toggle_group(entry.date);
        self.report_toggle(outcome);
    }

    fn report_toggle(&mut self, outcome: GroupToggle) {
        match outcome {
            GroupToggle::Selected(n) => self.notify(MessageType::Info, format!("Selected {} entries", n)),
            GroupToggle::Deselected(n) => {
                self.notify(MessageType::Info, format!("Deselected {} entries", n))
            }
            GroupToggle::Nothing => {
                self.notify(MessageType::Warning, "Nothing here can be selected")
            }
        }
    }

    fn refuse_if_month_locked(&mut self) -> bool {
        if self.session.month_locked() {
            self.notify(
                MessageType::Warning,
                "This month has been submitted for approval and is locked",
            );
            return true;
        }
        false
    }

    fn start_add(&mut self) {
        if self.refuse_if_month_locked() {
            return;
        }
        self.form = Some(self.session.new_entry_form());
        self.mode = AppMode::Form;
        self.notify(
            MessageType::Info,
            "Add mode - Tab to navigate fields, Enter to save, Esc to cancel",
        );
    }

    fn start_edit(&mut self) {
        let Some(entry) = self.current_entry() else {
            return;
        };
        match self.session.edit_entry_form(&entry.id) {
            Ok(form) => {
                self.form = Some(form);
                self.mode = AppMode::Form;
                self.notify(
                    MessageType::Info,
                    "Edit mode - Tab to navigate fields, Enter to save, Esc to cancel",
                );
            }
            Err(e) => self.notify_error("Cannot edit entry", &e),
        }
    }

    async fn duplicate_current(&mut self) {
        if self.refuse_if_month_locked() {
            return;
        }
        let Some(entry) = self.current_entry() else {
            return;
        };
        match self.session.duplicate_entry(&entry.id).await {
            Ok(copy) => self.notify(
                MessageType::Success,
                format!("Entry duplicated as {}", copy.id),
            ),
            Err(e) => self.notify_error("Failed to duplicate entry", &e),
        }
    }

    fn start_delete(&mut self) {
        let Some(entry) = self.current_entry() else {
            return;
        };
        match self.session.guard_entry(&entry.id) {
            Ok(_) => {
                self.mode = AppMode::ConfirmDelete;
                self.notify(
                    MessageType::Warning,
                    "DELETE CONFIRMATION - Press 'y' to confirm, any other key to cancel",
                );
            }
            Err(refusal) => {
                self.notify_error("Cannot delete entry", &TimesheetError::Refused(refusal))
            }
        }
    }

    fn propose_next_status(&mut self) {
        let Some(entry) = self.current_entry() else {
            return;
        };
        match self.session.propose_status(&entry.id, entry.status.next()) {
            Ok(Proposal::AwaitingConfirmation(change)) => {
                self.message_input.reset();
                self.mode = AppMode::ConfirmStatus;
                self.notify(
                    MessageType::Info,
                    format!(
                        "Change {} from {} to {}? Enter to confirm, Esc to cancel",
                        change.entry_id, change.from, change.to
                    ),
                );
            }
            Ok(Proposal::Unchanged) => {}
            Err(e) => self.notify_error("Cannot change status", &e),
        }
    }

    fn start_bulk(&mut self, action: BulkAction) {
        if self.session.selection().is_empty() {
            self.notify(MessageType::Warning, "No entries are selected");
            return;
        }
        self.message_input.reset();
        self.mode = AppMode::ConfirmBulk(action);
        self.notify(
            MessageType::Warning,
            format!(
                "Bulk {} of {} entries - Enter to confirm, Esc to cancel",
                action,
                self.session.selection().len()
            ),
        );
    }

    fn start_submit(&mut self) {
        if !self.session.can(Action::RequestApproval) {
            self.notify(MessageType::Warning, "Your role does not request approvals");
            return;
        }
        if self.session.month_locked() {
            self.notify(
                MessageType::Warning,
                "This month has already been submitted for approval",
            );
            return;
        }
        self.mode = AppMode::ConfirmSubmit;
        self.notify(
            MessageType::Warning,
            format!(
                "Request approval for {}? Entries will be locked. Press 'y' to confirm",
                self.session.filters().month.label()
            ),
        );
    }

    fn cycle_status_filter(&mut self) {
        let next = match self.session.filters().status {
            None => Some(EntryStatus::Pending),
            Some(EntryStatus::Rejected) => None,
            Some(status) => Some(status.next()),
        };
        match self.session.set_status_filter(next) {
            Ok(()) => {
                self.cursor = 0;
                let label = next.map_or("all".to_string(), |s| s.to_string());
                self.notify(MessageType::Info, format!("Status filter: {}", label));
            }
            Err(e) => self.notify_error("Cannot filter", &e),
        }
    }

    fn cycle_project_filter(&mut self) {
        let options: Vec<String> = self.session.projects().iter().map(|p| p.id.clone()).collect();
        let next = next_option(self.session.filters().project_id.as_deref(), &options);
        match self.session.set_project_filter(next.clone()) {
            Ok(()) => {
                self.cursor = 0;
                let label = next.map_or("all".to_string(), |id| {
                    self.session.project_name(&id).to_string()
                });
                self.notify(MessageType::Info, format!("Project filter: {}", label));
            }
            Err(e) => self.notify_error("Cannot filter", &e),
        }
    }

    fn cycle_user_filter(&mut self) {
        let options: Vec<String> = self.session.users().iter().map(|u| u.id.clone()).collect();
        let next = next_option(self.session.filters().user_id.as_deref(), &options);
        match self.session.set_user_filter(next.clone()) {
            Ok(()) => {
                self.cursor = 0;
                let label = next.map_or("all".to_string(), |id| {
                    self.session.user_name(&id).to_string()
                });
                self.notify(MessageType::Info, format!("User filter: {}", label));
            }
            Err(e) => self.notify_error("Cannot filter", &e),
        }
    }

    async fn handle_form_mode(&mut self, event: KeyEvent) {
        let Some(form) = self.form.as_mut() else {
            self.mode = AppMode::Browse;
            return;
        };
        let options: Vec<String> = match form.current_field {
            FormField::User => self.session.users().iter().map(|u| u.id.clone()).collect(),
            FormField::Project => self.session.projects().iter().map(|p| p.id.clone()).collect(),
            _ => Vec::new(),
        };

        match event.code {
            KeyCode::Esc => {
                let what = if form.is_edit() { "Edit" } else { "Add" };
                self.form = None;
                self.mode = AppMode::Browse;
                self.notify(MessageType::Info, format!("{} cancelled", what));
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Left if form.current_field.is_choice() => form.cycle_choice(&options, false),
            KeyCode::Right if form.current_field.is_choice() => form.cycle_choice(&options, true),
            KeyCode::Left => form.move_cursor_left(),
            KeyCode::Right => form.move_cursor_right(),
            KeyCode::Char(' ') if form.current_field.is_choice() => {
                form.cycle_choice(&options, true)
            }
            KeyCode::Char(c) => form.insert_char(c),
            KeyCode::Backspace => form.delete_char_before(),
            KeyCode::Enter => self.save_form().await,
            _ => {}
        }
    }

    async fn save_form(&mut self) {
        let Some(mut form) = self.form.take() else {
            return;
        };
        // Leaving the time field completes a partial value
        let field = form.current_field;
        form.focus(field);

        let outcome = if form.is_edit() {
            self.session.edit_entry(&form).await
        } else {
            self.session.create_entry(&form).await
        };

        match outcome {
            Ok(entry) => {
                let verb = if form.is_edit() { "updated" } else { "added" };
                self.mode = AppMode::Browse;
                self.notify(MessageType::Success, format!("Entry {} {}", entry.id, verb));
                self.clamp_cursor();
            }
            Err(TimesheetError::Form(errors)) => {
                self.notify(MessageType::Error, format!("Validation error: {}", errors));
                form.errors = errors;
                self.form = Some(form);
            }
            Err(e) => {
                self.mode = AppMode::Browse;
                self.notify_error("Failed to save entry", &e);
                self.clamp_cursor();
            }
        }
    }

    async fn handle_status_mode(&mut self, event: KeyEvent) {
        match event.code {
            KeyCode::Enter => {
                let message = self.message_input.value().trim().to_string();
                let message = (!message.is_empty()).then_some(message);
                self.mode = AppMode::Browse;
                match self.session.confirm_status(message).await {
                    Ok(entry) => self.notify(
                        MessageType::Success,
                        format!("Entry {} is now {}", entry.id, entry.status),
                    ),
                    Err(e) => self.notify_error("Failed to change status", &e),
                }
                self.clamp_cursor();
            }
            KeyCode::Esc => {
                self.mode = AppMode::Browse;
                match self.session.cancel_status().await {
                    Ok(()) => self.notify(MessageType::Info, "Status change cancelled"),
                    Err(e) => self.notify_error("Refresh failed", &e),
                }
                self.clamp_cursor();
            }
            _ => {
                self.message_input.handle_event(&Event::Key(event));
            }
        }
    }

    async fn handle_delete_mode(&mut self, event: KeyEvent) {
        self.mode = AppMode::Browse;
        if !matches!(event.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
            self.notify(MessageType::Info, "Delete cancelled");
            return;
        }
        let Some(entry) = self.current_entry() else {
            return;
        };
        match self.session.delete_entry(&entry.id).await {
            Ok(()) => self.notify(MessageType::Success, "Entry deleted successfully"),
            Err(e) => self.notify_error("Failed to delete entry", &e),
        }
        self.clamp_cursor();
    }

    async fn handle_bulk_mode(&mut self, event: KeyEvent, action: BulkAction) {
        match event.code {
            KeyCode::Enter => {
                let message = self.message_input.value().trim().to_string();
                let message = (!message.is_empty() && action != BulkAction::Delete).then_some(message);
                self.mode = AppMode::Browse;
                match self.session.bulk(action, message).await {
                    Ok(report) => self.notify(
                        MessageType::Success,
                        format!("Bulk {} applied to {} entries", report.action, report.attempted),
                    ),
                    Err(e) => self.notify_error(&format!("Bulk {} failed", action), &e),
                }
                self.clamp_cursor();
            }
            KeyCode::Esc => {
                self.mode = AppMode::Browse;
                self.notify(MessageType::Info, format!("Bulk {} cancelled", action));
            }
            _ => {
                self.message_input.handle_event(&Event::Key(event));
            }
        }
    }

    async fn handle_submit_mode(&mut self, event: KeyEvent) {
        self.mode = AppMode::Browse;
        if !matches!(event.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
            self.notify(MessageType::Info, "Approval request cancelled");
            return;
        }
        match self.session.request_approval().await {
            Ok(request) => self.notify(
                MessageType::Success,
                format!(
                    "Submitted for approval: {} entries locked",
                    request.associated
                ),
            ),
            Err(e) => self.notify_error("Approval request failed", &e),
        }
    }
}

/// Steps an optional filter through `options`, wrapping back to "all"
fn next_option(current: Option<&str>, options: &[String]) -> Option<String> {
    match current.and_then(|c| options.iter().position(|o| o == c)) {
        None => options.first().cloned(),
        Some(i) => options.get(i + 1).cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use timesheet::filters::MemoryFilterStore;
    use timesheet::memory::InMemoryRepository;
    use timesheet::models::Role;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    async fn app(role: Role) -> App<InMemoryRepository, MemoryFilterStore> {
        let repo = InMemoryRepository::seeded_demo(role);
        let session = TimesheetSession::open(repo, MemoryFilterStore::new())
            .await
            .unwrap();
        App::new(session)
    }

    #[tokio::test]
    async fn test_status_change_with_message() {
        let mut app = app(Role::Manager).await;
        let entry = app.current_entry().unwrap();
        assert_eq!(entry.status, EntryStatus::Pending);

        app.handle_event(key(KeyCode::Char('s'))).await.unwrap();
        assert_eq!(app.mode, AppMode::ConfirmStatus);
        for c in "ok".chars() {
            app.handle_event(key(KeyCode::Char(c))).await.unwrap();
        }
        app.handle_event(key(KeyCode::Enter)).await.unwrap();

        assert_eq!(app.mode, AppMode::Browse);
        let updated = app.session.find_entry(&entry.id).unwrap();
        assert_eq!(updated.status, EntryStatus::Approved);
        assert_eq!(updated.status_description.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_cancelled_status_change_writes_nothing() {
        let mut app = app(Role::Manager).await;
        app.session.repository().clear_calls();

        app.handle_event(key(KeyCode::Char('s'))).await.unwrap();
        app.handle_event(key(KeyCode::Esc)).await.unwrap();

        assert_eq!(app.mode, AppMode::Browse);
        assert!(app.session.pending_change().is_none());
        assert!(app.session.repository().write_calls().is_empty());
    }

    #[tokio::test]
    async fn test_consultant_cannot_propose_status() {
        let mut app = app(Role::Consultant).await;
        app.handle_event(key(KeyCode::Char('s'))).await.unwrap();
        assert_eq!(app.mode, AppMode::Browse);
        let last = app.messages.last().unwrap();
        assert_eq!(last.message_type, MessageType::Warning);
    }

    #[tokio::test]
    async fn test_submitted_month_blocks_add_and_duplicate() {
        let mut app = app(Role::Consultant).await;
        app.handle_event(key(KeyCode::Char('r'))).await.unwrap();
        assert_eq!(app.mode, AppMode::ConfirmSubmit);
        app.handle_event(key(KeyCode::Char('y'))).await.unwrap();
        assert!(app.session.month_locked());
        app.session.repository().clear_calls();

        app.handle_event(key(KeyCode::Char('a'))).await.unwrap();
        assert_eq!(app.mode, AppMode::Browse);
        assert!(app.form.is_none());

        app.handle_event(key(KeyCode::Char('c'))).await.unwrap();
        assert!(app.session.repository().write_calls().is_empty());
        let last = app.messages.last().unwrap();
        assert_eq!(last.message_type, MessageType::Warning);
    }

    #[tokio::test]
    async fn test_bulk_requires_selection() {
        let mut app = app(Role::Admin).await;
        app.handle_event(key(KeyCode::Char('b'))).await.unwrap();
        assert_eq!(app.mode, AppMode::Browse);

        app.handle_event(key(KeyCode::Char('A'))).await.unwrap();
        assert!(!app.session.selection().is_empty());
        app.handle_event(key(KeyCode::Char('b'))).await.unwrap();
        assert_eq!(app.mode, AppMode::ConfirmBulk(BulkAction::Approve));
        app.handle_event(key(KeyCode::Enter)).await.unwrap();

        assert!(app.session.selection().is_empty());
        let ids = app.visible_ids();
        assert!(ids
            .iter()
            .all(|id| app.session.find_entry(id).unwrap().status == EntryStatus::Approved));
    }

    #[tokio::test]
    async fn test_quit_and_help() {
        let mut app = app(Role::Consultant).await;
        assert!(app.handle_event(key(KeyCode::Char('?'))).await.unwrap());
        assert_eq!(app.mode, AppMode::Help);
        assert!(app.handle_event(key(KeyCode::Char('x'))).await.unwrap());
        assert_eq!(app.mode, AppMode::Browse);
        assert!(!app.handle_event(key(KeyCode::Char('q'))).await.unwrap());
    }

    #[test]
    fn test_next_option_wraps_to_all() {
        let options = vec!["a".to_string(), "b".to_string()];
        assert_eq!(next_option(None, &options).as_deref(), Some("a"));
        assert_eq!(next_option(Some("a"), &options).as_deref(), Some("b"));
        assert_eq!(next_option(Some("b"), &options), None);
        assert_eq!(next_option(Some("gone"), &options).as_deref(), Some("a"));
    }
}
