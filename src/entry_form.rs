//! Create/edit form state and its client-side validation

use chrono::NaiveDate;

use crate::error::{FieldErrors, ValidationError};
use crate::models::{Actor, EntryPatch, EntryStatus, NewEntry, TimeEntry};
use crate::policy::{can, Action};
use crate::time_mask;
use crate::utils::{non_blank, parse_date};

/// Form field types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    User,
    Project,
    Date,
    Time,
    ActivityType,
    Notes,
    Status,
}

impl FormField {
    /// Fields in display order; owner and status are only offered to roles
    /// that may assign them
    pub fn all(assign_owner: bool) -> Vec<FormField> {
        let mut fields = Vec::with_capacity(7);
        if assign_owner {
            fields.push(FormField::User);
        }
        fields.extend([
            FormField::Project,
            FormField::Date,
            FormField::Time,
            FormField::ActivityType,
            FormField::Notes,
        ]);
        if assign_owner {
            fields.push(FormField::Status);
        }
        fields
    }

    /// Get field label
    pub fn label(&self) -> &'static str {
        match self {
            FormField::User => "User",
            FormField::Project => "Project",
            FormField::Date => "Date",
            FormField::Time => "Time (HH:MM)",
            FormField::ActivityType => "Activity Type",
            FormField::Notes => "Notes",
            FormField::Status => "Status",
        }
    }

    /// Key under which validation messages are collected
    pub fn key(&self) -> &'static str {
        match self {
            FormField::User => "user",
            FormField::Project => "project",
            FormField::Date => "date",
            FormField::Time => "time",
            FormField::ActivityType => "activity",
            FormField::Notes => "notes",
            FormField::Status => "status",
        }
    }

    /// Picked from a list rather than typed
    pub fn is_choice(&self) -> bool {
        matches!(self, FormField::User | FormField::Project | FormField::Status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit {
        entry_id: String,
        original_status: EntryStatus,
    },
}

/// A form that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidEntry {
    pub user_id: String,
    pub project_id: String,
    pub date: NaiveDate,
    pub hours: f64,
    pub activity_type: String,
    pub notes: Option<String>,
    /// `None` when the actor may not choose a status
    pub status: Option<EntryStatus>,
}

#[derive(Debug, Clone)]
pub struct EntryForm {
    pub mode: FormMode,
    pub user_id: String,
    pub project_id: String,
    pub date: String,
    pub time: String,
    pub activity_type: String,
    pub notes: String,
    pub status: EntryStatus,
    pub current_field: FormField,
    /// In characters, for the text fields
    pub cursor_position: usize,
    pub errors: FieldErrors,
    assign_owner: bool,
}

impl EntryForm {
    /// Empty form for a new entry owned by the actor
    pub fn new(actor: &Actor, date: NaiveDate) -> Self {
        let assign_owner = can(actor.role, Action::AssignOwner);
        EntryForm {
            mode: FormMode::Create,
            user_id: actor.id.clone(),
            project_id: String::new(),
            date: date.format("%Y-%m-%d").to_string(),
            time: String::new(),
            activity_type: String::new(),
            notes: String::new(),
            status: EntryStatus::Pending,
            current_field: FormField::all(assign_owner)[0],
            cursor_position: 0,
            errors: FieldErrors::new(),
            assign_owner,
        }
    }

    /// Create form from existing entry
    pub fn for_edit(actor: &Actor, entry: &TimeEntry) -> Self {
        let mut form = Self::new(actor, entry.date);
        form.mode = FormMode::Edit {
            entry_id: entry.id.clone(),
            original_status: entry.status,
        };
        form.user_id = entry.user_id.clone();
        form.project_id = entry.project_id.clone();
        form.time = time_mask::to_masked(entry.hours);
        form.activity_type = entry.activity_type.clone();
        form.notes = entry.notes.clone().unwrap_or_default();
        form.status = entry.status;
        form.update_cursor_for_field();
        form
    }

    pub fn is_edit(&self) -> bool {
        matches!(self.mode, FormMode::Edit { .. })
    }

    pub fn fields(&self) -> Vec<FormField> {
        FormField::all(self.assign_owner)
    }

    /// Get the current field value
    pub fn value(&self, field: FormField) -> &str {
        match field {
            FormField::User => &self.user_id,
            FormField::Project => &self.project_id,
            FormField::Date => &self.date,
            FormField::Time => &self.time,
            FormField::ActivityType => &self.activity_type,
            FormField::Notes => &self.notes,
            FormField::Status => self.status.as_str(),
        }
    }

    fn text_mut(&mut self, field: FormField) -> Option<&mut String> {
        match field {
            FormField::Date => Some(&mut self.date),
            FormField::ActivityType => Some(&mut self.activity_type),
            FormField::Notes => Some(&mut self.notes),
            _ => None,
        }
    }

    /// Move focus, completing a partial time value when it leaves the time field
    pub fn focus(&mut self, field: FormField) {
        if self.current_field == FormField::Time && field != FormField::Time {
            self.time = time_mask::complete_partial(&self.time);
        }
        self.current_field = field;
        self.update_cursor_for_field();
    }

    /// Move to next field
    pub fn next_field(&mut self) {
        let fields = self.fields();
        let index = fields
            .iter()
            .position(|f| *f == self.current_field)
            .unwrap_or(0);
        self.focus(fields[(index + 1) % fields.len()]);
    }

    /// Move to previous field
    pub fn previous_field(&mut self) {
        let fields = self.fields();
        let index = fields
            .iter()
            .position(|f| *f == self.current_field)
            .unwrap_or(0);
        self.focus(fields[(index + fields.len() - 1) % fields.len()]);
    }

    /// Insert character at cursor position; the time field is re-masked instead
    pub fn insert_char(&mut self, c: char) {
        if self.current_field == FormField::Time {
            self.time = time_mask::apply_mask(&format!("{}{}", self.time, c));
            self.cursor_position = self.time.chars().count();
            return;
        }
        let pos = self.cursor_position;
        if let Some(field) = self.text_mut(self.current_field) {
            let at = byte_index(field, pos);
            field.insert(at, c);
            self.cursor_position = pos + 1;
        }
    }

    /// Delete character before cursor (backspace)
    pub fn delete_char_before(&mut self) {
        if self.current_field == FormField::Time {
            let mut digits: String = self.time.chars().filter(|c| c.is_ascii_digit()).collect();
            digits.pop();
            self.time = time_mask::apply_mask(&digits);
            self.cursor_position = self.time.chars().count();
            return;
        }
        let pos = self.cursor_position;
        if pos == 0 {
            return;
        }
        if let Some(field) = self.text_mut(self.current_field) {
            let pos = pos.min(field.chars().count());
            if pos > 0 {
                let at = byte_index(field, pos - 1);
                field.remove(at);
                self.cursor_position = pos - 1;
            }
        }
    }

    /// Move cursor left
    pub fn move_cursor_left(&mut self) {
        self.cursor_position = self.cursor_position.saturating_sub(1);
    }

    /// Move cursor right
    pub fn move_cursor_right(&mut self) {
        let field_len = self.value(self.current_field).chars().count();
        if self.cursor_position < field_len {
            self.cursor_position += 1;
        }
    }

    /// Update cursor position when changing fields
    pub fn update_cursor_for_field(&mut self) {
        self.cursor_position = self.value(self.current_field).chars().count();
    }

    /// Steps a choice field through `options` (user or project ids); the status
    /// field cycles through the entry statuses
    pub fn cycle_choice(&mut self, options: &[String], forward: bool) {
        match self.current_field {
            FormField::Status => {
                self.status = if forward {
                    self.status.next()
                } else {
                    self.status.next().next()
                };
            }
            FormField::User | FormField::Project => {
                if options.is_empty() {
                    return;
                }
                let current = self.value(self.current_field).to_string();
                let next = match options.iter().position(|o| *o == current) {
                    Some(i) if forward => (i + 1) % options.len(),
                    Some(i) => (i + options.len() - 1) % options.len(),
                    None => 0,
                };
                let chosen = options[next].clone();
                if self.current_field == FormField::User {
                    self.user_id = chosen;
                } else {
                    self.project_id = chosen;
                }
            }
            _ => {}
        }
    }

    /// Checks every field and collects one message per offending field
    pub fn validate(&self, actor: &Actor) -> Result<ValidEntry, FieldErrors> {
        let mut errors = FieldErrors::new();

        let user_id = if self.assign_owner {
            non_blank(&self.user_id).unwrap_or_else(|| {
                errors.add("user", "Select a user");
                String::new()
            })
        } else {
            actor.id.clone()
        };

        let project_id = non_blank(&self.project_id).unwrap_or_else(|| {
            errors.add("project", "Select a project");
            String::new()
        });

        let date = match parse_date(&self.date) {
            Ok(date) => Some(date),
            Err(e) => {
                errors.add("date", e.to_string());
                None
            }
        };

        let time = time_mask::complete_partial(&self.time);
        let hours = match time_mask::validate_duration(&time) {
            Ok(hours) => Some(hours),
            Err(e) => {
                let message = match e {
                    ValidationError::MissingField(_) => "Time is required".to_string(),
                    other => other.to_string(),
                };
                errors.add("time", message);
                None
            }
        };

        let activity_type = non_blank(&self.activity_type).unwrap_or_else(|| {
            errors.add("activity", "Activity type is required");
            String::new()
        });

        errors.into_result()?;

        match (date, hours) {
            (Some(date), Some(hours)) => Ok(ValidEntry {
                user_id,
                project_id,
                date,
                hours,
                activity_type,
                notes: non_blank(&self.notes),
                status: self.assign_owner.then_some(self.status),
            }),
            // date and time failures were recorded above
            _ => Err(FieldErrors::new()),
        }
    }

    /// Payload for creating the entry
    pub fn to_new_entry(&self, actor: &Actor) -> Result<NewEntry, FieldErrors> {
        let valid = self.validate(actor)?;
        Ok(NewEntry {
            user_id: valid.user_id,
            project_id: valid.project_id,
            date: valid.date,
            hours: valid.hours,
            activity_type: valid.activity_type,
            notes: valid.notes,
            status: valid.status.unwrap_or(EntryStatus::Pending),
        })
    }

    /// Payload for editing; owner and status are only sent by roles that may
    /// assign them, and status only when it changed
    pub fn to_patch(
        &self,
        actor: &Actor,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<EntryPatch, FieldErrors> {
        let valid = self.validate(actor)?;
        let original_status = match &self.mode {
            FormMode::Edit {
                original_status, ..
            } => Some(*original_status),
            FormMode::Create => None,
        };

        let mut patch = match valid.status {
            Some(status) if Some(status) != original_status => {
                EntryPatch::status_change(status, None, &actor.id, now)
            }
            _ => EntryPatch::default(),
        };
        if self.assign_owner {
            patch.user_id = Some(valid.user_id);
        }
        patch.project_id = Some(valid.project_id);
        patch.date = Some(valid.date);
        patch.hours = Some(valid.hours);
        patch.activity_type = Some(valid.activity_type);
        patch.notes = Some(valid.notes.unwrap_or_default());
        Ok(patch)
    }
}

/// New entry copying an existing one: same owner, project, date, hours,
/// activity and notes, back to PENDING with no approval or submission data
pub fn duplicate_of(entry: &TimeEntry) -> NewEntry {
    NewEntry {
        user_id: entry.user_id.clone(),
        project_id: entry.project_id.clone(),
        date: entry.date,
        hours: entry.hours,
        activity_type: entry.activity_type.clone(),
        notes: entry.notes.clone(),
        status: EntryStatus::Pending,
    }
}

fn byte_index(s: &str, char_pos: usize) -> usize {
    s.char_indices()
        .nth(char_pos)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::test_data::{actor, entry};
    use chrono::Utc;

    fn march_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn filled(actor: &Actor) -> EntryForm {
        let mut form = EntryForm::new(actor, march_first());
        form.project_id = "p1".to_string();
        form.time = "07:30".to_string();
        form.activity_type = "Development".to_string();
        form
    }

    #[test]
    fn test_fields_depend_on_role() {
        let consultant = EntryForm::new(&actor("c1", Role::Consultant), march_first());
        assert_eq!(consultant.fields().len(), 5);
        assert_eq!(consultant.current_field, FormField::Project);

        let admin = EntryForm::new(&actor("a1", Role::Admin), march_first());
        assert_eq!(admin.fields().first(), Some(&FormField::User));
        assert_eq!(admin.fields().last(), Some(&FormField::Status));
    }

    #[test]
    fn test_time_field_is_masked_while_typing() {
        let mut form = EntryForm::new(&actor("c1", Role::Consultant), march_first());
        form.focus(FormField::Time);
        for c in "0x83".chars() {
            form.insert_char(c);
        }
        assert_eq!(form.time, "08:3");
        form.delete_char_before();
        assert_eq!(form.time, "08");

        form.next_field();
        assert_eq!(form.time, "08:00");
        assert_eq!(form.current_field, FormField::ActivityType);
    }

    #[test]
    fn test_text_editing_handles_multibyte_characters() {
        let mut form = EntryForm::new(&actor("c1", Role::Consultant), march_first());
        form.focus(FormField::Notes);
        for c in "Über".chars() {
            form.insert_char(c);
        }
        form.move_cursor_left();
        form.move_cursor_left();
        form.delete_char_before();
        assert_eq!(form.notes, "Üer");
        assert_eq!(form.cursor_position, 1);
    }

    #[test]
    fn test_validation_collects_every_field() {
        let admin = actor("a1", Role::Admin);
        let mut form = EntryForm::new(&admin, march_first());
        form.user_id.clear();
        form.date = "01/03/2024".to_string();
        form.time = "00:00".to_string();

        let errors = form.validate(&admin).unwrap_err();
        assert_eq!(errors.get("user"), Some("Select a user"));
        assert_eq!(errors.get("project"), Some("Select a project"));
        assert!(errors.get("date").is_some());
        assert_eq!(errors.get("time"), Some("Duration must be greater than 00:00"));
        assert_eq!(errors.get("activity"), Some("Activity type is required"));
    }

    #[test]
    fn test_empty_time_is_rejected_and_one_minute_accepted() {
        let consultant = actor("c1", Role::Consultant);
        let mut form = filled(&consultant);
        form.time.clear();
        assert_eq!(
            form.validate(&consultant).unwrap_err().get("time"),
            Some("Time is required")
        );

        form.time = "00:01".to_string();
        assert!(form.validate(&consultant).is_ok());
    }

    #[test]
    fn test_consultant_is_forced_to_own_user_and_pending() {
        let consultant = actor("c1", Role::Consultant);
        let mut form = filled(&consultant);
        form.user_id = "someone-else".to_string();
        form.status = EntryStatus::Approved;

        let new = form.to_new_entry(&consultant).unwrap();
        assert_eq!(new.user_id, "c1");
        assert_eq!(new.status, EntryStatus::Pending);
        assert_eq!(new.hours, 7.5);
        assert_eq!(new.notes, None);
    }

    #[test]
    fn test_edit_patch_sends_status_only_when_changed() {
        let admin = actor("a1", Role::Admin);
        let existing = entry("e1", "u1", "2024-03-01", 2.0);
        let mut form = EntryForm::for_edit(&admin, &existing);
        assert_eq!(form.time, "02:00");

        let patch = form.to_patch(&admin, Utc::now()).unwrap();
        assert_eq!(patch.status, None);
        assert_eq!(patch.user_id.as_deref(), Some("u1"));

        form.focus(FormField::Status);
        form.cycle_choice(&[], true);
        let patch = form.to_patch(&admin, Utc::now()).unwrap();
        assert_eq!(patch.status, Some(EntryStatus::Approved));
        assert_eq!(patch.approver_id, Some(Some("a1".to_string())));

        let consultant = actor("u1", Role::Consultant);
        let patch = EntryForm::for_edit(&consultant, &existing)
            .to_patch(&consultant, Utc::now())
            .unwrap();
        assert_eq!(patch.user_id, None);
        assert_eq!(patch.status, None);
    }

    #[test]
    fn test_cycle_choice_through_options() {
        let admin = actor("a1", Role::Admin);
        let mut form = EntryForm::new(&admin, march_first());
        form.focus(FormField::Project);
        let projects = vec!["p1".to_string(), "p2".to_string()];
        form.cycle_choice(&projects, true);
        assert_eq!(form.project_id, "p1");
        form.cycle_choice(&projects, true);
        assert_eq!(form.project_id, "p2");
        form.cycle_choice(&projects, false);
        assert_eq!(form.project_id, "p1");
    }

    #[test]
    fn test_duplicate_resets_status_and_metadata() {
        let mut original = entry("e1", "u1", "2024-03-01", 3.0);
        original.status = EntryStatus::Approved;
        original.approver_id = Some("a1".to_string());
        original.submission_id = Some("s1".to_string());
        original.notes = Some("pairing".to_string());

        let copy = duplicate_of(&original);
        assert_eq!(copy.status, EntryStatus::Pending);
        assert_eq!(copy.user_id, "u1");
        assert_eq!(copy.notes.as_deref(), Some("pairing"));
        assert_eq!(copy.hours, 3.0);
    }
}
