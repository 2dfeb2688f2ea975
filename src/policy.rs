//! Capability and lock policy
//!
//! One lookup decides what a role may do; data filtering, UI gating and the
//! pre-network guards all ask it instead of comparing roles themselves.

use std::fmt;

use crate::error::Refusal;
use crate::models::{Actor, Role, Submission, TimeEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// See other users' entries and use the user/project/status filters
    ViewAllUsers,
    /// Narrow the month view down to one exact date
    FilterByDate,
    /// Approve, reject or reset entries, alone or in bulk
    ChangeStatus,
    BulkDelete,
    /// Log time for someone else or pick the status in the entry form
    AssignOwner,
    RequestApproval,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Action::ViewAllUsers => "view other users' entries",
            Action::FilterByDate => "filter by exact date",
            Action::ChangeStatus => "change entry status",
            Action::BulkDelete => "delete entries in bulk",
            Action::AssignOwner => "log time for other users",
            Action::RequestApproval => "request approval",
        };
        f.write_str(text)
    }
}

pub fn can(role: Role, action: Action) -> bool {
    match action {
        Action::ViewAllUsers | Action::ChangeStatus | Action::AssignOwner => {
            !role.is_owner_restricted()
        }
        Action::FilterByDate => matches!(role, Role::Admin),
        Action::BulkDelete => true,
        Action::RequestApproval => role.is_owner_restricted(),
    }
}

/// `Err(NotPermitted)` unless the role holds the capability
pub fn require(role: Role, action: Action) -> Result<(), Refusal> {
    if can(role, action) {
        Ok(())
    } else {
        tracing::info!(%role, %action, "refused by capability policy");
        Err(Refusal::NotPermitted(action))
    }
}

/// A month is frozen for its owner once its submission left draft
pub fn is_month_locked(role: Role, submission: Option<&Submission>) -> bool {
    role.is_owner_restricted() && submission.is_some_and(|s| s.status.locks_month())
}

/// An entry is frozen for its owner as soon as it references a submission.
///
/// The referenced submission's current status is not consulted.
pub fn is_entry_locked(role: Role, entry: &TimeEntry) -> bool {
    role.is_owner_restricted() && entry.has_submission()
}

/// Guard for edit, delete, duplicate and select-for-bulk
pub fn check_entry_action(actor: &Actor, entry: &TimeEntry) -> Result<(), Refusal> {
    if !actor.role.is_owner_restricted() {
        return Ok(());
    }
    if entry.user_id != actor.id {
        tracing::info!(entry_id = %entry.id, actor = %actor.id, "refused: not the owner");
        return Err(Refusal::NotOwner);
    }
    if is_entry_locked(actor.role, entry) {
        tracing::info!(entry_id = %entry.id, "refused: entry is locked");
        return Err(Refusal::Locked);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryStatus, SubmissionStatus};
    use crate::test_data::{actor, entry};
    use rstest::rstest;

    fn submission(status: SubmissionStatus) -> Submission {
        crate::test_data::submission("s1", "c1", 2024, 3, status)
    }

    #[rstest]
    #[case(Role::Admin, Action::FilterByDate, true)]
    #[case(Role::Manager, Action::FilterByDate, false)]
    #[case(Role::Consultant, Action::FilterByDate, false)]
    #[case(Role::Manager, Action::ChangeStatus, true)]
    #[case(Role::Consultant, Action::ChangeStatus, false)]
    #[case(Role::Consultant, Action::BulkDelete, true)]
    #[case(Role::Consultant, Action::RequestApproval, true)]
    #[case(Role::Admin, Action::RequestApproval, false)]
    #[case(Role::Consultant, Action::ViewAllUsers, false)]
    #[case(Role::Consultant, Action::AssignOwner, false)]
    fn test_capabilities(#[case] role: Role, #[case] action: Action, #[case] allowed: bool) {
        assert_eq!(can(role, action), allowed);
        assert_eq!(require(role, action).is_ok(), allowed);
    }

    #[rstest]
    #[case(None, false)]
    #[case(Some(SubmissionStatus::Draft), false)]
    #[case(Some(SubmissionStatus::Submitted), true)]
    #[case(Some(SubmissionStatus::ChangesRequested), true)]
    #[case(Some(SubmissionStatus::Approved), true)]
    fn test_month_lock_for_consultant(
        #[case] status: Option<SubmissionStatus>,
        #[case] locked: bool,
    ) {
        let submission = status.map(submission);
        assert_eq!(is_month_locked(Role::Consultant, submission.as_ref()), locked);
        assert!(!is_month_locked(Role::Admin, submission.as_ref()));
    }

    #[test]
    fn test_entry_lock_ignores_status() {
        for status in EntryStatus::ALL {
            let mut e = entry("e1", "c1", "2024-03-01", 1.0);
            e.status = status;
            e.submission_id = Some("s1".to_string());
            assert!(is_entry_locked(Role::Consultant, &e));
            assert!(!is_entry_locked(Role::Admin, &e));
            assert!(!is_entry_locked(Role::Manager, &e));
        }
    }

    #[test]
    fn test_check_entry_action() {
        let consultant = actor("c1", Role::Consultant);
        let own = entry("e1", "c1", "2024-03-01", 1.0);
        let foreign = entry("e2", "c2", "2024-03-01", 1.0);
        let mut locked = entry("e3", "c1", "2024-03-01", 1.0);
        locked.submission_id = Some("s1".to_string());

        assert_eq!(check_entry_action(&consultant, &own), Ok(()));
        assert_eq!(check_entry_action(&consultant, &foreign), Err(Refusal::NotOwner));
        assert_eq!(check_entry_action(&consultant, &locked), Err(Refusal::Locked));

        let admin = actor("a1", Role::Admin);
        assert_eq!(check_entry_action(&admin, &foreign), Ok(()));
        assert_eq!(check_entry_action(&admin, &locked), Ok(()));
    }
}
