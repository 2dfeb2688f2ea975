//! Status changes, single-entry and bulk
//!
//! A single-entry change is two-phase: `propose_status` records the change,
//! then `confirm_status` persists it or `cancel_status` drops it. Both end in a
//! refetch, so the displayed status never diverges from the backend.

use std::fmt;

use chrono::Utc;
use futures::future::join_all;

use crate::error::{Refusal, Result, TimesheetError};
use crate::filters::FilterStore;
use crate::models::{EntryPatch, EntryStatus, TimeEntry};
use crate::policy::{check_entry_action, require, Action};
use crate::repository::TimesheetRepository;
use crate::session::TimesheetSession;

/// A proposed status change waiting for confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChange {
    pub entry_id: String,
    pub from: EntryStatus,
    pub to: EntryStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Proposal {
    /// The entry already has the requested status; nothing to confirm
    Unchanged,
    AwaitingConfirmation(PendingChange),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    Approve,
    Reject,
    Delete,
}

impl BulkAction {
    fn capability(self) -> Action {
        match self {
            BulkAction::Approve | BulkAction::Reject => Action::ChangeStatus,
            BulkAction::Delete => Action::BulkDelete,
        }
    }

    fn target_status(self) -> Option<EntryStatus> {
        match self {
            BulkAction::Approve => Some(EntryStatus::Approved),
            BulkAction::Reject => Some(EntryStatus::Rejected),
            BulkAction::Delete => None,
        }
    }
}

impl fmt::Display for BulkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BulkAction::Approve => "approve",
            BulkAction::Reject => "reject",
            BulkAction::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Outcome of a bulk action in which every call succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub action: BulkAction,
    pub attempted: usize,
}

impl<R: TimesheetRepository, S: FilterStore> TimesheetSession<R, S> {
    /// First phase of a single-entry status change; makes no backend call
    pub fn propose_status(&mut self, entry_id: &str, status: EntryStatus) -> Result<Proposal> {
        require(self.actor.role, Action::ChangeStatus)?;
        let entry = self
            .find_entry(entry_id)
            .ok_or_else(|| Refusal::UnknownEntry(entry_id.to_string()))?;

        if entry.status == status {
            self.pending = None;
            return Ok(Proposal::Unchanged);
        }

        let change = PendingChange {
            entry_id: entry.id.clone(),
            from: entry.status,
            to: status,
        };
        self.pending = Some(change.clone());
        Ok(Proposal::AwaitingConfirmation(change))
    }

    /// Persists the pending change with an optional message, then refetches
    pub async fn confirm_status(&mut self, message: Option<String>) -> Result<TimeEntry> {
        let change = self.pending.take().ok_or(Refusal::NoPendingChange)?;
        let patch = EntryPatch::status_change(change.to, message, &self.actor.id, Utc::now());
        tracing::debug!(entry_id = %change.entry_id, from = %change.from, to = %change.to, "confirming status change");

        let outcome = self.repo.update_entry(&change.entry_id, &patch).await;
        self.settle(outcome).await
    }

    /// Drops the pending change and refetches without persisting anything
    pub async fn cancel_status(&mut self) -> Result<()> {
        if let Some(change) = self.pending.take() {
            tracing::debug!(entry_id = %change.entry_id, "status change cancelled");
        }
        self.refresh().await
    }

    /// Applies `action` to every selected entry with independent calls.
    ///
    /// A bulk delete is aborted before any call when a selected entry is
    /// locked. Otherwise the selection is cleared and the data refetched,
    /// whatever the individual outcomes were.
    pub async fn bulk(&mut self, action: BulkAction, message: Option<String>) -> Result<BatchReport> {
        require(self.actor.role, action.capability())?;
        let ids: Vec<String> = self.selection.ids().map(str::to_string).collect();
        if ids.is_empty() {
            return Err(Refusal::NothingSelected.into());
        }

        if action == BulkAction::Delete {
            let blocked = ids
                .iter()
                .filter_map(|id| self.find_entry(id))
                .filter(|entry| check_entry_action(&self.actor, entry).is_err())
                .count();
            if blocked > 0 {
                tracing::info!(blocked, "bulk delete aborted: selection contains locked entries");
                return Err(Refusal::LockedSelection { blocked }.into());
            }
        }

        let patch = action
            .target_status()
            .map(|status| EntryPatch::status_change(status, message, &self.actor.id, Utc::now()));
        let repo = &self.repo;
        let calls = ids.iter().map(|id| {
            let patch = patch.as_ref();
            async move {
                let outcome = match patch {
                    Some(patch) => repo.update_entry(id, patch).await.map(|_| ()),
                    None => repo.delete_entry(id).await,
                };
                if let Err(e) = &outcome {
                    tracing::warn!(entry_id = %id, error = %e, "bulk call failed");
                }
                outcome
            }
        });
        let failed = join_all(calls)
            .await
            .into_iter()
            .filter(|outcome| outcome.is_err())
            .count();

        let total = ids.len();
        tracing::info!(%action, attempted = total, failed, "bulk action finished");

        self.selection.clear();
        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "refresh after bulk action failed");
        }

        if failed > 0 {
            Err(TimesheetError::Batch { failed, total })
        } else {
            Ok(BatchReport {
                action,
                attempted: total,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::MemoryFilterStore;
    use crate::memory::{Call, InMemoryRepository};
    use crate::models::{Role, YearMonth};
    use crate::test_data::{actor, entry};

    async fn admin_session(
        entries: Vec<TimeEntry>,
    ) -> TimesheetSession<InMemoryRepository, MemoryFilterStore> {
        let repo = InMemoryRepository::new(actor("a1", Role::Admin)).with_entries(entries);
        let mut session = TimesheetSession::open(repo, MemoryFilterStore::new())
            .await
            .unwrap();
        session
            .select_month(YearMonth::new(2024, 3).unwrap())
            .await
            .unwrap();
        session.repository().clear_calls();
        session
    }

    #[tokio::test]
    async fn test_same_status_is_a_no_op() {
        let mut s = admin_session(vec![entry("e1", "u1", "2024-03-01", 1.0)]).await;
        let proposal = s.propose_status("e1", EntryStatus::Pending).unwrap();
        assert_eq!(proposal, Proposal::Unchanged);
        assert!(s.pending_change().is_none());
        assert!(s.repository().calls().is_empty());
    }

    #[tokio::test]
    async fn test_confirm_persists_with_approver() {
        let mut s = admin_session(vec![entry("e1", "u1", "2024-03-01", 1.0)]).await;
        s.propose_status("e1", EntryStatus::Rejected).unwrap();
        assert!(s.repository().calls().is_empty());

        let updated = s
            .confirm_status(Some("missing ticket reference".to_string()))
            .await
            .unwrap();
        assert_eq!(updated.status, EntryStatus::Rejected);
        assert_eq!(updated.approver_id.as_deref(), Some("a1"));
        assert!(updated.approved_at.is_some());
        assert_eq!(
            updated.status_description.as_deref(),
            Some("missing ticket reference")
        );
        assert_eq!(s.find_entry("e1").unwrap().status, EntryStatus::Rejected);
        assert!(s.pending_change().is_none());
    }

    #[tokio::test]
    async fn test_cancel_refreshes_without_writing() {
        let mut s = admin_session(vec![entry("e1", "u1", "2024-03-01", 1.0)]).await;
        s.propose_status("e1", EntryStatus::Approved).unwrap();
        s.cancel_status().await.unwrap();

        assert!(s.pending_change().is_none());
        assert!(s.repository().write_calls().is_empty());
        assert!(s.repository().calls().contains(&Call::ListEntries));
        assert!(matches!(
            s.confirm_status(None).await,
            Err(TimesheetError::Refused(Refusal::NoPendingChange))
        ));
    }

    #[tokio::test]
    async fn test_consultant_cannot_propose() {
        let repo = InMemoryRepository::new(actor("c1", Role::Consultant))
            .with_entries(vec![entry("e1", "c1", "2024-03-01", 1.0)]);
        let mut s = TimesheetSession::open(repo, MemoryFilterStore::new())
            .await
            .unwrap();
        assert!(matches!(
            s.propose_status("e1", EntryStatus::Approved),
            Err(TimesheetError::Refused(Refusal::NotPermitted(Action::ChangeStatus)))
        ));
    }

    #[tokio::test]
    async fn test_bulk_approve_replicates_message() {
        let mut s = admin_session(vec![
            entry("e1", "u1", "2024-03-01", 1.0),
            entry("e2", "u2", "2024-03-02", 1.0),
        ])
        .await;
        s.toggle_all();

        let report = s
            .bulk(BulkAction::Approve, Some("ok for March".to_string()))
            .await
            .unwrap();
        assert_eq!(report.attempted, 2);
        assert!(s.selection().is_empty());
        for e in s.entries() {
            assert_eq!(e.status, EntryStatus::Approved);
            assert_eq!(e.status_description.as_deref(), Some("ok for March"));
        }
    }

    #[tokio::test]
    async fn test_bulk_partial_failure_reports_batch_error() {
        let mut s = admin_session(vec![
            entry("e1", "u1", "2024-03-01", 1.0),
            entry("e2", "u1", "2024-03-01", 1.0),
            entry("e3", "u1", "2024-03-01", 1.0),
        ])
        .await;
        s.toggle_all();
        s.repository().fail_writes_to("e2");

        let err = s.bulk(BulkAction::Delete, None).await.unwrap_err();
        assert!(matches!(err, TimesheetError::Batch { failed: 1, total: 3 }));
        assert!(s.selection().is_empty());
        let remaining: Vec<&str> = s.entries().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(remaining, vec!["e2"]);
    }

    #[tokio::test]
    async fn test_bulk_requires_selection() {
        let mut s = admin_session(vec![entry("e1", "u1", "2024-03-01", 1.0)]).await;
        assert!(matches!(
            s.bulk(BulkAction::Reject, None).await,
            Err(TimesheetError::Refused(Refusal::NothingSelected))
        ));
    }
}
