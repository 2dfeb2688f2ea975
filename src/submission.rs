//! Monthly "request approval" flow

use chrono::Utc;
use futures::future::join_all;

use crate::error::{Refusal, Result, TimesheetError};
use crate::filters::FilterStore;
use crate::models::{
    EntryPatch, NewSubmission, Submission, SubmissionPatch, SubmissionStatus, YearMonth,
};
use crate::policy::{require, Action};
use crate::repository::TimesheetRepository;
use crate::session::TimesheetSession;

/// What a successful approval request did
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalRequest {
    pub submission: Submission,
    /// False when an existing submission for the month was updated
    pub created: bool,
    pub associated: usize,
}

impl<R: TimesheetRepository, S: FilterStore> TimesheetSession<R, S> {
    /// Submits the actor's active month for approval.
    ///
    /// Marks (or creates) the month's submission as SUBMITTED and associates
    /// every entry of the actor dated in that month with it. When an
    /// association fails the submission is put back to DRAFT so the month
    /// stays open and the request can be repeated.
    pub async fn request_approval(&mut self) -> Result<ApprovalRequest> {
        require(self.actor.role, Action::RequestApproval)?;
        if self.month_locked() {
            tracing::info!(month = %self.filters.month, "refused: month already submitted");
            return Err(Refusal::MonthLocked.into());
        }

        let month = self.filters.month;
        let (submission, created) = match self.submit_month(month).await {
            Ok(submitted) => submitted,
            Err(e) => return self.settle(Err(e)).await,
        };

        // Taken from the whole collection, so an exact-date filter cannot
        // narrow the claim
        let ids: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.user_id == self.actor.id && month.contains(e.date))
            .map(|e| e.id.clone())
            .collect();

        let patch = EntryPatch::associate(&submission.id);
        let repo = &self.repo;
        let outcomes = join_all(ids.iter().map(|id| {
            let patch = &patch;
            async move {
                let outcome = repo.update_entry(id, patch).await;
                if let Err(e) = &outcome {
                    tracing::warn!(entry_id = %id, error = %e, "could not associate entry");
                }
                outcome
            }
        }))
        .await;
        let failed = outcomes.iter().filter(|o| o.is_err()).count();
        let total = ids.len();
        tracing::info!(
            %month,
            submission_id = %submission.id,
            attempted = total,
            failed,
            "approval requested"
        );

        if failed > 0 {
            self.revert_to_draft(&submission).await;
            return self.settle(Err(TimesheetError::Batch { failed, total })).await;
        }

        self.settle(Ok(ApprovalRequest {
            submission,
            created,
            associated: total,
        }))
        .await
    }

    /// Steps 1 and 2: update the month's submission or create it
    async fn submit_month(&self, month: YearMonth) -> Result<(Submission, bool)> {
        let now = Utc::now();
        match self.repo.find_submission(&self.actor.id, month).await? {
            Some(existing) => {
                let patch = SubmissionPatch {
                    status: SubmissionStatus::Submitted,
                    submitted_at: Some(now),
                };
                let updated = self.repo.update_submission(&existing.id, &patch).await?;
                Ok((updated, false))
            }
            None => {
                let new = NewSubmission {
                    user_id: self.actor.id.clone(),
                    year: month.year,
                    month: month.month,
                    status: SubmissionStatus::Submitted,
                    submitted_at: now,
                };
                let created = self.repo.create_submission(&new).await?;
                Ok((created, true))
            }
        }
    }

    async fn revert_to_draft(&self, submission: &Submission) {
        let patch = SubmissionPatch {
            status: SubmissionStatus::Draft,
            submitted_at: None,
        };
        match self.repo.update_submission(&submission.id, &patch).await {
            Ok(_) => tracing::info!(submission_id = %submission.id, "submission reverted to draft"),
            Err(e) => {
                tracing::warn!(submission_id = %submission.id, error = %e, "could not revert submission")
            }
        }
    }
}
