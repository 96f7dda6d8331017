// 🧭 Review Session - walk duplicate groups one at a time
//
//   Idle ──begin_scan──▶ Scanning ──finish_scan(groups)──▶ Reviewing ──last group resolved──▶ Complete
//    ▲                      │   └──finish_scan(no groups)──────────────────────────────────────▲
//    └────finish_scan(err)──┘
//
// Scan and delete are two-phase (begin_* / finish_*) and carry a ticket, so
// a response for a request the session no longer tracks is rejected instead
// of being applied. While a delete is in flight every other action in
// Reviewing is refused.

use crate::deduplication::{DuplicateCandidateGroup, ScanReport};
use crate::error::{DedupError, ReviewError};
use crate::executor::DeletionExecutor;
use crate::scanner::DuplicateScanner;
use crate::store::UserContext;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanTicket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteTicket(u64);

/// Ids to hand to the deletion executor, plus the ticket to report back with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionRequest {
    pub ticket: DeleteTicket,
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Scanning,
    Reviewing,
    Complete,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Scanning => "scanning",
            Phase::Reviewing => "reviewing",
            Phase::Complete => "complete",
        }
    }
}

/// Final (or running) counts of a review.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReviewSummary {
    pub total_groups: usize,
    pub groups_resolved: usize,
    pub transactions_deleted: usize,
    pub scanned_transactions: usize,
}

#[derive(Debug, Clone)]
struct PendingDelete {
    ticket: DeleteTicket,
    ids: Vec<String>,
}

/// State held while walking groups.
#[derive(Debug, Clone)]
pub struct Review {
    groups: Vec<DuplicateCandidateGroup>,
    index: usize,
    selection: BTreeSet<String>,
    resolved: BTreeSet<usize>,
    transactions_deleted: usize,
    scanned_transactions: usize,
    pending_delete: Option<PendingDelete>,
    last_error: Option<String>,
}

impl Review {
    fn new(report: ScanReport) -> Self {
        Review {
            groups: report.groups,
            index: 0,
            selection: BTreeSet::new(),
            resolved: BTreeSet::new(),
            transactions_deleted: 0,
            scanned_transactions: report.scanned_transactions,
            pending_delete: None,
            last_error: None,
        }
    }

    fn current(&self) -> &DuplicateCandidateGroup {
        &self.groups[self.index]
    }

    fn summary(&self) -> ReviewSummary {
        ReviewSummary {
            total_groups: self.groups.len(),
            groups_resolved: self.resolved.len(),
            transactions_deleted: self.transactions_deleted,
            scanned_transactions: self.scanned_transactions,
        }
    }

    /// Mark the current group resolved and move on. Returns true when no
    /// group is left.
    fn resolve_current(&mut self) -> bool {
        self.resolved.insert(self.index);
        self.selection.clear();
        self.last_error = None;
        if self.index + 1 < self.groups.len() {
            self.index += 1;
            false
        } else {
            true
        }
    }
}

#[derive(Debug, Clone)]
pub enum SessionState {
    Idle { last_error: Option<String> },
    Scanning { ticket: ScanTicket },
    Reviewing(Review),
    Complete(ReviewSummary),
}

/// One review workflow. Not persisted; a new check starts a new session.
#[derive(Debug)]
pub struct ReviewSession {
    state: SessionState,
    next_ticket: u64,
}

impl Default for ReviewSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ReviewSession {
    pub fn new() -> Self {
        ReviewSession {
            state: SessionState::Idle { last_error: None },
            next_ticket: 1,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            SessionState::Idle { .. } => Phase::Idle,
            SessionState::Scanning { .. } => Phase::Scanning,
            SessionState::Reviewing(_) => Phase::Reviewing,
            SessionState::Complete(_) => Phase::Complete,
        }
    }

    /// Error from the last failed scan or delete, if not cleared since
    pub fn last_error(&self) -> Option<&str> {
        match &self.state {
            SessionState::Idle { last_error } => last_error.as_deref(),
            SessionState::Reviewing(review) => review.last_error.as_deref(),
            _ => None,
        }
    }

    fn ticket(&mut self) -> u64 {
        let t = self.next_ticket;
        self.next_ticket += 1;
        t
    }

    fn invalid(&self, action: &'static str) -> ReviewError {
        ReviewError::InvalidTransition {
            action,
            state: self.phase().as_str(),
        }
    }

    // ========================================================================
    // SCAN
    // ========================================================================

    /// Idle -> Scanning
    pub fn begin_scan(&mut self) -> Result<ScanTicket, ReviewError> {
        if self.phase() != Phase::Idle {
            return Err(self.invalid("start a scan"));
        }
        let ticket = ScanTicket(self.ticket());
        self.state = SessionState::Scanning { ticket };
        debug!(ticket = ticket.0, "scan requested");
        Ok(ticket)
    }

    /// Apply a scan outcome. Scanning -> Reviewing | Complete | Idle(error)
    pub fn finish_scan(
        &mut self,
        ticket: ScanTicket,
        outcome: Result<ScanReport, DedupError>,
    ) -> Result<Phase, ReviewError> {
        match &self.state {
            SessionState::Scanning { ticket: current } if *current == ticket => {}
            _ => return Err(ReviewError::StaleResponse),
        }

        match outcome {
            Ok(report) if report.groups.is_empty() => {
                info!(scanned = report.scanned_transactions, "no duplicates found");
                self.state = SessionState::Complete(ReviewSummary {
                    scanned_transactions: report.scanned_transactions,
                    ..ReviewSummary::default()
                });
            }
            Ok(report) => {
                info!(groups = report.groups.len(), "review started");
                self.state = SessionState::Reviewing(Review::new(report));
            }
            Err(e) => {
                let message = e.to_string();
                warn!(error = %message, "scan failed, session back to idle");
                self.state = SessionState::Idle {
                    last_error: Some(message.clone()),
                };
                return Err(ReviewError::ScanFailed(message));
            }
        }

        Ok(self.phase())
    }

    /// Run a whole scan round trip against `scanner`.
    pub async fn scan(&mut self, scanner: &DuplicateScanner, ctx: &UserContext) -> Result<Phase, ReviewError> {
        let ticket = self.begin_scan()?;
        let outcome = scanner.scan(ctx).await;
        self.finish_scan(ticket, outcome)
    }

    // ========================================================================
    // REVIEWING
    // ========================================================================

    fn review(&self) -> Option<&Review> {
        match &self.state {
            SessionState::Reviewing(review) => Some(review),
            _ => None,
        }
    }

    /// Mutable review state for an action that must not race a pending delete
    fn review_for(&mut self, action: &'static str) -> Result<&mut Review, ReviewError> {
        let err = self.invalid(action);
        match &mut self.state {
            SessionState::Reviewing(review) if review.pending_delete.is_some() => Err(ReviewError::DeletePending),
            SessionState::Reviewing(review) => Ok(review),
            _ => Err(err),
        }
    }

    pub fn groups(&self) -> &[DuplicateCandidateGroup] {
        self.review().map(|r| r.groups.as_slice()).unwrap_or(&[])
    }

    pub fn current_group(&self) -> Option<&DuplicateCandidateGroup> {
        self.review().map(Review::current)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.review().map(|r| r.index)
    }

    pub fn selection(&self) -> Option<&BTreeSet<String>> {
        self.review().map(|r| &r.selection)
    }

    pub fn is_selected(&self, transaction_id: &str) -> bool {
        self.review().map_or(false, |r| r.selection.contains(transaction_id))
    }

    pub fn is_delete_pending(&self) -> bool {
        self.review().map_or(false, |r| r.pending_delete.is_some())
    }

    /// Running counts while reviewing, final counts once complete
    pub fn summary(&self) -> Option<ReviewSummary> {
        match &self.state {
            SessionState::Reviewing(review) => Some(review.summary()),
            SessionState::Complete(summary) => Some(summary.clone()),
            _ => None,
        }
    }

    /// Add or remove a member of the current group from the selection.
    /// Returns whether it is selected afterwards.
    pub fn toggle(&mut self, transaction_id: &str) -> Result<bool, ReviewError> {
        let review = self.review_for("toggle a selection")?;
        if !review.current().contains(transaction_id) {
            return Err(ReviewError::NotInGroup(transaction_id.to_string()));
        }

        if review.selection.remove(transaction_id) {
            Ok(false)
        } else {
            review.selection.insert(transaction_id.to_string());
            Ok(true)
        }
    }

    /// Resolve the current group without deleting anything.
    pub fn keep_all(&mut self) -> Result<Phase, ReviewError> {
        let review = self.review_for("keep all")?;
        debug!(group = review.index, "group kept");
        if review.resolve_current() {
            self.complete();
        }
        Ok(self.phase())
    }

    /// Move back one group. The selection is dropped, not remembered.
    pub fn previous(&mut self) -> Result<(), ReviewError> {
        let review = self.review_for("go back")?;
        if review.index == 0 {
            return Err(ReviewError::AtFirstGroup);
        }
        review.selection.clear();
        review.index -= 1;
        Ok(())
    }

    /// Validate the selection and mark a delete as in flight.
    ///
    /// Requires `0 < selected < members`; on rejection nothing changes and
    /// the executor must not be called.
    pub fn begin_delete(&mut self) -> Result<DeletionRequest, ReviewError> {
        let ticket = DeleteTicket(self.next_ticket);
        let review = self.review_for("delete")?;

        let members = review.current().len();
        let selected = review.selection.len();
        if selected == 0 {
            return Err(ReviewError::EmptySelection);
        }
        if selected >= members {
            return Err(ReviewError::NoSurvivor { selected, members });
        }

        // Group order, not selection order
        let ids: Vec<String> = review
            .current()
            .transactions
            .iter()
            .filter(|t| review.selection.contains(&t.id))
            .map(|t| t.id.clone())
            .collect();

        review.pending_delete = Some(PendingDelete {
            ticket,
            ids: ids.clone(),
        });
        self.next_ticket += 1;
        debug!(ticket = ticket.0, count = ids.len(), "delete requested");
        Ok(DeletionRequest { ticket, ids })
    }

    /// Apply a deletion outcome.
    ///
    /// Success: totals grow, deleted members leave the group, and the session
    /// advances (or completes). Failure: nothing is counted, the group stays
    /// current with its selection intact for a retry.
    pub fn finish_delete(
        &mut self,
        ticket: DeleteTicket,
        outcome: Result<usize, DedupError>,
    ) -> Result<Phase, ReviewError> {
        let review = match &mut self.state {
            SessionState::Reviewing(review) => review,
            _ => return Err(ReviewError::StaleResponse),
        };
        let pending = match review.pending_delete.take() {
            Some(p) if p.ticket == ticket => p,
            other => {
                review.pending_delete = other;
                return Err(ReviewError::StaleResponse);
            }
        };

        match outcome {
            Ok(deleted) => {
                let index = review.index;
                review.groups[index]
                    .transactions
                    .retain(|t| !pending.ids.contains(&t.id));
                review.transactions_deleted += deleted;
                info!(group = index, deleted, total = review.transactions_deleted, "group resolved by deletion");

                if review.resolve_current() {
                    self.complete();
                }
                Ok(self.phase())
            }
            Err(e) => {
                let message = e.to_string();
                warn!(error = %message, "deletion failed, group stays current");
                review.last_error = Some(message.clone());
                Err(ReviewError::DeletionFailed(message))
            }
        }
    }

    /// Run a whole delete round trip through `executor`.
    pub async fn delete_selected_and_advance(
        &mut self,
        executor: &DeletionExecutor,
        ctx: &UserContext,
    ) -> Result<Phase, ReviewError> {
        let request = self.begin_delete()?;
        let outcome = executor.execute(ctx, &request.ids).await;
        self.finish_delete(request.ticket, outcome)
    }

    fn complete(&mut self) {
        if let SessionState::Reviewing(review) = &self.state {
            let summary = review.summary();
            info!(
                resolved = summary.groups_resolved,
                deleted = summary.transactions_deleted,
                "review complete"
            );
            self.state = SessionState::Complete(summary);
        }
    }

    /// Acknowledge completion and discard the session.
    ///
    /// Returns the final counts, or gives the session back if it is not
    /// complete yet.
    pub fn acknowledge(self) -> Result<ReviewSummary, ReviewSession> {
        match self.state {
            SessionState::Complete(summary) => Ok(summary),
            _ => Err(self),
        }
    }
}
