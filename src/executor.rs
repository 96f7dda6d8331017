use crate::error::{DedupError, Result};
use crate::store::{LedgerStore, UserContext};
use std::sync::Arc;
use tracing::{info, warn};

/// Removes a batch of transactions as one all-or-nothing operation.
///
/// No retries here; a failed batch is replayed by the user through the
/// review session.
pub struct DeletionExecutor {
    store: Arc<dyn LedgerStore>,
}

impl DeletionExecutor {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Returns the number of deleted transactions. A stale id stays
    /// `NotFound`; any other store error is reported as `DeletionFailure`.
    /// Either way no id is assumed deleted.
    pub async fn execute(&self, ctx: &UserContext, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Err(DedupError::InvalidInput("nothing to delete".to_string()));
        }

        match self.store.delete_transactions(ctx, ids).await {
            Ok(deleted) => {
                info!(user_id = %ctx.user_id, deleted, "deletion batch committed");
                Ok(deleted)
            }
            Err(e) => {
                warn!(user_id = %ctx.user_id, batch = ids.len(), error = %e, "deletion batch failed");
                Err(match e {
                    DedupError::DeletionFailure(_) | DedupError::NotFound(_) => e,
                    other => DedupError::DeletionFailure(other.to_string()),
                })
            }
        }
    }
}
