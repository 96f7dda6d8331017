use crate::deduplication::{DeduplicationEngine, ScanReport};
use crate::error::{DedupError, Result};
use crate::store::{LedgerStore, UserContext};
use std::sync::Arc;
use tracing::{info, warn};

/// Fetches a caller's transactions and runs the duplicate engine over them.
pub struct DuplicateScanner {
    store: Arc<dyn LedgerStore>,
    engine: DeduplicationEngine,
}

impl DuplicateScanner {
    pub fn new(store: Arc<dyn LedgerStore>, engine: DeduplicationEngine) -> Self {
        Self { store, engine }
    }

    /// One full scan. Store failures come back as `ScanFailure`.
    pub async fn scan(&self, ctx: &UserContext) -> Result<ScanReport> {
        info!(user_id = %ctx.user_id, "duplicate scan started");

        let transactions = match self.store.fetch_transactions(ctx).await {
            Ok(txs) => txs,
            Err(e) => {
                warn!(user_id = %ctx.user_id, error = %e, "duplicate scan failed");
                return Err(match e {
                    DedupError::Unauthorized(_) | DedupError::ScanFailure(_) => e,
                    other => DedupError::ScanFailure(other.to_string()),
                });
            }
        };

        let report = self.engine.scan(&transactions);
        info!(
            user_id = %ctx.user_id,
            scanned = report.scanned_transactions,
            groups = report.groups.len(),
            duplicates = report.total_duplicates_found,
            "duplicate scan finished"
        );
        Ok(report)
    }
}
