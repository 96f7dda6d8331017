use thiserror::Error;

/// Failures coming from the ledger store, a scan, or a deletion batch.
#[derive(Error, Debug)]
pub enum DedupError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Scan failed: {0}")]
    ScanFailure(String),

    #[error("Deletion failed: {0}")]
    DeletionFailure(String),

    #[error("Transaction not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, DedupError>;

/// Rejections raised by the review session.
///
/// None of these are fatal: the session stays in a well-defined state and
/// the caller may retry, navigate, or keep the group.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReviewError {
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("at least one transaction must remain: {selected} of {members} selected")]
    NoSurvivor { selected: usize, members: usize },

    #[error("no transactions selected for deletion")]
    EmptySelection,

    #[error("transaction {0} is not in the current group")]
    NotInGroup(String),

    #[error("a deletion is still in flight")]
    DeletePending,

    #[error("already at the first group")]
    AtFirstGroup,

    #[error("response belongs to a request this session no longer tracks")]
    StaleResponse,

    #[error("scan failed: {0}")]
    ScanFailed(String),

    #[error("deletion failed: {0}")]
    DeletionFailed(String),
}
