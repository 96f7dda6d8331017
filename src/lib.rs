// Ledger Dedup - Core Library
// Duplicate-transaction detection and review, shared by the CLI, the API
// server and tests

pub mod error;
pub mod config;
pub mod logging;
pub mod db;
pub mod store;
pub mod similarity;     // Levenshtein similarity of descriptions
pub mod clustering;     // Seed-only / transitive clustering strategies
pub mod confidence;     // 0..=100 group scoring
pub mod deduplication;  // Engine + group assembly
pub mod scanner;
pub mod executor;
pub mod session;        // Review workflow state machine
pub mod wire;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use error::{DedupError, ReviewError};
pub use config::{DetectionConfig, Settings};
pub use db::{
    Transaction, NewTransaction, Event, ImportSummary, NamedTable,
    setup_database, load_csv, ensure_named, insert_transaction,
    get_transactions_for_user, delete_transactions, count_transactions,
    parse_amount_minor, format_minor, parse_event_date,
};
pub use store::{LedgerStore, SqliteStore, UserContext};
pub use similarity::{levenshtein_distance, similarity};
pub use clustering::{
    ClusterStrategy, ClusteringStrategy, MatchWindow, SeedClustering, TransitiveClustering,
};
pub use confidence::ConfidenceBreakdown;
pub use deduplication::{DeduplicationEngine, DuplicateCandidateGroup, ScanReport};
pub use scanner::DuplicateScanner;
pub use executor::DeletionExecutor;
pub use session::{
    DeleteTicket, DeletionRequest, Phase, ReviewSession, ReviewSummary, ScanTicket, SessionState,
};
pub use wire::{DeleteRequest, DeleteResponse, GroupResponse, ScanResponse, TransactionResponse};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
