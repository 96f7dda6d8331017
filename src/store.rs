use crate::db::{self, Transaction};
use crate::error::{DedupError, Result};
use async_trait::async_trait;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Caller identity, passed explicitly into every store call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserContext {
    pub user_id: String,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>) -> Result<Self> {
        let user_id = user_id.into();
        if user_id.trim().is_empty() {
            return Err(DedupError::Unauthorized("empty user id".to_string()));
        }
        Ok(Self { user_id })
    }
}

/// The ledger backend the duplicate pipeline talks to.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Every transaction of the caller, with account/category/counterparty
    /// names resolved, in store order (newest first).
    async fn fetch_transactions(&self, ctx: &UserContext) -> Result<Vec<Transaction>>;

    /// Remove all `ids` or none of them. Returns the number removed.
    async fn delete_transactions(&self, ctx: &UserContext, ids: &[String]) -> Result<usize>;
}

/// SQLite-backed store sharing one connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let conn = Connection::open(path)?;
        db::setup_database(&conn)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        db::setup_database(&conn)?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Lock the connection for direct use (imports, seeding).
    pub fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| DedupError::Store("connection lock poisoned".to_string()))
    }
}

#[async_trait]
impl LedgerStore for SqliteStore {
    async fn fetch_transactions(&self, ctx: &UserContext) -> Result<Vec<Transaction>> {
        let conn = self.lock()?;
        let transactions = db::get_transactions_for_user(&conn, &ctx.user_id)?;
        debug!(user_id = %ctx.user_id, count = transactions.len(), "fetched transactions");
        Ok(transactions)
    }

    async fn delete_transactions(&self, ctx: &UserContext, ids: &[String]) -> Result<usize> {
        let mut conn = self.lock()?;
        db::delete_transactions(&mut conn, &ctx.user_id, ids, "duplicate_review")
    }
}
