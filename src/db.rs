use crate::error::{DedupError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Transaction as seen by the duplicate pipeline.
///
/// Read-only: built from the joined store rows, never written back. The
/// optional category/counterparty stay `None` when the row has no link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub description: String,

    /// Signed amount in minor currency units (cents)
    pub amount_minor: i64,

    pub event_date: NaiveDate,
    pub account_id: String,
    pub account_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty_name: Option<String>,
}

impl Transaction {
    /// Amount as a decimal number of currency units
    pub fn amount(&self) -> f64 {
        self.amount_minor as f64 / 100.0
    }
}

/// Parse a human amount like `-1,234.56`, `$45.99` or `(12.00)` into cents.
pub fn parse_amount_minor(raw: &str) -> Result<i64> {
    let mut s: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',' && *c != '$')
        .collect();

    let mut negative = false;
    if s.starts_with('(') && s.ends_with(')') && s.len() > 2 {
        negative = true;
        s = s[1..s.len() - 1].to_string();
    }
    if let Some(rest) = s.strip_prefix('-') {
        negative = !negative;
        s = rest.to_string();
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest.to_string();
    }

    let invalid = || DedupError::InvalidInput(format!("unparseable amount: {raw:?}"));

    let (whole, fraction) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s.as_str(), ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if fraction.len() > 2
        || !whole.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }

    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let cents: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
        _ => fraction.parse().map_err(|_| invalid())?,
    };

    let minor = whole
        .checked_mul(100)
        .and_then(|v| v.checked_add(cents))
        .ok_or_else(invalid)?;
    Ok(if negative { -minor } else { minor })
}

/// Render cents as `-12.34`
pub fn format_minor(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Parse an event date (supports YYYY-MM-DD and MM/DD/YYYY)
pub fn parse_event_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .map_err(|_| DedupError::InvalidInput(format!("unparseable date: {raw:?}")))
}

// ============================================================================
// AUDIT EVENTS
// ============================================================================

/// Event for the audit trail
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (user_id, name)
        );

        CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            UNIQUE (user_id, name)
        );

        CREATE TABLE IF NOT EXISTS counterparties (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            UNIQUE (user_id, name)
        );

        CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            account_id TEXT NOT NULL REFERENCES accounts(id),
            description TEXT NOT NULL,
            amount_minor INTEGER NOT NULL,
            event_date TEXT NOT NULL,
            category_id TEXT REFERENCES categories(id),
            counterparty_id TEXT REFERENCES counterparties(id),
            idempotency_hash TEXT UNIQUE,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX IF NOT EXISTS idx_tx_user_date ON transactions(user_id, event_date);
        CREATE INDEX IF NOT EXISTS idx_tx_account ON transactions(account_id);
        CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id);",
    )?;

    Ok(())
}

/// Lookup tables whose rows are addressed by (user, name)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedTable {
    Accounts,
    Categories,
    Counterparties,
}

impl NamedTable {
    fn as_str(&self) -> &'static str {
        match self {
            NamedTable::Accounts => "accounts",
            NamedTable::Categories => "categories",
            NamedTable::Counterparties => "counterparties",
        }
    }
}

/// Return the id for `name` in `table`, creating the row if needed.
pub fn ensure_named(conn: &Connection, table: NamedTable, user_id: &str, name: &str) -> Result<String> {
    let select = format!("SELECT id FROM {} WHERE user_id = ?1 AND name = ?2", table.as_str());
    let existing: Option<String> = conn
        .query_row(&select, params![user_id, name], |row| row.get(0))
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let id = uuid::Uuid::new_v4().to_string();
    let insert = format!("INSERT INTO {} (id, user_id, name) VALUES (?1, ?2, ?3)", table.as_str());
    conn.execute(&insert, params![id, user_id, name])?;
    Ok(id)
}

// ============================================================================
// TRANSACTIONS
// ============================================================================

/// Row to insert; ids must already exist for this user.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub account_id: String,
    pub description: String,
    pub amount_minor: i64,
    pub event_date: NaiveDate,
    pub category_id: Option<String>,
    pub counterparty_id: Option<String>,
    /// Set for imported rows so replaying the same file is a no-op
    pub idempotency_hash: Option<String>,
}

/// Insert one transaction. Returns `None` when the idempotency hash is
/// already present.
pub fn insert_transaction(conn: &Connection, user_id: &str, tx: &NewTransaction) -> Result<Option<String>> {
    let id = uuid::Uuid::new_v4().to_string();

    let result = conn.execute(
        "INSERT INTO transactions (
            id, user_id, account_id, description, amount_minor, event_date,
            category_id, counterparty_id, idempotency_hash
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            id,
            user_id,
            tx.account_id,
            tx.description,
            tx.amount_minor,
            tx.event_date.format(DATE_FORMAT).to_string(),
            tx.category_id,
            tx.counterparty_id,
            tx.idempotency_hash,
        ],
    );

    match result {
        Ok(_) => Ok(Some(id)),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation && tx.idempotency_hash.is_some() =>
        {
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// All transactions owned by `user_id`, annotated with account, category
/// and counterparty names, newest first.
pub fn get_transactions_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.description, t.amount_minor, t.event_date,
                t.account_id, a.name,
                t.category_id, c.name,
                t.counterparty_id, p.name
         FROM transactions t
         JOIN accounts a ON a.id = t.account_id
         LEFT JOIN categories c ON c.id = t.category_id
         LEFT JOIN counterparties p ON p.id = t.counterparty_id
         WHERE t.user_id = ?1
         ORDER BY t.event_date DESC, t.rowid ASC",
    )?;

    let transactions = stmt
        .query_map([user_id], |row| {
            let date_str: String = row.get(3)?;
            let event_date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
            })?;

            Ok(Transaction {
                id: row.get(0)?,
                description: row.get(1)?,
                amount_minor: row.get(2)?,
                event_date,
                account_id: row.get(4)?,
                account_name: row.get(5)?,
                category_id: row.get(6)?,
                category_name: row.get(7)?,
                counterparty_id: row.get(8)?,
                counterparty_name: row.get(9)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(transactions)
}

pub fn count_transactions(conn: &Connection, user_id: &str) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM transactions WHERE user_id = ?1",
        [user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Delete a batch of transactions as one unit.
///
/// Every id must belong to `user_id`; if any is missing the whole batch is
/// rolled back and nothing is removed.
pub fn delete_transactions(conn: &mut Connection, user_id: &str, ids: &[String], actor: &str) -> Result<usize> {
    if ids.is_empty() {
        return Err(DedupError::InvalidInput("empty deletion batch".to_string()));
    }

    let tx = conn.transaction()?;
    let mut deleted = 0;
    {
        let mut stmt = tx.prepare("DELETE FROM transactions WHERE id = ?1 AND user_id = ?2")?;
        for id in ids {
            let affected = stmt.execute(params![id, user_id])?;
            if affected == 0 {
                // Dropping `tx` without commit rolls back earlier deletes
                return Err(DedupError::NotFound(id.clone()));
            }
            deleted += affected;
        }
    }

    let event = Event::new(
        "transactions_deleted",
        "user",
        user_id,
        serde_json::json!({ "ids": ids, "count": deleted }),
        actor,
    );
    insert_event(&tx, &event)?;
    tx.commit()?;

    info!(user_id, deleted, "deleted transaction batch");
    Ok(deleted)
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
#[cfg(test)]
pub(crate) fn get_events_for_entity(conn: &Connection, entity_type: &str, entity_id: &str) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
                    })?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(events)
}

// ============================================================================
// CSV IMPORT
// ============================================================================

/// One CSV line: `account,date,description,amount,category,counterparty`
#[derive(Debug, Deserialize)]
struct CsvRow {
    account: String,
    date: String,
    description: String,
    amount: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    counterparty: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub rows: usize,
    pub inserted: usize,
    pub skipped: usize,
}

/// Digest of a whole statement file; identical bytes = same statement
pub fn compute_file_digest(contents: &[u8]) -> String {
    format!("{:x}", Sha256::digest(contents))
}

/// Hash identifying an imported line: same statement + same line = same row.
/// Keyed on file contents, so two exports sharing a file name stay distinct.
pub fn compute_idempotency_hash(user_id: &str, file_digest: &str, line_number: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}|{}|{}", user_id, file_digest, line_number));
    format!("{:x}", hasher.finalize())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Import a CSV file for `user_id` in one SQLite transaction.
pub fn load_csv(conn: &mut Connection, user_id: &str, csv_path: &Path) -> Result<ImportSummary> {
    let contents = std::fs::read(csv_path)?;
    let file_digest = compute_file_digest(&contents);
    let mut rdr = csv::Reader::from_reader(contents.as_slice());
    let source_file = csv_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let tx = conn.transaction()?;
    let mut summary = ImportSummary::default();

    for (index, result) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let line_number = index + 2; // header is line 1
        summary.rows += 1;

        let account_id = ensure_named(&tx, NamedTable::Accounts, user_id, row.account.trim())?;
        let category_id = match non_blank(row.category) {
            Some(name) => Some(ensure_named(&tx, NamedTable::Categories, user_id, &name)?),
            None => None,
        };
        let counterparty_id = match non_blank(row.counterparty) {
            Some(name) => Some(ensure_named(&tx, NamedTable::Counterparties, user_id, &name)?),
            None => None,
        };

        let new_tx = NewTransaction {
            account_id,
            description: row.description.trim().to_string(),
            amount_minor: parse_amount_minor(&row.amount)?,
            event_date: parse_event_date(&row.date)?,
            category_id,
            counterparty_id,
            idempotency_hash: Some(compute_idempotency_hash(user_id, &file_digest, line_number)),
        };

        match insert_transaction(&tx, user_id, &new_tx)? {
            Some(id) => {
                debug!(%id, line_number, "imported transaction");
                summary.inserted += 1;
            }
            None => summary.skipped += 1,
        }
    }

    tx.commit()?;
    info!(
        source_file = %source_file,
        inserted = summary.inserted,
        skipped = summary.skipped,
        "csv import finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn add_tx(conn: &Connection, user: &str, account: &str, date: &str, desc: &str, amount: i64) -> String {
        let account_id = ensure_named(conn, NamedTable::Accounts, user, account).unwrap();
        insert_transaction(
            conn,
            user,
            &NewTransaction {
                account_id,
                description: desc.to_string(),
                amount_minor: amount,
                event_date: parse_event_date(date).unwrap(),
                category_id: None,
                counterparty_id: None,
                idempotency_hash: None,
            },
        )
        .unwrap()
        .unwrap()
    }

    #[test]
    fn test_parse_amount_minor() {
        assert_eq!(parse_amount_minor("150.00").unwrap(), 15000);
        assert_eq!(parse_amount_minor("-45.99").unwrap(), -4599);
        assert_eq!(parse_amount_minor("$1,234.5").unwrap(), 123450);
        assert_eq!(parse_amount_minor("(12.00)").unwrap(), -1200);
        assert_eq!(parse_amount_minor("7").unwrap(), 700);
        assert_eq!(parse_amount_minor(".25").unwrap(), 25);
        assert!(parse_amount_minor("12.345").is_err());
        assert!(parse_amount_minor("abc").is_err());
        assert!(parse_amount_minor("").is_err());
    }

    #[test]
    fn test_format_minor() {
        assert_eq!(format_minor(15000), "150.00");
        assert_eq!(format_minor(-5), "-0.05");
        assert_eq!(format_minor(0), "0.00");
    }

    #[test]
    fn test_parse_event_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 12, 25).unwrap();
        assert_eq!(parse_event_date("2024-12-25").unwrap(), expected);
        assert_eq!(parse_event_date("12/25/2024").unwrap(), expected);
        assert!(parse_event_date("25.12.2024").is_err());
    }

    #[test]
    fn test_fetch_is_scoped_and_annotated() {
        let conn = test_db();
        let user = "alice";
        let account_id = ensure_named(&conn, NamedTable::Accounts, user, "Checking").unwrap();
        let category_id = ensure_named(&conn, NamedTable::Categories, user, "Groceries").unwrap();
        insert_transaction(
            &conn,
            user,
            &NewTransaction {
                account_id: account_id.clone(),
                description: "Corner Market".to_string(),
                amount_minor: -2350,
                event_date: parse_event_date("2024-03-02").unwrap(),
                category_id: Some(category_id.clone()),
                counterparty_id: None,
                idempotency_hash: None,
            },
        )
        .unwrap();
        add_tx(&conn, user, "Checking", "2024-03-05", "Rent", -120000);
        add_tx(&conn, "bob", "Savings", "2024-03-05", "Other user", 100);

        let txs = get_transactions_for_user(&conn, user).unwrap();
        assert_eq!(txs.len(), 2);
        // Newest first
        assert_eq!(txs[0].description, "Rent");
        assert_eq!(txs[0].category_id, None);
        assert_eq!(txs[1].account_name, "Checking");
        assert_eq!(txs[1].category_id.as_deref(), Some(category_id.as_str()));
        assert_eq!(txs[1].category_name.as_deref(), Some("Groceries"));
        assert_eq!(txs[1].counterparty_name, None);
    }

    #[test]
    fn test_ensure_named_reuses_rows() {
        let conn = test_db();
        let a = ensure_named(&conn, NamedTable::Counterparties, "u", "ACME").unwrap();
        let b = ensure_named(&conn, NamedTable::Counterparties, "u", "ACME").unwrap();
        let c = ensure_named(&conn, NamedTable::Counterparties, "other", "ACME").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_delete_batch_commits_and_audits() {
        let mut conn = test_db();
        let a = add_tx(&conn, "u", "Checking", "2024-01-01", "A", 100);
        let b = add_tx(&conn, "u", "Checking", "2024-01-02", "B", 100);
        add_tx(&conn, "u", "Checking", "2024-01-03", "C", 100);

        let deleted = delete_transactions(&mut conn, "u", &[a, b], "test").unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(count_transactions(&conn, "u").unwrap(), 1);

        let events = get_events_for_entity(&conn, "user", "u").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "transactions_deleted");
        assert_eq!(events[0].data["count"], 2);
    }

    #[test]
    fn test_delete_batch_rolls_back_on_missing_id() {
        let mut conn = test_db();
        let a = add_tx(&conn, "u", "Checking", "2024-01-01", "A", 100);

        let err = delete_transactions(&mut conn, "u", &[a, "missing".to_string()], "test").unwrap_err();
        assert!(matches!(err, DedupError::NotFound(ref id) if id == "missing"));
        assert_eq!(count_transactions(&conn, "u").unwrap(), 1);
        assert!(get_events_for_entity(&conn, "user", "u").unwrap().is_empty());
    }

    #[test]
    fn test_delete_refuses_other_users_rows() {
        let mut conn = test_db();
        let theirs = add_tx(&conn, "bob", "Checking", "2024-01-01", "A", 100);

        let err = delete_transactions(&mut conn, "alice", &[theirs], "test").unwrap_err();
        assert!(matches!(err, DedupError::NotFound(_)));
        assert_eq!(count_transactions(&conn, "bob").unwrap(), 1);
    }

    #[test]
    fn test_csv_import_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statement.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "account,date,description,amount,category,counterparty").unwrap();
        writeln!(file, "Checking,2024-05-01,Gym membership,-45.00,Health,FitCo").unwrap();
        writeln!(file, "Checking,2024-05-01,Gym membership,-45.00,Health,FitCo").unwrap();
        writeln!(file, "Visa,05/03/2024,Bookshop,-12.5,,").unwrap();
        drop(file);

        let mut conn = test_db();
        let first = load_csv(&mut conn, "u", &path).unwrap();
        assert_eq!(first, ImportSummary { rows: 3, inserted: 3, skipped: 0 });

        let second = load_csv(&mut conn, "u", &path).unwrap();
        assert_eq!(second, ImportSummary { rows: 3, inserted: 0, skipped: 3 });

        let txs = get_transactions_for_user(&conn, "u").unwrap();
        assert_eq!(txs.len(), 3);
        let book = txs.iter().find(|t| t.description == "Bookshop").unwrap();
        assert_eq!(book.amount_minor, -1250);
        assert_eq!(book.category_id, None);
        assert_eq!(book.counterparty_id, None);
        let gym: Vec<_> = txs.iter().filter(|t| t.description == "Gym membership").collect();
        assert_eq!(gym.len(), 2);
        assert_eq!(gym[0].counterparty_name.as_deref(), Some("FitCo"));
    }

    #[test]
    fn test_same_file_name_different_statements_both_import() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for (month, date) in [("jan", "2024-01-01"), ("feb", "2024-02-01")] {
            let month_dir = dir.path().join(month);
            std::fs::create_dir(&month_dir).unwrap();
            let path = month_dir.join("statement.csv");
            let mut file = std::fs::File::create(&path).unwrap();
            writeln!(file, "account,date,description,amount,category,counterparty").unwrap();
            writeln!(file, "Checking,{},Rent,-1200.00,Housing,Landlord", date).unwrap();
            paths.push(path);
        }

        let mut conn = test_db();
        let jan = load_csv(&mut conn, "u", &paths[0]).unwrap();
        let feb = load_csv(&mut conn, "u", &paths[1]).unwrap();

        assert_eq!(jan, ImportSummary { rows: 1, inserted: 1, skipped: 0 });
        assert_eq!(feb, ImportSummary { rows: 1, inserted: 1, skipped: 0 });
        assert_eq!(count_transactions(&conn, "u").unwrap(), 2);

        // Re-importing either statement is still a no-op
        let again = load_csv(&mut conn, "u", &paths[1]).unwrap();
        assert_eq!(again.skipped, 1);
        assert_eq!(count_transactions(&conn, "u").unwrap(), 2);
    }

    #[test]
    fn test_idempotency_hash_is_stable() {
        let digest = compute_file_digest(b"account,date\n");
        let h1 = compute_idempotency_hash("u", &digest, 2);
        let h2 = compute_idempotency_hash("u", &digest, 2);
        let h3 = compute_idempotency_hash("u", &digest, 3);
        let other = compute_idempotency_hash("u", &compute_file_digest(b"other"), 2);
        assert_eq!(h1, h2);
        assert_ne!(h1, h3);
        assert_ne!(h1, other);
        assert_eq!(h1.len(), 64);
    }
}
