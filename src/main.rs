// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ledger_dedup::{
    config, count_transactions, format_minor, load_csv, logging, DeduplicationEngine, DeletionExecutor,
    DuplicateScanner, LedgerStore, ScanReport, ScanResponse, Settings, SqliteStore, UserContext,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "ledger-dedup", version, about = "Find and review duplicate ledger transactions")]
struct Cli {
    /// Settings file (default: ~/.config/ledger-dedup/settings.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path (overrides settings)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import transactions from a CSV file
    Import {
        #[arg(long, env = "LEDGER_DEDUP_USER")]
        user: String,
        file: PathBuf,
    },
    /// Scan for duplicate groups and print them
    Scan {
        #[arg(long, env = "LEDGER_DEDUP_USER")]
        user: String,
        /// Print the API response shape instead of a listing
        #[arg(long)]
        json: bool,
    },
    /// Review duplicate groups interactively
    Review {
        #[arg(long, env = "LEDGER_DEDUP_USER")]
        user: String,
    },
    /// Print the effective settings
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // The review screen owns the terminal; keep the log stream quiet
    match cli.command {
        Command::Review { .. } => logging::init_tracing("ledger_dedup=warn"),
        _ => logging::init_tracing("ledger_dedup=info"),
    }

    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }

    match cli.command {
        Command::Import { user, file } => run_import(&settings, &user, &file),
        Command::Scan { user, json } => run_scan(&settings, &user, json).await,
        Command::Review { user } => run_review(&settings, &user).await,
        Command::Config => run_config(&settings, cli.config),
    }
}

fn open_store(settings: &Settings) -> Result<SqliteStore> {
    SqliteStore::open(&settings.db_path).with_context(|| format!("Failed to open database at {:?}", settings.db_path))
}

fn build_scanner(settings: &Settings, store: Arc<dyn LedgerStore>) -> DuplicateScanner {
    DuplicateScanner::new(store, DeduplicationEngine::from_config(&settings.detection))
}

fn run_import(settings: &Settings, user: &str, file: &Path) -> Result<()> {
    let ctx = UserContext::new(user)?;

    println!("🗄️  Ledger Dedup - CSV Import");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!("\n🔧 Opening database {:?}...", settings.db_path);
    let store = open_store(settings)?;
    let mut conn = store.lock()?;

    println!("\n📂 Loading {:?}...", file);
    let summary = load_csv(&mut conn, &ctx.user_id, file)?;
    println!("✓ Read {} rows", summary.rows);
    println!("✓ Inserted {} transactions", summary.inserted);
    if summary.skipped > 0 {
        println!("✓ Skipped {} already-imported rows", summary.skipped);
    }

    let count = count_transactions(&conn, &ctx.user_id)?;
    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ {} now has {} transactions", ctx.user_id, count);
    Ok(())
}

async fn run_scan(settings: &Settings, user: &str, json: bool) -> Result<()> {
    let ctx = UserContext::new(user)?;
    let store: Arc<dyn LedgerStore> = Arc::new(open_store(settings)?);
    let scanner = build_scanner(settings, store);

    let report = match scanner.scan(&ctx).await {
        Ok(report) => report,
        Err(e) if json => {
            println!("{}", serde_json::to_string_pretty(&ScanResponse::failed(e.to_string()))?);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&ScanResponse::from(report))?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &ScanReport) {
    println!("🔍 Scanned {} transactions", report.scanned_transactions);

    if report.is_all_clear() {
        println!("✅ All clear - no duplicates found");
        return;
    }

    println!(
        "⚠️  Found {} group(s), {} duplicate transaction(s)\n",
        report.groups.len(),
        report.total_duplicates_found
    );

    for (i, group) in report.groups.iter().enumerate() {
        println!(
            "[{}] {}  confidence {}  ({})",
            i + 1,
            group.account_name,
            group.confidence,
            group.breakdown.reason()
        );
        for tx in &group.transactions {
            println!(
                "    {}  {:>12}  {}  ({})",
                tx.event_date,
                format_minor(tx.amount_minor),
                tx.description,
                tx.id
            );
        }
    }
}

#[cfg(feature = "tui")]
async fn run_review(settings: &Settings, user: &str) -> Result<()> {
    let ctx = UserContext::new(user)?;

    if !settings.db_path.exists() {
        eprintln!("❌ Database not found at {:?}", settings.db_path);
        eprintln!("   Run: ledger-dedup import --user {} <FILE>", ctx.user_id);
        eprintln!("   to import transactions first.");
        std::process::exit(1);
    }

    let store: Arc<dyn LedgerStore> = Arc::new(open_store(settings)?);
    let scanner = build_scanner(settings, store.clone());
    let executor = DeletionExecutor::new(store);

    let mut app = ui::App::new(&scanner, &executor, ctx);
    app.start_scan().await;
    ui::run_ui(&mut app).await?;

    match app.session.acknowledge() {
        Ok(summary) => {
            println!("\n✅ Review complete");
            println!("   Groups resolved:      {}/{}", summary.groups_resolved, summary.total_groups);
            println!("   Transactions deleted: {}", summary.transactions_deleted);
        }
        Err(session) => {
            if let Some(summary) = session.summary() {
                println!("\n⏸️  Review closed early");
                println!("   Groups resolved:      {}/{}", summary.groups_resolved, summary.total_groups);
                println!("   Transactions deleted: {}", summary.transactions_deleted);
            } else {
                println!("\n⏸️  Review closed");
            }
        }
    }
    Ok(())
}

#[cfg(not(feature = "tui"))]
async fn run_review(_settings: &Settings, _user: &str) -> Result<()> {
    eprintln!("❌ Review mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API: cargo run --bin ledger-dedup-server --features server");
    std::process::exit(1);
}

fn run_config(settings: &Settings, path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(config::settings_path);
    println!("# {}", path.display());
    println!("{}", serde_json::to_string_pretty(settings)?);
    Ok(())
}
