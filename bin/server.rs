// Ledger Dedup - Web Server
// REST API with Axum: duplicate scan + batch delete

use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use ledger_dedup::api::{self, AppState};
use ledger_dedup::{
    logging, DeduplicationEngine, DeletionExecutor, DuplicateScanner, LedgerStore, Settings, SqliteStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Parser)]
#[command(name = "ledger-dedup-server", version, about = "Duplicate scan API")]
struct Args {
    /// Settings file (default: ~/.config/ledger-dedup/settings.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQLite database path (overrides settings)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Address to bind (overrides settings)
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_tracing("ledger_dedup=info,tower_http=info");
    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref()).context("Failed to load settings")?;
    if let Some(db) = args.db {
        settings.db_path = db;
    }
    if let Some(bind) = args.bind {
        settings.bind_addr = bind;
    }

    let store = SqliteStore::open(&settings.db_path)
        .with_context(|| format!("Failed to open database at {:?}", settings.db_path))?;
    info!(db = ?settings.db_path, "database opened");

    let store: Arc<dyn LedgerStore> = Arc::new(store);
    let state = AppState {
        scanner: Arc::new(DuplicateScanner::new(
            store.clone(),
            DeduplicationEngine::from_config(&settings.detection),
        )),
        executor: Arc::new(DeletionExecutor::new(store)),
    };

    let app = Router::new()
        .nest("/api", api::router(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", settings.bind_addr))?;

    println!("🌐 Ledger Dedup - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("🚀 Listening on http://{}", settings.bind_addr);
    println!("   Scan:   POST /api/duplicates/scan        (header: x-user-id)");
    println!("   Delete: POST /api/transactions/delete    {{\"ids\": [...]}}");
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
