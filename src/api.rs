// REST API - stateless scan and delete endpoints
//
// The review session lives with the client; the server only runs scans and
// executes deletion batches for the caller named in the `x-user-id` header.

use crate::error::DedupError;
use crate::executor::DeletionExecutor;
use crate::scanner::DuplicateScanner;
use crate::store::UserContext;
use crate::wire::{DeleteRequest, DeleteResponse, ScanResponse};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

pub const USER_HEADER: &str = "x-user-id";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub scanner: Arc<DuplicateScanner>,
    pub executor: Arc<DeletionExecutor>,
}

#[derive(Serialize)]
struct HealthResponse {
    success: bool,
    data: &'static str,
}

fn caller(headers: &HeaderMap) -> Result<UserContext, DedupError> {
    let raw = headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| DedupError::Unauthorized(format!("missing {} header", USER_HEADER)))?;
    UserContext::new(raw)
}

fn status_for(err: &DedupError) -> StatusCode {
    match err {
        DedupError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        DedupError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        // Ids from an older scan that are already gone
        DedupError::NotFound(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// GET /api/health
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        success: true,
        data: "OK",
    })
}

/// POST /api/duplicates/scan
async fn scan_duplicates(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let ctx = match caller(&headers) {
        Ok(ctx) => ctx,
        Err(e) => return (status_for(&e), Json(ScanResponse::failed(e.to_string()))).into_response(),
    };

    match state.scanner.scan(&ctx).await {
        Ok(report) => (StatusCode::OK, Json(ScanResponse::from(report))).into_response(),
        Err(e) => {
            warn!(user_id = %ctx.user_id, error = %e, "scan request failed");
            (status_for(&e), Json(ScanResponse::failed(e.to_string()))).into_response()
        }
    }
}

/// POST /api/transactions/delete
async fn delete_transactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<DeleteRequest>,
) -> Response {
    let ctx = match caller(&headers) {
        Ok(ctx) => ctx,
        Err(e) => return (status_for(&e), Json(DeleteResponse::failed(e.to_string()))).into_response(),
    };

    match state.executor.execute(&ctx, &request.ids).await {
        Ok(deleted) => (StatusCode::OK, Json(DeleteResponse::deleted(deleted))).into_response(),
        Err(e) => (status_for(&e), Json(DeleteResponse::failed(e.to_string()))).into_response(),
    }
}

/// API routes, to be nested under `/api`
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/duplicates/scan", post(scan_duplicates))
        .route("/transactions/delete", post(delete_transactions))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ensure_named, insert_transaction, NamedTable, NewTransaction};
    use crate::deduplication::DeduplicationEngine;
    use crate::store::SqliteStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::NaiveDate;
    use tower::ServiceExt;

    fn seeded_app() -> (Router, SqliteStore, Vec<String>) {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut ids = Vec::new();
        {
            let conn = store.lock().unwrap();
            let account_id = ensure_named(&conn, NamedTable::Accounts, "alice", "Checking").unwrap();
            for day in [1, 3] {
                let id = insert_transaction(
                    &conn,
                    "alice",
                    &NewTransaction {
                        account_id: account_id.clone(),
                        description: "Water utility".to_string(),
                        amount_minor: -6000,
                        event_date: NaiveDate::from_ymd_opt(2024, 8, day).unwrap(),
                        category_id: None,
                        counterparty_id: None,
                        idempotency_hash: None,
                    },
                )
                .unwrap()
                .unwrap();
                ids.push(id);
            }
        }

        let shared: Arc<SqliteStore> = Arc::new(store.clone());
        let state = AppState {
            scanner: Arc::new(DuplicateScanner::new(shared.clone(), DeduplicationEngine::new())),
            executor: Arc::new(DeletionExecutor::new(shared)),
        };
        (Router::new().nest("/api", router(state)), store, ids)
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _, _) = seeded_app();
        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_scan_requires_caller() {
        let (app, _, _) = seeded_app();
        let response = app
            .oneshot(Request::post("/api/duplicates/scan").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains(USER_HEADER));
    }

    #[tokio::test]
    async fn test_scan_returns_groups() {
        let (app, _, _) = seeded_app();
        let response = app
            .oneshot(
                Request::post("/api/duplicates/scan")
                    .header(USER_HEADER, "alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["scanned_transactions"], 2);
        assert_eq!(body["total_duplicates_found"], 1);
        assert_eq!(body["duplicate_groups"][0]["days_apart"], 2);
        assert_eq!(body["duplicate_groups"][0]["confidence"], 58);
    }

    #[tokio::test]
    async fn test_scan_is_scoped_to_caller() {
        let (app, _, _) = seeded_app();
        let response = app
            .oneshot(
                Request::post("/api/duplicates/scan")
                    .header(USER_HEADER, "bob")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = json_body(response).await;
        assert_eq!(body["scanned_transactions"], 0);
        assert_eq!(body["duplicate_groups"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_delete_endpoint() {
        let (app, store, ids) = seeded_app();
        let payload = serde_json::to_string(&DeleteRequest { ids: vec![ids[0].clone()] }).unwrap();
        let response = app
            .oneshot(
                Request::post("/api/transactions/delete")
                    .header(USER_HEADER, "alice")
                    .header("content-type", "application/json")
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body, serde_json::json!({ "success": true, "deleted": 1 }));
        assert_eq!(crate::db::count_transactions(&store.lock().unwrap(), "alice").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_unknown_id_fails_whole_batch() {
        let (app, store, ids) = seeded_app();
        let payload = serde_json::to_string(&DeleteRequest {
            ids: vec![ids[0].clone(), "ghost".to_string()],
        })
        .unwrap();
        let response = app
            .oneshot(
                Request::post("/api/transactions/delete")
                    .header(USER_HEADER, "alice")
                    .header("content-type", "application/json")
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("ghost"));
        assert_eq!(crate::db::count_transactions(&store.lock().unwrap(), "alice").unwrap(), 2);
    }
}
