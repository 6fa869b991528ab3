use crate::models::{
    AssignCategoryRequest, BulkCategorizeRequest, BulkCategorizeResult, RawCreateTransactionRequest, Transaction,
    TransactionFilter,
};
use crate::service::{TransactionError, TransactionService};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{Datelike, Utc};
use common::AppState;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

impl IntoResponse for TransactionError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            TransactionError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            TransactionError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            TransactionError::Infrastructure(msg) => {
                tracing::error!("Transaction infrastructure error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": msg }))).into_response()
    }
}

#[derive(Deserialize)]
pub struct SummaryQuery {
    pub year: Option<i32>,
}

pub fn transactions_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_transactions).post(create_transaction))
        .route("/bulk-categorize", post(bulk_categorize))
        .route("/summary/monthly", get(monthly_summary))
        .route("/batch/{batch_id}", get(list_batch).delete(rollback_batch))
        .route("/{id}", get(get_transaction).delete(delete_transaction))
        .route("/{id}/category", put(assign_category).delete(remove_category))
        .with_state(state)
}

async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<TransactionFilter>,
) -> Result<Json<Vec<Transaction>>, TransactionError> {
    let transactions = TransactionService::list_transactions(&state.db, &filter).await?;
    Ok(Json(transactions))
}

async fn create_transaction(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RawCreateTransactionRequest>,
) -> Result<impl IntoResponse, TransactionError> {
    let transaction = TransactionService::create_transaction(&state.db, payload).await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Transaction>, TransactionError> {
    let transaction = TransactionService::get_transaction(&state.db, id).await?;
    Ok(Json(transaction))
}

async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, TransactionError> {
    TransactionService::delete_transaction(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn assign_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<AssignCategoryRequest>,
) -> Result<Json<Transaction>, TransactionError> {
    let transaction = TransactionService::assign_category(&state.db, id, payload.category_id).await?;
    Ok(Json(transaction))
}

async fn remove_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Transaction>, TransactionError> {
    let transaction = TransactionService::remove_category(&state.db, id).await?;
    Ok(Json(transaction))
}

async fn bulk_categorize(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BulkCategorizeRequest>,
) -> Result<Json<BulkCategorizeResult>, TransactionError> {
    let result = TransactionService::bulk_categorize(&state.db, &payload.transaction_ids, payload.category_id).await?;
    Ok(Json(result))
}

async fn monthly_summary(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SummaryQuery>,
) -> Result<Json<BTreeMap<String, Decimal>>, TransactionError> {
    let year = params
        .year
        .filter(|y| *y != 0)
        .unwrap_or_else(|| Utc::now().year());
    let summary = TransactionService::monthly_summary(&state.db, year).await?;
    Ok(Json(summary))
}

async fn list_batch(
    State(state): State<Arc<AppState>>,
    Path(batch_id): Path<Uuid>,
) -> Result<Json<Vec<Transaction>>, TransactionError> {
    let transactions = TransactionService::list_batch(&state.db, batch_id).await?;
    Ok(Json(transactions))
}

async fn rollback_batch(
    State(state): State<Arc<AppState>>,
    Path(batch_id): Path<Uuid>,
) -> Result<impl IntoResponse, TransactionError> {
    let removed = TransactionService::rollback_batch(&state.db, batch_id).await?;
    Ok(Json(json!({ "uploadBatchId": batch_id, "removed": removed })))
}
