use crate::ledger::CategoryLedger;
use crate::models::{CategorySpending, CategorySummary, RawCategoryRequest};
use crate::service::{CategoryError, CategoryService};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{Datelike, Utc};
use common::AppState;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

impl IntoResponse for CategoryError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            CategoryError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            CategoryError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            CategoryError::InUse(msg) => (StatusCode::CONFLICT, msg),
            CategoryError::NotFound => (StatusCode::NOT_FOUND, "Category not found".to_string()),
            CategoryError::Infrastructure(msg) => {
                tracing::error!("Category infrastructure error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": msg }))).into_response()
    }
}

pub fn categories_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/{id}", get(get_category).put(update_category).delete(delete_category))
        .route("/{id}/spending", get(get_spending))
        .route("/{id}/spending/monthly", get(get_monthly_spending))
        .with_state(state)
}

#[derive(Deserialize)]
pub struct YearQuery {
    pub year: Option<i32>,
}

impl YearQuery {
    // 0 or absent means the current year
    fn resolve(&self) -> i32 {
        self.year
            .filter(|y| *y != 0)
            .unwrap_or_else(|| Utc::now().year())
    }
}

async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CategorySummary>>, CategoryError> {
    let categories = CategoryService::list_categories(&state.db).await?;
    Ok(Json(categories))
}

async fn get_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<CategorySummary>, CategoryError> {
    let category = CategoryService::get_category_summary(&state.db, id).await?;
    Ok(Json(category))
}

async fn create_category(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RawCategoryRequest>,
) -> Result<impl IntoResponse, CategoryError> {
    let category = CategoryService::create_category(&state.db, payload.name, payload.description).await?;
    let summary = CategorySummary::new(category, 0, Decimal::ZERO);
    Ok((StatusCode::CREATED, Json(summary)))
}

async fn update_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<RawCategoryRequest>,
) -> Result<Json<CategorySummary>, CategoryError> {
    CategoryService::update_category(&state.db, id, payload.name, payload.description).await?;
    let summary = CategoryService::get_category_summary(&state.db, id).await?;
    Ok(Json(summary))
}

async fn delete_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, CategoryError> {
    CategoryService::delete_category(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_spending(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Decimal>, CategoryError> {
    let total = CategoryLedger::total_spending(&state.db, id).await?;
    Ok(Json(total))
}

async fn get_monthly_spending(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(params): Query<YearQuery>,
) -> Result<Json<CategorySpending>, CategoryError> {
    let report = CategoryLedger::spending_report(&state.db, id, params.resolve()).await?;
    Ok(Json(report))
}
