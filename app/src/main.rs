use axum::{extract::DefaultBodyLimit, Router};
use clap::Parser;
use common::{AppState, Config};
use database::Database;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine; real environment variables still apply
    dotenvy::dotenv().ok();

    // 1. Initialize Logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Load Config from CLI args and environment
    let config = Config::parse();

    // 3. Initialize Database
    let db = Database::new(&config.database_url).await?;
    db.run_migrations().await?;

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
    });

    // 4. Start Server
    let app = build_router(state);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let transactions = transactions::handler::transactions_router(state.clone())
        .merge(imports::handler::imports_router(state.clone()));

    let api = Router::<Arc<AppState>>::new()
        .nest("/transactions", transactions)
        .nest("/categories", categories::handler::categories_router(state.clone()));

    Router::<Arc<AppState>>::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{self, Body},
        http::{Request, StatusCode},
    };
    use database::get_test_db;
    use tower::ServiceExt;

    async fn app() -> Router {
        let db = get_test_db().await;
        build_router(Arc::new(AppState { db, config: Config::for_tests() }))
    }

    async fn read_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_routes_are_mounted_under_api() {
        let app = app().await;

        let request = Request::builder()
            .method("POST")
            .uri("/api/categories")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name":"Groceries"}"#))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let request = Request::builder().uri("/api/transactions").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await, serde_json::json!([]));

        let request = Request::builder().uri("/categories").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_then_list_batch() {
        let app = app().await;
        let boundary = "B0UNDARY";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"jan.csv\"\r\n\r\nTransaction Date,Description,Debits,Credits,Balance\n01/05/2024,Bakery,$4.20,,\r\n--{boundary}--\r\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri("/api/transactions/upload")
            .header("content-type", format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let outcome = read_json(response).await;
        let batch_id = outcome["uploadBatchId"].as_str().unwrap().to_string();

        let request = Request::builder()
            .uri(format!("/api/transactions/batch/{}", batch_id))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let listed = read_json(response).await;
        assert_eq!(listed[0]["description"], "Bakery");
        assert_eq!(listed[0]["debit"], "4.20");
        assert_eq!(listed[0]["transactionDate"], "2024-01-05");
    }
}
