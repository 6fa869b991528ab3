use crate::importer::BatchImporter;
use crate::models::ImportError;
use axum::{
    body::Bytes,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use common::AppState;
use serde_json::json;
use std::sync::Arc;

const FILE_FIELD: &str = "file";

impl IntoResponse for ImportError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ImportError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ImportError::Persistence(msg) => {
                tracing::error!("Error uploading CSV file: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An error occurred while processing the CSV file".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": msg }))).into_response()
    }
}

pub fn imports_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/upload", post(upload_statement))
        .with_state(state)
}

/// Takes the first `file` part of the form; other parts are skipped.
async fn read_upload(multipart: &mut Multipart) -> Result<Option<(String, Bytes)>, ImportError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ImportError::InvalidInput(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ImportError::InvalidInput(e.body_text()))?;
        return Ok(Some((file_name, data)));
    }
    Ok(None)
}

fn is_csv(file_name: &str) -> bool {
    file_name.to_ascii_lowercase().ends_with(".csv")
}

async fn upload_statement(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, ImportError> {
    let (file_name, data) = match read_upload(&mut multipart).await? {
        Some((name, data)) if !data.is_empty() => (name, data),
        _ => return Err(ImportError::InvalidInput("No file uploaded".into())),
    };

    if !is_csv(&file_name) {
        return Err(ImportError::InvalidInput("File must be a CSV file".into()));
    }

    tracing::info!(file_name = %file_name, bytes = data.len(), "Received statement upload");
    let outcome = BatchImporter::import(&state.db, data.as_ref()).await?;

    let status = if outcome.successful_imports == 0 {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)).into_response())
}
