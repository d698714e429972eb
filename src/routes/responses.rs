use axum::Json;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use serde_json::json;

use crate::error::AppError;
use crate::sink::relational::StoredSubmission;
use crate::state::SharedState;
use crate::submission::record::FIELD_NAMES;

/// All stored rows, most recent first.
pub async fn list(State(state): State<SharedState>) -> Result<Json<serde_json::Value>, AppError> {
    let rows = state.relational.list_all().await?;
    Ok(Json(json!({ "success": true, "data": rows })))
}

/// All stored rows in arrival order, as a CSV attachment.
pub async fn export_csv(State(state): State<SharedState>) -> Result<impl IntoResponse, AppError> {
    let rows = state.relational.list_oldest_first().await?;
    let csv = render_csv(&rows);

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"responses.csv\"",
            ),
        ],
        csv,
    ))
}

/// The raw SQLite file as a binary attachment.
pub async fn download_db(State(state): State<SharedState>) -> Result<impl IntoResponse, AppError> {
    let bytes = tokio::fs::read(state.relational.db_path())
        .await
        .map_err(|e| AppError::Internal(format!("Failed to read database file: {e}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"responses.db\"",
            ),
        ],
        bytes,
    ))
}

fn render_csv(rows: &[StoredSubmission]) -> String {
    use std::fmt::Write;
    let mut csv = String::new();

    let _ = write!(csv, "id,timestamp");
    for name in FIELD_NAMES {
        let _ = write!(csv, ",{name}");
    }
    let _ = writeln!(csv);

    for row in rows {
        let _ = write!(csv, "{},{}", row.id, row.submission.timestamp);
        for name in FIELD_NAMES {
            let _ = write!(csv, ",{}", csv_escape(row.submission.value(name)));
        }
        let _ = writeln!(csv);
    }

    csv
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
