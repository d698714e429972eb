pub mod responses;
pub mod submit;

use axum::Router;
use axum::routing::{get, post};

use crate::state::SharedState;

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(liveness))
        .route("/submit", post(submit::submit))
        .route("/responses", get(responses::list))
        .route("/export-csv", get(responses::export_csv))
        .route("/download-db", get(responses::download_db))
}

async fn liveness() -> &'static str {
    "Survey backend is running"
}
