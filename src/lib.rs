pub mod config;
pub mod error;
pub mod routes;
pub mod sink;
pub mod state;
pub mod submission;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::sink::Sink;
use crate::sink::journal::FileJournalSink;
use crate::sink::relational::RelationalSink;
use crate::sink::sheet::RemoteSheetSink;
use crate::state::{AppState, SharedState};
use crate::submission::pipeline::SubmissionAppender;

/// Build the router and shared state. The relational sink must already be
/// opened (schema bootstrapped) by the caller.
pub fn build_app(relational: Arc<RelationalSink>, config: Config) -> Result<Router, String> {
    let mut sinks: Vec<Arc<dyn Sink>> = Vec::new();
    sinks.push(Arc::new(FileJournalSink::new(&config.journal_path)));
    sinks.push(relational.clone());

    match config.sheet.as_ref() {
        Some(sheet) => {
            let sink = RemoteSheetSink::new(
                sheet.key.clone(),
                sheet.spreadsheet_id.clone(),
                sheet.range.clone(),
            )?;
            sinks.push(Arc::new(sink));
            tracing::info!("Sheet sink enabled for spreadsheet {}", sheet.spreadsheet_id);
        }
        None => {
            tracing::warn!("Sheet sink disabled: FORMSINK_SHEET_ID not set");
        }
    }

    let appender =
        SubmissionAppender::new(sinks, config.sink_timeout, config.success_policy.clone());

    let cors = if config.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>()
                    .map_err(|e| format!("Invalid CORS origin '{o}': {e}"))
            })
            .collect::<Result<Vec<_>, String>>()?;
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let max_body_size = config.max_body_size;

    let state: SharedState = Arc::new(AppState {
        config,
        appender,
        relational,
    });

    Ok(Router::new()
        .merge(routes::routes())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
