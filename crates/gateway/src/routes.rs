use crate::error::ApiError;
use crate::pdf::render_pdf;
use crate::pipeline::{PipelineError, PredictionEnvelope};
use crate::session::ensure_session;
use crate::state::AppState;
use crate::stats::SessionStats;
use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State, multipart::MultipartRejection},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::{Value, json};
use store::SessionId;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

const RECORD_NOT_FOUND: &str = "Record not found";
const IMAGE_NOT_FOUND: &str = "Image not found";

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/api/history", get(history))
        .route("/api/clear-history", post(clear_history))
        .route("/api/stats", get(stats))
        .route("/export-pdf/:id", get(export_pdf))
        .route("/image/:id", get(image))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(middleware::from_fn(ensure_session))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(bind_addr: &str, app: Router) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("HTTP server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Run file and model work off the async executor.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(ApiError::server)
}

async fn predict(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionEnvelope>, ApiError> {
    let mut multipart = multipart?;
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("image") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        upload = Some((filename, bytes));
        break;
    }

    let (filename, bytes) = upload
        .filter(|(filename, _)| !filename.is_empty())
        .ok_or(PipelineError::MissingFile)?;

    let service = state.service.clone();
    let envelope = blocking(move || service.predict(&session, &bytes, &filename)).await??;

    Ok(Json(envelope))
}

async fn history(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
) -> Result<Json<Value>, ApiError> {
    let service = state.service.clone();
    let records = blocking(move || service.list_history(&session)).await?;

    Ok(Json(json!({ "success": true, "history": records })))
}

async fn clear_history(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
) -> Result<Json<Value>, ApiError> {
    let service = state.service.clone();
    blocking(move || service.clear_history(&session))
        .await?
        .map_err(ApiError::server)?;

    Ok(Json(json!({ "success": true, "message": "History cleared." })))
}

#[derive(Serialize)]
struct StatsResponse {
    success: bool,
    #[serde(flatten)]
    stats: SessionStats,
}

async fn stats(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
) -> Result<Json<StatsResponse>, ApiError> {
    let service = state.service.clone();
    let stats = blocking(move || service.stats(&session)).await?;

    Ok(Json(StatsResponse {
        success: true,
        stats,
    }))
}

async fn export_pdf(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let service = state.service.clone();
    let rendered = blocking(move || {
        service
            .render_report(&session, &id)
            .map(|report| render_pdf(&report).map(|pdf| (report.file_name(), pdf)))
    })
    .await?;

    let (file_name, pdf) = rendered
        .ok_or(ApiError::NotFound(RECORD_NOT_FOUND))?
        .map_err(ApiError::Server)?;

    Ok((
        [
            (CONTENT_TYPE, "application/pdf".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        pdf,
    )
        .into_response())
}

async fn image(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let service = state.service.clone();
    let bytes = blocking(move || service.get_image(&session, &id))
        .await?
        .map_err(ApiError::server)?
        .ok_or(ApiError::NotFound(IMAGE_NOT_FOUND))?;

    Ok(([(CONTENT_TYPE, "image/jpeg")], bytes).into_response())
}
