//! Serve command - HTTP API over the pipeline.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Path, State, multipart::MultipartError,
        rejection::JsonRejection,
    },
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::Args;
use serde::Serialize;
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use billscan_core::registry::{is_captcha_ref, purge_expired};
use billscan_core::{
    IngestError, IngestReport, Pipeline, VerifyError, VerifyOutcome, VerifyRequest,
};

use super::{load_config, open_pipeline};

/// Header carrying the user id established by the upstream auth layer.
const USER_HEADER: &str = "x-user-id";

/// Largest accepted upload.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Arguments for the serve command.
#[derive(Args)]
pub struct ServeArgs {
    /// Address to bind (overrides server.host)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides server.port)
    #[arg(short, long)]
    port: Option<u16>,
}

/// Application state shared across handlers
struct AppState {
    pipeline: Pipeline,
    uploads_dir: PathBuf,
    captcha_ttl: Duration,
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

pub async fn run(args: ServeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    info!("Initializing pipeline...");
    let (pipeline, _store) = open_pipeline(&config).await?;
    tokio::fs::create_dir_all(&config.storage.uploads_dir).await?;

    let state = Arc::new(AppState {
        pipeline,
        uploads_dir: config.storage.uploads_dir.clone(),
        captcha_ttl: config.storage.captcha_ttl(),
    });

    let host = args.host.unwrap_or(config.server.host);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address: {}", e))?;

    info!("Server listening on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /health             - Health check");
    info!("  POST /api/process-bill   - Ingest a receipt image");
    info!("  POST /api/validate-gst   - Verify a GST number and save the expense");
    info!("  POST /api/captcha        - Fetch a fresh captcha");
    info!("  GET  /uploads/:filename  - Captcha images");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/process-bill", post(process_bill_handler))
        .route("/api/validate-gst", post(validate_gst_handler))
        .route("/api/captcha", post(captcha_handler))
        .route("/uploads/:filename", get(upload_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn process_bill_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let user_id = match authenticate(&state, &headers).await {
        Ok(id) => id,
        Err(response) => return response,
    };
    let request_id = Uuid::new_v4().to_string();
    let start = Instant::now();

    let bytes = match read_file_field(&mut multipart).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return error_response(StatusCode::BAD_REQUEST, "No file uploaded"),
        Err(e) => {
            warn!(request_id = %request_id, error = %e, "Malformed upload");
            return error_response(StatusCode::BAD_REQUEST, "No file uploaded");
        }
    };
    info!(request_id = %request_id, user_id = %user_id, bytes = bytes.len(), "Processing bill");

    match state.pipeline.ingest(bytes).await {
        Ok(report) => {
            info!(
                request_id = %request_id,
                stage = ?report.stage,
                total_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Bill processed"
            );
            (StatusCode::OK, Json(ingest_envelope(&report))).into_response()
        }
        Err(e @ IngestError::Extraction(_)) => {
            warn!(request_id = %request_id, error = ?e, "Extraction failed");
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
        Err(e @ IngestError::Internal(_)) => {
            error!(request_id = %request_id, error = ?e, "Processing failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

async fn validate_gst_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Response {
    let user_id = match authenticate(&state, &headers).await {
        Ok(id) => id,
        Err(response) => return response,
    };
    let Ok(Json(request)) = body else {
        return error_response(
            StatusCode::BAD_REQUEST,
            &VerifyError::MissingFields.to_string(),
        );
    };

    match state.pipeline.verify(&user_id, &request).await {
        Ok(outcome) => (StatusCode::OK, Json(verify_envelope(&outcome))).into_response(),
        Err(e @ VerifyError::Store(_)) => {
            error!(user_id = %user_id, error = %e, "Failed to persist verified records");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Processing failed")
        }
        Err(e) => {
            info!(user_id = %user_id, error = ?e, "GST validation rejected");
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
    }
}

async fn captcha_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(response) = authenticate(&state, &headers).await {
        return response;
    }

    match state.pipeline.refresh_captcha().await {
        Ok(challenge) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "captcha_data": captcha_data(&challenge.image_ref, &challenge.session_token),
            })),
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Captcha unavailable");
            error_response(StatusCode::SERVICE_UNAVAILABLE, "Captcha unavailable")
        }
    }
}

async fn upload_handler(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Response {
    if !is_captcha_ref(&filename) {
        return error_response(StatusCode::NOT_FOUND, "Not found");
    }

    if let Err(e) = purge_expired(&state.uploads_dir, state.captcha_ttl).await {
        warn!("Failed to purge expired captchas: {}", e);
    }

    match tokio::fs::read(state.uploads_dir.join(&filename)).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "image/png"),
                (header::CACHE_CONTROL, "no-store"),
            ],
            bytes,
        )
            .into_response(),
        Err(_) => error_response(StatusCode::NOT_FOUND, "Not found"),
    }
}

/// Resolve the caller from the auth header and check it with the store.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<String, Response> {
    let Some(user_id) = headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    else {
        return Err(error_response(StatusCode::UNAUTHORIZED, "Unauthorized"));
    };

    match state.pipeline.store().find_user(user_id).await {
        Ok(Some(user)) => Ok(user.id),
        Ok(None) => Err(error_response(StatusCode::UNAUTHORIZED, "Unauthorized")),
        Err(e) => {
            error!(error = %e, "User lookup failed");
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Processing failed",
            ))
        }
    }
}

/// Bytes of the multipart field named `file`, if present and non-empty.
async fn read_file_field(multipart: &mut Multipart) -> Result<Option<Vec<u8>>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let data = field.bytes().await?;
            return Ok((!data.is_empty()).then(|| data.to_vec()));
        }
    }
    Ok(None)
}

fn ingest_envelope(report: &IngestReport) -> Value {
    let mut body = json!({
        "success": true,
        "data": report.invoice,
        "stage": report.stage,
        "parse_path": report.parse_path,
        "warnings": report.warnings,
    });
    if let Some(challenge) = &report.captcha {
        body["captcha_data"] = captcha_data(&challenge.image_ref, &challenge.session_token);
    }
    body
}

fn verify_envelope(outcome: &VerifyOutcome) -> Value {
    json!({
        "success": true,
        "gst_data": outcome.registrant.raw,
        "location_data": outcome.location,
        "expense_saved": outcome.expense_saved(),
    })
}

fn captcha_data(image_ref: &str, session_token: &str) -> Value {
    json!({
        "captcha_image": format!("/uploads/{}", image_ref),
        "captcha_cookie": session_token,
    })
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
