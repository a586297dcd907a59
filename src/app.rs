use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, Request, State, multipart::MultipartError},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::cell::CellValue;
use crate::config::ServerConfig;
use crate::error::SheetError;
use crate::session::{Export, ExportFormat, OpenFile, StoreService, WorkbookService};
use crate::spreadsheet::Document;
use crate::store::MemoryStore;

lazy_static! {
    static ref UNSAFE_FILENAME_CHARS: Regex = Regex::new(r#"[^A-Za-z0-9._ ()-]"#).unwrap();
}

pub struct AppState {
    service: Arc<dyn WorkbookService>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangeSheet {
    sheet_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CellUpdate {
    row_index: i64,
    column_index: i64,
    #[serde(default)]
    value: CellValue,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportQuery {
    file_name: Option<String>,
    format: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Everything a client needs to render a file: the active sheet flattened into
/// `headers`/`data` plus every sheet by name.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FilePayload<'a> {
    file_id: &'a str,
    file_name: &'a str,
    headers: &'a [String],
    data: &'a [Vec<CellValue>],
    sheet_names: &'a [String],
    active_sheet: &'a str,
    sheets: SheetsByName<'a>,
}

impl<'a> From<&'a OpenFile> for FilePayload<'a> {
    fn from(open: &'a OpenFile) -> Self {
        let doc: &Document = &open.document;
        FilePayload {
            file_id: &open.file_id,
            file_name: &open.file_name,
            headers: doc.headers(),
            data: doc.data(),
            sheet_names: doc.sheet_names(),
            active_sheet: doc.active_sheet(),
            sheets: SheetsByName(doc),
        }
    }
}

// Serialized as a JSON object in workbook order.
struct SheetsByName<'a>(&'a Document);

impl Serialize for SheetsByName<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.sheet_names().len()))?;
        for (name, table) in self.0.sheets() {
            map.serialize_entry(name, table)?;
        }
        map.end()
    }
}

fn file_response(open: &OpenFile) -> Response {
    Json(FilePayload::from(open)).into_response()
}

/// Failure of one request, rendered as `{ "error": ... }`.
pub enum ApiError {
    Sheet(SheetError),
    Multipart(MultipartError),
}

impl From<SheetError> for ApiError {
    fn from(e: SheetError) -> Self {
        ApiError::Sheet(e)
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::Multipart(e)
    }
}

fn status_for(error: &SheetError) -> StatusCode {
    match error {
        SheetError::NotFound(_) => StatusCode::NOT_FOUND,
        SheetError::Serialize(_) => StatusCode::INTERNAL_SERVER_ERROR,
        SheetError::Parse(_)
        | SheetError::UnknownSheet(_)
        | SheetError::Index { .. }
        | SheetError::Unsupported(_) => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Sheet(e) => (status_for(&e), e.to_string()),
            ApiError::Multipart(e) => (e.status(), e.body_text()),
        };
        if status.is_server_error() {
            log::error!("{}", message);
        } else {
            log::warn!("{}", message);
        }
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Build the HTTP router around a workbook service.
pub fn router(service: Arc<dyn WorkbookService>, max_upload_bytes: usize) -> Router {
    let app_state = Arc::new(AppState { service });

    Router::new()
        .route("/health", get(health))
        .route("/api/upload", post(upload_file))
        .route("/api/sheets/:file_id", get(get_file).delete(close_file))
        .route("/api/sheets/:file_id/change-sheet", post(change_sheet))
        .route("/api/sheets/:file_id/update-cell", post(update_cell))
        .route("/api/sheets/:file_id/export", get(export_file))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(middleware::from_fn(log_requests))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

pub async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let service: Arc<dyn WorkbookService> = Arc::new(
        StoreService::new(Arc::new(MemoryStore::new(config.ttl))).with_max_cells(config.max_cells),
    );

    if config.ttl.is_some() {
        let sweeper = Arc::clone(&service);
        let every = config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                sweeper.evict_expired();
            }
        });
    }

    let app = router(service, config.max_upload_bytes);

    // Start server
    let listener = TcpListener::bind(config.addr).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("cannot listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("shutting down");
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = Instant::now();

    let response = next.run(request).await;

    log::info!(
        "{} {} -> {} ({:.1?})",
        method,
        uri.path(),
        response.status().as_u16(),
        started.elapsed()
    );
    response
}

async fn health() -> &'static str {
    "ok"
}

async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;

        let open = state.service.upload(&file_name, &bytes)?;
        return Ok(file_response(&open));
    }

    Err(SheetError::Unsupported("No file uploaded".to_string()).into())
}

async fn get_file(
    Path(file_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let open = state.service.open_file(&file_id)?;
    Ok(file_response(&open))
}

async fn change_sheet(
    Path(file_id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChangeSheet>,
) -> Result<Response, ApiError> {
    let open = state.service.switch_sheet(&file_id, &payload.sheet_name)?;
    Ok(file_response(&open))
}

async fn update_cell(
    Path(file_id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CellUpdate>,
) -> Result<Response, ApiError> {
    let open = state.service.update_cell(
        &file_id,
        payload.row_index,
        payload.column_index,
        payload.value,
    )?;
    Ok(file_response(&open))
}

async fn export_file(
    Path(file_id): Path<String>,
    Query(params): Query<ExportQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let format = match params.format.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("xlsx") => ExportFormat::Xlsx,
        Some("csv") => ExportFormat::Csv,
        Some(other) => {
            return Err(SheetError::Unsupported(format!("unknown export format: {}", other)).into());
        }
    };

    let export = state
        .service
        .export(&file_id, params.file_name.as_deref(), format)?;
    Ok(download_response(export))
}

fn download_response(export: Export) -> Response {
    let disposition = content_disposition(&export.file_name);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, export.format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export.bytes,
    )
        .into_response()
}

/// `attachment` disposition with an ASCII fallback name and the exact name percent-encoded.
pub fn content_disposition(file_name: &str) -> String {
    let fallback = UNSAFE_FILENAME_CHARS.replace_all(file_name, "_");
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(file_name)
    )
}

async fn close_file(
    Path(file_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, ApiError> {
    state.service.close(&file_id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_sanitizes_and_encodes() {
        assert_eq!(
            content_disposition("report.xlsx"),
            "attachment; filename=\"report.xlsx\"; filename*=UTF-8''report.xlsx"
        );
        assert_eq!(
            content_disposition("a\"b;ü.xlsx"),
            "attachment; filename=\"a_b__.xlsx\"; filename*=UTF-8''a%22b%3B%C3%BC.xlsx"
        );
    }

    #[test]
    fn error_statuses() {
        assert_eq!(status_for(&SheetError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(&SheetError::UnknownSheet("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&SheetError::index(-1, 0, "negative")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&SheetError::serialize("disk full")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
