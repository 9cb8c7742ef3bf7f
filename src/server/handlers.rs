//! Request handlers.

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};

use super::state::AppState;
use crate::dispatch::Completed;
use crate::error::{PdfCraftError, Result};
use crate::ops::{Engine, OperationSpec};
use crate::ops::inspect::PdfInfo;
use crate::ops::params::Params;
use crate::storage::{FileId, Upload};

/// Multipart field names that carry files.
const FILE_FIELDS: [&str; 3] = ["file", "files", "files[]"];

pub const X_DOWNLOAD_ID: HeaderName = HeaderName::from_static("x-download-id");
pub const X_ORIGINAL_SIZE: HeaderName = HeaderName::from_static("x-original-size");
pub const X_COMPRESSED_SIZE: HeaderName = HeaderName::from_static("x-compressed-size");
pub const X_REDUCTION_PERCENT: HeaderName = HeaderName::from_static("x-reduction-percent");

/// Split a multipart body into uploaded files and text parameters.
async fn read_multipart(mut multipart: Multipart) -> Result<(Vec<Upload>, Params)> {
    let mut uploads = Vec::new();
    let mut params = Params::new();

    while let Some(field) = multipart.next_field().await.map_err(bad_body)? {
        let field_name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);

        if file_name.is_some() || FILE_FIELDS.contains(&field_name.as_str()) {
            let bytes = field.bytes().await.map_err(bad_body)?;
            let name = file_name.unwrap_or_default();
            // Browsers send an empty part for a file input left blank.
            if bytes.is_empty() && name.is_empty() {
                continue;
            }
            let name = if name.is_empty() {
                format!("upload-{}", uploads.len() + 1)
            } else {
                name
            };
            uploads.push(Upload::new(name, bytes.to_vec()));
        } else {
            let value = field.text().await.map_err(bad_body)?;
            params.insert(field_name, value);
        }
    }

    Ok((uploads, params))
}

fn bad_body(err: axum::extract::multipart::MultipartError) -> PdfCraftError {
    PdfCraftError::validation(format!("Could not read the request body: {}", err.body_text()))
}

fn header_value(value: impl ToString) -> Result<HeaderValue> {
    HeaderValue::from_str(&value.to_string())
        .map_err(|e| PdfCraftError::internal("building response headers", e))
}

fn attachment(content_type: &str, file_name: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, header_value(content_type)?);
    headers.insert(
        header::CONTENT_DISPOSITION,
        header_value(format!("attachment; filename=\"{file_name}\""))?,
    );
    Ok(headers)
}

/// `POST /api/:operation`
pub async fn run_operation(
    State(state): State<AppState>,
    Path(operation): Path<String>,
    multipart: Multipart,
) -> Result<Response> {
    let (uploads, params) = read_multipart(multipart).await?;
    let Completed { result, bytes } = state.dispatcher.handle(&operation, uploads, &params).await?;

    let mut headers = attachment(result.format.content_type(), &result.download_name)?;
    headers.insert(X_DOWNLOAD_ID, header_value(&result.id)?);
    if let Some(stats) = result.compression {
        headers.insert(X_ORIGINAL_SIZE, header_value(stats.original_size)?);
        headers.insert(X_COMPRESSED_SIZE, header_value(stats.compressed_size)?);
        headers.insert(X_REDUCTION_PERCENT, header_value(stats.reduction_percent())?);
    }

    Ok((StatusCode::OK, headers, bytes).into_response())
}

/// `GET /api/download/:id`
pub async fn download(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let id: FileId = id.parse()?;
    let bytes = state.dispatcher.fetch_result(&id).await?;

    let content_type = match id.extension() {
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    };
    let headers = attachment(content_type, id.as_str())?;
    Ok((StatusCode::OK, headers, bytes).into_response())
}

/// `POST /api/info`
pub async fn info(State(state): State<AppState>, multipart: Multipart) -> Result<Json<PdfInfo>> {
    let (uploads, _) = read_multipart(multipart).await?;
    let mut uploads = uploads.into_iter();
    let upload = match (uploads.next(), uploads.next()) {
        (Some(upload), None) => upload,
        (None, _) => return Err(PdfCraftError::validation("No file uploaded")),
        (Some(_), Some(_)) => return Err(PdfCraftError::validation("Upload exactly one PDF")),
    };
    Ok(Json(state.dispatcher.inspect(upload).await?))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse<'a> {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub retention_minutes: u64,
    pub max_upload_bytes: usize,
    pub libraries: Libraries,
    pub operations: Vec<OperationStatus<'a>>,
}

/// Which PDF libraries this host can use.
#[derive(Debug, Serialize)]
pub struct Libraries {
    pub lopdf: bool,
    pub pdfium: bool,
}

#[derive(Debug, Serialize)]
pub struct OperationStatus<'a> {
    #[serde(flatten)]
    pub spec: &'a OperationSpec,
    pub available: bool,
}

/// `GET /api/status`
pub async fn status(State(state): State<AppState>) -> Json<Value> {
    let libraries = Libraries {
        lopdf: true,
        pdfium: state.renderer_available,
    };
    let operations = state
        .dispatcher
        .registry()
        .iter()
        .map(|spec| OperationStatus {
            spec,
            available: match spec.engine {
                Engine::Lopdf => libraries.lopdf,
                Engine::Pdfium => libraries.pdfium,
            },
        })
        .collect();
    let response = StatusResponse {
        status: "ok",
        service: crate::NAME,
        version: crate::VERSION,
        retention_minutes: state.config.retention.window().as_secs() / 60,
        max_upload_bytes: state.config.server.max_upload_bytes,
        libraries,
        operations,
    };
    Json(json!(response))
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}
