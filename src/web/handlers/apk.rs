//! APK handlers: upload, list, rename and delete.

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::web::dto::{ApkResponse, DeleteRequest, RenameRequest, UploadForm, ValidatedJson};
use crate::web::error::{ApiError, ErrorBody};
use crate::web::handlers::AppState;
use crate::DepotError;

/// POST /upload-apk - Upload an APK.
///
/// Request body: multipart/form-data with the file in the `apk` field.
#[utoipa::path(
    post,
    path = "/upload-apk",
    tag = "apks",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "APK stored", body = String),
        (status = 400, description = "No file uploaded", body = ErrorBody),
        (status = 409, description = "Generated filename already taken", body = ErrorBody),
        (status = 413, description = "File too large", body = ErrorBody),
        (status = 415, description = "Not an APK", body = ErrorBody),
        (status = 500, description = "Store error", body = ErrorBody)
    )
)]
pub async fn upload_apk(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, String), ApiError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::warn!("Rejected upload without multipart body: {}", e);
        ApiError::from(DepotError::MissingFile)
    })?;
    let field_name = state.depot.policy().field_name.clone();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::warn!("Failed to read multipart field: {}", e);
        ApiError::bad_request("Invalid multipart data")
    })? {
        if field.name() != Some(field_name.as_str()) {
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        tracing::debug!(
            original_name = field.file_name().unwrap_or(""),
            content_type = content_type.as_deref().unwrap_or("none"),
            "Receiving upload"
        );

        let outcome = state
            .depot
            .upload(&field_name, content_type.as_deref(), field)
            .await?;

        return Ok((
            StatusCode::CREATED,
            format!("APK uploaded successfully: {}", outcome.filename),
        ));
    }

    Err(DepotError::MissingFile.into())
}

/// GET /apks - List stored APKs in upload order.
#[utoipa::path(
    get,
    path = "/apks",
    tag = "apks",
    responses(
        (status = 200, description = "Stored APKs", body = Vec<ApkResponse>),
        (status = 500, description = "Metadata unreadable", body = ErrorBody)
    )
)]
pub async fn list_apks(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ApkResponse>>, ApiError> {
    let apks = state.depot.list().await?;
    Ok(Json(apks.into_iter().map(ApkResponse::from).collect()))
}

/// PATCH /rename-apk - Rename a stored APK.
#[utoipa::path(
    patch,
    path = "/rename-apk",
    tag = "apks",
    request_body = RenameRequest,
    responses(
        (status = 200, description = "APK renamed", body = String),
        (status = 400, description = "Missing or invalid filenames", body = ErrorBody),
        (status = 404, description = "Original APK not found", body = ErrorBody),
        (status = 409, description = "Target name already exists", body = ErrorBody),
        (status = 500, description = "Store error", body = ErrorBody)
    )
)]
pub async fn rename_apk(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RenameRequest>,
) -> Result<String, ApiError> {
    let renamed = state
        .depot
        .rename(&req.old_filename, &req.new_filename)
        .await?;

    Ok(format!("APK renamed successfully to {renamed}"))
}

/// DELETE /delete-apk - Delete a stored APK.
///
/// Deleting a file that is already gone succeeds; any metadata entries still
/// naming it are removed.
#[utoipa::path(
    delete,
    path = "/delete-apk",
    tag = "apks",
    request_body = DeleteRequest,
    responses(
        (status = 200, description = "APK deleted", body = String),
        (status = 400, description = "Missing or invalid filename", body = ErrorBody),
        (status = 500, description = "Store error", body = ErrorBody)
    )
)]
pub async fn delete_apk(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<DeleteRequest>,
) -> Result<String, ApiError> {
    state.depot.delete(&req.filename).await?;

    Ok("APK deleted successfully".to_string())
}
