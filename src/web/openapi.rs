//! OpenAPI document and Swagger UI.

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::dto::{ApkResponse, DeleteRequest, RenameRequest, UploadForm};
use super::error::{ErrorBody, ErrorCode, ErrorDetail};
use super::handlers::apk;

/// OpenAPI description of the APK endpoints.
#[derive(OpenApi)]
#[openapi(
    info(title = "APK Depot", description = "Upload, list, rename and delete APK files"),
    paths(apk::upload_apk, apk::list_apks, apk::rename_apk, apk::delete_apk),
    components(schemas(
        ApkResponse,
        RenameRequest,
        DeleteRequest,
        UploadForm,
        ErrorBody,
        ErrorDetail,
        ErrorCode
    )),
    tags((name = "apks", description = "APK file management"))
)]
pub struct ApiDoc;

/// Swagger UI at `/swagger-ui`, backed by `/api-docs/openapi.json`.
pub fn create_swagger_router() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
