//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::adapters::storage::remove_file_best_effort;
use crate::web::state::AppState;
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use lesson_plan_core::{
    domain::{DocumentKind, LessonPlan, LessonPlanContent, LessonPlanPatch, NewLessonPlan},
    ports::PortError,
};
use serde::{Deserialize, Serialize};
use std::path::Path as FsPath;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        upload_lesson_plan_handler,
        list_lesson_plans_handler,
        get_lesson_plan_handler,
        get_original_file_handler,
        update_lesson_plan_handler,
        improve_lesson_plan_handler,
        delete_lesson_plan_handler,
        generate_pdf_handler,
    ),
    components(
        schemas(LessonPlanResponse, LessonPlanContentBody, UpdateLessonPlanRequest, ErrorBody)
    ),
    tags(
        (name = "Lesson Plans", description = "Upload, standardize, edit and export lesson plans.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The ten content fields of a lesson plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct LessonPlanContentBody {
    pub title: String,
    pub year_grade: String,
    pub teacher_name: String,
    pub knowledge_area: String,
    pub summary: String,
    pub objectives: String,
    pub skills: String,
    pub estimated_time: String,
    pub resources: String,
    pub step_by_step: String,
}

impl From<LessonPlanContent> for LessonPlanContentBody {
    fn from(c: LessonPlanContent) -> Self {
        Self {
            title: c.title,
            year_grade: c.year_grade,
            teacher_name: c.teacher_name,
            knowledge_area: c.knowledge_area,
            summary: c.summary,
            objectives: c.objectives,
            skills: c.skills,
            estimated_time: c.estimated_time,
            resources: c.resources,
            step_by_step: c.step_by_step,
        }
    }
}

impl From<LessonPlanContentBody> for LessonPlanContent {
    fn from(b: LessonPlanContentBody) -> Self {
        Self {
            title: b.title,
            year_grade: b.year_grade,
            teacher_name: b.teacher_name,
            knowledge_area: b.knowledge_area,
            summary: b.summary,
            objectives: b.objectives,
            skills: b.skills,
            estimated_time: b.estimated_time,
            resources: b.resources,
            step_by_step: b.step_by_step,
        }
    }
}

/// A stored lesson plan as returned by the API.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LessonPlanResponse {
    pub id: Uuid,
    #[serde(flatten)]
    pub content: LessonPlanContentBody,
    pub original_file_path: String,
    pub original_file_mime_type: String,
    pub generated_pdf_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<LessonPlan> for LessonPlanResponse {
    fn from(plan: LessonPlan) -> Self {
        Self {
            id: plan.id,
            content: plan.content.into(),
            original_file_path: plan.original_file_path,
            original_file_mime_type: plan.original_file_mime_type,
            generated_pdf_path: plan.generated_pdf_path,
            created_at: plan.created_at,
        }
    }
}

/// A partial edit. Omitted fields keep their stored value.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLessonPlanRequest {
    pub title: Option<String>,
    pub year_grade: Option<String>,
    pub teacher_name: Option<String>,
    pub knowledge_area: Option<String>,
    pub summary: Option<String>,
    pub objectives: Option<String>,
    pub skills: Option<String>,
    pub estimated_time: Option<String>,
    pub resources: Option<String>,
    pub step_by_step: Option<String>,
}

impl From<UpdateLessonPlanRequest> for LessonPlanPatch {
    fn from(r: UpdateLessonPlanRequest) -> Self {
        Self {
            title: r.title,
            year_grade: r.year_grade,
            teacher_name: r.teacher_name,
            knowledge_area: r.knowledge_area,
            summary: r.summary,
            objectives: r.objectives,
            skills: r.skills,
            estimated_time: r.estimated_time,
            resources: r.resources,
            step_by_step: r.step_by_step,
        }
    }
}

/// The body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

//=========================================================================================
// Error Mapping
//=========================================================================================

pub type HandlerError = (StatusCode, Json<ErrorBody>);

fn error_response(status: StatusCode, message: impl Into<String>) -> HandlerError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

/// Maps a port failure onto a status code. Details stay in the server log.
fn port_error_response(e: PortError, context: &str) -> HandlerError {
    match e {
        PortError::NotFound(msg) => {
            info!("{}: {}", context, msg);
            error_response(StatusCode::NOT_FOUND, "Lesson plan not found")
        }
        PortError::MalformedAiResponse { reason, raw } => {
            error!("{}: malformed AI response ({}). Raw reply:\n{}", context, reason, raw);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, context)
        }
        other => {
            error!("{}: {:?}", context, other);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, context)
        }
    }
}

async fn file_body(path: &FsPath) -> Result<Body, HandlerError> {
    let file = tokio::fs::File::open(path).await.map_err(|e| {
        warn!("Could not open {}: {}", path.display(), e);
        error_response(StatusCode::NOT_FOUND, "File not found")
    })?;
    Ok(Body::from_stream(ReaderStream::new(file)))
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness message.
pub async fn root_handler() -> &'static str {
    "Lesson plan API is running."
}

/// Upload a PDF or DOCX lesson plan and standardize it.
///
/// Accepts a multipart/form-data request with a `file` part. The document text is
/// extracted, structured by the AI model and stored as a new lesson plan.
#[utoipa::path(
    post,
    path = "/api/lesson-plans/upload",
    request_body(content_type = "multipart/form-data", description = "The lesson plan document in a `file` field."),
    responses(
        (status = 201, description = "Lesson plan created", body = LessonPlanResponse),
        (status = 400, description = "No file, unsupported file type or invalid multipart body", body = ErrorBody),
        (status = 413, description = "File too large", body = ErrorBody),
        (status = 500, description = "Processing failed", body = ErrorBody)
    ),
    tag = "Lesson Plans"
)]
pub async fn upload_lesson_plan_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HandlerError> {
    let mut upload: Option<(String, String, Bytes)> = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        error_response(e.status(), format!("Failed to read multipart data: {}", e.body_text()))
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(|e| {
            error_response(e.status(), format!("Failed to read file bytes: {}", e.body_text()))
        })?;
        upload = Some((file_name, content_type, data));
        break;
    }

    let (file_name, content_type, data) = upload
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "No file uploaded."))?;
    let max_upload_bytes = app_state.config.max_upload_bytes;
    if data.len() > max_upload_bytes {
        return Err(error_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("File too large. The limit is {} bytes.", max_upload_bytes),
        ));
    }
    let kind = DocumentKind::from_mime_type(&content_type).ok_or_else(|| {
        error_response(
            StatusCode::BAD_REQUEST,
            "Invalid file type. Only PDF and DOCX are allowed.",
        )
    })?;

    let stored_path = app_state
        .storage
        .store_original(&file_name, &data)
        .await
        .map_err(|e| {
            error!("Failed to store upload {}: {}", file_name, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store the uploaded file")
        })?;
    info!("Stored upload {} ({} bytes) at {}", file_name, data.len(), stored_path.display());

    let result = async {
        let text = app_state
            .extractor
            .extract_text(&stored_path, kind.mime_type())
            .await?;
        let content = app_state.structurer.structure_text(&text).await?;
        app_state
            .db
            .create_lesson_plan(NewLessonPlan {
                content,
                original_file_path: stored_path.to_string_lossy().into_owned(),
                original_file_mime_type: kind.mime_type().to_string(),
            })
            .await
    }
    .await;

    match result {
        Ok(plan) => {
            info!("Created lesson plan {}", plan.id);
            Ok((StatusCode::CREATED, Json(LessonPlanResponse::from(plan))))
        }
        Err(e) => {
            remove_file_best_effort(&stored_path, "original").await;
            Err(port_error_response(e, "Failed to process the lesson plan"))
        }
    }
}

/// List all lesson plans, newest first.
#[utoipa::path(
    get,
    path = "/api/lesson-plans",
    responses(
        (status = 200, description = "All lesson plans", body = [LessonPlanResponse]),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    tag = "Lesson Plans"
)]
pub async fn list_lesson_plans_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<LessonPlanResponse>>, HandlerError> {
    let plans = app_state
        .db
        .list_lesson_plans()
        .await
        .map_err(|e| port_error_response(e, "Failed to list lesson plans"))?;
    Ok(Json(plans.into_iter().map(LessonPlanResponse::from).collect()))
}

/// Fetch a single lesson plan.
#[utoipa::path(
    get,
    path = "/api/lesson-plans/{id}",
    params(("id" = Uuid, Path, description = "The lesson plan id.")),
    responses(
        (status = 200, description = "The lesson plan", body = LessonPlanResponse),
        (status = 404, description = "Not found", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    tag = "Lesson Plans"
)]
pub async fn get_lesson_plan_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<LessonPlanResponse>, HandlerError> {
    let plan = app_state
        .db
        .get_lesson_plan_by_id(id)
        .await
        .map_err(|e| port_error_response(e, "Failed to fetch the lesson plan"))?;
    Ok(Json(plan.into()))
}

/// Download the originally uploaded document.
#[utoipa::path(
    get,
    path = "/api/lesson-plans/{id}/original-file",
    params(("id" = Uuid, Path, description = "The lesson plan id.")),
    responses(
        (status = 200, description = "The original document, with its stored media type"),
        (status = 404, description = "Lesson plan or file not found", body = ErrorBody)
    ),
    tag = "Lesson Plans"
)]
pub async fn get_original_file_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let plan = app_state
        .db
        .get_lesson_plan_by_id(id)
        .await
        .map_err(|e| port_error_response(e, "Failed to fetch the lesson plan"))?;

    let body = file_body(FsPath::new(&plan.original_file_path)).await?;
    Ok(([(header::CONTENT_TYPE, plan.original_file_mime_type)], body))
}

/// Update some or all of the content fields of a lesson plan.
#[utoipa::path(
    put,
    path = "/api/lesson-plans/{id}",
    params(("id" = Uuid, Path, description = "The lesson plan id.")),
    request_body = UpdateLessonPlanRequest,
    responses(
        (status = 200, description = "The updated lesson plan", body = LessonPlanResponse),
        (status = 400, description = "Invalid request body", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    tag = "Lesson Plans"
)]
pub async fn update_lesson_plan_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateLessonPlanRequest>, JsonRejection>,
) -> Result<Json<LessonPlanResponse>, HandlerError> {
    let Json(request) = payload
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e.body_text())))?;

    let plan = app_state
        .db
        .update_lesson_plan_content(id, request.into())
        .await
        .map_err(|e| port_error_response(e, "Failed to update the lesson plan"))?;
    info!("Updated lesson plan {}", plan.id);
    Ok(Json(plan.into()))
}

/// Ask the AI model for an elaborated version of the submitted plan.
///
/// The result is returned for review only; it is stored when the client sends it
/// back through the update endpoint.
#[utoipa::path(
    post,
    path = "/api/lesson-plans/{id}/improve",
    params(("id" = Uuid, Path, description = "The lesson plan id.")),
    request_body = LessonPlanContentBody,
    responses(
        (status = 200, description = "The improved content fields", body = LessonPlanContentBody),
        (status = 400, description = "Invalid lesson plan data", body = ErrorBody),
        (status = 500, description = "Improvement failed", body = ErrorBody)
    ),
    tag = "Lesson Plans"
)]
pub async fn improve_lesson_plan_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Result<Json<LessonPlanContentBody>, JsonRejection>,
) -> Result<Json<LessonPlanContentBody>, HandlerError> {
    let Json(body) = payload
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, format!("Invalid lesson plan data: {}", e.body_text())))?;
    if body.title.trim().is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Invalid lesson plan data: a title is required.",
        ));
    }

    let improved = app_state
        .structurer
        .improve_plan(&body.into())
        .await
        .map_err(|e| port_error_response(e, "Failed to improve the lesson plan"))?;
    info!("Produced an improved version of lesson plan {}", id);
    Ok(Json(improved.into()))
}

/// Delete a lesson plan together with its files.
#[utoipa::path(
    delete,
    path = "/api/lesson-plans/{id}",
    params(("id" = Uuid, Path, description = "The lesson plan id.")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    tag = "Lesson Plans"
)]
pub async fn delete_lesson_plan_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HandlerError> {
    let db = &app_state.db;
    let plan = db
        .get_lesson_plan_by_id(id)
        .await
        .map_err(|e| port_error_response(e, "Failed to delete the lesson plan"))?;
    db.delete_lesson_plan(id)
        .await
        .map_err(|e| port_error_response(e, "Failed to delete the lesson plan"))?;

    remove_file_best_effort(FsPath::new(&plan.original_file_path), "original").await;
    if let Some(generated) = &plan.generated_pdf_path {
        remove_file_best_effort(FsPath::new(generated), "generated PDF").await;
    }

    info!("Deleted lesson plan {}", id);
    Ok(StatusCode::NO_CONTENT)
}

/// Render the standardized PDF and download it.
#[utoipa::path(
    get,
    path = "/api/lesson-plans/{id}/generate-pdf",
    params(("id" = Uuid, Path, description = "The lesson plan id.")),
    responses(
        (status = 200, description = "The generated PDF (application/pdf), sent as an attachment"),
        (status = 404, description = "Not found", body = ErrorBody),
        (status = 500, description = "Rendering failed", body = ErrorBody)
    ),
    tag = "Lesson Plans"
)]
pub async fn generate_pdf_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let db = &app_state.db;
    let plan = db
        .get_lesson_plan_by_id(id)
        .await
        .map_err(|e| port_error_response(e, "Failed to generate the PDF"))?;

    let pdf_path = app_state
        .pdf_renderer
        .render(&plan)
        .await
        .map_err(|e| port_error_response(e, "Failed to generate the PDF"))?;
    db.set_generated_pdf_path(id, &pdf_path.to_string_lossy())
        .await
        .map_err(|e| port_error_response(e, "Failed to generate the PDF"))?;

    let body = file_body(&pdf_path).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.pdf\"", id),
            ),
        ],
        body,
    ))
}
