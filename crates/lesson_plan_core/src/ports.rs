//! crates/lesson_plan_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use crate::domain::{LessonPlan, LessonPlanContent, LessonPlanPatch, NewLessonPlan};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unsupported file type for text extraction: {0}")]
    UnsupportedType(String),
    #[error("AI call failed: {0}")]
    AiCall(String),
    /// The model replied, but the reply could not be parsed even after repair.
    /// `raw` keeps the untouched reply for server-side logging.
    #[error("Malformed AI response: {reason}")]
    MalformedAiResponse { reason: String, raw: String },
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    async fn create_lesson_plan(&self, new_plan: NewLessonPlan) -> PortResult<LessonPlan>;

    /// Returns every record, newest first.
    async fn list_lesson_plans(&self) -> PortResult<Vec<LessonPlan>>;

    async fn get_lesson_plan_by_id(&self, id: Uuid) -> PortResult<LessonPlan>;

    async fn update_lesson_plan_content(
        &self,
        id: Uuid,
        patch: LessonPlanPatch,
    ) -> PortResult<LessonPlan>;

    async fn set_generated_pdf_path(&self, id: Uuid, path: &str) -> PortResult<LessonPlan>;

    async fn delete_lesson_plan(&self, id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait TextExtractionService: Send + Sync {
    /// Returns the plain text of the file at `path`, interpreted as `mime_type`.
    async fn extract_text(&self, path: &Path, mime_type: &str) -> PortResult<String>;
}

#[async_trait]
pub trait LessonPlanStructuringService: Send + Sync {
    /// Turns raw document text into the ten-field lesson plan shape.
    async fn structure_text(&self, text: &str) -> PortResult<LessonPlanContent>;

    /// Asks the model for an elaborated version of an existing plan.
    async fn improve_plan(&self, current: &LessonPlanContent) -> PortResult<LessonPlanContent>;
}

#[async_trait]
pub trait PdfRenderingService: Send + Sync {
    /// Renders the standardized PDF for `plan` and returns where it was written.
    async fn render(&self, plan: &LessonPlan) -> PortResult<PathBuf>;
}
