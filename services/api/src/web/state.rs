//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::adapters::storage::FileStorage;
use crate::config::Config;
use lesson_plan_core::ports::{
    DatabaseService, LessonPlanStructuringService, PdfRenderingService, TextExtractionService,
};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub storage: FileStorage,
    pub extractor: Arc<dyn TextExtractionService>,
    pub structurer: Arc<dyn LessonPlanStructuringService>,
    pub pdf_renderer: Arc<dyn PdfRenderingService>,
}
