pub mod rest;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::services::ServeDir;

use rest::{
    delete_lesson_plan_handler, generate_pdf_handler, get_lesson_plan_handler,
    get_original_file_handler, improve_lesson_plan_handler, list_lesson_plans_handler,
    root_handler, update_lesson_plan_handler, upload_lesson_plan_handler,
};
use state::AppState;

/// Room for multipart boundaries and part headers on top of the file size cap.
/// The cap itself is enforced on the file bytes by the upload handler.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Builds the application router: the `/api` lesson-plan routes, the liveness
/// route and the static directory of generated PDFs.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let upload_limit = DefaultBodyLimit::max(
        app_state
            .config
            .max_upload_bytes
            .saturating_add(MULTIPART_OVERHEAD_BYTES),
    );

    let api_routes = Router::new()
        .route("/lesson-plans", get(list_lesson_plans_handler))
        .route(
            "/lesson-plans/upload",
            post(upload_lesson_plan_handler).layer(upload_limit),
        )
        .route(
            "/lesson-plans/{id}",
            get(get_lesson_plan_handler)
                .put(update_lesson_plan_handler)
                .delete(delete_lesson_plan_handler),
        )
        .route("/lesson-plans/{id}/original-file", get(get_original_file_handler))
        .route("/lesson-plans/{id}/improve", post(improve_lesson_plan_handler))
        .route("/lesson-plans/{id}/generate-pdf", get(generate_pdf_handler));

    Router::new()
        .route("/", get(root_handler))
        .nest("/api", api_routes)
        .nest_service(
            "/files/generated",
            ServeDir::new(app_state.storage.generated_dir()),
        )
        .with_state(app_state)
}
