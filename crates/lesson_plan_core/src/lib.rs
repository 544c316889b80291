pub mod domain;
pub mod normalize;
pub mod ports;

pub use domain::{
    DocumentKind, LessonPlan, LessonPlanContent, LessonPlanPatch, NewLessonPlan, CONTENT_FIELDS,
    DOCX_MIME_TYPE, PDF_MIME_TYPE,
};
pub use normalize::{normalize_response, MalformedResponse};
pub use ports::{
    DatabaseService, LessonPlanStructuringService, PdfRenderingService, PortError, PortResult,
    TextExtractionService,
};
