//! crates/lesson_plan_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs carry no database or HTTP concerns; the only serialization
//! they know about is the ten-field JSON shape exchanged with the AI model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const PDF_MIME_TYPE: &str = "application/pdf";
pub const DOCX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// The ten free-text content fields of a lesson plan.
///
/// This is the exact shape the AI model is asked to produce, and the shape
/// the repair/normalize pipeline guarantees.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LessonPlanContent {
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

/// The JSON keys of the ten content fields, in schema order.
pub const CONTENT_FIELDS: [&str; 10] = [
    "title",
    "yearGrade",
    "teacherName",
    "knowledgeArea",
    "summary",
    "objectives",
    "skills",
    "estimatedTime",
    "resources",
    "stepByStep",
];

impl LessonPlanContent {
    /// Mutable access to a content field by its JSON key.
    pub fn field_mut(&mut self, key: &str) -> Option<&mut String> {
        let slot = match key {
            "title" => &mut self.title,
            "yearGrade" => &mut self.year_grade,
            "teacherName" => &mut self.teacher_name,
            "knowledgeArea" => &mut self.knowledge_area,
            "summary" => &mut self.summary,
            "objectives" => &mut self.objectives,
            "skills" => &mut self.skills,
            "estimatedTime" => &mut self.estimated_time,
            "resources" => &mut self.resources,
            "stepByStep" => &mut self.step_by_step,
            _ => return None,
        };
        Some(slot)
    }
}

/// A persisted lesson plan record.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonPlan {
    pub id: Uuid,
    pub content: LessonPlanContent,
    pub original_file_path: String,
    pub original_file_mime_type: String,
    pub generated_pdf_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Everything needed to insert a new record. The id and timestamp are
/// assigned by the repository.
#[derive(Debug, Clone)]
pub struct NewLessonPlan {
    pub content: LessonPlanContent,
    pub original_file_path: String,
    pub original_file_mime_type: String,
}

/// A partial edit of the content fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LessonPlanPatch {
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

impl LessonPlanPatch {
    /// Applies the patch onto existing content.
    pub fn apply_to(self, content: &mut LessonPlanContent) {
        let pairs = [
            (self.title, &mut content.title),
            (self.year_grade, &mut content.year_grade),
            (self.teacher_name, &mut content.teacher_name),
            (self.knowledge_area, &mut content.knowledge_area),
            (self.summary, &mut content.summary),
            (self.objectives, &mut content.objectives),
            (self.skills, &mut content.skills),
            (self.estimated_time, &mut content.estimated_time),
            (self.resources, &mut content.resources),
            (self.step_by_step, &mut content.step_by_step),
        ];
        for (value, slot) in pairs {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

/// The document formats the text extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
}

impl DocumentKind {
    pub fn from_mime_type(mime_type: &str) -> Option<Self> {
        match mime_type {
            PDF_MIME_TYPE => Some(Self::Pdf),
            DOCX_MIME_TYPE => Some(Self::Docx),
            _ => None,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Pdf => PDF_MIME_TYPE,
            Self::Docx => DOCX_MIME_TYPE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_uses_camel_case_keys() {
        let content = LessonPlanContent {
            year_grade: "3º ano".to_string(),
            step_by_step: "1. Ler".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&content).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        for key in CONTENT_FIELDS {
            assert!(keys.contains(&key), "missing {key}");
        }
        assert_eq!(json["yearGrade"], "3º ano");
        assert_eq!(json["stepByStep"], "1. Ler");
    }

    #[test]
    fn every_content_field_is_addressable_by_key() {
        let mut content = LessonPlanContent::default();
        for key in CONTENT_FIELDS {
            *content.field_mut(key).unwrap() = key.to_string();
        }
        assert_eq!(content.knowledge_area, "knowledgeArea");
        assert_eq!(content.estimated_time, "estimatedTime");
        assert!(content.field_mut("createdAt").is_none());
    }

    #[test]
    fn patch_only_touches_provided_fields() {
        let mut content = LessonPlanContent {
            title: "Old".to_string(),
            summary: "Keep me".to_string(),
            ..Default::default()
        };
        LessonPlanPatch {
            title: Some("New".to_string()),
            skills: Some(String::new()),
            ..Default::default()
        }
        .apply_to(&mut content);

        assert_eq!(content.title, "New");
        assert_eq!(content.summary, "Keep me");
        assert_eq!(content.skills, "");
    }

    #[test]
    fn document_kind_round_trips_mime_types() {
        assert_eq!(DocumentKind::from_mime_type(PDF_MIME_TYPE), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_mime_type(DOCX_MIME_TYPE), Some(DocumentKind::Docx));
        assert_eq!(DocumentKind::from_mime_type("text/plain"), None);
        assert_eq!(DocumentKind::Docx.mime_type(), DOCX_MIME_TYPE);
    }
}
