//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lesson_plan_core::domain::{LessonPlan, LessonPlanContent, LessonPlanPatch, NewLessonPlan};
use lesson_plan_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

const LESSON_PLAN_COLUMNS: &str = "id, title, year_grade, teacher_name, knowledge_area, summary, \
     objectives, skills, estimated_time, resources, step_by_step, original_file_path, \
     original_file_mime_type, generated_pdf_path, created_at";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// "Impure" Database Record Struct
//=========================================================================================

#[derive(FromRow)]
struct LessonPlanRecord {
    id: Uuid,
    title: String,
    year_grade: String,
    teacher_name: String,
    knowledge_area: String,
    summary: String,
    objectives: String,
    skills: String,
    estimated_time: String,
    resources: String,
    step_by_step: String,
    original_file_path: String,
    original_file_mime_type: String,
    generated_pdf_path: Option<String>,
    created_at: DateTime<Utc>,
}

impl LessonPlanRecord {
    fn to_domain(self) -> LessonPlan {
        LessonPlan {
            id: self.id,
            content: LessonPlanContent {
                title: self.title,
                year_grade: self.year_grade,
                teacher_name: self.teacher_name,
                knowledge_area: self.knowledge_area,
                summary: self.summary,
                objectives: self.objectives,
                skills: self.skills,
                estimated_time: self.estimated_time,
                resources: self.resources,
                step_by_step: self.step_by_step,
            },
            original_file_path: self.original_file_path,
            original_file_mime_type: self.original_file_mime_type,
            generated_pdf_path: self.generated_pdf_path,
            created_at: self.created_at,
        }
    }
}

fn not_found(id: Uuid) -> PortError {
    PortError::NotFound(format!("Lesson plan {} not found", id))
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_lesson_plan(&self, new_plan: NewLessonPlan) -> PortResult<LessonPlan> {
        let content = new_plan.content;
        let query = format!(
            "INSERT INTO lesson_plans (id, title, year_grade, teacher_name, knowledge_area, summary, \
             objectives, skills, estimated_time, resources, step_by_step, original_file_path, \
             original_file_mime_type) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {}",
            LESSON_PLAN_COLUMNS
        );
        let record = sqlx::query_as::<_, LessonPlanRecord>(&query)
            .bind(Uuid::new_v4())
            .bind(content.title)
            .bind(content.year_grade)
            .bind(content.teacher_name)
            .bind(content.knowledge_area)
            .bind(content.summary)
            .bind(content.objectives)
            .bind(content.skills)
            .bind(content.estimated_time)
            .bind(content.resources)
            .bind(content.step_by_step)
            .bind(new_plan.original_file_path)
            .bind(new_plan.original_file_mime_type)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(record.to_domain())
    }

    async fn list_lesson_plans(&self) -> PortResult<Vec<LessonPlan>> {
        let query = format!(
            "SELECT {} FROM lesson_plans ORDER BY created_at DESC",
            LESSON_PLAN_COLUMNS
        );
        let records = sqlx::query_as::<_, LessonPlanRecord>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let plans = records.into_iter().map(|r| r.to_domain()).collect();
        Ok(plans)
    }

    async fn get_lesson_plan_by_id(&self, id: Uuid) -> PortResult<LessonPlan> {
        let query = format!("SELECT {} FROM lesson_plans WHERE id = $1", LESSON_PLAN_COLUMNS);
        let record = sqlx::query_as::<_, LessonPlanRecord>(&query)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => not_found(id),
                _ => PortError::Unexpected(e.to_string()),
            })?;
        Ok(record.to_domain())
    }

    async fn update_lesson_plan_content(
        &self,
        id: Uuid,
        patch: LessonPlanPatch,
    ) -> PortResult<LessonPlan> {
        let query = format!(
            "UPDATE lesson_plans SET \
             title = COALESCE($2, title), \
             year_grade = COALESCE($3, year_grade), \
             teacher_name = COALESCE($4, teacher_name), \
             knowledge_area = COALESCE($5, knowledge_area), \
             summary = COALESCE($6, summary), \
             objectives = COALESCE($7, objectives), \
             skills = COALESCE($8, skills), \
             estimated_time = COALESCE($9, estimated_time), \
             resources = COALESCE($10, resources), \
             step_by_step = COALESCE($11, step_by_step) \
             WHERE id = $1 RETURNING {}",
            LESSON_PLAN_COLUMNS
        );
        let record = sqlx::query_as::<_, LessonPlanRecord>(&query)
            .bind(id)
            .bind(patch.title)
            .bind(patch.year_grade)
            .bind(patch.teacher_name)
            .bind(patch.knowledge_area)
            .bind(patch.summary)
            .bind(patch.objectives)
            .bind(patch.skills)
            .bind(patch.estimated_time)
            .bind(patch.resources)
            .bind(patch.step_by_step)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .ok_or_else(|| not_found(id))?;
        Ok(record.to_domain())
    }

    async fn set_generated_pdf_path(&self, id: Uuid, path: &str) -> PortResult<LessonPlan> {
        let query = format!(
            "UPDATE lesson_plans SET generated_pdf_path = $2 WHERE id = $1 RETURNING {}",
            LESSON_PLAN_COLUMNS
        );
        let record = sqlx::query_as::<_, LessonPlanRecord>(&query)
            .bind(id)
            .bind(path)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .ok_or_else(|| not_found(id))?;
        Ok(record.to_domain())
    }

    async fn delete_lesson_plan(&self, id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM lesson_plans WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }
}
