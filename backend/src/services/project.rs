//! Project and participant service

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    generate_project_code, validate_budget, validate_project_code, Capability, PaginatedResponse,
    Pagination, PaginationMeta, ParticipantRole, Project, ProjectParticipant, ProjectStatus,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{convert_all, ParticipantRow, ProjectRow, PROJECT_COLUMNS};
use crate::services::ledger::{compute_position, lock_project, recompute_reserved_budget};
use crate::services::user::ensure_user_exists;

/// Project service
#[derive(Clone)]
pub struct ProjectService {
    db: PgPool,
}

/// Input for creating a project
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectInput {
    pub project_code: Option<String>,
    #[validate(length(min = 3, max = 200))]
    pub name: String,
    #[validate(length(max = 200))]
    pub responsible_person: Option<String>,
    pub total_budget: Decimal,
    pub status: Option<ProjectStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Input for updating a project
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProjectInput {
    #[validate(length(min = 3, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 200))]
    pub responsible_person: Option<String>,
    pub total_budget: Option<Decimal>,
    pub status: Option<ProjectStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct AddParticipantInput {
    pub user_id: Uuid,
    pub role_in_project: ParticipantRole,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListProjectsQuery {
    pub status: Option<ProjectStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

fn validate_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> AppResult<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(AppError::validation(
                "end_date",
                "End date must not be before start date",
                "วันสิ้นสุดต้องไม่อยู่ก่อนวันเริ่มต้น",
            ));
        }
    }
    Ok(())
}

fn budget_error(message: &str) -> AppError {
    AppError::validation("total_budget", message, "งบประมาณไม่ถูกต้อง")
}

/// Whether `user_id` takes part in the project in the given role
pub(crate) async fn is_participant(
    conn: &mut PgConnection,
    project_id: Uuid,
    user_id: Uuid,
    role: ParticipantRole,
) -> AppResult<bool> {
    let exists = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM project_participants
            WHERE project_id = $1 AND user_id = $2 AND role_in_project = $3
        )
        "#,
    )
    .bind(project_id)
    .bind(user_id)
    .bind(role.as_str())
    .fetch_one(&mut *conn)
    .await?;
    Ok(exists)
}

impl ProjectService {
    /// Create a new ProjectService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a project; the code is generated when not supplied
    pub async fn create_project(&self, user: &AuthUser, input: CreateProjectInput) -> AppResult<Project> {
        user.require(Capability::ManageProjects)?;
        input.validate()?;
        validate_budget(input.total_budget).map_err(budget_error)?;
        validate_dates(input.start_date, input.end_date)?;

        let project_code = match &input.project_code {
            Some(code) => {
                let code = code.trim().to_uppercase();
                validate_project_code(&code).map_err(|message| {
                    AppError::validation("project_code", message, "รหัสโครงการไม่ถูกต้อง")
                })?;
                code
            }
            None => {
                let year = Utc::now().year();
                let count = sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM projects WHERE project_code LIKE $1",
                )
                .bind(format!("PRJ-{}-%", year))
                .fetch_one(&self.db)
                .await?;
                generate_project_code(year, count + 1)
            }
        };

        let status = input.status.unwrap_or(ProjectStatus::Draft);

        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            r#"
            INSERT INTO projects (
                project_code, name, responsible_person, total_budget,
                reserved_budget, spent_budget, remaining_budget,
                status, start_date, end_date, created_by
            )
            VALUES ($1, $2, $3, $4, 0, 0, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            PROJECT_COLUMNS
        ))
        .bind(&project_code)
        .bind(input.name.trim())
        .bind(&input.responsible_person)
        .bind(input.total_budget)
        .bind(status.as_str())
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(user.user_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            AppError::on_unique_violation(e, || AppError::Conflict {
                resource: "project_code".to_string(),
                message: format!("Project code {} already exists", project_code),
                message_th: format!("รหัสโครงการ {} มีอยู่แล้ว", project_code),
            })
        })?;

        let project = Project::try_from(row)?;
        tracing::info!(
            project_id = %project.id,
            project_code = %project.project_code,
            total_budget = %project.total_budget,
            "Project created"
        );
        Ok(project)
    }

    /// Update project details. A new total may not drop below what is reserved.
    pub async fn update_project(
        &self,
        user: &AuthUser,
        project_id: Uuid,
        input: UpdateProjectInput,
    ) -> AppResult<Project> {
        user.require(Capability::ManageProjects)?;
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let project = lock_project(&mut tx, project_id).await?;

        validate_dates(
            input.start_date.or(project.start_date),
            input.end_date.or(project.end_date),
        )?;

        let total_budget = input.total_budget.unwrap_or(project.total_budget);
        if input.total_budget.is_some() {
            validate_budget(total_budget).map_err(budget_error)?;
            let position = compute_position(&mut tx, &project).await?;
            if total_budget < position.reserved_budget {
                return Err(AppError::validation(
                    "total_budget",
                    &format!(
                        "Total budget cannot be lower than the reserved amount {}",
                        position.reserved_budget
                    ),
                    &format!(
                        "งบประมาณรวมต้องไม่น้อยกว่ายอดที่กันไว้แล้ว {}",
                        position.reserved_budget
                    ),
                ));
            }
        }

        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            r#"
            UPDATE projects
            SET name = COALESCE($2, name),
                responsible_person = COALESCE($3, responsible_person),
                total_budget = $4,
                status = COALESCE($5, status),
                start_date = COALESCE($6, start_date),
                end_date = COALESCE($7, end_date)
            WHERE id = $1
            RETURNING {}
            "#,
            PROJECT_COLUMNS
        ))
        .bind(project_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.responsible_person)
        .bind(total_budget)
        .bind(input.status.map(|s| s.as_str()))
        .bind(input.start_date)
        .bind(input.end_date)
        .fetch_one(&mut *tx)
        .await?;
        let updated = Project::try_from(row)?;

        let position = recompute_reserved_budget(&mut tx, &updated).await?;
        tx.commit().await?;

        tracing::info!(
            project_id = %project_id,
            total_budget = %position.total_budget,
            remaining = %position.remaining_budget,
            "Project updated"
        );

        Ok(Project {
            reserved_budget: position.reserved_budget,
            spent_budget: position.spent_budget,
            remaining_budget: position.remaining_budget,
            ..updated
        })
    }

    /// Get a project by ID
    pub async fn get_project(&self, project_id: Uuid) -> AppResult<Project> {
        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {} FROM projects WHERE id = $1",
            PROJECT_COLUMNS
        ))
        .bind(project_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Project".to_string()))?;

        Project::try_from(row)
    }

    /// List projects, optionally filtered by status
    pub async fn list_projects(&self, query: ListProjectsQuery) -> AppResult<PaginatedResponse<Project>> {
        let defaults = Pagination::default();
        let pagination = Pagination {
            page: query.page.unwrap_or(defaults.page),
            per_page: query.per_page.unwrap_or(defaults.per_page),
        };
        let status = query.status.map(|s| s.as_str());

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM projects WHERE ($1::text IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, ProjectRow>(&format!(
            r#"
            SELECT {} FROM projects
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            PROJECT_COLUMNS
        ))
        .bind(status)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse {
            data: convert_all(rows)?,
            pagination: PaginationMeta::new(&pagination, total.max(0) as u64),
        })
    }

    /// Add a user to a project as requester or inspector
    pub async fn add_participant(
        &self,
        user: &AuthUser,
        project_id: Uuid,
        input: AddParticipantInput,
    ) -> AppResult<ProjectParticipant> {
        user.require(Capability::ManageProjects)?;

        let mut conn = self.db.acquire().await?;
        self.get_project(project_id).await?;
        ensure_user_exists(&mut conn, input.user_id, "user_id").await?;

        let row = sqlx::query_as::<_, ParticipantRow>(
            r#"
            INSERT INTO project_participants (project_id, user_id, role_in_project)
            VALUES ($1, $2, $3)
            RETURNING project_id, user_id, role_in_project, created_at
            "#,
        )
        .bind(project_id)
        .bind(input.user_id)
        .bind(input.role_in_project.as_str())
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            AppError::on_unique_violation(e, || AppError::Conflict {
                resource: "participant".to_string(),
                message: "User already participates in this role".to_string(),
                message_th: "ผู้ใช้นี้อยู่ในโครงการด้วยบทบาทนี้แล้ว".to_string(),
            })
        })?;

        ProjectParticipant::try_from(row)
    }

    /// Remove a user's role in a project
    pub async fn remove_participant(
        &self,
        user: &AuthUser,
        project_id: Uuid,
        user_id: Uuid,
        role: ParticipantRole,
    ) -> AppResult<()> {
        user.require(Capability::ManageProjects)?;

        let result = sqlx::query(
            r#"
            DELETE FROM project_participants
            WHERE project_id = $1 AND user_id = $2 AND role_in_project = $3
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .bind(role.as_str())
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Participant".to_string()));
        }
        Ok(())
    }

    /// List a project's participants
    pub async fn list_participants(&self, project_id: Uuid) -> AppResult<Vec<ProjectParticipant>> {
        self.get_project(project_id).await?;

        let rows = sqlx::query_as::<_, ParticipantRow>(
            r#"
            SELECT project_id, user_id, role_in_project, created_at
            FROM project_participants
            WHERE project_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.db)
        .await?;

        convert_all(rows)
    }
}
