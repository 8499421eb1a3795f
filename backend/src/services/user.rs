//! User directory service
//!
//! Identities are provisioned by the university; this table only records who
//! may act in which role.

use serde::Deserialize;
use shared::{validate_email, Capability, Role, User};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{convert_all, UserRow};

const USER_COLUMNS: &str = "id, email, full_name, role, department, created_at, updated_at";

/// User service
#[derive(Clone)]
pub struct UserService {
    db: PgPool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(length(max = 254))]
    pub email: String,
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    pub role: Role,
    #[validate(length(max = 200))]
    pub department: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRoleInput {
    pub role: Role,
}

/// Fail with a validation error on `field` unless the user exists
pub(crate) async fn ensure_user_exists(conn: &mut PgConnection, user_id: Uuid, field: &str) -> AppResult<()> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;

    if exists {
        Ok(())
    } else {
        Err(AppError::validation(field, "Unknown user", "ไม่พบผู้ใช้"))
    }
}

impl UserService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create_user(&self, user: &AuthUser, input: CreateUserInput) -> AppResult<User> {
        user.require(Capability::ManageUsers)?;
        input.validate()?;
        let email = input.email.trim().to_lowercase();
        validate_email(&email)
            .map_err(|message| AppError::validation("email", message, "รูปแบบอีเมลไม่ถูกต้อง"))?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (email, full_name, role, department)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&email)
        .bind(input.full_name.trim())
        .bind(input.role.as_str())
        .bind(&input.department)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            AppError::on_unique_violation(e, || AppError::Conflict {
                resource: "email".to_string(),
                message: format!("A user with email {} already exists", email),
                message_th: format!("มีผู้ใช้อีเมล {} อยู่แล้ว", email),
            })
        })?;

        let created = User::try_from(row)?;
        tracing::info!(user_id = %created.id, role = %created.role, "User created");
        Ok(created)
    }

    pub async fn list_users(&self, user: &AuthUser) -> AppResult<Vec<User>> {
        user.require(Capability::ManageUsers)?;

        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users ORDER BY full_name",
            USER_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        convert_all(rows)
    }

    pub async fn update_user_role(
        &self,
        user: &AuthUser,
        user_id: Uuid,
        input: UpdateUserRoleInput,
    ) -> AppResult<User> {
        user.require(Capability::ManageUsers)?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET role = $2 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(input.role.as_str())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        let updated = User::try_from(row)?;
        tracing::info!(user_id = %updated.id, role = %updated.role, "User role changed");
        Ok(updated)
    }
}
