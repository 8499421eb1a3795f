//! User directory HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use shared::{Capability, Role, User};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::user::{CreateUserInput, UpdateUserRoleInput, UserService};
use crate::AppState;

/// The caller's identity as carried by the token
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub capabilities: Vec<&'static str>,
}

pub async fn me(current_user: CurrentUser) -> Json<MeResponse> {
    let user = current_user.0;
    Json(MeResponse {
        user_id: user.user_id,
        email: user.email,
        capabilities: user.role.capabilities().iter().map(Capability::as_str).collect(),
        role: user.role,
    })
}

pub async fn create_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateUserInput>,
) -> AppResult<(StatusCode, Json<User>)> {
    let service = UserService::new(state.db);
    let user = service.create_user(&current_user.0, input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn list_users(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<User>>> {
    let service = UserService::new(state.db);
    let users = service.list_users(&current_user.0).await?;
    Ok(Json(users))
}

/// Change a user's role
pub async fn update_user_role(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
    Json(input): Json<UpdateUserRoleInput>,
) -> AppResult<Json<User>> {
    let service = UserService::new(state.db);
    let user = service
        .update_user_role(&current_user.0, user_id, input)
        .await?;
    Ok(Json(user))
}
