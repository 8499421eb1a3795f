//! Project and participant HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{PaginatedResponse, ParticipantRole, Project, ProjectParticipant};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::project::{
    AddParticipantInput, CreateProjectInput, ListProjectsQuery, ProjectService, UpdateProjectInput,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RemoveParticipantQuery {
    pub role: ParticipantRole,
}

/// Create a project
pub async fn create_project(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateProjectInput>,
) -> AppResult<(StatusCode, Json<Project>)> {
    let service = ProjectService::new(state.db);
    let project = service.create_project(&current_user.0, input).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// List projects
pub async fn list_projects(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ListProjectsQuery>,
) -> AppResult<Json<PaginatedResponse<Project>>> {
    let service = ProjectService::new(state.db);
    let projects = service.list_projects(query).await?;
    Ok(Json(projects))
}

/// Get a project by ID
pub async fn get_project(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Project>> {
    let service = ProjectService::new(state.db);
    let project = service.get_project(project_id).await?;
    Ok(Json(project))
}

/// Update a project
pub async fn update_project(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(project_id): Path<Uuid>,
    Json(input): Json<UpdateProjectInput>,
) -> AppResult<Json<Project>> {
    let service = ProjectService::new(state.db);
    let project = service.update_project(&current_user.0, project_id, input).await?;
    Ok(Json(project))
}

/// List the participants of a project
pub async fn list_participants(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Vec<ProjectParticipant>>> {
    let service = ProjectService::new(state.db);
    let participants = service.list_participants(project_id).await?;
    Ok(Json(participants))
}

/// Add a participant to a project
pub async fn add_participant(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(project_id): Path<Uuid>,
    Json(input): Json<AddParticipantInput>,
) -> AppResult<(StatusCode, Json<ProjectParticipant>)> {
    let service = ProjectService::new(state.db);
    let participant = service.add_participant(&current_user.0, project_id, input).await?;
    Ok((StatusCode::CREATED, Json(participant)))
}

/// Remove a participant's role from a project
pub async fn remove_participant(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((project_id, user_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<RemoveParticipantQuery>,
) -> AppResult<StatusCode> {
    let service = ProjectService::new(state.db);
    service
        .remove_participant(&current_user.0, project_id, user_id, query.role)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
