use crate::api::routes::{
    ApiResult, ApiState, AuthUser, ensure_found, parse_choice, parse_task_date, required_text,
};
use crate::db::{NewTask, Priority, TaskFilter, TaskRow, TaskStatus, TaskUpdate};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct TasksQuery {
    tag: Option<String>,
    status: Option<String>,
    priority: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    title: String,
    tag: Option<String>,
    priority: Option<String>,
    date: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    title: Option<String>,
    tag: Option<String>,
    priority: Option<String>,
    status: Option<String>,
    date: Option<String>,
}

pub async fn list(
    State(state): State<ApiState>,
    auth: AuthUser,
    Query(query): Query<TasksQuery>,
) -> ApiResult<Json<Vec<TaskRow>>> {
    let filter = TaskFilter {
        tag: query
            .tag
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty()),
        status: query
            .status
            .as_deref()
            .map(|raw| parse_choice(raw, "status", TaskStatus::parse, TaskStatus::expected))
            .transpose()?,
        priority: parse_priority(query.priority.as_deref())?,
        date: query
            .date
            .as_deref()
            .map(|raw| parse_task_date(&state.config, raw))
            .transpose()?,
    };

    Ok(Json(state.database()?.list_tasks(auth.user.id, &filter)?))
}

pub async fn create(
    State(state): State<ApiState>,
    auth: AuthUser,
    Json(request): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskRow>)> {
    let task = NewTask {
        title: required_text(&request.title, "title")?,
        tag: request
            .tag
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty()),
        priority: parse_priority(request.priority.as_deref())?,
        date: parse_task_date(&state.config, &request.date)?,
    };

    let created = state.database()?.create_task(auth.user.id, &task)?;
    info!(user_id = auth.user.id, task_id = created.id, "task created");

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update(
    State(state): State<ApiState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(request): Json<UpdateTaskRequest>,
) -> ApiResult<Json<TaskRow>> {
    let update = TaskUpdate {
        title: request
            .title
            .as_deref()
            .map(|title| required_text(title, "title"))
            .transpose()?,
        tag: request.tag.map(|tag| tag.trim().to_string()),
        priority: parse_priority(request.priority.as_deref())?,
        status: request
            .status
            .as_deref()
            .map(|raw| parse_choice(raw, "status", TaskStatus::parse, TaskStatus::expected))
            .transpose()?,
        date: request
            .date
            .as_deref()
            .map(|raw| parse_task_date(&state.config, raw))
            .transpose()?,
    };

    let updated = state.database()?.update_task(auth.user.id, id, &update)?;
    Ok(Json(ensure_found(updated, "Task")?))
}

pub async fn delete(
    State(state): State<ApiState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let deleted = state.database()?.delete_task(auth.user.id, id)?;
    ensure_found(deleted.then_some(()), "Task")?;

    Ok(Json(json!({ "message": "Task deleted" })))
}

pub async fn delete_all(State(state): State<ApiState>, auth: AuthUser) -> ApiResult<Json<Value>> {
    let deleted = state.database()?.delete_all_tasks(auth.user.id)?;
    info!(user_id = auth.user.id, deleted, "all tasks deleted");

    Ok(Json(json!({ "deleted": deleted })))
}

fn parse_priority(raw: Option<&str>) -> ApiResult<Option<Priority>> {
    raw.map(|raw| parse_choice(raw, "priority", Priority::parse, Priority::expected))
        .transpose()
}
