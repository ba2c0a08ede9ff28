use crate::api::routes::{AdminUser, ApiError, ApiResult, ApiState, ensure_found};
use crate::db::UserRow;
use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::info;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TasksSummary {
    total_tasks: u32,
    completed_tasks: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetails {
    user: UserRow,
    tasks_summary: TasksSummary,
}

pub async fn list_users(
    State(state): State<ApiState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<UserRow>>> {
    Ok(Json(state.database()?.list_users()?))
}

pub async fn user_details(
    State(state): State<ApiState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<UserDetails>> {
    let database = state.database()?;
    let user = ensure_found(database.user(id)?, "User")?;
    let (total_tasks, completed_tasks) = database.task_summary(user.id)?;

    Ok(Json(UserDetails {
        user,
        tasks_summary: TasksSummary {
            total_tasks,
            completed_tasks,
        },
    }))
}

pub async fn delete_user(
    State(state): State<ApiState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    if admin.id == id {
        return Err(ApiError::BadRequest(
            "Admins cannot delete their own account".to_string(),
        ));
    }

    let deleted = state.database()?.delete_user(id)?;
    ensure_found(deleted.then_some(()), "User")?;
    info!(admin_id = admin.id, user_id = id, "user deleted");

    Ok(Json(json!({ "message": "User deleted" })))
}
