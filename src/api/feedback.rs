use crate::api::routes::{
    ApiError, ApiResult, ApiState, AuthUser, ensure_found, parse_choice, required_text,
};
use crate::db::{FeedbackFilter, FeedbackKind, FeedbackRow, FeedbackStatus, FeedbackUpdate, Role};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct FeedbackQuery {
    status: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFeedbackRequest {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateFeedbackRequest {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
    status: Option<String>,
}

/// Admins see every entry; everyone else only their own.
pub async fn list(
    State(state): State<ApiState>,
    auth: AuthUser,
    Query(query): Query<FeedbackQuery>,
) -> ApiResult<Json<Vec<FeedbackRow>>> {
    let filter = FeedbackFilter {
        owner: (auth.user.role != Role::Admin).then_some(auth.user.id),
        status: parse_status(query.status.as_deref())?,
        kind: parse_kind(query.kind.as_deref())?,
    };

    Ok(Json(state.database()?.list_feedback(&filter)?))
}

pub async fn create(
    State(state): State<ApiState>,
    auth: AuthUser,
    Json(request): Json<CreateFeedbackRequest>,
) -> ApiResult<(StatusCode, Json<FeedbackRow>)> {
    let kind = parse_choice(&request.kind, "type", FeedbackKind::parse, FeedbackKind::expected)?;
    let message = required_text(&request.message, "message")?;

    let created = state
        .database()?
        .create_feedback(auth.user.id, kind, &message)?;
    info!(user_id = auth.user.id, feedback_id = created.id, kind = %kind, "feedback submitted");

    Ok((StatusCode::CREATED, Json(created)))
}

/// Owners edit their own entries. Only admins change the status, and they may
/// edit any entry.
pub async fn update(
    State(state): State<ApiState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(request): Json<UpdateFeedbackRequest>,
) -> ApiResult<Json<FeedbackRow>> {
    let is_admin = auth.user.role == Role::Admin;
    let status = parse_status(request.status.as_deref())?;
    if status.is_some() && !is_admin {
        return Err(ApiError::Forbidden(
            "Only admins can change feedback status".to_string(),
        ));
    }

    let update = FeedbackUpdate {
        kind: parse_kind(request.kind.as_deref())?,
        message: request
            .message
            .as_deref()
            .map(|message| required_text(message, "message"))
            .transpose()?,
        status,
    };

    let owner = (!is_admin).then_some(auth.user.id);
    let updated = state.database()?.update_feedback(owner, id, &update)?;

    Ok(Json(ensure_found(updated, "Feedback")?))
}

pub async fn delete(
    State(state): State<ApiState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let deleted = state.database()?.delete_feedback(auth.user.id, id)?;
    ensure_found(deleted.then_some(()), "Feedback")?;

    Ok(Json(json!({ "message": "Feedback deleted" })))
}

fn parse_status(raw: Option<&str>) -> ApiResult<Option<FeedbackStatus>> {
    raw.map(|raw| parse_choice(raw, "status", FeedbackStatus::parse, FeedbackStatus::expected))
        .transpose()
}

fn parse_kind(raw: Option<&str>) -> ApiResult<Option<FeedbackKind>> {
    raw.map(|raw| parse_choice(raw, "type", FeedbackKind::parse, FeedbackKind::expected))
        .transpose()
}
