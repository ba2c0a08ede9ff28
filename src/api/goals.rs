use crate::api::routes::{
    ApiError, ApiResult, ApiState, AuthUser, ensure_found, parse_choice, required_text,
};
use crate::db::{GoalFilter, GoalRow, GoalType, GoalUpdate, NewGoal};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct GoalsQuery {
    #[serde(rename = "type")]
    goal_type: Option<String>,
    year: Option<String>,
    month: Option<String>,
    quarter: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Timeframe {
    year: i32,
    month: Option<u32>,
    quarter: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateGoalRequest {
    title: String,
    #[serde(rename = "type")]
    goal_type: String,
    timeframe: Timeframe,
}

#[derive(Debug, Deserialize)]
pub struct UpdateGoalRequest {
    title: Option<String>,
    #[serde(alias = "isCompleted")]
    is_completed: Option<bool>,
}

pub async fn list(
    State(state): State<ApiState>,
    auth: AuthUser,
    Query(query): Query<GoalsQuery>,
) -> ApiResult<Json<Vec<GoalRow>>> {
    let filter = GoalFilter {
        goal_type: query
            .goal_type
            .as_deref()
            .map(|raw| parse_choice(raw, "type", GoalType::parse, GoalType::expected))
            .transpose()?,
        year: parse_number(query.year.as_deref(), "year")?,
        month: parse_number(query.month.as_deref(), "month")?,
        quarter: parse_number(query.quarter.as_deref(), "quarter")?,
    };

    Ok(Json(state.database()?.list_goals(auth.user.id, &filter)?))
}

pub async fn create(
    State(state): State<ApiState>,
    auth: AuthUser,
    Json(request): Json<CreateGoalRequest>,
) -> ApiResult<(StatusCode, Json<GoalRow>)> {
    let goal_type = parse_choice(
        &request.goal_type,
        "type",
        GoalType::parse,
        GoalType::expected,
    )?;
    let goal = timeframe_goal(
        required_text(&request.title, "title")?,
        goal_type,
        request.timeframe,
    )?;

    let created = state.database()?.create_goal(auth.user.id, &goal)?;
    info!(user_id = auth.user.id, goal_id = created.id, goal_type = %goal_type, "goal created");

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update(
    State(state): State<ApiState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(request): Json<UpdateGoalRequest>,
) -> ApiResult<Json<GoalRow>> {
    let update = GoalUpdate {
        title: request
            .title
            .as_deref()
            .map(|title| required_text(title, "title"))
            .transpose()?,
        is_completed: request.is_completed,
    };

    let updated = state.database()?.update_goal(auth.user.id, id, &update)?;
    Ok(Json(ensure_found(updated, "Goal")?))
}

pub async fn delete(
    State(state): State<ApiState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let deleted = state.database()?.delete_goal(auth.user.id, id)?;
    ensure_found(deleted.then_some(()), "Goal")?;

    Ok(Json(json!({ "message": "Goal deleted" })))
}

pub async fn delete_all(State(state): State<ApiState>, auth: AuthUser) -> ApiResult<Json<Value>> {
    let deleted = state.database()?.delete_all_goals(auth.user.id)?;
    info!(user_id = auth.user.id, deleted, "all goals deleted");

    Ok(Json(json!({ "deleted": deleted })))
}

/// A monthly goal carries only a month, a quarterly goal only a quarter and
/// a yearly goal neither.
fn timeframe_goal(title: String, goal_type: GoalType, timeframe: Timeframe) -> ApiResult<NewGoal> {
    if timeframe.year < 1 {
        return Err(ApiError::BadRequest(format!(
            "Invalid year: {}",
            timeframe.year
        )));
    }

    let (month, quarter) = match goal_type {
        GoalType::Monthly => match timeframe.month {
            Some(month @ 1..=12) => (Some(month), None),
            _ => {
                return Err(ApiError::BadRequest(
                    "Monthly goals need a month between 1 and 12".to_string(),
                ));
            }
        },
        GoalType::Quarterly => match timeframe.quarter {
            Some(quarter @ 1..=4) => (None, Some(quarter)),
            _ => {
                return Err(ApiError::BadRequest(
                    "Quarterly goals need a quarter between 1 and 4".to_string(),
                ));
            }
        },
        GoalType::Yearly => (None, None),
    };

    Ok(NewGoal {
        title,
        goal_type,
        year: timeframe.year,
        month,
        quarter,
    })
}

fn parse_number<T: FromStr>(raw: Option<&str>, field: &str) -> ApiResult<Option<T>> {
    raw.map(|raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|_| ApiError::BadRequest(format!("Invalid {field}: {raw}")))
    })
    .transpose()
}
