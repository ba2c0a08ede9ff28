use crate::api::routes::{ApiResult, ApiState, AuthUser};
use crate::stats::trend::DatedCount;
use crate::stats::window::{DateWindow, parse_days};
use crate::stats::{self, Dashboard, StatsError, StreakReport};
use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    days: Option<String>,
    year: Option<String>,
}

pub async fn dashboard(
    State(state): State<ApiState>,
    auth: AuthUser,
    Query(query): Query<WindowQuery>,
) -> ApiResult<Json<Dashboard>> {
    let window = DateWindow::rolling(state.config.today(), parse_days(query.days.as_deref())?)?;
    let database = state.database()?;

    Ok(Json(stats::build_dashboard(&database, auth.user.id, window)?))
}

pub async fn streak(
    State(state): State<ApiState>,
    auth: AuthUser,
    Query(query): Query<WindowQuery>,
) -> ApiResult<Json<StreakReport>> {
    let window = DateWindow::rolling(state.config.today(), parse_days(query.days.as_deref())?)?;
    let database = state.database()?;

    Ok(Json(stats::build_streak_report(&database, auth.user.id, window)?))
}

pub async fn calendar(
    State(state): State<ApiState>,
    auth: AuthUser,
    Query(query): Query<WindowQuery>,
) -> ApiResult<Json<Vec<DatedCount>>> {
    let raw_year = query
        .year
        .ok_or_else(|| StatsError::InvalidYear(String::new()))?;
    let window = DateWindow::for_year(state.config.today(), &raw_year)?;
    let database = state.database()?;

    Ok(Json(stats::build_year_calendar(&database, auth.user.id, window)?))
}
