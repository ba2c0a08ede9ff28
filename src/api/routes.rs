use crate::api::{admin, feedback, goals, stats, tasks, users};
use crate::auth;
use crate::config::Config;
use crate::db::{Database, Role, UserRow};
use crate::scheduler;
use crate::stats::StatsError;
use crate::uploads::{self, AVATAR_MAX_BYTES};
use anyhow::Result;
use axum::extract::{DefaultBodyLimit, FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::error;

// Room for the multipart boundaries and part headers around the image.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
}

impl ApiState {
    pub fn database(&self) -> Result<Database> {
        Database::open(&self.config.db_path)
    }
}

pub fn router(state: ApiState) -> Router {
    let uploads_dir = ServeDir::new(state.config.upload_dir.clone());

    Router::new()
        .route("/api/v1/status", get(status))
        .route("/api/v1/users/register", post(users::register))
        .route("/api/v1/users/login", post(users::login))
        .route("/api/v1/users/logout", post(users::logout))
        .route("/api/v1/users/me", get(users::me).put(users::update_me))
        .route(
            "/api/v1/users/me/avatar",
            post(users::upload_avatar)
                .layer(DefaultBodyLimit::max(AVATAR_MAX_BYTES + MULTIPART_OVERHEAD_BYTES)),
        )
        .route("/api/v1/users/otp/send", post(users::send_otp))
        .route("/api/v1/users/otp/verify", post(users::verify_otp))
        .route("/api/v1/users/password/reset", post(users::reset_password))
        .route("/api/v1/stats/dashboard", get(stats::dashboard))
        .route("/api/v1/stats/streak", get(stats::streak))
        .route("/api/v1/stats/calendar", get(stats::calendar))
        .route(
            "/api/v1/tasks",
            get(tasks::list)
                .post(tasks::create)
                .delete(tasks::delete_all),
        )
        .route(
            "/api/v1/tasks/:id",
            put(tasks::update).delete(tasks::delete),
        )
        .route(
            "/api/v1/goals",
            get(goals::list)
                .post(goals::create)
                .delete(goals::delete_all),
        )
        .route(
            "/api/v1/goals/:id",
            put(goals::update).delete(goals::delete),
        )
        .route(
            "/api/v1/feedback",
            get(feedback::list).post(feedback::create),
        )
        .route(
            "/api/v1/feedback/:id",
            put(feedback::update).delete(feedback::delete),
        )
        .route("/api/v1/admin/users", get(admin::list_users))
        .route(
            "/api/v1/admin/users/:id",
            get(admin::user_details).delete(admin::delete_user),
        )
        .nest_service(uploads::PUBLIC_PREFIX, uploads_dir)
        .layer(cors_layer())
        .with_state(state)
}

/// Any origin may call the API; credentials travel in the bearer header,
/// never in cookies.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60))
}

async fn status(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let cron_expression = scheduler::cron_from_sweep_time(&state.config.sweep_time)?;

    Ok(Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "today": state.config.today(),
        "utc_offset_minutes": state.config.utc_offset_minutes,
        "sweep_time": state.config.sweep_time,
        "sweep_cron": cron_expression
    })))
}

/// The user behind a valid, unexpired bearer token.
pub struct AuthUser {
    pub user: UserRow,
    pub token_digest: String,
}

#[axum::async_trait]
impl FromRequestParts<ApiState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> ApiResult<Self> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

        let token_digest = auth::token_digest(token);
        let user = state
            .database()?
            .session_user(&token_digest, Utc::now().timestamp())?
            .ok_or_else(|| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

        Ok(Self { user, token_digest })
    }
}

pub struct AdminUser(pub UserRow);

#[axum::async_trait]
impl FromRequestParts<ApiState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> ApiResult<Self> {
        let AuthUser { user, .. } = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(ApiError::Forbidden("Admins only".to_string()));
        }

        Ok(Self(user))
    }
}

/// The credential from an `Authorization` value. The scheme is matched
/// case-insensitively.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Accepts `YYYY-MM-DD`, or an RFC 3339 timestamp which is reduced to its
/// calendar day at the configured offset.
pub fn parse_task_date(config: &Config, raw: &str) -> ApiResult<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| {
            DateTime::parse_from_rfc3339(raw)
                .map(|instant| config.date_at(instant.with_timezone(&Utc)))
        })
        .map_err(|_| {
            ApiError::BadRequest(format!("Invalid date format: {raw}. Example: 2024-03-10"))
        })
}

pub fn parse_choice<T>(
    raw: &str,
    field: &str,
    parse: fn(&str) -> Option<T>,
    expected: fn() -> String,
) -> ApiResult<T> {
    parse(raw).ok_or_else(|| {
        ApiError::BadRequest(format!("Invalid {field}: {raw}. Expected one of {}", expected()))
    })
}

pub fn required_text(raw: &str, field: &str) -> ApiResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    PayloadTooLarge(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value)
    }
}

impl From<StatsError> for ApiError {
    fn from(value: StatsError) -> Self {
        Self::BadRequest(value.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            ApiError::PayloadTooLarge(message) => (StatusCode::PAYLOAD_TOO_LARGE, message),
            ApiError::Internal(error) => {
                error!(error = %format!("{error:#}"), "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn ensure_found<T>(value: Option<T>, what: &str) -> ApiResult<T> {
    value.ok_or_else(|| ApiError::NotFound(format!("{what} not found")))
}
