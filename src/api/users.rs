use crate::api::routes::{ApiError, ApiResult, ApiState, AuthUser, required_text};
use crate::auth;
use crate::db::{self, Database, OtpState, UserRow};
use crate::{outbox, uploads};
use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    username: String,
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    bio: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OtpSendRequest {
    email: String,
}

#[derive(Debug, Deserialize)]
pub struct OtpVerifyRequest {
    email: String,
    otp: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    email: String,
    otp: String,
    password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionPayload {
    token: String,
    user: UserRow,
}

pub async fn register(
    State(state): State<ApiState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<SessionPayload>)> {
    let username = request.username.trim();
    let email = request.email.trim().to_lowercase();
    auth::validate_registration(username, &email, &request.password)
        .map_err(|error| ApiError::BadRequest(error.to_string()))?;

    let database = state.database()?;
    if let Some(field) = database.taken_identity(username, &email)? {
        return Err(ApiError::Conflict(format!("User with this {field} already exists")));
    }

    let password_hash = auth::hash_password(&request.password)?;
    let user = database
        .create_user(username, &email, &password_hash)
        .map_err(registration_conflict)?;
    let token = open_session(&state, &database, user.id)?;
    info!(user_id = user.id, "user registered");

    Ok((StatusCode::CREATED, Json(SessionPayload { token, user })))
}

pub async fn login(
    State(state): State<ApiState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<SessionPayload>> {
    let database = state.database()?;
    let credentials = database
        .credentials_by_username(request.username.trim())?
        .filter(|credentials| auth::verify_password(&request.password, &credentials.password_hash))
        .ok_or_else(|| {
            ApiError::Unauthorized("Invalid username or wrong password".to_string())
        })?;

    let token = open_session(&state, &database, credentials.user.id)?;

    Ok(Json(SessionPayload {
        token,
        user: credentials.user,
    }))
}

pub async fn logout(State(state): State<ApiState>, auth: AuthUser) -> ApiResult<Json<Value>> {
    state.database()?.delete_session(&auth.token_digest)?;
    Ok(Json(json!({ "message": "Logged out" })))
}

pub async fn me(auth: AuthUser) -> Json<UserRow> {
    Json(auth.user)
}

pub async fn update_me(
    State(state): State<ApiState>,
    auth: AuthUser,
    Json(request): Json<ProfileRequest>,
) -> ApiResult<Json<UserRow>> {
    let user = state
        .database()?
        .update_profile(auth.user.id, request.bio.as_deref().map(str::trim), None)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// Accepts a multipart `image` field of at most 3 MB and points the
/// profile's avatar at the stored copy.
pub async fn upload_avatar(
    State(state): State<ApiState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let mut image = None;
    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() != Some("image") {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !uploads::is_image(&content_type) {
            return Err(ApiError::BadRequest("Only image files allowed".to_string()));
        }

        let bytes = field.bytes().await.map_err(upload_error)?;
        image = Some((content_type, bytes));
        break;
    }

    let (content_type, bytes) =
        image.ok_or_else(|| ApiError::BadRequest("Profile image is required".to_string()))?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("Profile image is required".to_string()));
    }
    if bytes.len() > uploads::AVATAR_MAX_BYTES {
        return Err(ApiError::PayloadTooLarge(
            "Profile image must be 3 MB or smaller".to_string(),
        ));
    }

    let avatar =
        uploads::write_avatar(&state.config.upload_dir, auth.user.id, &content_type, &bytes)?;
    state
        .database()?
        .update_profile(auth.user.id, None, Some(&avatar))?;
    info!(user_id = auth.user.id, avatar = %avatar, "avatar uploaded");

    Ok(Json(json!({
        "message": "Profile uploaded successfully",
        "profileImageUrl": avatar
    })))
}

pub async fn send_otp(
    State(state): State<ApiState>,
    Json(request): Json<OtpSendRequest>,
) -> ApiResult<Json<Value>> {
    let email = required_text(&request.email, "email")?.to_lowercase();
    let database = state.database()?;
    let account = database
        .otp_state_by_email(&email)?
        .ok_or_else(|| ApiError::NotFound("User with this email does not exist".to_string()))?;

    let otp = auth::generate_otp();
    let ttl_minutes = state.config.otp_ttl_minutes;
    let expires_at = (Utc::now() + Duration::minutes(i64::from(ttl_minutes))).timestamp();
    database.store_otp(account.user_id, &auth::otp_digest(&email, &otp), expires_at)?;

    let message = outbox::write_otp_message(&state.config.outbox_dir, &email, &otp, ttl_minutes)?;
    info!(user_id = account.user_id, path = %message.display(), "otp issued");

    Ok(Json(json!({ "message": "OTP sent" })))
}

pub async fn verify_otp(
    State(state): State<ApiState>,
    Json(request): Json<OtpVerifyRequest>,
) -> ApiResult<Json<Value>> {
    let email = required_text(&request.email, "email")?.to_lowercase();
    let database = state.database()?;
    let account = checked_otp(&database, &email, &request.otp)?;

    database.consume_otp(account.user_id)?;
    info!(user_id = account.user_id, "account verified");

    Ok(Json(json!({ "message": "Account verified" })))
}

pub async fn reset_password(
    State(state): State<ApiState>,
    Json(request): Json<PasswordResetRequest>,
) -> ApiResult<Json<Value>> {
    let email = required_text(&request.email, "email")?.to_lowercase();
    auth::validate_password(&request.password)
        .map_err(|error| ApiError::BadRequest(error.to_string()))?;

    let mut database = state.database()?;
    let account = checked_otp(&database, &email, &request.otp)?;

    database.reset_password(account.user_id, &auth::hash_password(&request.password)?)?;
    database.consume_otp(account.user_id)?;
    info!(user_id = account.user_id, "password reset");

    Ok(Json(json!({ "message": "Password updated" })))
}

fn registration_conflict(error: anyhow::Error) -> ApiError {
    if db::is_constraint_violation(&error) {
        ApiError::Conflict("User with this username or email already exists".to_string())
    } else {
        ApiError::Internal(error)
    }
}

fn upload_error(error: MultipartError) -> ApiError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("Profile image must be 3 MB or smaller".to_string())
    } else {
        ApiError::BadRequest(format!("Invalid upload: {}", error.body_text()))
    }
}

fn open_session(state: &ApiState, database: &Database, user_id: i64) -> ApiResult<String> {
    let token = auth::generate_token();
    let ttl = Duration::hours(i64::from(state.config.session_ttl_hours));
    let expires_at = (Utc::now() + ttl).timestamp();
    database.create_session(user_id, &auth::token_digest(&token), expires_at)?;
    Ok(token)
}

fn checked_otp(database: &Database, email: &str, otp: &str) -> ApiResult<OtpState> {
    let account = database
        .otp_state_by_email(email)?
        .ok_or_else(|| ApiError::NotFound("User with this email does not exist".to_string()))?;

    let (Some(stored), Some(expires_at)) = (account.otp_hash.as_deref(), account.otp_expires_at)
    else {
        return Err(ApiError::BadRequest("No OTP requested for this email".to_string()));
    };

    if expires_at <= Utc::now().timestamp() {
        return Err(ApiError::BadRequest("OTP has expired".to_string()));
    }
    if !auth::otp_matches(email, otp, stored) {
        return Err(ApiError::BadRequest("Invalid OTP".to_string()));
    }

    Ok(account)
}

#[cfg(test)]
mod tests {
    use super::registration_conflict;
    use crate::api::routes::ApiError;
    use crate::db::test_support::temp_database;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[test]
    fn racing_registration_maps_to_conflict() {
        let (_dir, database) = temp_database();
        database
            .create_user("zed", "zed@example.com", "h")
            .expect("first user");

        let error = database
            .create_user("zed", "zed@example.com", "h")
            .expect_err("duplicate user");
        let mapped = registration_conflict(error);

        assert!(matches!(mapped, ApiError::Conflict(_)));
        assert_eq!(mapped.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn other_store_errors_stay_internal() {
        let mapped = registration_conflict(anyhow::anyhow!("disk on fire"));
        assert_eq!(
            mapped.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
