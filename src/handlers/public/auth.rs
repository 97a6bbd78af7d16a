// POST /auth/login and POST /auth/refresh

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AuthToken;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub expires_in: i64,
}

impl From<AuthToken> for TokenResponse {
    fn from(token: AuthToken) -> Self {
        Self {
            expires_in: token.expires_in(),
            token: token.token,
            issued_at: token.issued_at,
            expires_at: token.expires_at,
        }
    }
}

/// Exchange the master password for a bearer token.
///
/// ```json
/// { "password": "string" }
/// ```
///
/// A wrong password and an unconfigured server look the same to the client.
pub async fn login_post(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<TokenResponse> {
    let Json(request) = payload?;

    let token = state
        .tokens
        .login(&request.password)
        .await
        .ok_or_else(|| ApiError::unauthorized("Your password was incorrect."))?;

    Ok(ApiResponse::success(token.into()))
}

/// Trade a still-valid token for a new one with a full lifetime.
///
/// ```json
/// { "token": "string" }
/// ```
pub async fn refresh_post(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<TokenResponse> {
    let Json(request) = payload?;

    let token = state
        .tokens
        .refresh(request.token.trim())
        .ok_or_else(|| ApiError::unauthorized("You are not logged in. Your token expired or is invalid."))?;

    Ok(ApiResponse::success(token.into()))
}
