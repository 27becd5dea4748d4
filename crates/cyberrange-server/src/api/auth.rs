//! Authentication API endpoints

use crate::{
    auth::{self, Claims, LoginForm, RegisterForm, UserInfo, TOKEN_COOKIE},
    error::{WebError, WebResult},
    state::AppState,
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserInfo,
    /// Same value as the cookie, for clients that send a bearer header
    pub token: String,
    pub message: String,
}

/// Self-service registration; always creates a student
pub async fn register_handler(
    State(state): State<AppState>,
    Json(form): Json<RegisterForm>,
) -> WebResult<(StatusCode, Json<UserInfo>)> {
    let user = auth::register_user(&state.pool, &form).await?;
    Ok((StatusCode::CREATED, Json(UserInfo::from(user))))
}

/// Validates credentials and returns the JWT as an httpOnly cookie
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(login): Json<LoginForm>,
) -> WebResult<(CookieJar, Json<LoginResponse>)> {
    let user = auth::authenticate_user(&state.pool, &login).await?;
    let token = state
        .keys
        .generate_token(&Claims::new(&user, state.keys.ttl()))?;

    let cookie = Cookie::build((TOKEN_COOKIE, token.clone()))
        .path("/")
        .http_only(true)
        .secure(true)
        .max_age(time::Duration::seconds(state.keys.ttl().num_seconds()))
        .build();

    let response = LoginResponse {
        user: UserInfo::from(user),
        token,
        message: "Login successful".to_string(),
    };

    tracing::info!("User logged in: {}", response.user.username);

    Ok((jar.add(cookie), Json(response)))
}

/// Clears the authentication cookie
pub async fn logout_handler(jar: CookieJar) -> (CookieJar, StatusCode) {
    let cookie = Cookie::build((TOKEN_COOKIE, ""))
        .path("/")
        .max_age(time::Duration::seconds(0))
        .build();

    (jar.add(cookie), StatusCode::OK)
}

/// The currently authenticated account
pub async fn me_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> WebResult<Json<UserInfo>> {
    let user = auth::find_user(&state.pool, &claims.sub)
        .await?
        .ok_or_else(|| WebError::Unauthorized("Account no longer exists".to_string()))?;
    Ok(Json(UserInfo::from(user)))
}
