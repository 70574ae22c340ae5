use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RefreshRequest, SignupRequest, SignupResponse},
        jwt::{AuthUser, JwtKeys, TokenKind},
        password::{hash_password, verify_password},
        repo::User,
        services::validate_signup,
    },
    db,
    error::AppError,
    extract::AppJson,
    state::AppState,
};

fn duplicate_email() -> AppError {
    AppError::Conflict("User with this email already exists".into())
}

/// A unique violation on insert means another signup won the race for this email.
fn map_insert_error(err: sqlx::Error) -> AppError {
    if db::is_unique_violation(&err) {
        warn!("email taken during insert");
        duplicate_email()
    } else {
        error!(error = %err, "create user failed");
        AppError::from(err)
    }
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    AppJson(payload): AppJson<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), AppError> {
    let account = validate_signup(payload).map_err(|e| {
        warn!(error = %e, "signup rejected");
        e
    })?;

    let existing = User::find_by_email(&state.db, &account.email)
        .await
        .map_err(|e| {
            error!(error = %e, "find_by_email failed");
            AppError::from(e)
        })?;
    if existing.is_some() {
        warn!(email = %account.email, "email already registered");
        return Err(duplicate_email());
    }

    let password = account.password;
    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(anyhow::Error::from)??;

    let user = User::create(&state.db, &account.name, &account.email, &hash)
        .await
        .map_err(map_insert_error)?;

    info!(user_id = %user.id, "user created");
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "User created successfully",
            user: user.into(),
        }),
    ))
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid credentials".into())
}

fn issue_tokens(keys: &JwtKeys, user: User) -> Result<AuthResponse, AppError> {
    Ok(AuthResponse {
        access_token: keys.issue(user.id, TokenKind::Access)?,
        refresh_token: keys.issue(user.id, TokenKind::Refresh)?,
        user: user.into(),
    })
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let email = payload.email.trim();

    let user = match User::find_by_email(&state.db, email).await? {
        Some(u) => u,
        None => {
            warn!(email = %email, "login unknown email");
            return Err(invalid_credentials());
        }
    };

    let Some(hash) = user.password_hash.clone() else {
        warn!(user_id = %user.id, "login for account without password");
        return Err(invalid_credentials());
    };
    let password = payload.password;
    let ok = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(anyhow::Error::from)??;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(invalid_credentials());
    }

    info!(user_id = %user.id, "user logged in");
    let keys = JwtKeys::from_ref(&state);
    Ok(Json(issue_tokens(&keys, user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .decode_as(&payload.refresh_token, TokenKind::Refresh)
        .map_err(|e| {
            warn!(error = %e, "refresh rejected");
            AppError::Unauthorized("Invalid refresh token".into())
        })?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    Ok(Json(issue_tokens(&keys, user)?))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| {
            warn!(user_id = %user_id, "user not found");
            AppError::Unauthorized("User not found".into())
        })?;
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use sqlx::error::ErrorKind;

    use super::{duplicate_email, map_insert_error};
    use crate::{
        state::AppState,
        test_support::{call, db_error},
    };

    #[test]
    fn racing_duplicate_insert_reads_like_the_precheck() {
        let err = map_insert_error(db_error(ErrorKind::UniqueViolation));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), duplicate_email().to_string());
        assert_eq!(err.to_string(), "User with this email already exists");
    }

    #[test]
    fn other_insert_failures_keep_their_class() {
        let err = map_insert_error(db_error(ErrorKind::ForeignKeyViolation));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = map_insert_error(db_error(ErrorKind::Other));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = map_insert_error(sqlx::Error::PoolTimedOut);
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.to_string(), "Database connection error. Please try again later.");
    }

    #[tokio::test]
    async fn signup_rejects_short_password_before_touching_db() {
        let state = AppState::fake();
        let (status, body) = call(
            &state,
            "POST",
            "/api/auth/signup",
            None,
            Some(json!({ "name": "Sam", "email": "sam@example.com", "password": "12345" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Password must be at least 6 characters long");
    }

    #[tokio::test]
    async fn signup_requires_all_fields() {
        let state = AppState::fake();
        let (status, body) = call(
            &state,
            "POST",
            "/api/auth/signup",
            None,
            Some(json!({ "email": "sam@example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required fields");
    }

    #[tokio::test]
    async fn signup_rejects_malformed_email() {
        let state = AppState::fake();
        let (status, body) = call(
            &state,
            "POST",
            "/api/auth/signup",
            None,
            Some(json!({ "name": "Sam", "email": "sam.example.com", "password": "123456" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Please enter a valid email address");
    }

    #[tokio::test]
    async fn me_requires_token() {
        let state = AppState::fake();
        let (status, _) = call(&state, "GET", "/api/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(&state, "GET", "/api/me", Some("Bearer nope"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid or expired token");
    }

    #[tokio::test]
    async fn refresh_rejects_garbage_token() {
        let state = AppState::fake();
        let (status, body) = call(
            &state,
            "POST",
            "/api/auth/refresh",
            None,
            Some(json!({ "refreshToken": "garbage" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid refresh token");
    }
}
