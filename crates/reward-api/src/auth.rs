use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use tracing::{info, warn};

use reward_engine::referral::generate_refer_code;
use reward_engine::{EngineError, StoreError};
use reward_types::NewUser;
use reward_types::api::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::error::{ApiError, join_error};
use crate::middleware::TOKEN_COOKIE;
use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    let name_len = req.username.chars().count();
    if !(3..=32).contains(&name_len) {
        return Err(ApiError::BadRequest("username must be 3 to 32 characters".into()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::BadRequest("password must be at least 8 characters".into()));
    }
    if !req.email.contains('@') {
        return Err(ApiError::BadRequest("invalid email".into()));
    }

    // Hashing and the inserts both block, so the whole registration runs off the runtime
    let worker = state.clone();
    let username = req.username.clone();
    let user_id = tokio::task::spawn_blocking(move || {
        if worker.users.username_or_email_taken(&req.username, &req.email)? {
            return Err(EngineError::Conflict("user already exists".into()));
        }

        // Hash password with Argon2id
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|e| EngineError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))?
            .to_string();

        let user = NewUser {
            username: req.username,
            password_hash,
            email: req.email,
            refer_code: generate_refer_code(),
        };
        worker.users.create_user(&user).map_err(|e| match e {
            StoreError::Conflict(_) => EngineError::Conflict("user already exists".into()),
            other => other.into(),
        })
    })
    .await
    .map_err(join_error)??;

    let token = state
        .auth
        .issue(user_id, &username)
        .map_err(EngineError::Internal)?;

    info!(user_id = %user_id, username = %username, "User registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { user_id, token }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let worker = state.clone();
    let username = req.username.clone();
    let user = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
        let user = worker
            .users
            .find_by_username(&req.username)
            .map_err(EngineError::from)?
            .ok_or(ApiError::Unauthorized)?;

        // Verify password
        let parsed_hash = PasswordHash::new(&user.password_hash).map_err(|e| {
            EngineError::Internal(anyhow::anyhow!("corrupt password hash for user {}: {}", user.id, e))
        })?;
        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .map_err(|_| ApiError::Unauthorized)?;

        Ok(user)
    })
    .await
    .map_err(join_error)?
    .inspect_err(|_| warn!(username = %username, "Login failed"))?;

    let token = state
        .auth
        .issue(user.id, &user.username)
        .map_err(EngineError::Internal)?;

    let cookie = format!(
        "{TOKEN_COOKIE}={token}; Path=/; HttpOnly; Secure; SameSite=Strict; Max-Age={}",
        state.auth.ttl().num_seconds()
    );

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            user_id: user.id,
            username: user.username,
            token,
        }),
    ))
}
