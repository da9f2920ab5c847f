use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};

use reward_engine::EngineError;
use reward_types::UserId;
use reward_types::api::{
    Claims, LeaderboardEntry, LeaderboardResponse, LinkReferrerRequest, LinkReferrerResponse,
    UserStatus,
};

use crate::error::{ApiError, join_error};
use crate::state::AppState;

pub async fn user_status(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let worker = state.clone();
    let status = tokio::task::spawn_blocking(move || -> Result<_, EngineError> {
        let user = worker.users.get_user(user_id)?;
        let completed = worker.completions.count_for_user(user_id)?;
        Ok(UserStatus::new(user, completed))
    })
    .await
    .map_err(join_error)??;

    Ok(Json(status))
}

pub async fn leaderboard(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let worker = state.clone();
    let users = tokio::task::spawn_blocking(move || worker.users.leaderboard())
        .await
        .map_err(join_error)?
        .map_err(EngineError::from)?;

    let data = users
        .into_iter()
        .map(|u| LeaderboardEntry {
            user_id: u.id,
            username: u.username,
            balance: u.balance,
        })
        .collect();

    Ok(Json(LeaderboardResponse { data }))
}

/// Links the authenticated user to the owner of `refer_code`.
pub async fn link_referrer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<LinkReferrerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let worker = state.clone();
    tokio::task::spawn_blocking(move || worker.referrals.link_referrer(claims.sub, &req.refer_code))
        .await
        .map_err(join_error)??;

    Ok(Json(LinkReferrerResponse {
        success: "ok".into(),
    }))
}
