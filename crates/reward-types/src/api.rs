use serde::{Deserialize, Serialize};

use crate::models::{Task, TaskId, User, UserId};

// -- JWT Claims --

/// JWT claims issued by `/auth/login` and `/auth/register` and checked by the
/// API auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub username: String,
    pub iat: usize,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: UserId,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: UserId,
    pub username: String,
    pub token: String,
}

// -- Tasks --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: i64,
}

#[derive(Debug, Serialize)]
pub struct CreateTaskResponse {
    pub task_id: TaskId,
}

#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkReferrerRequest {
    pub refer_code: String,
}

#[derive(Debug, Serialize)]
pub struct LinkReferrerResponse {
    pub success: String,
}

/// Public view of a user. Never carries the password hash.
#[derive(Debug, Serialize)]
pub struct UserStatus {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub balance: i64,
    pub refer_code: Option<String>,
    pub refer_from: Option<UserId>,
    pub completed_tasks: u64,
}

impl UserStatus {
    pub fn new(user: User, completed_tasks: u64) -> Self {
        Self {
            user_id: user.id,
            username: user.username,
            email: user.email,
            balance: user.balance,
            refer_code: user.refer_code,
            refer_from: user.refer_from,
            completed_tasks,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    pub username: String,
    pub balance: i64,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub data: Vec<LeaderboardEntry>,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
