//! Database row types. These map directly to SQLite rows.
//! Distinct from reward-types models to keep the DB layer independent.

use chrono::{DateTime, NaiveDateTime, Utc};
use reward_types::{Task, TaskId, User, UserId};
use tracing::warn;

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub balance: i64,
    pub refer_code: Option<String>,
    pub refer_from: Option<i64>,
    pub created_at: String,
}

pub struct TaskRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub price: i64,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let created_at = parse_timestamp(&row.created_at).unwrap_or_else(|| {
            warn!("Corrupt created_at '{}' on user {}", row.created_at, row.id);
            DateTime::default()
        });

        User {
            id: UserId(row.id),
            username: row.username,
            password_hash: row.password_hash,
            email: row.email,
            balance: row.balance,
            refer_code: row.refer_code,
            refer_from: row.refer_from.map(UserId),
            created_at,
        }
    }
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Task {
            id: TaskId(row.id),
            title: row.title,
            description: row.description,
            price: row.price,
        }
    }
}

/// SQLite stores `datetime('now')` as "YYYY-MM-DD HH:MM:SS" without timezone.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|ndt| ndt.and_utc())
        })
}
