//! Capability interfaces over persistent Users, Tasks and Completions.
//!
//! Every call is a blocking I/O boundary. Async callers run engine operations
//! on the blocking pool.

use reward_types::{NewTask, NewUser, Task, TaskId, User, UserId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The named row does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The balance adjustment would leave the `i64` range.
    #[error("balance overflow for user {0}")]
    Overflow(UserId),

    /// Connectivity, I/O or query failure.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub trait UserStore: Send + Sync {
    fn get_user(&self, id: UserId) -> Result<User, StoreError>;

    fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    fn find_by_refer_code(&self, refer_code: &str) -> Result<Option<User>, StoreError>;

    /// True when either the username or the email already belongs to a user.
    fn username_or_email_taken(&self, username: &str, email: &str) -> Result<bool, StoreError>;

    /// Fails with `Conflict` when username, email or refer code is taken.
    fn create_user(&self, user: &NewUser) -> Result<UserId, StoreError>;

    /// Atomic `balance += delta`. Never a read-then-write. Fails with
    /// `Overflow` and leaves the balance untouched when the sum would not fit.
    fn adjust_balance(&self, id: UserId, delta: i64) -> Result<(), StoreError>;

    /// Sets `refer_from` only if it is still unset. Returns `false` when the
    /// user already had a referrer, `NotFound` when the user is missing.
    fn link_referrer(&self, id: UserId, referrer: UserId) -> Result<bool, StoreError>;

    /// All users, highest balance first.
    fn leaderboard(&self) -> Result<Vec<User>, StoreError>;
}

pub trait TaskStore: Send + Sync {
    fn get_task(&self, id: TaskId) -> Result<Task, StoreError>;

    fn exists_with_content(&self, title: &str, description: &str) -> Result<bool, StoreError>;

    /// Fails with `Conflict` when (title, description) is already taken.
    fn insert_task(&self, task: &NewTask) -> Result<TaskId, StoreError>;

    /// Full scan in ascending id order.
    fn list_tasks(&self) -> Result<Vec<Task>, StoreError>;
}

pub trait CompletionStore: Send + Sync {
    /// Opens an atomic unit of work. The unit exclusively owns its connection
    /// until it is committed or dropped; dropping it uncommitted rolls back.
    fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>, StoreError>;

    fn count_for_user(&self, id: UserId) -> Result<u64, StoreError>;
}

/// Writes staged inside one transaction.
pub trait UnitOfWork {
    /// Fails with `Conflict` when (user, task) was already recorded.
    fn record_completion(&mut self, user_id: UserId, task_id: TaskId) -> Result<(), StoreError>;

    fn adjust_balance(&mut self, user_id: UserId, delta: i64) -> Result<(), StoreError>;

    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
