//! `reward-engine` store capabilities backed by [`Database`].

use std::sync::MutexGuard;

use reward_engine::store::{CompletionStore, StoreError, TaskStore, UnitOfWork, UserStore};
use reward_types::{NewTask, NewUser, Task, TaskId, User, UserId};
use rusqlite::{Connection, ErrorCode, ffi};
use tracing::{debug, warn};

use crate::Database;
use crate::queries::{balance_of, credit_balance, insert_completion};

/// Maps adapter errors onto the store taxonomy. Unique and primary key
/// violations become `Conflict`; everything else is `Internal`.
fn classify(err: anyhow::Error) -> StoreError {
    if let Some(rusqlite::Error::SqliteFailure(e, msg)) = err.downcast_ref::<rusqlite::Error>() {
        if e.code == ErrorCode::ConstraintViolation
            && matches!(
                e.extended_code,
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            )
        {
            return StoreError::Conflict(msg.clone().unwrap_or_else(|| "unique constraint".into()));
        }
    }
    StoreError::Internal(err)
}

/// Explains a credit that changed no row: the user is missing, or the
/// bounded update refused to overflow.
fn credit_refused(id: UserId, delta: i64, balance: Option<i64>) -> StoreError {
    match balance {
        None => StoreError::NotFound("user"),
        Some(balance) => {
            warn!(user_id = %id, balance, delta, "Balance credit would overflow");
            StoreError::Overflow(id)
        }
    }
}

impl UserStore for Database {
    fn get_user(&self, id: UserId) -> Result<User, StoreError> {
        self.get_user_by_id(id.0)
            .map_err(classify)?
            .map(User::from)
            .ok_or(StoreError::NotFound("user"))
    }

    fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.get_user_by_username(username).map_err(classify)?.map(User::from))
    }

    fn find_by_refer_code(&self, refer_code: &str) -> Result<Option<User>, StoreError> {
        Ok(self.get_user_by_refer_code(refer_code).map_err(classify)?.map(User::from))
    }

    fn username_or_email_taken(&self, username: &str, email: &str) -> Result<bool, StoreError> {
        self.user_exists(username, email).map_err(classify)
    }

    fn create_user(&self, user: &NewUser) -> Result<UserId, StoreError> {
        Database::create_user(self, user).map(UserId).map_err(classify)
    }

    fn adjust_balance(&self, id: UserId, delta: i64) -> Result<(), StoreError> {
        if self.add_to_balance(id.0, delta).map_err(classify)? == 1 {
            return Ok(());
        }
        let balance = self.get_balance(id.0).map_err(classify)?;
        Err(credit_refused(id, delta, balance))
    }

    fn link_referrer(&self, id: UserId, referrer: UserId) -> Result<bool, StoreError> {
        if self.set_refer_from(id.0, referrer.0).map_err(classify)? == 1 {
            return Ok(true);
        }
        // Nothing changed: either the user is missing or already linked.
        UserStore::get_user(self, id)?;
        Ok(false)
    }

    fn leaderboard(&self) -> Result<Vec<User>, StoreError> {
        Ok(self
            .get_leaderboard()
            .map_err(classify)?
            .into_iter()
            .map(User::from)
            .collect())
    }
}

impl TaskStore for Database {
    fn get_task(&self, id: TaskId) -> Result<Task, StoreError> {
        self.get_task_by_id(id.0)
            .map_err(classify)?
            .map(Task::from)
            .ok_or(StoreError::NotFound("task"))
    }

    fn exists_with_content(&self, title: &str, description: &str) -> Result<bool, StoreError> {
        self.task_exists(title, description).map_err(classify)
    }

    fn insert_task(&self, task: &NewTask) -> Result<TaskId, StoreError> {
        Database::insert_task(self, task).map(TaskId).map_err(classify)
    }

    fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self
            .get_all_tasks()
            .map_err(classify)?
            .into_iter()
            .map(Task::from)
            .collect())
    }
}

impl CompletionStore for Database {
    fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>, StoreError> {
        let conn = self.lock().map_err(classify)?;
        // IMMEDIATE takes the write lock up front so two units never deadlock upgrading.
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| classify(e.into()))?;
        Ok(Box::new(SqliteUnit {
            conn,
            finished: false,
        }))
    }

    fn count_for_user(&self, id: UserId) -> Result<u64, StoreError> {
        self.count_completions(id.0).map_err(classify)
    }
}

/// An open `BEGIN IMMEDIATE` transaction holding the connection lock.
/// Rolled back on drop unless committed.
pub struct SqliteUnit<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl UnitOfWork for SqliteUnit<'_> {
    fn record_completion(&mut self, user_id: UserId, task_id: TaskId) -> Result<(), StoreError> {
        insert_completion(&self.conn, user_id.0, task_id.0).map_err(classify)
    }

    fn adjust_balance(&mut self, user_id: UserId, delta: i64) -> Result<(), StoreError> {
        if credit_balance(&self.conn, user_id.0, delta).map_err(classify)? == 1 {
            return Ok(());
        }
        let balance = balance_of(&self.conn, user_id.0).map_err(classify)?;
        Err(credit_refused(user_id, delta, balance))
    }

    fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| classify(e.into()))?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for SqliteUnit<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.conn.execute_batch("ROLLBACK") {
            Ok(()) => debug!("Unit of work rolled back"),
            Err(e) => warn!("Rollback failed: {}", e),
        }
    }
}
