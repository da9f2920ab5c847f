use crate::models::{TaskRow, UserRow};
use crate::Database;
use anyhow::Result;
use reward_types::{NewTask, NewUser};
use rusqlite::{Connection, Row};

const USER_COLUMNS: &str =
    "id, username, password_hash, email, balance, refer_code, refer_from, created_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NewUser) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, password_hash, email, refer_code) VALUES (?1, ?2, ?3, ?4)",
                (&user.username, &user.password_hash, &user.email, &user.refer_code),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username = ?1", username))
    }

    pub fn get_user_by_refer_code(&self, refer_code: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "refer_code = ?1", refer_code))
    }

    pub fn user_exists(&self, username: &str, email: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1 OR email = ?2)",
                (username, email),
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    /// Returns the number of rows changed: 0 means no such user, or a sum
    /// that would overflow.
    pub fn add_to_balance(&self, id: i64, delta: i64) -> Result<usize> {
        self.with_conn(|conn| credit_balance(conn, id, delta))
    }

    pub fn get_balance(&self, id: i64) -> Result<Option<i64>> {
        self.with_conn(|conn| balance_of(conn, id))
    }

    /// Sets `refer_from` only while it is still NULL. Returns rows changed.
    pub fn set_refer_from(&self, id: i64, referrer: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET refer_from = ?1 WHERE id = ?2 AND refer_from IS NULL",
                (referrer, id),
            )?;
            Ok(changed)
        })
    }

    pub fn get_leaderboard(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY balance DESC, id ASC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Tasks --

    pub fn insert_task(&self, task: &NewTask) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (title, description, price) VALUES (?1, ?2, ?3)",
                (&task.title, &task.description, task.price),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_task_by_id(&self, id: i64) -> Result<Option<TaskRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, title, description, price FROM tasks WHERE id = ?1",
                    [id],
                    task_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn task_exists(&self, title: &str, description: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM tasks WHERE title = ?1 AND description = ?2)",
                (title, description),
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    pub fn get_all_tasks(&self) -> Result<Vec<TaskRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, title, description, price FROM tasks ORDER BY id ASC")?;
            let rows = stmt
                .query_map([], task_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Completions --

    pub fn count_completions(&self, user_id: i64) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM task_completions WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }
}

pub(crate) fn insert_completion(conn: &Connection, user_id: i64, task_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO task_completions (user_id, task_id) VALUES (?1, ?2)",
        (user_id, task_id),
    )?;
    Ok(())
}

/// Single-statement increment so concurrent credits never lose updates.
///
/// The bounds keep the sum inside `i64`; SQLite would otherwise store an
/// overflowing result as REAL. Zero rows changed means the user is missing
/// or the sum would overflow.
pub(crate) fn credit_balance(conn: &Connection, id: i64, delta: i64) -> Result<usize> {
    let ceiling = i64::MAX.saturating_sub(delta.max(0));
    let floor = i64::MIN.saturating_sub(delta.min(0));
    let changed = conn.execute(
        "UPDATE users SET balance = balance + ?1 WHERE id = ?2 AND balance BETWEEN ?3 AND ?4",
        (delta, id, floor, ceiling),
    )?;
    Ok(changed)
}

pub(crate) fn balance_of(conn: &Connection, id: i64) -> Result<Option<i64>> {
    let balance = conn
        .query_row("SELECT balance FROM users WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;
    Ok(balance)
}

fn query_user<P: rusqlite::ToSql>(conn: &Connection, filter: &str, param: P) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {filter}");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([param], user_from_row).optional()?;
    Ok(row)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        email: row.get(3)?,
        balance: row.get(4)?,
        refer_code: row.get(5)?,
        refer_from: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<TaskRow> {
    Ok(TaskRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        price: row.get(3)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
