use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            username        TEXT NOT NULL UNIQUE,
            password_hash   TEXT NOT NULL,
            email           TEXT NOT NULL UNIQUE,
            balance         INTEGER NOT NULL DEFAULT 0,
            refer_code      TEXT UNIQUE,
            refer_from      INTEGER REFERENCES users(id),
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            CHECK (refer_from IS NULL OR refer_from <> id)
        );

        CREATE INDEX IF NOT EXISTS idx_users_balance
            ON users(balance DESC);

        CREATE TABLE IF NOT EXISTS tasks (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            title           TEXT NOT NULL CHECK (length(title) > 0),
            description     TEXT NOT NULL DEFAULT '',
            price           INTEGER NOT NULL CHECK (price >= 1),
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(title, description)
        );

        -- One completion per (user, task): this key is what prevents double rewards
        CREATE TABLE IF NOT EXISTS task_completions (
            user_id         INTEGER NOT NULL REFERENCES users(id),
            task_id         INTEGER NOT NULL REFERENCES tasks(id),
            completed_at    TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (user_id, task_id)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
