use rusqlite::Connection;
use tracing::info;

use crate::DbResult;

pub fn run(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                 TEXT PRIMARY KEY,
            nickname           TEXT NOT NULL UNIQUE,
            password           TEXT NOT NULL,
            birthday           TEXT,
            gender             TEXT,
            job                TEXT,
            point              INTEGER NOT NULL DEFAULT 0,
            roles              TEXT NOT NULL DEFAULT 'USER',
            created_at         TEXT NOT NULL,
            delete_request_at  TEXT
        );

        CREATE TABLE IF NOT EXISTS friends (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            target_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            status      TEXT NOT NULL CHECK (status IN ('REQUEST', 'FRIEND')),
            created_at  TEXT NOT NULL,
            UNIQUE (owner_id, target_id)
        );

        CREATE INDEX IF NOT EXISTS idx_friends_target
            ON friends(target_id, status);

        CREATE INDEX IF NOT EXISTS idx_users_delete_request
            ON users(delete_request_at)
            WHERE delete_request_at IS NOT NULL;
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
