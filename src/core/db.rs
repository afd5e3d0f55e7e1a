//! SQLite connection and schema management for chat storage.
use anyhow::{Error, Result};
use rusqlite::Connection;

// Each entry moves the schema from version `index` to `index + 1`.
// Never edit an entry that has shipped, append a new one instead.
const MIGRATIONS: &[&str] = &[r#"
    CREATE TABLE IF NOT EXISTS chat (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS chat_updated_at_idx ON chat(updated_at);
    CREATE TABLE IF NOT EXISTS chat_message (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        chat_id TEXT NOT NULL REFERENCES chat(id) ON DELETE CASCADE,
        data TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS chat_message_chat_id_idx ON chat_message(chat_id);
"#];

/// Open an async connection to the database file at `db_path`.
pub async fn async_db(db_path: &str) -> Result<tokio_rusqlite::Connection, Error> {
    let db = tokio_rusqlite::Connection::open(db_path).await?;
    db.call(|conn| {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(())
    })
    .await?;
    Ok(db)
}

pub fn schema_version(conn: &Connection) -> rusqlite::Result<usize> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(version.max(0) as usize)
}

/// Apply every migration newer than the database's current version.
/// Returns the number of migrations applied.
pub fn migrate_db(conn: &mut Connection) -> rusqlite::Result<usize> {
    let current = schema_version(conn)?;
    let mut applied = 0;

    for (version, sql) in MIGRATIONS.iter().enumerate().skip(current) {
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", (version + 1) as i64)?;
        tx.commit()?;
        applied += 1;
        tracing::debug!("Applied db migration {}", version + 1);
    }

    Ok(applied)
}

/// Create the schema on a fresh database. Safe to call on an
/// existing one.
pub fn initialize_db(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    migrate_db(conn)?;
    Ok(())
}
