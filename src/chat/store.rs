//! Durable storage of chat records.
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio_rusqlite::{Connection, params};
use uuid::Uuid;

use super::error::{ChatError, Result};
use super::models::{Chat, ChatSummary, Message, NewChat};

/// Persists chat records keyed by a store-assigned id. Every
/// operation may fail with `ChatError::StoreUnavailable`.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Write a new record and return its id. The store sets
    /// `created_at` and `updated_at`.
    async fn create(&self, chat: NewChat) -> Result<String>;

    /// Append one message and refresh `updated_at` in a single
    /// atomic write.
    async fn append_message(&self, id: &str, msg: &Message) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<Chat>>;

    /// All records, most recently updated first.
    async fn list_all(&self) -> Result<Vec<Chat>>;

    /// A summary of every record, most recently updated first. Doesn't
    /// read message bodies.
    async fn list_summaries(&self) -> Result<Vec<ChatSummary>>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Set a new title and refresh `updated_at`.
    async fn rename(&self, id: &str, title: &str) -> Result<()>;
}

// Fixed width so that lexical ordering in SQL matches time ordering
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(ts: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(ts)?.with_timezone(&Utc))
}

struct ChatRow {
    id: String,
    title: String,
    created_at: String,
    updated_at: String,
}

impl ChatRow {
    fn into_chat(self, messages: Vec<Message>) -> Result<Chat> {
        Ok(Chat {
            id: self.id,
            title: self.title,
            messages,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn decode_messages(rows: Vec<String>) -> Result<Vec<Message>> {
    rows.iter()
        .map(|data| serde_json::from_str::<Message>(data).map_err(ChatError::from))
        .collect()
}

#[derive(Clone)]
pub struct SqliteChatStore {
    db: Connection,
}

impl SqliteChatStore {
    /// Expects a connection whose schema was set up with
    /// `core::db::initialize_db`.
    pub fn new(db: Connection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ChatStore for SqliteChatStore {
    async fn create(&self, chat: NewChat) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let now = format_timestamp(Utc::now());
        let data = chat
            .messages
            .iter()
            .map(serde_json::to_string)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let chat_id = id.clone();
        self.db
            .call(move |conn| {
                // The record and its messages are written together or
                // not at all
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO chat (id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                    params![chat_id, chat.title, now],
                )?;
                for d in data {
                    tx.execute(
                        "INSERT INTO chat_message (chat_id, data) VALUES (?1, ?2)",
                        params![chat_id, d],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await?;

        tracing::debug!("Created chat {}", id);
        Ok(id)
    }

    async fn append_message(&self, id: &str, msg: &Message) -> Result<()> {
        let chat_id = id.to_owned();
        let data = serde_json::to_string(msg)?;
        let now = format_timestamp(Utc::now());

        let updated = self
            .db
            .call(move |conn| {
                let tx = conn.transaction()?;
                let updated = tx.execute(
                    "UPDATE chat SET updated_at = ?1 WHERE id = ?2",
                    params![now, chat_id],
                )?;
                if updated == 0 {
                    // Nothing to append to, drop the transaction
                    return Ok(0);
                }
                tx.execute(
                    "INSERT INTO chat_message (chat_id, data) VALUES (?1, ?2)",
                    params![chat_id, data],
                )?;
                tx.commit()?;
                Ok(updated)
            })
            .await?;

        if updated == 0 {
            return Err(ChatError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Chat>> {
        let chat_id = id.to_owned();
        let found = self
            .db
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, title, created_at, updated_at FROM chat WHERE id = ?1",
                )?;
                let row = stmt
                    .query_map([&chat_id], |row| {
                        Ok(ChatRow {
                            id: row.get(0)?,
                            title: row.get(1)?,
                            created_at: row.get(2)?,
                            updated_at: row.get(3)?,
                        })
                    })?
                    .next()
                    .transpose()?;

                let Some(row) = row else {
                    return Ok(None);
                };

                let mut stmt = conn
                    .prepare("SELECT data FROM chat_message WHERE chat_id = ?1 ORDER BY id ASC")?;
                let messages = stmt
                    .query_map([&chat_id], |row| row.get::<_, String>(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                Ok(Some((row, messages)))
            })
            .await?;

        match found {
            Some((row, messages)) => Ok(Some(row.into_chat(decode_messages(messages)?)?)),
            None => Ok(None),
        }
    }

    async fn list_all(&self) -> Result<Vec<Chat>> {
        let (rows, messages) = self
            .db
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, title, created_at, updated_at FROM chat ORDER BY updated_at DESC",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(ChatRow {
                            id: row.get(0)?,
                            title: row.get(1)?,
                            created_at: row.get(2)?,
                            updated_at: row.get(3)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<ChatRow>>>()?;

                let mut stmt =
                    conn.prepare("SELECT chat_id, data FROM chat_message ORDER BY id ASC")?;
                let messages = stmt
                    .query_map([], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                    })?
                    .collect::<rusqlite::Result<Vec<(String, String)>>>()?;
                Ok((rows, messages))
            })
            .await?;

        let mut by_chat: HashMap<String, Vec<String>> = HashMap::new();
        for (chat_id, data) in messages {
            by_chat.entry(chat_id).or_default().push(data);
        }

        rows.into_iter()
            .map(|row| {
                let data = by_chat.remove(&row.id).unwrap_or_default();
                row.into_chat(decode_messages(data)?)
            })
            .collect()
    }

    async fn list_summaries(&self) -> Result<Vec<ChatSummary>> {
        let rows = self
            .db
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT c.id, c.title, c.created_at, c.updated_at, COUNT(m.id)
                     FROM chat c
                     LEFT JOIN chat_message m ON m.chat_id = c.id
                     GROUP BY c.id
                     ORDER BY c.updated_at DESC",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((
                            ChatRow {
                                id: row.get(0)?,
                                title: row.get(1)?,
                                created_at: row.get(2)?,
                                updated_at: row.get(3)?,
                            },
                            row.get::<_, i64>(4)?,
                        ))
                    })?
                    .collect::<rusqlite::Result<Vec<(ChatRow, i64)>>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(row, count)| {
                Ok(ChatSummary {
                    id: row.id,
                    title: row.title,
                    created_at: parse_timestamp(&row.created_at)?,
                    updated_at: parse_timestamp(&row.updated_at)?,
                    message_count: count.max(0) as usize,
                })
            })
            .collect()
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let chat_id = id.to_owned();
        let deleted = self
            .db
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM chat_message WHERE chat_id = ?1", [&chat_id])?;
                let deleted = tx.execute("DELETE FROM chat WHERE id = ?1", [&chat_id])?;
                tx.commit()?;
                Ok(deleted)
            })
            .await?;

        if deleted == 0 {
            tracing::debug!("Delete of chat {} matched nothing", id);
        }
        Ok(())
    }

    async fn rename(&self, id: &str, title: &str) -> Result<()> {
        let chat_id = id.to_owned();
        let title = title.to_owned();
        let now = format_timestamp(Utc::now());
        let updated = self
            .db
            .call(move |conn| {
                let updated = conn.execute(
                    "UPDATE chat SET title = ?1, updated_at = ?2 WHERE id = ?3",
                    params![title, now, chat_id],
                )?;
                Ok(updated)
            })
            .await?;

        if updated == 0 {
            return Err(ChatError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_formats_timestamps_with_fixed_width() {
        let ts = DateTime::parse_from_rfc3339("2024-07-25T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let formatted = format_timestamp(ts);
        assert_eq!(formatted, "2024-07-25T10:00:00.000000Z");
        assert_eq!(parse_timestamp(&formatted).unwrap(), ts);
    }

    #[test]
    fn it_rejects_malformed_timestamps() {
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(ChatError::StoreUnavailable(_))
        ));
    }
}
