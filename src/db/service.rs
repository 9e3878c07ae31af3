use crate::db::models::{ContentKind, Message, MessageRole, Session};
use crate::news::Article;
use chrono::{DateTime, Utc};
use duckdb::{params, Connection, Result as DbResult, Row};
use uuid::Uuid;

pub struct DbService;

const SESSION_COLS: &str =
    "id, name, user_id, news, CAST(created_at AS VARCHAR), CAST(updated_at AS VARCHAR)";
const MESSAGE_COLS: &str =
    "id, session_id, role, kind, content, metadata, news, CAST(created_at AS VARCHAR)";

impl DbService {
    fn row_to_session(row: &Row) -> DbResult<Session> {
        let news_str: String = row.get(3)?;
        let news: Vec<Article> = serde_json::from_str(&news_str).unwrap_or_default();

        // Timestamps are selected AS text so we don't depend on the driver's
        // chrono feature; see the CAST in every SELECT below.
        let created_str: String = row.get(4)?;
        let updated_str: String = row.get(5)?;
        let created_at = created_str.parse::<DateTime<Utc>>().unwrap_or_else(|_| Utc::now());
        let updated_at = updated_str.parse::<DateTime<Utc>>().unwrap_or_else(|_| Utc::now());

        Ok(Session {
            id: row.get::<_, String>(0)?.parse().unwrap_or_default(),
            name: row.get::<_, String>(1)?,
            user_id: row
                .get::<_, Option<String>>(2)?
                .and_then(|s| s.parse().ok()),
            news,
            created_at,
            updated_at,
        })
    }

    fn row_to_message(row: &Row) -> DbResult<Message> {
        let metadata = row
            .get::<_, Option<String>>(5)?
            .and_then(|s| serde_json::from_str(&s).ok());
        let news = row
            .get::<_, Option<String>>(6)?
            .and_then(|s| serde_json::from_str::<Vec<Article>>(&s).ok());

        let created_str: String = row.get(7)?;
        let created_at = created_str.parse::<DateTime<Utc>>().unwrap_or_else(|_| Utc::now());

        Ok(Message {
            id: row.get(0)?,
            session_id: row.get::<_, String>(1)?.parse().unwrap_or_default(),
            role: MessageRole::parse(&row.get::<_, String>(2)?).unwrap_or_default(),
            kind: ContentKind::from_db(row.get::<_, Option<String>>(3)?.as_deref()),
            content: row.get(4)?,
            metadata,
            news,
            created_at,
        })
    }

    // --- Session Operations ---

    /// Inserts a session under a caller-supplied id. The id is stable across
    /// turns, so creation happens at most once per conversation.
    pub fn insert_session(
        conn: &Connection,
        id: Uuid,
        name: &str,
        user_id: Option<Uuid>,
    ) -> DbResult<Session> {
        conn.execute(
            "INSERT INTO sessions (id, name, user_id) VALUES (?, ?, ?)",
            params![id.to_string(), name, user_id.map(|u| u.to_string())],
        )?;

        Self::get_session(conn, id).map(|s| s.unwrap())
    }

    pub fn get_session(conn: &Connection, id: Uuid) -> DbResult<Option<Session>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sessions WHERE id = ?",
            SESSION_COLS
        ))?;
        let mut rows = stmt.query_map(params![id.to_string()], Self::row_to_session)?;

        if let Some(row) = rows.next() {
            Ok(Some(row?))
        } else {
            Ok(None)
        }
    }

    pub fn list_sessions(conn: &Connection, limit: usize, offset: usize) -> DbResult<Vec<Session>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sessions ORDER BY updated_at DESC LIMIT ? OFFSET ?",
            SESSION_COLS
        ))?;
        let rows = stmt.query_map(params![limit as i64, offset as i64], Self::row_to_session)?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?);
        }
        Ok(sessions)
    }

    /// Replaces the session's cached news wholesale. The cache is advisory;
    /// a concurrent lost update only costs one extra fetch later.
    pub fn update_session_news(conn: &Connection, id: Uuid, news: &[Article]) -> DbResult<()> {
        let news_str = serde_json::to_string(news).unwrap_or_else(|_| "[]".to_string());
        conn.execute(
            "UPDATE sessions SET news = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            params![news_str, id.to_string()],
        )?;
        Ok(())
    }

    pub fn delete_session(conn: &Connection, id: Uuid) -> DbResult<()> {
        conn.execute("BEGIN TRANSACTION", [])?;

        let id_str = id.to_string();

        // Delete messages first to satisfy the foreign key relationship
        if let Err(e) = conn.execute("DELETE FROM messages WHERE session_id = ?", params![id_str]) {
            let _ = conn.execute("ROLLBACK", []);
            return Err(e);
        }

        if let Err(e) = conn.execute("DELETE FROM sessions WHERE id = ?", params![id_str]) {
            let _ = conn.execute("ROLLBACK", []);
            return Err(e);
        }

        conn.execute("COMMIT", [])?;
        Ok(())
    }

    // --- Message Operations ---

    pub fn insert_message(
        conn: &Connection,
        session_id: Uuid,
        role: MessageRole,
        kind: ContentKind,
        content: &str,
        metadata: Option<serde_json::Value>,
        news: Option<&[Article]>,
    ) -> DbResult<Message> {
        let meta_str = metadata.map(|m| m.to_string());
        let news_str = news.map(|n| serde_json::to_string(n).unwrap_or_else(|_| "[]".to_string()));

        conn.execute(
            "INSERT INTO messages (session_id, role, kind, content, metadata, news)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                session_id.to_string(),
                role.as_str(),
                kind.as_db(),
                content,
                meta_str,
                news_str
            ],
        )?;

        conn.execute(
            "UPDATE sessions SET updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            params![session_id.to_string()],
        )?;

        // Fetch the message we just inserted (its id comes from the sequence)
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM messages WHERE session_id = ? ORDER BY id DESC LIMIT 1",
            MESSAGE_COLS
        ))?;
        let mut rows = stmt.query_map(params![session_id.to_string()], Self::row_to_message)?;

        Ok(rows.next().unwrap()?)
    }

    /// Full history, oldest first. The sequence id is the ordering field so
    /// the result is reproducible across storage backends.
    pub fn get_messages(
        conn: &Connection,
        session_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> DbResult<Vec<Message>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM messages WHERE session_id = ? ORDER BY id ASC LIMIT ? OFFSET ?",
            MESSAGE_COLS
        ))?;

        let rows = stmt.query_map(
            params![session_id.to_string(), limit as i64, offset as i64],
            Self::row_to_message,
        )?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Bounded short-term context window, newest first.
    pub fn recent_messages(
        conn: &Connection,
        session_id: Uuid,
        limit: usize,
        role: Option<MessageRole>,
    ) -> DbResult<Vec<Message>> {
        let mut messages = Vec::new();

        match role {
            Some(role) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM messages WHERE session_id = ? AND role = ? ORDER BY id DESC LIMIT ?",
                    MESSAGE_COLS
                ))?;
                let rows = stmt.query_map(
                    params![session_id.to_string(), role.as_str(), limit as i64],
                    Self::row_to_message,
                )?;
                for row in rows {
                    messages.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM messages WHERE session_id = ? ORDER BY id DESC LIMIT ?",
                    MESSAGE_COLS
                ))?;
                let rows = stmt.query_map(
                    params![session_id.to_string(), limit as i64],
                    Self::row_to_message,
                )?;
                for row in rows {
                    messages.push(row?);
                }
            }
        }

        Ok(messages)
    }
}
