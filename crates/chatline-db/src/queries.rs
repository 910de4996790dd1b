use crate::models::{CredentialRow, MessageRow, UserRow};
use crate::Database;
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Credentials --

    /// Insert a credential. Returns `false` when the email is already taken.
    pub fn create_credential(&self, id: &str, email: &str, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO credentials (id, email, password) VALUES (?1, ?2, ?3)
                 ON CONFLICT(email) DO NOTHING",
                (id, email, password_hash),
            )?;
            Ok(inserted == 1)
        })
    }

    pub fn get_credential_by_email(&self, email: &str) -> Result<Option<CredentialRow>> {
        self.with_conn(|conn| query_credential(conn, "email", email))
    }

    pub fn get_credential_by_id(&self, id: &str) -> Result<Option<CredentialRow>> {
        self.with_conn(|conn| query_credential(conn, "id", id))
    }

    // -- Directory --

    /// Insert or overwrite the directory record for `id`.
    pub fn put_user(&self, id: &str, name: &str, email: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, email) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, email = excluded.email",
                (id, name, email),
            )?;
            Ok(())
        })
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name, email FROM users ORDER BY id")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT id, name, email FROM users WHERE id = ?1", [id], |row| {
                Ok(UserRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                })
            })
            .optional()
        })
    }

    // -- Messages --

    /// Append a message. SQLite assigns `seq` and `created_at`.
    pub fn insert_message(
        &self,
        id: &str,
        conversation_id: &str,
        sender_id: &str,
        text: &str,
    ) -> Result<MessageRow> {
        self.with_conn(|conn| {
            let row = conn.query_row(
                "INSERT INTO messages (id, conversation_id, sender_id, text) VALUES (?1, ?2, ?3, ?4)
                 RETURNING seq, id, conversation_id, sender_id, text, created_at",
                rusqlite::params![id, conversation_id, sender_id, text],
                map_message,
            )?;
            Ok(row)
        })
    }

    /// Newest `limit` messages of a conversation, newest first.
    pub fn latest_messages(&self, conversation_id: &str, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT seq, id, conversation_id, sender_id, text, created_at
                 FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY created_at DESC, seq DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![conversation_id, limit], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Every message of a conversation, oldest first.
    pub fn conversation_messages(&self, conversation_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT seq, id, conversation_id, sender_id, text, created_at
                 FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY created_at ASC, seq ASC",
            )?;
            let rows = stmt
                .query_map([conversation_id], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_credential(conn: &Connection, column: &str, value: &str) -> Result<Option<CredentialRow>> {
    let sql = format!(
        "SELECT id, email, password FROM credentials WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    stmt.query_row([value], |row| {
        Ok(CredentialRow {
            id: row.get(0)?,
            email: row.get(1)?,
            password: row.get(2)?,
        })
    })
    .optional()
}

fn map_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        seq: row.get(0)?,
        id: row.get(1)?,
        conversation_id: row.get(2)?,
        sender_id: row.get(3)?,
        text: row.get(4)?,
        created_at: row.get(5)?,
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
