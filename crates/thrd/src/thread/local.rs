//! Local SQLite backend.
//!
//! Record shapes are flat rows with JSON-string-encoded nested fields.
//! Empty collections are stored as SQL NULL, not as `"[]"` / `"{}"`;
//! on the way back NULL images decode to an empty list while NULL
//! metadata decodes to `None`. The asymmetry is part of the contract.

use serde_json::Value;
use sqlx::QueryBuilder;

use async_trait::async_trait;

use crate::db::Database;
use crate::error::{ThreadError, ThreadResult};

use super::models::{Message, Role, ThreadState};
use super::store::{MessageQuery, ThreadQuery, ThreadStore};

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn encode_metadata(metadata: &Option<Value>) -> ThreadResult<Option<String>> {
    match metadata {
        Some(value) if !is_empty_value(value) => Ok(Some(serde_json::to_string(value)?)),
        _ => Ok(None),
    }
}

fn encode_images(images: &[String]) -> ThreadResult<Option<String>> {
    if images.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(images)?))
}

/// Flat storage row for a thread.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ThreadRecord {
    pub id: String,
    pub owner_id: Option<String>,
    pub public: bool,
    pub name: Option<String>,
    pub metadata: Option<String>,
    pub role_mapping: String,
    pub remote: Option<String>,
    pub version: Option<String>,
    pub created: f64,
    pub updated: f64,
}

impl ThreadRecord {
    pub fn from_state(state: &ThreadState) -> ThreadResult<Self> {
        Ok(Self {
            id: state.id.clone(),
            owner_id: state.owner_id.clone(),
            public: state.public,
            name: state.name.clone(),
            metadata: encode_metadata(&state.metadata)?,
            role_mapping: serde_json::to_string(&state.role_mapping)?,
            remote: state.remote.clone(),
            version: state.version.clone(),
            created: state.created,
            updated: state.updated,
        })
    }

    pub fn into_state(self, messages: Vec<Message>) -> ThreadResult<ThreadState> {
        let metadata = match self.metadata {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        };
        Ok(ThreadState {
            id: self.id,
            owner_id: self.owner_id,
            public: self.public,
            name: self.name,
            metadata,
            role_mapping: serde_json::from_str(&self.role_mapping)?,
            // A locally hydrated thread is local, whatever the row says.
            remote: None,
            version: self.version,
            created: self.created,
            updated: self.updated,
            messages,
        })
    }
}

/// Flat storage row for a message.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageRecord {
    pub id: String,
    pub role: String,
    pub text: String,
    pub images: Option<String>,
    pub private: bool,
    pub created: f64,
    pub metadata: Option<String>,
    pub thread_id: Option<String>,
}

impl MessageRecord {
    pub fn from_message(message: &Message) -> ThreadResult<Self> {
        Ok(Self {
            id: message.id.clone(),
            role: message.role.clone(),
            text: message.text.clone(),
            images: encode_images(&message.images)?,
            private: message.private,
            created: message.created,
            metadata: encode_metadata(&message.metadata)?,
            thread_id: message.thread_id.clone(),
        })
    }

    pub fn into_message(self) -> ThreadResult<Message> {
        let images = match self.images {
            Some(raw) => serde_json::from_str(&raw)?,
            None => Vec::new(),
        };
        let metadata = match self.metadata {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        };
        Ok(Message {
            id: self.id,
            role: self.role,
            text: self.text,
            images,
            private: self.private,
            created: self.created,
            metadata,
            thread_id: self.thread_id,
        })
    }
}

const THREAD_COLUMNS: &str =
    "id, owner_id, public, name, metadata, role_mapping, remote, version, created, updated";

const MESSAGE_COLUMNS: &str = "id, role, text, images, private, created, metadata, thread_id";

/// Thread persistence over a [`Database`] handle.
#[derive(Debug, Clone)]
pub struct SqliteThreadStore {
    db: Database,
}

impl SqliteThreadStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Upsert the full aggregate in one transaction: thread row, then
    /// delete-and-reinsert every message. Reinsertion renumbers the
    /// autoincrement `seq` column, so persisted order always matches the
    /// in-memory aggregate, equal timestamps included.
    async fn upsert(&self, state: &ThreadState) -> ThreadResult<()> {
        let record = ThreadRecord::from_state(state)?;
        let mut tx = self.db.pool().begin().await?;

        sqlx::query(
            r#"
            INSERT INTO threads (id, owner_id, public, name, metadata, role_mapping, remote, version, created, updated)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                owner_id = excluded.owner_id,
                public = excluded.public,
                name = excluded.name,
                metadata = excluded.metadata,
                role_mapping = excluded.role_mapping,
                remote = excluded.remote,
                version = excluded.version,
                created = excluded.created,
                updated = excluded.updated
            "#,
        )
        .bind(&record.id)
        .bind(&record.owner_id)
        .bind(record.public)
        .bind(&record.name)
        .bind(&record.metadata)
        .bind(&record.role_mapping)
        .bind(&record.remote)
        .bind(&record.version)
        .bind(record.created)
        .bind(record.updated)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM messages WHERE thread_id = ?")
            .bind(&state.id)
            .execute(&mut *tx)
            .await?;

        for message in &state.messages {
            let row = MessageRecord::from_message(message)?;
            sqlx::query(
                r#"
                INSERT INTO messages (id, role, text, images, private, created, metadata, thread_id)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&row.id)
            .bind(&row.role)
            .bind(&row.text)
            .bind(&row.images)
            .bind(row.private)
            .bind(row.created)
            .bind(&row.metadata)
            .bind(&state.id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_messages(&self, thread_id: &str) -> ThreadResult<Vec<Message>> {
        let rows: Vec<MessageRecord> = sqlx::query_as(
            "SELECT id, role, text, images, private, created, metadata, thread_id \
             FROM messages WHERE thread_id = ? ORDER BY created ASC, seq ASC",
        )
        .bind(thread_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter().map(MessageRecord::into_message).collect()
    }

    /// Persist a single message outside the owning thread's full-replace
    /// save. This is how standalone messages (no `thread_id`) reach the
    /// store at all; for attached messages it upserts just the one row.
    pub async fn save_message(&self, message: &Message) -> ThreadResult<()> {
        let row = MessageRecord::from_message(message)?;
        sqlx::query(
            r#"
            INSERT INTO messages (id, role, text, images, private, created, metadata, thread_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                role = excluded.role,
                text = excluded.text,
                images = excluded.images,
                private = excluded.private,
                created = excluded.created,
                metadata = excluded.metadata,
                thread_id = excluded.thread_id
            "#,
        )
        .bind(&row.id)
        .bind(&row.role)
        .bind(&row.text)
        .bind(&row.images)
        .bind(row.private)
        .bind(row.created)
        .bind(&row.metadata)
        .bind(&row.thread_id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// Look up standalone messages by exact-match predicates, ordered by
    /// creation time with the insertion sequence as tie-break.
    pub async fn find_messages(&self, query: &MessageQuery) -> ThreadResult<Vec<Message>> {
        let mut qb = QueryBuilder::new(format!("SELECT {} FROM messages", MESSAGE_COLUMNS));
        let mut sep = " WHERE ";
        if let Some(id) = &query.id {
            qb.push(sep).push("id = ").push_bind(id);
            sep = " AND ";
        }
        if let Some(role) = &query.role {
            qb.push(sep).push("role = ").push_bind(role);
            sep = " AND ";
        }
        if let Some(text) = &query.text {
            qb.push(sep).push("text = ").push_bind(text);
            sep = " AND ";
        }
        if let Some(thread_id) = &query.thread_id {
            qb.push(sep).push("thread_id = ").push_bind(thread_id);
        }
        qb.push(" ORDER BY created ASC, seq ASC");

        let rows: Vec<MessageRecord> = qb.build_query_as().fetch_all(self.db.pool()).await?;
        rows.into_iter().map(MessageRecord::into_message).collect()
    }
}

#[async_trait]
impl ThreadStore for SqliteThreadStore {
    async fn save(&self, state: &mut ThreadState) -> ThreadResult<()> {
        state.bump_version()?;
        self.upsert(state).await
    }

    async fn post(&self, state: &mut ThreadState, message: Message) -> ThreadResult<()> {
        state.messages.push(message);
        self.save(state).await
    }

    async fn find(&self, query: &ThreadQuery) -> ThreadResult<Vec<ThreadState>> {
        let mut qb = QueryBuilder::new(format!("SELECT {} FROM threads", THREAD_COLUMNS));
        let mut sep = " WHERE ";
        if let Some(id) = &query.id {
            qb.push(sep).push("id = ").push_bind(id);
            sep = " AND ";
        }
        if let Some(owner_id) = &query.owner_id {
            qb.push(sep).push("owner_id = ").push_bind(owner_id);
            sep = " AND ";
        }
        if let Some(public) = query.public {
            qb.push(sep).push("public = ").push_bind(public);
            sep = " AND ";
        }
        if let Some(name) = &query.name {
            qb.push(sep).push("name = ").push_bind(name);
            sep = " AND ";
        }
        if let Some(version) = &query.version {
            qb.push(sep).push("version = ").push_bind(version);
            sep = " AND ";
        }
        if let Some(remote) = &query.remote {
            qb.push(sep).push("remote = ").push_bind(remote);
            sep = " AND ";
        }
        if let Some(created) = query.created {
            qb.push(sep).push("created = ").push_bind(created);
        }
        qb.push(" ORDER BY created ASC");

        let records: Vec<ThreadRecord> = qb.build_query_as().fetch_all(self.db.pool()).await?;

        let mut out = Vec::with_capacity(records.len());
        for record in records {
            let messages = self.load_messages(&record.id).await?;
            out.push(record.into_state(messages)?);
        }
        Ok(out)
    }

    async fn delete(&self, state: &ThreadState) -> ThreadResult<()> {
        let mut tx = self.db.pool().begin().await?;
        sqlx::query("DELETE FROM messages WHERE thread_id = ?")
            .bind(&state.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM threads WHERE id = ?")
            .bind(&state.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn refresh(&self, _state: &mut ThreadState) -> ThreadResult<()> {
        Err(ThreadError::Config(
            "refresh is only supported for remote threads".to_string(),
        ))
    }

    async fn add_role(&self, state: &mut ThreadState, role: Role) -> ThreadResult<()> {
        if state.role_mapping.contains_key(&role.name) {
            return Err(ThreadError::RoleExists(role.name));
        }
        state.role_mapping.insert(role.name.clone(), role);
        self.save(state).await
    }

    async fn remove_role(&self, state: &mut ThreadState, name: &str) -> ThreadResult<()> {
        if state.role_mapping.remove(name).is_none() {
            return Err(ThreadError::RoleMissing(name.to_string()));
        }
        self.save(state).await
    }

    fn remote_addr(&self) -> Option<&str> {
        None
    }
}
