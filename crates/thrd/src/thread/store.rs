//! The backend capability threads dispatch through.

use async_trait::async_trait;

use crate::error::ThreadResult;

use super::models::{Message, Role, ThreadState};

/// Exact-match predicates for a thread lookup.
///
/// Unset fields do not constrain the query. Local lookups translate these
/// into a `WHERE` clause; remote lookups serialize them into the listing
/// request payload.
#[derive(Debug, Clone, Default)]
pub struct ThreadQuery {
    pub id: Option<String>,
    pub owner_id: Option<String>,
    pub public: Option<bool>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub remote: Option<String>,
    pub created: Option<f64>,
}

impl ThreadQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn owner_id(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn public(mut self, public: bool) -> Self {
        self.public = Some(public);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self
    }

    pub fn created(mut self, created: f64) -> Self {
        self.created = Some(created);
        self
    }
}

/// Exact-match predicates for a standalone message lookup (local only).
#[derive(Debug, Clone, Default)]
pub struct MessageQuery {
    pub id: Option<String>,
    pub role: Option<String>,
    pub text: Option<String>,
    pub thread_id: Option<String>,
}

impl MessageQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }
}

/// Persistence operations a thread dispatches to its backend.
///
/// Exactly one implementation is bound to a thread at construction time
/// and never changes for the lifetime of the entity: [`super::SqliteThreadStore`]
/// for local persistence, [`super::RemoteThreadStore`] for an HTTP peer.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Persist the full aggregate. Recomputes the version token first.
    async fn save(&self, state: &mut ThreadState) -> ThreadResult<()>;

    /// Append a message and persist it.
    async fn post(&self, state: &mut ThreadState, message: Message) -> ThreadResult<()>;

    /// Look up threads by exact-match predicates, oldest first.
    async fn find(&self, query: &ThreadQuery) -> ThreadResult<Vec<ThreadState>>;

    /// Remove the thread and its messages.
    async fn delete(&self, state: &ThreadState) -> ThreadResult<()>;

    /// Re-fetch authoritative state from the backing peer.
    /// Only meaningful for remote backends.
    async fn refresh(&self, state: &mut ThreadState) -> ThreadResult<()>;

    /// Map a role name to a participant descriptor.
    async fn add_role(&self, state: &mut ThreadState, role: Role) -> ThreadResult<()>;

    /// Unmap a role name.
    async fn remove_role(&self, state: &mut ThreadState, name: &str) -> ThreadResult<()>;

    /// The remote address this store proxies to, if any.
    fn remote_addr(&self) -> Option<&str>;
}
