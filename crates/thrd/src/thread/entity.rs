//! The thread aggregate root.
//!
//! A `Thread` bundles aggregate state with the backend handle chosen at
//! construction. Every mutation dispatches through that handle, so a
//! thread behaves identically whether it is backed by the local database
//! or a remote peer.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::ThreadResult;
use crate::img::{self, ImageSource};

use super::models::{ChatMessage, Message, Role, ThreadState};
use super::store::{ThreadQuery, ThreadStore};

/// Attributes for a new thread.
#[derive(Debug, Clone, Default)]
pub struct NewThread {
    pub owner_id: Option<String>,
    pub public: bool,
    pub name: Option<String>,
    pub metadata: Option<Value>,
    /// Explicit version token; when unset the content hash is used.
    pub version: Option<String>,
}

impl NewThread {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner_id(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// A message to post, before image normalization.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub role: String,
    pub text: String,
    pub images: Vec<ImageSource>,
    pub private: bool,
    pub metadata: Option<Value>,
}

impl NewMessage {
    pub fn new(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            text: text.into(),
            images: Vec::new(),
            private: false,
            metadata: None,
        }
    }

    pub fn image(mut self, image: ImageSource) -> Self {
        self.images.push(image);
        self
    }

    pub fn private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A conversational thread bound to one backend for its whole lifetime.
#[derive(Clone)]
pub struct Thread {
    state: ThreadState,
    store: Arc<dyn ThreadStore>,
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("state", &self.state)
            .field("remote", &self.store.remote_addr())
            .finish()
    }
}

impl Thread {
    /// Create and immediately persist a new thread.
    pub async fn create(store: Arc<dyn ThreadStore>, opts: NewThread) -> ThreadResult<Self> {
        let remote = store.remote_addr().map(str::to_string);
        let mut state = ThreadState::new(opts.owner_id, opts.public, opts.name, opts.metadata, remote);
        state.version = match opts.version {
            Some(version) => Some(version),
            None => Some(state.version_hash()?),
        };
        store.save(&mut state).await?;
        Ok(Self { state, store })
    }

    /// Bind already-hydrated state to a backend handle.
    pub fn from_state(store: Arc<dyn ThreadStore>, state: ThreadState) -> Self {
        Self { state, store }
    }

    /// Look up threads by exact-match predicates.
    pub async fn find(
        store: Arc<dyn ThreadStore>,
        query: &ThreadQuery,
    ) -> ThreadResult<Vec<Self>> {
        let states = store.find(query).await?;
        Ok(states
            .into_iter()
            .map(|state| Self {
                state,
                store: store.clone(),
            })
            .collect())
    }

    pub fn id(&self) -> &str {
        &self.state.id
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.state.owner_id.as_deref()
    }

    pub fn public(&self) -> bool {
        self.state.public
    }

    pub fn name(&self) -> Option<&str> {
        self.state.name.as_deref()
    }

    pub fn metadata(&self) -> Option<&Value> {
        self.state.metadata.as_ref()
    }

    pub fn remote(&self) -> Option<&str> {
        self.state.remote.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.state.version.as_deref()
    }

    pub fn created(&self) -> f64 {
        self.state.created
    }

    pub fn updated(&self) -> f64 {
        self.state.updated
    }

    pub fn role_mapping(&self) -> &std::collections::BTreeMap<String, Role> {
        &self.state.role_mapping
    }

    pub fn state(&self) -> &ThreadState {
        &self.state
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.state.name = Some(name.into());
    }

    pub fn set_metadata(&mut self, metadata: Value) {
        self.state.metadata = Some(metadata);
    }

    pub fn set_public(&mut self, public: bool) {
        self.state.public = public;
    }

    /// Messages in conversation order, optionally excluding private ones.
    pub fn messages(&self, include_private: bool) -> Vec<&Message> {
        self.state.messages(include_private)
    }

    /// Post a message. Images are normalized to canonical strings first;
    /// the backend decides how the message is persisted.
    pub async fn post(&mut self, message: NewMessage) -> ThreadResult<()> {
        let images = message
            .images
            .iter()
            .map(img::normalize)
            .collect::<ThreadResult<Vec<_>>>()?;
        let message = Message::new(
            message.role,
            message.text,
            Some(self.state.id.clone()),
            images,
            message.private,
            message.metadata,
        );
        let store = self.store.clone();
        store.post(&mut self.state, message).await
    }

    /// Persist the aggregate through the bound backend.
    pub async fn save(&mut self) -> ThreadResult<()> {
        let store = self.store.clone();
        store.save(&mut self.state).await
    }

    /// Remove the thread (and its messages) from the backend.
    pub async fn delete(&self) -> ThreadResult<()> {
        self.store.delete(&self.state).await
    }

    /// Re-fetch authoritative state. Remote mode only.
    pub async fn refresh(&mut self) -> ThreadResult<()> {
        let store = self.store.clone();
        store.refresh(&mut self.state).await
    }

    /// Map a role name to a participant descriptor.
    pub async fn add_role(&mut self, role: Role) -> ThreadResult<()> {
        let store = self.store.clone();
        store.add_role(&mut self.state, role).await
    }

    /// Unmap a role name.
    pub async fn remove_role(&mut self, name: &str) -> ThreadResult<()> {
        let store = self.store.clone();
        store.remove_role(&mut self.state, name).await
    }

    /// Deep, independent copy with a fresh id and reset timestamps.
    /// The copy shares the backend handle but is not persisted until saved.
    pub fn copy(&self) -> Self {
        Self {
            state: self.state.copy(),
            store: self.store.clone(),
        }
    }

    /// Render the thread for a chat-completions request.
    pub fn to_chat(&self, include_private: bool) -> ThreadResult<Vec<ChatMessage>> {
        self.state.to_chat(include_private)
    }

    /// Drop all images attached to user-authored messages.
    pub fn remove_images(&mut self) {
        self.state.remove_images();
    }
}
