//! Domain model: messages, roles, and the thread aggregate state.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{ThreadError, ThreadResult};

use super::schema::{V1Message, V1Thread};

/// Placeholder token marking an inline image position in message text.
pub const IMAGE_PLACEHOLDER: &str = "<image>";

/// Current instant as float Unix seconds (the storage and wire time unit).
pub(crate) fn now_seconds() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// A participant descriptor mapped under a role name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Role {
    pub name: String,
    pub user_id: String,
    pub user_name: String,
    pub icon: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A role-attributed message with text, optional images, and metadata.
///
/// Messages are immutable after posting except via full replacement of
/// the owning thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: String,
    pub text: String,
    pub images: Vec<String>,
    pub private: bool,
    pub created: f64,
    pub metadata: Option<Value>,
    pub thread_id: Option<String>,
}

impl Message {
    /// Create a message with a fresh id and the current timestamp.
    ///
    /// `images` must already be canonical strings (see [`crate::img`]).
    pub fn new(
        role: impl Into<String>,
        text: impl Into<String>,
        thread_id: Option<String>,
        images: Vec<String>,
        private: bool,
        metadata: Option<Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: role.into(),
            text: text.into(),
            images,
            private,
            created: now_seconds(),
            metadata,
            thread_id,
        }
    }

    pub fn to_schema(&self) -> V1Message {
        V1Message {
            id: self.id.clone(),
            role: self.role.clone(),
            text: self.text.clone(),
            images: self.images.clone(),
            private: Some(self.private),
            created: self.created,
            metadata: self.metadata.clone(),
            thread_id: self.thread_id.clone(),
        }
    }

    pub fn from_schema(schema: V1Message) -> Self {
        Self {
            id: schema.id,
            role: schema.role,
            text: schema.text,
            images: schema.images,
            private: schema.private.unwrap_or(false),
            created: schema.created,
            metadata: schema.metadata,
            thread_id: schema.thread_id,
        }
    }

    /// Number of inline `<image>` placeholders in the text.
    pub fn placeholder_count(&self) -> usize {
        self.text.matches(IMAGE_PLACEHOLDER).count()
    }

    /// Render the message into content blocks.
    ///
    /// If the text contains `<image>` placeholders, each placeholder is
    /// replaced by the matching image in order and the counts must agree.
    /// Without placeholders the text comes first, then every image.
    pub fn content_blocks(&self) -> ThreadResult<Vec<ContentBlock>> {
        let placeholders = self.placeholder_count();
        let mut blocks = Vec::new();

        if placeholders > 0 {
            if placeholders != self.images.len() {
                return Err(ThreadError::ImageCount {
                    placeholders,
                    images: self.images.len(),
                });
            }
            for (i, segment) in self.text.split(IMAGE_PLACEHOLDER).enumerate() {
                if !segment.is_empty() {
                    blocks.push(ContentBlock::text(segment));
                }
                if i < self.images.len() {
                    blocks.push(ContentBlock::image(&self.images[i]));
                }
            }
        } else {
            if !self.text.is_empty() {
                blocks.push(ContentBlock::text(&self.text));
            }
            for image in &self.images {
                blocks.push(ContentBlock::image(image));
            }
        }

        Ok(blocks)
    }
}

/// One block of chat-completion style message content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ImageUrl { image_url: ImageUrlBlock },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageUrlBlock {
    pub url: String,
}

impl ContentBlock {
    fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    fn image(url: impl Into<String>) -> Self {
        Self::ImageUrl {
            image_url: ImageUrlBlock { url: url.into() },
        }
    }
}

/// A thread message rendered for a chat-completions request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Value,
}

/// The thread aggregate data: identity, attributes, role mapping, and the
/// ordered message sequence. Pure data; persistence is dispatched through
/// a [`super::ThreadStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadState {
    pub id: String,
    pub owner_id: Option<String>,
    pub public: bool,
    pub name: Option<String>,
    pub metadata: Option<Value>,
    pub role_mapping: BTreeMap<String, Role>,
    pub remote: Option<String>,
    pub version: Option<String>,
    pub created: f64,
    pub updated: f64,
    pub messages: Vec<Message>,
}

impl ThreadState {
    /// Create fresh aggregate state with a new id and current timestamps.
    /// The version token is not computed here; the entity layer does that
    /// so an explicitly supplied version wins.
    pub fn new(
        owner_id: Option<String>,
        public: bool,
        name: Option<String>,
        metadata: Option<Value>,
        remote: Option<String>,
    ) -> Self {
        let now = now_seconds();
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id,
            public,
            name,
            metadata,
            role_mapping: BTreeMap::new(),
            remote,
            version: None,
            created: now,
            updated: now,
            messages: Vec::new(),
        }
    }

    pub fn to_schema(&self) -> V1Thread {
        V1Thread {
            id: self.id.clone(),
            owner_id: self.owner_id.clone(),
            public: self.public,
            name: self.name.clone(),
            metadata: self.metadata.clone(),
            role_mapping: self.role_mapping.clone(),
            messages: self.messages.iter().map(Message::to_schema).collect(),
            created: self.created,
            updated: self.updated,
            remote: self.remote.clone(),
            version: self.version.clone(),
        }
    }

    pub fn from_schema(schema: V1Thread) -> Self {
        Self {
            id: schema.id,
            owner_id: schema.owner_id,
            public: schema.public,
            name: schema.name,
            metadata: schema.metadata,
            role_mapping: schema.role_mapping,
            remote: schema.remote,
            version: schema.version,
            created: schema.created,
            updated: schema.updated,
            messages: schema.messages.into_iter().map(Message::from_schema).collect(),
        }
    }

    /// Content hash of the canonical wire representation.
    ///
    /// The schema is serialized through `serde_json::Value`, whose object
    /// keys are sorted, so the same content always yields the same bytes.
    /// Every schema field participates, ids and timestamps included.
    pub fn version_hash(&self) -> ThreadResult<String> {
        let value = serde_json::to_value(self.to_schema())?;
        let canonical = serde_json::to_string(&value)?;
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }

    /// Recompute the version token; returns true when it changed.
    pub fn bump_version(&mut self) -> ThreadResult<bool> {
        let next = self.version_hash()?;
        if self.version.as_deref() != Some(next.as_str()) {
            self.version = Some(next);
            return Ok(true);
        }
        Ok(false)
    }

    /// Messages in conversation order, optionally excluding private ones.
    pub fn messages(&self, include_private: bool) -> Vec<&Message> {
        self.messages
            .iter()
            .filter(|m| include_private || !m.private)
            .collect()
    }

    /// Deep copy with a fresh id and reset timestamps.
    pub fn copy(&self) -> Self {
        let mut copied = self.clone();
        copied.id = Uuid::new_v4().to_string();
        copied.created = now_seconds();
        copied.updated = now_seconds();
        copied
    }

    /// Render the thread for a chat-completions request.
    pub fn to_chat(&self, include_private: bool) -> ThreadResult<Vec<ChatMessage>> {
        let mut out = Vec::new();
        for message in self.messages(include_private) {
            let content = if message.images.is_empty() {
                Value::String(message.text.clone())
            } else {
                serde_json::to_value(message.content_blocks()?)?
            };
            out.push(ChatMessage {
                role: message.role.clone(),
                content,
            });
        }
        Ok(out)
    }

    /// Drop all images attached to user-authored messages.
    pub fn remove_images(&mut self) {
        for message in &mut self.messages {
            if message.role == "user" {
                message.images.clear();
            }
        }
    }
}
