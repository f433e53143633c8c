//! Remote HTTP backend.
//!
//! Mirrors the local store's operations against a peer exposing the v1
//! thread API. Transport failures propagate verbatim; there is no retry
//! or local fallback in this path. Retry policy belongs to the caller.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use async_trait::async_trait;

use crate::config::HUB_API_KEY_ENV;
use crate::error::{ThreadError, ThreadResult};

use super::models::{Message, Role, ThreadState};
use super::schema::{V1DeleteRole, V1PostMessage, V1Thread, V1Threads, V1UpdateThread};
use super::store::{ThreadQuery, ThreadStore};

/// Thread persistence proxied to a remote peer.
#[derive(Debug, Clone)]
pub struct RemoteThreadStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl RemoteThreadStore {
    /// Create a store for the given base address (e.g. `https://hub.example.com`).
    ///
    /// The bearer credential is resolved from `THRD_HUB_API_KEY` before
    /// each request unless one is supplied with [`Self::with_token`].
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Use an explicit bearer credential instead of the environment.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve the bearer credential. Missing credential is a fatal
    /// configuration error raised before any request goes out.
    fn bearer(&self) -> ThreadResult<String> {
        if let Some(token) = &self.token {
            return Ok(format!("Bearer {}", token));
        }
        match std::env::var(HUB_API_KEY_ENV) {
            Ok(token) if !token.is_empty() => Ok(format!("Bearer {}", token)),
            _ => Err(ThreadError::Config(format!(
                "hub API key not found, set ${}",
                HUB_API_KEY_ENV
            ))),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> ThreadResult<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ThreadError::Api {
            status: status.as_u16(),
            body,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> ThreadResult<T> {
        let auth = self.bearer()?;
        let response = self
            .client
            .get(self.url(endpoint))
            .header("Authorization", auth)
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        body: &B,
    ) -> ThreadResult<()> {
        let auth = self.bearer()?;
        let response = self
            .client
            .request(method, self.url(endpoint))
            .header("Authorization", auth)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ThreadError::Api {
            status: status.as_u16(),
            body,
        })
    }

    /// Fetch a thread by id; a 404 means the peer has no record yet.
    async fn get_thread(&self, id: &str) -> ThreadResult<Option<V1Thread>> {
        let auth = self.bearer()?;
        let response = self
            .client
            .get(self.url(&format!("/v1/threads/{}", id)))
            .header("Authorization", auth)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(self.handle_response(response).await?))
    }
}

#[async_trait]
impl ThreadStore for RemoteThreadStore {
    async fn save(&self, state: &mut ThreadState) -> ThreadResult<()> {
        let existing = self.get_thread(&state.id).await?;

        if let Some(remote) = &existing {
            if remote.version != state.version {
                warn!(
                    thread_id = %state.id,
                    "local thread version differs from remote, changes may be overridden"
                );
            }
        }

        if state.bump_version()? {
            debug!(thread_id = %state.id, version = ?state.version, "version updated");
        }

        match existing {
            Some(_) => {
                let update = V1UpdateThread {
                    name: state.name.clone(),
                    public: state.public,
                    metadata: state.metadata.clone(),
                };
                self.send_json(
                    reqwest::Method::PUT,
                    &format!("/v1/threads/{}", state.id),
                    &update,
                )
                .await
            }
            None => {
                self.send_json(reqwest::Method::POST, "/v1/threads", &state.to_schema())
                    .await
            }
        }
    }

    async fn post(&self, state: &mut ThreadState, message: Message) -> ThreadResult<()> {
        let payload = V1PostMessage {
            role: message.role,
            msg: message.text,
            images: message.images,
        };
        self.send_json(
            reqwest::Method::POST,
            &format!("/v1/threads/{}/msgs", state.id),
            &payload,
        )
        .await?;
        // The in-memory append is skipped on purpose: the round trip back
        // through the peer is the source of truth.
        self.refresh(state).await
    }

    async fn find(&self, query: &ThreadQuery) -> ThreadResult<Vec<ThreadState>> {
        let mut payload = serde_json::Map::new();
        if let Some(id) = &query.id {
            payload.insert("id".to_string(), id.clone().into());
        }
        if let Some(owner_id) = &query.owner_id {
            payload.insert("owner_id".to_string(), owner_id.clone().into());
        }
        if let Some(public) = query.public {
            payload.insert("public".to_string(), public.into());
        }
        if let Some(name) = &query.name {
            payload.insert("name".to_string(), name.clone().into());
        }
        if let Some(version) = &query.version {
            payload.insert("version".to_string(), version.clone().into());
        }
        if let Some(remote) = &query.remote {
            payload.insert("remote".to_string(), remote.clone().into());
        }
        if let Some(created) = query.created {
            payload.insert("created".to_string(), created.into());
        }
        payload.insert("sort".to_string(), "created_desc".into());

        let auth = self.bearer()?;
        let response = self
            .client
            .get(self.url("/v1/threads"))
            .header("Authorization", auth)
            .json(&payload)
            .send()
            .await?;
        let listing: V1Threads = self.handle_response(response).await?;

        Ok(listing
            .threads
            .into_iter()
            .map(|schema| {
                let mut state = ThreadState::from_schema(schema);
                // Tag with this peer so later operations dispatch remotely.
                state.remote = Some(self.base_url.clone());
                state
            })
            .collect())
    }

    async fn delete(&self, state: &ThreadState) -> ThreadResult<()> {
        let auth = self.bearer()?;
        let response = self
            .client
            .delete(self.url(&format!("/v1/threads/{}", state.id)))
            .header("Authorization", auth)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ThreadError::Api {
            status: status.as_u16(),
            body,
        })
    }

    async fn refresh(&self, state: &mut ThreadState) -> ThreadResult<()> {
        let schema = self
            .get_thread(&state.id)
            .await?
            .ok_or_else(|| ThreadError::NotFound(state.id.clone()))?;

        // Narrow refresh scope: id, owner_id, and role_mapping stay as
        // they are; only peer-owned content is overwritten.
        state.public = schema.public;
        state.name = schema.name;
        state.metadata = schema.metadata;
        state.messages = schema
            .messages
            .into_iter()
            .map(Message::from_schema)
            .collect();
        state.updated = schema.updated;
        Ok(())
    }

    async fn add_role(&self, state: &mut ThreadState, role: Role) -> ThreadResult<()> {
        self.send_json(
            reqwest::Method::POST,
            &format!("/v1/threads/{}/roles", state.id),
            &role,
        )
        .await
    }

    async fn remove_role(&self, state: &mut ThreadState, name: &str) -> ThreadResult<()> {
        self.send_json(
            reqwest::Method::DELETE,
            &format!("/v1/threads/{}/roles", state.id),
            &V1DeleteRole {
                name: name.to_string(),
            },
        )
        .await?;
        self.refresh(state).await
    }

    fn remote_addr(&self) -> Option<&str> {
        Some(&self.base_url)
    }
}
