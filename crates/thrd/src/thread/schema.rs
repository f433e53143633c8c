//! Wire schema (v1).
//!
//! These are the nested, typed shapes exchanged with a remote peer. The
//! version hasher serializes [`V1Thread`] with sorted keys, so optional
//! fields are serialized explicitly as `null` rather than skipped: two
//! peers must produce byte-identical canonical JSON for equal content.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::models::Role;

/// A single message on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct V1Message {
    pub id: String,
    pub role: String,
    pub text: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub private: Option<bool>,
    pub created: f64,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// A full thread on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct V1Thread {
    pub id: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    pub public: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub role_mapping: BTreeMap<String, Role>,
    #[serde(default)]
    pub messages: Vec<V1Message>,
    pub created: f64,
    pub updated: f64,
    #[serde(default)]
    pub remote: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Collection returned by a thread listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V1Threads {
    pub threads: Vec<V1Thread>,
}

/// Update subset sent on `PUT /v1/threads/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V1UpdateThread {
    pub name: Option<String>,
    pub public: bool,
    pub metadata: Option<serde_json::Value>,
}

/// Body of `POST /v1/threads/{id}/msgs`.
///
/// The message sub-resource carries only role, text, and images; privacy
/// and metadata stay local to the posting side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V1PostMessage {
    pub role: String,
    pub msg: String,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Body of `DELETE /v1/threads/{id}/roles`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V1DeleteRole {
    pub name: String,
}
