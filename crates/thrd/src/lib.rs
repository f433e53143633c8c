//! Thread memory for agents.
//!
//! This library provides conversational threads (ordered collections of
//! role-attributed messages) persisted either in a local SQLite store or
//! proxied transparently to a remote peer over HTTP. Both backends present
//! the same object contract; the backend is selected once when a [`Thread`]
//! is constructed and held as a single polymorphic handle.

pub mod config;
pub mod db;
pub mod error;
pub mod img;
pub mod thread;

pub use db::Database;
pub use error::{ThreadError, ThreadResult};
pub use img::ImageSource;
pub use thread::{
    ChatMessage, ContentBlock, ImageUrlBlock, Message, MessageQuery, NewMessage, NewThread,
    RemoteThreadStore, Role, SqliteThreadStore, Thread, ThreadQuery, ThreadState, ThreadStore,
};
