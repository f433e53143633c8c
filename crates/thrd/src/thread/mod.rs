//! Conversational threads and their backends.

mod entity;
mod local;
mod models;
mod remote;
pub mod schema;
mod store;

pub use entity::{NewMessage, NewThread, Thread};
pub use local::SqliteThreadStore;
pub use models::{ChatMessage, ContentBlock, ImageUrlBlock, Message, Role, ThreadState};
pub use remote::RemoteThreadStore;
pub use store::{MessageQuery, ThreadQuery, ThreadStore};
