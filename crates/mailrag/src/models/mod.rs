//! Domain models for ingested mail

mod cursor;
mod document;
mod message;

pub use cursor::SyncCursor;
pub use document::{Embedding, StoredDocument};
pub use message::{EmailAddress, Message, MessageBuilder, MessageId, MessageRef, ThreadId};
