//! MongoDB collections as sources of a [`StreamContext`](crate::StreamContext).

use thiserror::Error;

use crate::context::ContextError;

mod context;
mod range;
mod store;
mod stream;
mod uri;

pub use context::{MongoContext, MongoContextBuilder};
pub use range::{KeyRange, KeySplit};
pub use store::{DocumentCursor, DocumentStore, MemoryStore, MongoStore, StoreError};
pub use stream::MongoStream;
pub use uri::{MongoUri, UriError};

#[derive(Debug, Error)]
pub enum MongoError {
    #[error("Invalid connection string: {0}")]
    Uri(#[from] UriError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("Cannot read the collection: {0}")]
    Store(#[from] StoreError),

    #[error("Conflicting options: {0}")]
    ConflictingOptions(&'static str),

    #[error("The range key must not be empty")]
    InvalidKey,
}

impl MongoError {
    /// Whether the error comes from using a stopped context.
    pub fn is_stopped(&self) -> bool {
        matches!(self, MongoError::Context(ContextError::Stopped))
    }
}
