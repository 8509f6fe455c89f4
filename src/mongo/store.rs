use std::fmt::Debug;
use std::sync::Arc;

use bson::{doc, Bson, Document};
use mongodb::sync::{Client, Collection};
use parking_lot::RwLock;
use thiserror::Error;

use crate::mongo::range::{compare_keys, KeySplit};
use crate::mongo::uri::MongoUri;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("MongoDB driver error: {0}")]
    Driver(#[from] mongodb::error::Error),

    #[error("{0}")]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wrap an error of a user-defined store.
    pub fn custom<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        StoreError::Custom(error.into())
    }
}

/// The documents of a slice, in the order they are read.
pub type DocumentCursor = Box<dyn Iterator<Item = Result<Document, StoreError>> + Send>;

/// A collection of documents that can be read by key range.
///
/// The store is shared by all the replicas of a source, each replica calls
/// [`find_range`](DocumentStore::find_range) once with its own slice.
pub trait DocumentStore: Send + Sync + 'static {
    /// Read the documents whose `key` falls inside `split`, sorted by `key`.
    ///
    /// Documents without the key or with a non numeric value must not be returned. `batch_size`
    /// is a hint of how many documents to fetch per round trip.
    fn find_range(
        &self,
        key: &str,
        split: &KeySplit,
        batch_size: u32,
    ) -> Result<DocumentCursor, StoreError>;

    /// Short description of the collection, used in logs.
    fn describe(&self) -> String;
}

/// A collection on a MongoDB deployment, read with the synchronous driver.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct MongoStore {
    #[derivative(Debug = "ignore")]
    client: Client,
    database: String,
    collection: String,
}

impl MongoStore {
    /// Create a client for the deployment of the URI.
    ///
    /// The driver connects lazily: no server is contacted until the first operation.
    pub fn connect(uri: &MongoUri) -> Result<Self, StoreError> {
        debug!("creating MongoDB client for {uri}");
        let client = Client::with_uri_str(uri.driver_uri())?;
        Ok(Self::with_client(client, uri))
    }

    /// Use an existing client for the collection of the URI.
    pub fn with_client(client: Client, uri: &MongoUri) -> Self {
        Self {
            client,
            database: uri.database().to_string(),
            collection: uri.collection().to_string(),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn collection(&self) -> Collection<Document> {
        self.client
            .database(&self.database)
            .collection::<Document>(&self.collection)
    }

    /// Drop the whole collection.
    pub fn drop_collection(&self) -> Result<(), StoreError> {
        info!("dropping collection {}", self.describe());
        self.collection().drop().run()?;
        Ok(())
    }

    /// Insert the documents into the collection.
    pub fn insert_many(
        &self,
        documents: impl IntoIterator<Item = Document>,
    ) -> Result<(), StoreError> {
        let documents = documents.into_iter().collect::<Vec<_>>();
        debug!(
            "inserting {} documents into {}",
            documents.len(),
            self.describe()
        );
        self.collection().insert_many(documents).run()?;
        Ok(())
    }
}

impl DocumentStore for MongoStore {
    fn find_range(
        &self,
        key: &str,
        split: &KeySplit,
        batch_size: u32,
    ) -> Result<DocumentCursor, StoreError> {
        let filter = split.filter(key);
        debug!("querying {} with {filter}", self.describe());
        // _id breaks the ties, documents with the same key are read in a stable order
        let cursor = self
            .collection()
            .find(filter)
            .sort(doc! { key: 1, "_id": 1 })
            .batch_size(batch_size)
            .run()?;
        Ok(Box::new(cursor.map(|r| r.map_err(StoreError::from))))
    }

    fn describe(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }
}

/// A collection kept in memory, matching documents with the same rules of MongoDB range queries
/// on numeric fields.
///
/// Dotted keys walk into embedded documents, and arrays met along the key are matched by element.
/// Documents are sorted by their smallest matching value, documents with the same key keep the
/// insertion order.
///
/// Cloning the store gives another handle to the same documents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    name: String,
    documents: Arc<RwLock<Vec<Document>>>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: Default::default(),
        }
    }

    pub fn insert_many(&self, documents: impl IntoIterator<Item = Document>) {
        self.documents.write().extend(documents);
    }

    pub fn drop_collection(&self) {
        self.documents.write().clear();
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DocumentStore for MemoryStore {
    fn find_range(
        &self,
        key: &str,
        split: &KeySplit,
        _batch_size: u32,
    ) -> Result<DocumentCursor, StoreError> {
        let mut found = self
            .documents
            .read()
            .iter()
            .filter_map(|document| {
                let values = path_values(document, key);
                if !split.matches(&values) {
                    return None;
                }
                let sort_key = values
                    .into_iter()
                    .filter(|v| matches!(v, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)))
                    .min_by(|a, b| compare_keys(a, b))
                    .cloned();
                Some((sort_key, document.clone()))
            })
            .collect::<Vec<_>>();
        // stable: documents with the same key keep the insertion order
        found.sort_by(|(a, _), (b, _)| match (a, b) {
            (Some(a), Some(b)) => compare_keys(a, b),
            _ => std::cmp::Ordering::Equal,
        });
        Ok(Box::new(found.into_iter().map(|(_, document)| Ok(document))))
    }

    fn describe(&self) -> String {
        format!("memory:{}", self.name)
    }
}

/// The values a dotted `path` resolves to inside `document`.
///
/// Arrays met in the middle of the path are expanded into the documents they hold (or indexed,
/// when the segment is a number), and an array at the end of the path gives its elements.
fn path_values<'a>(document: &'a Document, path: &str) -> Vec<&'a Bson> {
    let mut segments = path.split('.');
    let mut values = segments
        .next()
        .and_then(|first| document.get(first))
        .into_iter()
        .collect::<Vec<_>>();
    for segment in segments {
        values = values
            .into_iter()
            .flat_map(|value| path_step(value, segment))
            .collect();
    }
    values
        .into_iter()
        .flat_map(|value| match value {
            Bson::Array(items) => items.iter().collect::<Vec<_>>(),
            other => vec![other],
        })
        .collect()
}

fn path_step<'a>(value: &'a Bson, segment: &str) -> Vec<&'a Bson> {
    match value {
        Bson::Document(inner) => inner.get(segment).into_iter().collect(),
        Bson::Array(items) => {
            let mut found = items
                .iter()
                .filter_map(|item| match item {
                    Bson::Document(inner) => inner.get(segment),
                    _ => None,
                })
                .collect::<Vec<_>>();
            if let Ok(index) = segment.parse::<usize>() {
                found.extend(items.get(index));
            }
            found
        }
        _ => Vec::new(),
    }
}
