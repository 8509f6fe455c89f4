use std::fmt::Display;
use std::sync::Arc;

use bson::Document;
use parking_lot::Mutex;

use crate::block::Replication;
use crate::mongo::{DocumentCursor, DocumentStore, KeyRange, KeySplit, StoreError};
use crate::operator::source::Source;
use crate::operator::{Operator, StreamElement};
use crate::scheduler::{Coord, ExecutionMetadata};
use crate::CoordUInt;

/// Where the replicas of a [`MongoRangeSource`] report the first error they hit.
pub type SourceErrorRef = Arc<Mutex<Option<StoreError>>>;

/// Source that reads from a [`DocumentStore`] the documents whose `key` is inside a range.
///
/// The range is split among the replicas (see [`KeyRange::split`]), and each replica queries the
/// store only for its own slice, sorted by key. A replica that fails to read stops emitting
/// documents and stores the error, see [`MongoRangeSource::errors`].
#[derive(Derivative)]
#[derivative(Debug)]
pub struct MongoRangeSource {
    #[derivative(Debug = "ignore")]
    store: Arc<dyn DocumentStore>,
    key: String,
    range: KeyRange,
    batch_size: u32,
    coord: Option<Coord>,
    split: Option<KeySplit>,
    #[derivative(Debug = "ignore")]
    cursor: Option<DocumentCursor>,
    #[derivative(Debug = "ignore")]
    errors: SourceErrorRef,
    read: usize,
    terminated: bool,
}

impl Display for MongoRangeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MongoRangeSource<{}.{} in {}>",
            self.store.describe(),
            self.key,
            self.range
        )
    }
}

impl MongoRangeSource {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        key: impl Into<String>,
        range: KeyRange,
        batch_size: u32,
    ) -> Self {
        Self {
            store,
            key: key.into(),
            range,
            batch_size,
            coord: None,
            split: None,
            cursor: None,
            errors: Default::default(),
            read: 0,
            terminated: false,
        }
    }

    /// The slot shared by all the replicas where the first read error is stored.
    pub fn errors(&self) -> SourceErrorRef {
        self.errors.clone()
    }

    fn fail(&mut self, error: StoreError) -> StreamElement<Document> {
        error!(
            "{} failed reading {} of {}: {error}",
            self.coord.map(|c| c.to_string()).unwrap_or_default(),
            self.split.map(|s| s.to_string()).unwrap_or_default(),
            self.store.describe()
        );
        self.errors.lock().get_or_insert(error);
        self.terminate()
    }

    fn terminate(&mut self) -> StreamElement<Document> {
        if !self.terminated {
            debug!(
                "{} read {} documents",
                self.coord.map(|c| c.to_string()).unwrap_or_default(),
                self.read
            );
        }
        self.terminated = true;
        self.cursor = None;
        StreamElement::Terminate
    }
}

impl Operator<Document> for MongoRangeSource {
    fn setup(&mut self, metadata: &mut ExecutionMetadata) {
        let peers = metadata.replicas.len() as CoordUInt;
        self.coord = Some(metadata.coord);
        self.split = self.range.split(metadata.global_id, peers);
        debug!(
            "{} reads {} of {} (range {}, {} replicas)",
            metadata.coord,
            self.split
                .map(|s| s.to_string())
                .unwrap_or_else(|| "nothing".to_string()),
            self.key,
            self.range,
            peers
        );
    }

    fn next(&mut self) -> StreamElement<Document> {
        if self.terminated {
            return StreamElement::Terminate;
        }
        if self.cursor.is_none() {
            let Some(split) = self.split else {
                return self.terminate();
            };
            match self.store.find_range(&self.key, &split, self.batch_size) {
                Ok(cursor) => self.cursor = Some(cursor),
                Err(e) => return self.fail(e),
            }
        }
        match self.cursor.as_mut().and_then(|cursor| cursor.next()) {
            Some(Ok(document)) => {
                self.read += 1;
                StreamElement::Item(document)
            }
            Some(Err(e)) => self.fail(e),
            None => self.terminate(),
        }
    }
}

impl Clone for MongoRangeSource {
    fn clone(&self) -> Self {
        assert!(
            self.cursor.is_none(),
            "MongoRangeSource can be cloned only before reading"
        );
        Self {
            store: self.store.clone(),
            key: self.key.clone(),
            range: self.range,
            batch_size: self.batch_size,
            coord: None,
            split: None,
            cursor: None,
            errors: self.errors.clone(),
            read: 0,
            terminated: false,
        }
    }
}

impl Source<Document> for MongoRangeSource {
    fn replication(&self) -> Replication {
        Replication::Unlimited
    }
}
