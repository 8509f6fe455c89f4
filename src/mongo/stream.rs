use std::sync::Arc;

use bson::Document;

use crate::context::{ContextError, StreamContext};
use crate::mongo::{DocumentStore, KeyRange, KeySplit, MongoError};
use crate::operator::source::{MongoRangeSource, SourceErrorRef};
use crate::stream::Stream;

/// The documents of a collection whose key is inside a range, partitioned among the replicas of
/// a context.
///
/// The handle is lazy: the collection is read only when the handle is collected or counted, and
/// every call reads it again.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct MongoStream {
    context: StreamContext,
    #[derivative(Debug = "ignore")]
    store: Arc<dyn DocumentStore>,
    key: String,
    range: KeyRange,
}

impl MongoStream {
    pub(crate) fn new(
        context: StreamContext,
        store: Arc<dyn DocumentStore>,
        key: String,
        range: KeyRange,
    ) -> Self {
        Self {
            context,
            store,
            key,
            range,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn range(&self) -> KeyRange {
        self.range
    }

    /// The non-empty slices of the range, one per replica that has something to read.
    pub fn partitions(&self) -> Vec<KeySplit> {
        self.range.splits(self.context.parallelism())
    }

    /// Start a stream on the context reading the documents of the range, to be closed with a sink
    /// and run with [`StreamContext::execute_blocking`].
    ///
    /// Read errors of the returned stream are only logged.
    pub fn stream(&self) -> Stream<Document, MongoRangeSource> {
        self.context.stream(self.source())
    }

    /// Read all the documents of the range, sorted by key.
    pub fn collect(&self) -> Result<Vec<Document>, MongoError> {
        self.check_running()?;
        let source = self.source();
        let errors = source.errors();
        let output = self.context.stream(source).collect_vec();
        self.context.execute_output(&output)?;
        check_errors(&errors)?;
        // every replica has terminated, empty replicas included
        let documents = output.get().unwrap_or_default();
        debug!(
            "collected {} documents of {} in {}",
            documents.len(),
            self.key,
            self.range
        );
        Ok(documents)
    }

    /// Count the documents of the range without gathering them.
    pub fn count(&self) -> Result<usize, MongoError> {
        self.check_running()?;
        let source = self.source();
        let errors = source.errors();
        let output = self.context.stream(source).collect_count();
        self.context.execute_output(&output)?;
        check_errors(&errors)?;
        Ok(output.get().unwrap_or(0))
    }

    fn source(&self) -> MongoRangeSource {
        MongoRangeSource::new(
            self.store.clone(),
            self.key.clone(),
            self.range,
            self.context.batch_size(),
        )
    }

    fn check_running(&self) -> Result<(), MongoError> {
        if self.context.is_stopped() {
            return Err(ContextError::Stopped.into());
        }
        Ok(())
    }
}

fn check_errors(errors: &SourceErrorRef) -> Result<(), MongoError> {
    match errors.lock().take() {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}
