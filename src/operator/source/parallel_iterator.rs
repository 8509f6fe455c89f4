use std::fmt::Display;
use std::ops::Range;

use crate::block::Replication;
use crate::operator::source::Source;
use crate::operator::{Data, Operator, StreamElement};
use crate::scheduler::ExecutionMetadata;
use crate::CoordUInt;

pub trait IntoParallelSource: Clone + Send {
    type Iter: Iterator + Send;
    fn generate_iterator(self, index: CoordUInt, peers: CoordUInt) -> Self::Iter;
}

impl<It, G> IntoParallelSource for G
where
    It: Iterator + Send + 'static,
    G: FnOnce(CoordUInt, CoordUInt) -> It + Send + Clone,
{
    type Iter = It;

    fn generate_iterator(self, index: CoordUInt, peers: CoordUInt) -> Self::Iter {
        self(index, peers)
    }
}

impl IntoParallelSource for Range<u64> {
    type Iter = Range<u64>;

    fn generate_iterator(self, index: CoordUInt, peers: CoordUInt) -> Self::Iter {
        let n = self.end.saturating_sub(self.start);
        let chunk_size = (n.saturating_add(peers - 1)) / peers;
        let start = self
            .start
            .saturating_add(index.saturating_mul(chunk_size))
            .min(self.end);
        let end = (start.saturating_add(chunk_size)).min(self.end);

        start..end
    }
}

impl IntoParallelSource for Range<i64> {
    type Iter = Range<i64>;

    fn generate_iterator(self, index: CoordUInt, peers: CoordUInt) -> Self::Iter {
        let n = (self.end as i128 - self.start as i128).max(0);
        let peers = peers as i128;
        let chunk_size = (n + peers - 1) / peers;
        let start = (self.start as i128 + index as i128 * chunk_size).min(self.end as i128);
        let end = (start + chunk_size).min(self.end as i128).max(start);

        // both are inside [self.start, self.end]
        (start as i64)..(end as i64)
    }
}

/// This enum wraps either an `Iterator` that yields the items, or a generator function that
/// produces such iterator.
///
/// This enum is `Clone` only _before_ generating the iterator. The generator function must be
/// `Clone`, but the resulting iterator doesn't have to be so.
enum IteratorGenerator<Source: IntoParallelSource> {
    /// The function that generates the iterator.
    Generator(Source),
    /// The actual iterator that produces the items.
    Iterator(Source::Iter),
    /// An extra variant used when moving the generator out of the enum, and before putting back the
    /// iterator. This makes this enum panic-safe in the `generate` method.
    Generating,
}

impl<Source: IntoParallelSource> IteratorGenerator<Source> {
    /// Consume the generator function and store the produced iterator.
    ///
    /// This method can be called only once.
    fn generate(&mut self, global_id: CoordUInt, instances: CoordUInt) {
        let gen = std::mem::replace(self, IteratorGenerator::Generating);
        let iter = match gen {
            IteratorGenerator::Generator(gen) => gen.generate_iterator(global_id, instances),
            _ => unreachable!("generate on non-Generator variant"),
        };
        *self = IteratorGenerator::Iterator(iter);
    }

    /// If the `generate` method has been called, get the next element from the iterator.
    fn next(&mut self) -> Option<<Source::Iter as Iterator>::Item> {
        match self {
            IteratorGenerator::Iterator(iter) => iter.next(),
            _ => unreachable!("next on non-Iterator variant"),
        }
    }
}

impl<Source: IntoParallelSource> Clone for IteratorGenerator<Source> {
    fn clone(&self) -> Self {
        match self {
            Self::Generator(gen) => Self::Generator(gen.clone()),
            _ => panic!("Can clone only before generating the iterator"),
        }
    }
}

/// Source that ingests items into a stream using the maximum parallelism. The items are from the
/// iterators returned by a generating function.
///
/// Each replica (i.e. each core) will have a different iterator. The iterator are produced by a
/// generating function passed to the [`ParallelIteratorSource::new`] method.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ParallelIteratorSource<Source>
where
    Source: IntoParallelSource,
{
    #[derivative(Debug = "ignore")]
    inner: IteratorGenerator<Source>,
    terminated: bool,
}

impl<Source> Display for ParallelIteratorSource<Source>
where
    Source: IntoParallelSource,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ParallelIteratorSource<{}>",
            std::any::type_name::<<Source::Iter as Iterator>::Item>()
        )
    }
}

impl<S> ParallelIteratorSource<S>
where
    S: IntoParallelSource,
{
    /// Create a new source that ingest items into the stream using the maximum parallelism
    /// available.
    ///
    /// The function passed as argument is cloned in each core, and called to get the iterator for
    /// that replica. The first parameter passed to the function is a 0-based index of the replica,
    /// while the second is the total number of replicas.
    ///
    /// ## Example
    ///
    /// ```
    /// # use renoir_mongo::{StreamContext, ContextConfig};
    /// # use renoir_mongo::operator::source::ParallelIteratorSource;
    /// # let ctx = StreamContext::new(ContextConfig::new().master("local[4]").app_name("doc")).unwrap();
    /// // generate the numbers from 0 to 99 using multiple replicas
    /// let n = 100;
    /// let source = ParallelIteratorSource::new(move |id: u64, instances: u64| {
    ///     let chunk_size = (n + instances - 1) / instances;
    ///     let remaining = n - n.min(chunk_size * id);
    ///     let range = remaining.min(chunk_size);
    ///
    ///     let start = id * chunk_size;
    ///     let stop = id * chunk_size + range;
    ///     start..stop
    /// });
    /// let res = ctx.stream(source).collect_vec();
    /// ctx.execute_blocking().unwrap();
    /// assert_eq!(res.get().unwrap(), (0..100).collect::<Vec<_>>());
    /// ```
    pub fn new(generator: S) -> Self {
        Self {
            inner: IteratorGenerator::Generator(generator),
            terminated: false,
        }
    }
}

impl<S> Operator<<S::Iter as Iterator>::Item> for ParallelIteratorSource<S>
where
    S: IntoParallelSource,
    <S::Iter as Iterator>::Item: Data,
{
    fn setup(&mut self, metadata: &mut ExecutionMetadata) {
        self.inner
            .generate(metadata.global_id, metadata.replicas.len() as CoordUInt);
    }

    fn next(&mut self) -> StreamElement<<S::Iter as Iterator>::Item> {
        if self.terminated {
            return StreamElement::Terminate;
        }
        match self.inner.next() {
            Some(t) => StreamElement::Item(t),
            None => {
                self.terminated = true;
                StreamElement::Terminate
            }
        }
    }
}

impl<S> Clone for ParallelIteratorSource<S>
where
    S: IntoParallelSource,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            terminated: false,
        }
    }
}

impl<S> Source<<S::Iter as Iterator>::Item> for ParallelIteratorSource<S>
where
    S: IntoParallelSource,
    <S::Iter as Iterator>::Item: Data,
{
    fn replication(&self) -> Replication {
        Replication::Unlimited
    }
}
