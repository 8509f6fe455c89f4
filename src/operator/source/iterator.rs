use std::fmt::Display;

use crate::block::Replication;
use crate::operator::source::Source;
use crate::operator::{Data, Operator, StreamElement};
use crate::scheduler::ExecutionMetadata;

/// Source that consumes an iterator and emits all its elements into the stream.
///
/// The iterator will be consumed **only from one replica**, therefore this source is not parallel.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct IteratorSource<Out: Data, It>
where
    It: Iterator<Item = Out> + Send + 'static,
{
    #[derivative(Debug = "ignore")]
    inner: It,
    terminated: bool,
}

impl<Out: Data, It> Display for IteratorSource<Out, It>
where
    It: Iterator<Item = Out> + Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IteratorSource<{}>", std::any::type_name::<Out>())
    }
}

impl<Out: Data, It> IteratorSource<Out, It>
where
    It: Iterator<Item = Out> + Send + 'static,
{
    /// Create a new source that reads the items from the iterator provided as input.
    ///
    /// **Note**: this source is **not parallel**, the iterator will be consumed only on a single
    /// replica. If you want to achieve parallelism use a
    /// [`ParallelIteratorSource`](super::ParallelIteratorSource).
    pub fn new(inner: It) -> Self {
        Self {
            inner,
            terminated: false,
        }
    }
}

impl<Out: Data, It> Source<Out> for IteratorSource<Out, It>
where
    It: Iterator<Item = Out> + Send + 'static,
{
    fn replication(&self) -> Replication {
        Replication::One
    }
}

impl<Out: Data, It> Operator<Out> for IteratorSource<Out, It>
where
    It: Iterator<Item = Out> + Send + 'static,
{
    fn setup(&mut self, _metadata: &mut ExecutionMetadata) {}

    fn next(&mut self) -> StreamElement<Out> {
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

impl<Out: Data, It> Clone for IteratorSource<Out, It>
where
    It: Iterator<Item = Out> + Send + 'static,
{
    fn clone(&self) -> Self {
        // Since this is a non-parallel source, we don't want the other replicas to emit any value
        panic!("IteratorSource cannot be cloned, replication should be One");
    }
}

#[cfg(test)]
mod tests {
    use crate::operator::source::IteratorSource;
    use crate::operator::{Operator, StreamElement};

    #[test]
    fn iterator_source_terminates() {
        let mut source = IteratorSource::new(vec!["a", "b"].into_iter());
        assert_eq!(source.next(), StreamElement::Item("a"));
        assert_eq!(source.next(), StreamElement::Item("b"));
        assert_eq!(source.next(), StreamElement::Terminate);
        assert_eq!(source.next(), StreamElement::Terminate);
    }
}
