use std::fmt::Display;

use crate::operator::sink::{Sink, StreamOutput, StreamOutputRef};
use crate::operator::{Data, Operator, StreamElement};
use crate::scheduler::ExecutionMetadata;
use crate::stream::Stream;
use crate::CoordUInt;

#[derive(Debug)]
pub struct CollectCountSink<Out: Data, PreviousOperators>
where
    PreviousOperators: Operator<Out>,
{
    prev: PreviousOperators,
    replica: CoordUInt,
    result: Option<usize>,
    output: StreamOutputRef<usize>,
    _out: std::marker::PhantomData<Out>,
}

impl<Out: Data, PreviousOperators> Display for CollectCountSink<Out, PreviousOperators>
where
    PreviousOperators: Operator<Out>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> CollectCountSink", self.prev)
    }
}

impl<Out: Data, PreviousOperators> Operator<()> for CollectCountSink<Out, PreviousOperators>
where
    PreviousOperators: Operator<Out>,
{
    fn setup(&mut self, metadata: &mut ExecutionMetadata) {
        self.replica = metadata.global_id;
        self.prev.setup(metadata);
    }

    fn next(&mut self) -> StreamElement<()> {
        match self.prev.next() {
            StreamElement::Item(_) => {
                if let Some(count) = self.result.as_mut() {
                    *count += 1;
                }
                StreamElement::Item(())
            }
            StreamElement::Terminate => {
                if let Some(count) = self.result.take() {
                    self.output.lock().push((self.replica, count));
                }
                StreamElement::Terminate
            }
        }
    }
}

impl<Out: Data, PreviousOperators> Sink for CollectCountSink<Out, PreviousOperators> where
    PreviousOperators: Operator<Out>
{
}

impl<Out: Data, PreviousOperators> Clone for CollectCountSink<Out, PreviousOperators>
where
    PreviousOperators: Operator<Out>,
{
    fn clone(&self) -> Self {
        Self {
            prev: self.prev.clone(),
            replica: self.replica,
            result: Some(0),
            output: self.output.clone(),
            _out: Default::default(),
        }
    }
}

impl<Out: Data, OperatorChain> Stream<Out, OperatorChain>
where
    OperatorChain: Operator<Out> + 'static,
{
    /// Close the stream and count its items. Each replica counts its own items and the partial
    /// counts are summed on the caller.
    ///
    /// ## Example
    ///
    /// ```
    /// # use renoir_mongo::{StreamContext, ContextConfig};
    /// # use renoir_mongo::operator::source::ParallelIteratorSource;
    /// # let ctx = StreamContext::new(ContextConfig::new().master("local[2]").app_name("doc")).unwrap();
    /// let s = ctx.stream(ParallelIteratorSource::new(0..10u64));
    /// let res = s.collect_count();
    ///
    /// ctx.execute_blocking().unwrap();
    ///
    /// assert_eq!(res.get(), Some(10));
    /// ```
    pub fn collect_count(self) -> StreamOutput<usize> {
        let output = StreamOutputRef::default();
        let outcome = self.add_operator(|prev| CollectCountSink {
            prev,
            replica: 0,
            result: Some(0),
            output: output.clone(),
            _out: Default::default(),
        })
        .finalize_block();
        StreamOutput::new(output, outcome)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ContextConfig;
    use crate::context::StreamContext;
    use crate::operator::source::ParallelIteratorSource;

    #[test]
    fn collect_count() {
        let ctx =
            StreamContext::new(ContextConfig::new().master("local[3]").app_name("test")).unwrap();
        let res = ctx
            .stream(ParallelIteratorSource::new(0..100u64))
            .filter(|n| n % 2 == 0)
            .collect_count();
        ctx.execute_blocking().unwrap();
        assert_eq!(res.get(), Some(50));
    }
}
