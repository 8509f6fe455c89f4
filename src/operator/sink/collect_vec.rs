use std::fmt::Display;

use crate::operator::sink::{Sink, StreamOutput, StreamOutputRef};
use crate::operator::{Data, Operator, StreamElement};
use crate::scheduler::ExecutionMetadata;
use crate::stream::Stream;
use crate::CoordUInt;

#[derive(Debug)]
pub struct CollectVecSink<Out: Data, PreviousOperators>
where
    PreviousOperators: Operator<Out>,
{
    prev: PreviousOperators,
    replica: CoordUInt,
    result: Option<Vec<Out>>,
    output: StreamOutputRef<Vec<Out>>,
}

impl<Out: Data, PreviousOperators> Display for CollectVecSink<Out, PreviousOperators>
where
    PreviousOperators: Operator<Out>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> CollectVecSink", self.prev)
    }
}

impl<Out: Data, PreviousOperators> Operator<()> for CollectVecSink<Out, PreviousOperators>
where
    PreviousOperators: Operator<Out>,
{
    fn setup(&mut self, metadata: &mut ExecutionMetadata) {
        self.replica = metadata.global_id;
        self.prev.setup(metadata);
    }

    fn next(&mut self) -> StreamElement<()> {
        match self.prev.next() {
            StreamElement::Item(t) => {
                if let Some(result) = self.result.as_mut() {
                    result.push(t);
                }
                StreamElement::Item(())
            }
            StreamElement::Terminate => {
                if let Some(result) = self.result.take() {
                    self.output.lock().push((self.replica, result));
                }
                StreamElement::Terminate
            }
        }
    }
}

impl<Out: Data, PreviousOperators> Sink for CollectVecSink<Out, PreviousOperators> where
    PreviousOperators: Operator<Out>
{
}

impl<Out: Data, PreviousOperators> Clone for CollectVecSink<Out, PreviousOperators>
where
    PreviousOperators: Operator<Out>,
{
    fn clone(&self) -> Self {
        Self {
            prev: self.prev.clone(),
            replica: self.replica,
            result: Some(Vec::new()),
            output: self.output.clone(),
        }
    }
}

impl<Out: Data, OperatorChain> Stream<Out, OperatorChain>
where
    OperatorChain: Operator<Out> + 'static,
{
    /// Close the stream and store all the resulting items into a [`Vec`] on the caller.
    ///
    /// The items of each replica are kept in the order they were produced, and the replicas are
    /// concatenated by replica index.
    ///
    /// ## Example
    ///
    /// ```
    /// # use renoir_mongo::{StreamContext, ContextConfig};
    /// # use renoir_mongo::operator::source::IteratorSource;
    /// # let ctx = StreamContext::new(ContextConfig::new().master("local").app_name("doc")).unwrap();
    /// let s = ctx.stream(IteratorSource::new(0..10));
    /// let res = s.collect_vec();
    ///
    /// ctx.execute_blocking().unwrap();
    ///
    /// assert_eq!(res.get().unwrap(), (0..10).collect::<Vec<_>>());
    /// ```
    pub fn collect_vec(self) -> StreamOutput<Vec<Out>> {
        let output = StreamOutputRef::default();
        let outcome = self.add_operator(|prev| CollectVecSink {
            prev,
            replica: 0,
            result: Some(Vec::new()),
            output: output.clone(),
        })
        .finalize_block();
        StreamOutput::new(output, outcome)
    }
}
