use std::sync::Arc;

use crate::block::InnerBlock;
use crate::context::StreamContextInner;
use crate::operator::{Data, Operator};
use crate::scheduler::BlockOutcomeRef;

/// A Stream represents a chain of operators that work on a flow of data. The type of the elements
/// leaving the stream is `Out`.
///
/// The chain is kept inside a block: when the stream is closed by a sink the block is handed to
/// the scheduler of the context, which runs a replica of it on each worker when the context is
/// executed.
///
/// A block is internally composed of a chain of operators, nested like the `Iterator` from `std`.
/// The type of the chain inside the block is `OperatorChain` and it's required as type argument of
/// the stream.
pub struct Stream<Out: Data, OperatorChain>
where
    OperatorChain: Operator<Out>,
{
    /// The last block inside the stream.
    pub(crate) block: InnerBlock<Out, OperatorChain>,
    /// A reference to the context this stream lives in.
    pub(crate) ctx: Arc<StreamContextInner>,
}

impl<Out: Data, OperatorChain> Stream<Out, OperatorChain>
where
    OperatorChain: Operator<Out> + 'static,
{
    /// Add a new operator to the current chain inside the stream. This consumes the stream and
    /// returns a new one with the operator added.
    ///
    /// `get_operator` is a function that is given the previous chain of operators and should return
    /// the new chain of operators. The new chain cannot be simply passed as argument since it is
    /// required to do a partial move of the `InnerBlock` structure.
    pub(crate) fn add_operator<NewOut: Data, Op, GetOp>(
        self,
        get_operator: GetOp,
    ) -> Stream<NewOut, Op>
    where
        Op: Operator<NewOut> + 'static,
        GetOp: FnOnce(OperatorChain) -> Op,
    {
        Stream {
            block: InnerBlock::new(
                self.block.id,
                get_operator(self.block.operators),
                self.block.replication,
            ),
            ctx: self.ctx,
        }
    }

    /// Close the stream and hand the last block to the scheduler.
    pub(crate) fn finalize_block(self) -> BlockOutcomeRef {
        info!("finalizing block id={}", self.block.id);
        self.ctx.scheduler.lock().add_block(self.block)
    }
}
