use std::fmt::{Display, Formatter};
use std::marker::PhantomData;

use crate::operator::{Data, Operator};

/// Identifier of a block in the job graph.
pub type BlockId = u64;

/// A chain of operators that will be run inside the same thread. The block produces elements of
/// type `Out`.
///
/// `OperatorChain` is the type of the chain of operators inside the block. It must be an operator
/// that yields values of type `Out`.
#[derive(Debug, Clone)]
pub(crate) struct InnerBlock<Out: Data, OperatorChain>
where
    OperatorChain: Operator<Out>,
{
    /// The identifier of the block inside the context.
    pub(crate) id: BlockId,
    /// The current chain of operators.
    pub(crate) operators: OperatorChain,
    /// How many replicas of this block the scheduler may spawn.
    pub(crate) replication: Replication,

    pub _out_type: PhantomData<Out>,
}

impl<Out: Data, OperatorChain> InnerBlock<Out, OperatorChain>
where
    OperatorChain: Operator<Out>,
{
    pub fn new(id: BlockId, operators: OperatorChain, replication: Replication) -> Self {
        Self {
            id,
            operators,
            replication,
            _out_type: Default::default(),
        }
    }
}

impl<Out: Data, OperatorChain> Display for InnerBlock<Out, OperatorChain>
where
    OperatorChain: Operator<Out>,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.operators)
    }
}

/// The number of replicas a block is spawned with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replication {
    /// One replica per unit of parallelism of the runtime.
    Unlimited,
    /// A single replica, regardless of the parallelism of the runtime.
    One,
}

impl Replication {
    pub(crate) fn instances(&self, parallelism: crate::CoordUInt) -> crate::CoordUInt {
        match self {
            Replication::Unlimited => parallelism,
            Replication::One => 1,
        }
    }
}
