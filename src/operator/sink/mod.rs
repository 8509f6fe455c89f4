//! Utility traits and structures related to the sink operators.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::context::ContextError;
use crate::operator::Operator;
use crate::scheduler::BlockOutcomeRef;
use crate::CoordUInt;

mod collect_count;
mod collect_vec;

/// This trait marks all the operators that can be used as sinks.
pub trait Sink: Operator<()> {}

/// The partial results of the replicas of a sink, tagged with the replica index.
pub(crate) type StreamOutputRef<Out> = Arc<Mutex<Vec<(CoordUInt, Out)>>>;

/// The result of a stream after the execution has ended.
///
/// Each replica of the sink stores its own partial result when it terminates; `get` gathers them
/// in replica order.
#[derive(Debug)]
pub struct StreamOutput<Out> {
    result: StreamOutputRef<Out>,
    outcome: BlockOutcomeRef,
}

impl<Out> StreamOutput<Out> {
    pub(crate) fn new(result: StreamOutputRef<Out>, outcome: BlockOutcomeRef) -> Self {
        Self { result, outcome }
    }

    /// Whether the block of this output has been executed or dropped.
    pub fn is_done(&self) -> bool {
        self.outcome.lock().is_some()
    }

    /// How the execution of the block of this output ended, `None` while the block is pending.
    ///
    /// The outcome can be taken only once.
    pub fn take_outcome(&self) -> Option<Result<(), ContextError>> {
        self.outcome.lock().take()
    }

    /// Take the partial results, sorted by replica. `None` if no replica has completed.
    fn take_partials(self) -> Option<Vec<Out>> {
        let mut partials = std::mem::take(&mut *self.result.lock());
        if partials.is_empty() {
            return None;
        }
        partials.sort_by_key(|(replica, _)| *replica);
        Some(partials.into_iter().map(|(_, partial)| partial).collect())
    }
}

impl<T> StreamOutput<Vec<T>> {
    /// The items of all the replicas, concatenated in replica order.
    pub fn get(self) -> Option<Vec<T>> {
        self.take_partials()
            .map(|partials| partials.into_iter().flatten().collect())
    }
}

impl StreamOutput<usize> {
    /// The total number of items counted by the replicas.
    pub fn get(self) -> Option<usize> {
        self.take_partials()
            .map(|partials| partials.into_iter().sum())
    }
}
