//! Utility traits and structures related to the source operators.

pub use iterator::*;
pub use mongo::*;
pub use parallel_iterator::*;

use crate::block::Replication;
use crate::operator::{Data, Operator};

mod iterator;
mod mongo;
mod parallel_iterator;

/// This trait marks all the operators that can be used as sources.
pub trait Source<Out: Data>: Operator<Out> {
    /// The maximum parallelism offered by this operator.
    fn replication(&self) -> Replication;
}
