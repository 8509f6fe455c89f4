//! Operators that can be applied to a stream.
//!
//! The actual operator list can be found from the implemented methods of [`Stream`](crate::Stream).

use std::fmt::Display;

use crate::scheduler::ExecutionMetadata;

mod filter;
mod map;
pub mod sink;
pub mod source;

/// Marker trait that all the types inside a stream should implement.
pub trait Data: Clone + Send + 'static {}
impl<T: Clone + Send + 'static> Data for T {}

/// An element of the stream. This is what enters and exits from the operators.
///
/// An operator may need to change the content of a `StreamElement` (e.g. a `Map` may change the
/// value of the `Item`). Usually `Terminate` is propagated without changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamElement<Out> {
    /// A normal element containing just the value of the message.
    Item(Out),
    /// The stream has ended, and the operators should exit as soon as possible.
    Terminate,
}

impl<Out> StreamElement<Out> {
    /// Change the type of the element inside the `StreamElement`.
    pub fn map<NewOut>(self, f: impl FnOnce(Out) -> NewOut) -> StreamElement<NewOut> {
        match self {
            StreamElement::Item(item) => StreamElement::Item(f(item)),
            StreamElement::Terminate => StreamElement::Terminate,
        }
    }

    /// A string representation of the variant of this `StreamElement`.
    pub fn variant_str(&self) -> &'static str {
        match self {
            StreamElement::Item(_) => "Item",
            StreamElement::Terminate => "Terminate",
        }
    }
}

/// An operator represents a unit of computation. It's always included inside a chain of operators,
/// inside a block.
///
/// Each operator implements the `Operator<Out>` trait, it produced a type of output `Out`.
///
/// An `Operator` must be `Clone` since it is part of a single chain when it's built, but it has to
/// be cloned to spawn the replicas of the block.
pub trait Operator<Out: Data>: Clone + Send + Display {
    /// Setup the operator chain. This is called before any call to `next` and it's used to
    /// initialize the operator. When it's called the operator has already been cloned and it will
    /// never be cloned again. Therefore it's safe to store the replica index and the number of
    /// replicas inside the operator.
    ///
    /// The call is recursive to the previous operators.
    fn setup(&mut self, metadata: &mut ExecutionMetadata);

    /// Take a value from the previous operator, process it and return it.
    fn next(&mut self) -> StreamElement<Out>;
}
