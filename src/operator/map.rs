use std::fmt::Display;
use std::marker::PhantomData;

use crate::operator::{Data, Operator, StreamElement};
use crate::scheduler::ExecutionMetadata;
use crate::stream::Stream;

#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct Map<Out: Data, NewOut: Data, F, PreviousOperators>
where
    F: Fn(Out) -> NewOut + Send + Clone,
    PreviousOperators: Operator<Out>,
{
    prev: PreviousOperators,
    #[derivative(Debug = "ignore")]
    f: F,
    _out: PhantomData<Out>,
    _new_out: PhantomData<NewOut>,
}

impl<Out: Data, NewOut: Data, F, PreviousOperators> Display
    for Map<Out, NewOut, F, PreviousOperators>
where
    F: Fn(Out) -> NewOut + Send + Clone,
    PreviousOperators: Operator<Out>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -> Map<{} -> {}>",
            self.prev,
            std::any::type_name::<Out>(),
            std::any::type_name::<NewOut>()
        )
    }
}

impl<Out: Data, NewOut: Data, F, PreviousOperators> Map<Out, NewOut, F, PreviousOperators>
where
    F: Fn(Out) -> NewOut + Send + Clone,
    PreviousOperators: Operator<Out>,
{
    fn new(prev: PreviousOperators, f: F) -> Self {
        Self {
            prev,
            f,
            _out: Default::default(),
            _new_out: Default::default(),
        }
    }
}

impl<Out: Data, NewOut: Data, F, PreviousOperators> Operator<NewOut>
    for Map<Out, NewOut, F, PreviousOperators>
where
    F: Fn(Out) -> NewOut + Send + Clone,
    PreviousOperators: Operator<Out>,
{
    fn setup(&mut self, metadata: &mut ExecutionMetadata) {
        self.prev.setup(metadata);
    }

    fn next(&mut self) -> StreamElement<NewOut> {
        self.prev.next().map(&self.f)
    }
}

impl<Out: Data, OperatorChain> Stream<Out, OperatorChain>
where
    OperatorChain: Operator<Out> + 'static,
{
    /// Transform every element of the stream with `f`, one output element per input element.
    ///
    /// Each replica applies its own clone of `f` to the elements it reads, so the order of the
    /// elements inside a replica is preserved.
    ///
    /// ## Example
    ///
    /// Project the documents read from a collection to one of their fields:
    ///
    /// ```
    /// # use renoir_mongo::prelude::*;
    /// let store = MemoryStore::new("people");
    /// store.insert_many((0..4).map(|i| doc! { "age": 20 + i, "name": format!("p{i}") }));
    /// let ctx = MongoContext::builder("mongodb://localhost:27017/test.people".parse().unwrap())
    ///     .master("local[2]")
    ///     .app_name("doc")
    ///     .store(store)
    ///     .build()
    ///     .unwrap();
    ///
    /// let names = ctx
    ///     .parallelize(21, 22, "age")
    ///     .unwrap()
    ///     .stream()
    ///     .map(|d| d.get_str("name").unwrap_or_default().to_string())
    ///     .collect_vec();
    /// ctx.context().execute_blocking().unwrap();
    ///
    /// assert_eq!(names.get().unwrap(), vec!["p1", "p2"]);
    /// ```
    pub fn map<NewOut: Data, F>(self, f: F) -> Stream<NewOut, impl Operator<NewOut>>
    where
        F: Fn(Out) -> NewOut + Send + Clone + 'static,
    {
        self.add_operator(|prev| Map::new(prev, f))
    }
}
