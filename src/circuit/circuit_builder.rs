//! API to construct dataflow graphs.
//!
//! The API exposes two abstractions: the [`GraphBuilder`] and
//! [`StreamBuilder`] handles denoting edges of the graph under
//! construction. Each functional method on a stream handle inserts one or
//! more operators, wires their edges, and returns the handle of the new
//! output edge. [`GraphBuilder::finalize`] seals the topology and yields
//! the runnable [`Graph`].
//!
//! # Examples
//!
//! ```
//! use deltaflow::{
//!     circuit::GraphBuilder,
//!     collection,
//!     order::{Antichain, Version},
//! };
//!
//! let builder = GraphBuilder::new(Antichain::from_elem(Version::from(0)));
//! let (numbers, mut writer) = builder.new_input::<u64, isize>();
//! let mut doubled = numbers.map(|n| n * 2).output();
//! let mut graph = builder.finalize();
//!
//! writer.send_data(Version::from(0), collection! { 3 => 1 }).unwrap();
//! writer.send_frontier(Antichain::from_elem(Version::from(1))).unwrap();
//! while graph.step() {}
//!
//! let received = doubled.drain_data();
//! assert_eq!(received[0].1, collection! { 6 => 1 });
//! ```

use crate::{
    algebra::{Collection, Record, ZRingValue},
    circuit::{
        operator_traits::Operator,
        schedule::Graph,
        stream::{Message, StreamReader, StreamWriter},
    },
    error::{ContractError, Error},
    order::{Antichain, Version},
};
use std::{cell::RefCell, rc::Rc};

struct BuilderInner {
    operators: Vec<Box<dyn Operator>>,
    frontier_stack: Vec<Antichain<Version>>,
    finalized: bool,
}

/// A dataflow graph as it is being built.
///
/// Cheap to clone; all clones share the same graph under construction.
pub struct GraphBuilder {
    inner: Rc<RefCell<BuilderInner>>,
}

impl GraphBuilder {
    /// Creates a builder whose inputs start at `initial_frontier`.
    ///
    /// The initial frontier fixes the version arity of the graph's inputs.
    pub fn new(initial_frontier: Antichain<Version>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(BuilderInner {
                operators: Vec::new(),
                frontier_stack: vec![initial_frontier],
                finalized: false,
            })),
        }
    }

    /// Creates an input edge, returning its stream handle and the writer
    /// the host uses to feed it.
    ///
    /// Messages sent before the graph is finalized reach only consumers
    /// wired at the time of the send, so write after `finalize`.
    pub fn new_input<D, R>(&self) -> (StreamBuilder<D, R>, InputWriter<D, R>)
    where
        D: Record,
        R: ZRingValue,
    {
        let stream = StreamBuilder::new(self.clone());
        let writer = InputWriter {
            writer: stream.writer(),
            frontier: self.frontier(),
        };
        (stream, writer)
    }

    /// Seals the topology. Stream handles kept around after this call can
    /// no longer grow the graph.
    pub fn finalize(self) -> Graph {
        let mut inner = self.inner.borrow_mut();
        inner.finalized = true;
        Graph::new(inner.operators.drain(..).collect())
    }

    pub(crate) fn add_operator<O>(&self, operator: O)
    where
        O: Operator,
    {
        let mut inner = self.inner.borrow_mut();
        assert!(!inner.finalized, "graph mutated after finalize");
        inner.operators.push(Box::new(operator));
    }

    /// The initial frontier for operators created in the current scope.
    pub(crate) fn frontier(&self) -> Antichain<Version> {
        self.inner
            .borrow()
            .frontier_stack
            .last()
            .expect("frontier stack is never empty")
            .clone()
    }

    /// True iff both handles denote the same graph under construction.
    pub(crate) fn same_graph(&self, other: &GraphBuilder) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn push_frontier(&self, frontier: Antichain<Version>) {
        self.inner.borrow_mut().frontier_stack.push(frontier);
    }

    pub(crate) fn pop_frontier(&self) {
        self.inner.borrow_mut().frontier_stack.pop();
    }
}

impl Clone for GraphBuilder {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// A handle denoting one edge of the graph under construction.
///
/// The handle only sets up topology; it never touches data. The
/// functional methods (`map`, `filter`, `join`, `iterate` and the rest)
/// live beside their operators in [`crate::operator`].
pub struct StreamBuilder<D, R = isize> {
    writer: StreamWriter<D, R>,
    builder: GraphBuilder,
}

impl<D, R> StreamBuilder<D, R>
where
    D: Record,
    R: ZRingValue,
{
    pub(crate) fn new(builder: GraphBuilder) -> Self {
        Self {
            writer: StreamWriter::new(),
            builder,
        }
    }

    /// The writer feeding this edge. Operators keep one to emit output.
    pub(crate) fn writer(&self) -> StreamWriter<D, R> {
        self.writer.clone()
    }

    /// Subscribes a new consumer to this edge.
    pub(crate) fn connect_reader(&self) -> StreamReader<D, R> {
        self.writer.subscribe()
    }

    pub(crate) fn builder(&self) -> &GraphBuilder {
        &self.builder
    }

    /// Attaches a sink the host can drain after each step.
    pub fn output(&self) -> OutputHandle<D, R> {
        OutputHandle {
            reader: self.connect_reader(),
        }
    }
}

impl<D, R> Clone for StreamBuilder<D, R> {
    fn clone(&self) -> Self {
        Self {
            writer: self.writer.clone(),
            builder: self.builder.clone(),
        }
    }
}

/// The host's handle for feeding one input edge.
///
/// The writer enforces the input contract: every data batch must carry a
/// version the writer's frontier still considers open, and frontier
/// advances must be monotone. Sending the empty antichain closes the
/// input permanently.
pub struct InputWriter<D, R = isize> {
    writer: StreamWriter<D, R>,
    frontier: Antichain<Version>,
}

impl<D, R> InputWriter<D, R>
where
    D: Record,
    R: ZRingValue,
{
    /// Enqueues a data batch at `version`.
    pub fn send_data(
        &mut self,
        version: Version,
        collection: Collection<D, R>,
    ) -> Result<(), Error> {
        if let Some(element) = self.frontier.elements().first() {
            if element.arity() != version.arity() {
                return Err(ContractError::ArityMismatch {
                    expected: element.arity(),
                    actual: version.arity(),
                }
                .into());
            }
        }
        if !self.frontier.less_equal_version(&version) {
            return Err(ContractError::DataBehindFrontier {
                version,
                frontier: self.frontier.clone(),
            }
            .into());
        }
        self.writer.send_data(version, collection);
        Ok(())
    }

    /// Advances the writer's frontier, promising that no future data batch
    /// will carry a version the new frontier has closed.
    pub fn send_frontier(&mut self, frontier: Antichain<Version>) -> Result<(), Error> {
        if let (Some(current), Some(next)) = (
            self.frontier.elements().first(),
            frontier.elements().first(),
        ) {
            if current.arity() != next.arity() {
                return Err(ContractError::ArityMismatch {
                    expected: current.arity(),
                    actual: next.arity(),
                }
                .into());
            }
        }
        if !self.frontier.less_equal(&frontier) {
            return Err(ContractError::FrontierRegression {
                current: self.frontier.clone(),
                next: frontier,
            }
            .into());
        }
        self.frontier = frontier.clone();
        self.writer.send_frontier(frontier);
        Ok(())
    }

    /// The frontier most recently sent on this writer.
    pub fn frontier(&self) -> &Antichain<Version> {
        &self.frontier
    }
}

/// A sink attached to an edge, letting the host read the messages the
/// edge carried.
pub struct OutputHandle<D, R = isize> {
    reader: StreamReader<D, R>,
}

impl<D, R> OutputHandle<D, R>
where
    D: Record,
    R: ZRingValue,
{
    /// Removes and returns all pending messages, oldest first.
    pub fn drain(&mut self) -> Vec<Message<D, R>> {
        self.reader.drain()
    }

    /// Removes all pending messages and returns the data batches, oldest
    /// first, discarding frontier advances.
    pub fn drain_data(&mut self) -> Vec<(Version, Collection<D, R>)> {
        self.drain()
            .into_iter()
            .filter_map(|message| match message {
                Message::Data(version, collection) => Some((version, collection)),
                Message::Frontier(_) => None,
            })
            .collect()
    }

    /// Removes all pending messages and returns the frontier advances,
    /// oldest first, discarding data batches.
    pub fn drain_frontiers(&mut self) -> Vec<Antichain<Version>> {
        self.drain()
            .into_iter()
            .filter_map(|message| match message {
                Message::Frontier(frontier) => Some(frontier),
                Message::Data(..) => None,
            })
            .collect()
    }
}
