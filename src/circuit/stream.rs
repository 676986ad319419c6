//! Edges of the dataflow graph.
//!
//! An edge carries two kinds of messages: data batches, pairing a version
//! with a delta collection, and frontier advances. A [`StreamWriter`]
//! broadcasts each message to one FIFO queue per subscribed
//! [`StreamReader`]; messages are never reordered or dropped.

use crate::{
    algebra::{Collection, Record, ZRingValue},
    order::{Antichain, Version},
};
use std::{
    cell::RefCell,
    collections::VecDeque,
    rc::Rc,
};

/// A message flowing along an edge.
#[derive(Clone, Debug)]
pub enum Message<D, R = isize> {
    /// A delta to the collection, labeled with the version it occurs at.
    Data(Version, Collection<D, R>),
    /// A promise that no future data batch on this edge will carry a
    /// version the antichain does not consider open.
    Frontier(Antichain<Version>),
}

impl<D, R> PartialEq for Message<D, R>
where
    D: Record,
    R: ZRingValue,
{
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Message::Data(v1, c1), Message::Data(v2, c2)) => v1 == v2 && c1 == c2,
            (Message::Frontier(f1), Message::Frontier(f2)) => f1 == f2,
            _ => false,
        }
    }
}

impl<D, R> Eq for Message<D, R>
where
    D: Record,
    R: ZRingValue,
{
}

type Queue<D, R> = Rc<RefCell<VecDeque<Message<D, R>>>>;

/// The sending half of an edge, broadcasting to every subscribed reader.
pub struct StreamWriter<D, R = isize> {
    queues: Rc<RefCell<Vec<Queue<D, R>>>>,
}

impl<D, R> StreamWriter<D, R>
where
    D: Record,
    R: ZRingValue,
{
    pub fn new() -> Self {
        Self {
            queues: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Creates a reader receiving every message sent from now on.
    pub fn subscribe(&self) -> StreamReader<D, R> {
        let queue: Queue<D, R> = Rc::new(RefCell::new(VecDeque::new()));
        self.queues.borrow_mut().push(queue.clone());
        StreamReader { queue }
    }

    /// Sends a data batch to every reader.
    pub fn send_data(&self, version: Version, collection: Collection<D, R>) {
        self.broadcast(Message::Data(version, collection));
    }

    /// Sends a frontier advance to every reader.
    pub fn send_frontier(&self, frontier: Antichain<Version>) {
        self.broadcast(Message::Frontier(frontier));
    }

    fn broadcast(&self, message: Message<D, R>) {
        let queues = self.queues.borrow();
        for queue in queues.iter().take(queues.len().saturating_sub(1)) {
            queue.borrow_mut().push_back(message.clone());
        }
        if let Some(last) = queues.last() {
            last.borrow_mut().push_back(message);
        }
    }
}

impl<D, R> Clone for StreamWriter<D, R> {
    fn clone(&self) -> Self {
        Self {
            queues: self.queues.clone(),
        }
    }
}

impl<D, R> Default for StreamWriter<D, R>
where
    D: Record,
    R: ZRingValue,
{
    fn default() -> Self {
        Self::new()
    }
}

/// The receiving half of an edge.
pub struct StreamReader<D, R = isize> {
    queue: Queue<D, R>,
}

impl<D, R> StreamReader<D, R> {
    /// Removes and returns all pending messages, oldest first.
    pub fn drain(&mut self) -> Vec<Message<D, R>> {
        self.queue.borrow_mut().drain(..).collect()
    }

    /// True iff a message is waiting.
    pub fn has_pending(&self) -> bool {
        !self.queue.borrow().is_empty()
    }
}

/// An operator's view of one of its inputs: the reader plus the frontier
/// the operator has observed on it.
pub struct InputPort<D, R = isize> {
    reader: StreamReader<D, R>,
    frontier: Antichain<Version>,
}

impl<D, R> InputPort<D, R> {
    pub fn new(reader: StreamReader<D, R>, initial_frontier: Antichain<Version>) -> Self {
        Self {
            reader,
            frontier: initial_frontier,
        }
    }

    /// Removes and returns all pending messages, oldest first.
    pub fn drain(&mut self) -> Vec<Message<D, R>> {
        self.reader.drain()
    }

    /// True iff a message is waiting.
    pub fn has_pending(&self) -> bool {
        self.reader.has_pending()
    }

    /// The frontier most recently recorded with [`update_frontier`](Self::update_frontier).
    pub fn frontier(&self) -> &Antichain<Version> {
        &self.frontier
    }

    /// Records an observed frontier advance. Upstream operators only send
    /// monotone frontiers; a regression here is a bug.
    pub fn update_frontier(&mut self, frontier: Antichain<Version>) {
        assert!(
            self.frontier.less_equal(&frontier),
            "input frontier regressed from {:?} to {:?}",
            self.frontier,
            frontier
        );
        self.frontier = frontier;
    }
}
