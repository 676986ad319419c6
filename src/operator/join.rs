//! Relational join of two keyed streams.

use crate::{
    algebra::{Collection, Record, ZRingValue},
    circuit::{
        operator_traits::Operator,
        stream::{InputPort, Message, StreamReader, StreamWriter},
        StreamBuilder,
    },
    order::{Antichain, Version},
    trace::Index,
};
use std::{borrow::Cow, collections::BTreeMap};

impl<K, V, R> StreamBuilder<(K, V), R>
where
    K: Record,
    V: Record,
    R: ZRingValue,
{
    /// Matches pairs `(k, v)` from `self` and `(k, w)` from `other` and
    /// produces `(k, (v, w))`.
    ///
    /// Each output pairing carries the join of the versions of its two
    /// inputs and the product of their multiplicities.
    pub fn join<V2>(&self, other: &StreamBuilder<(K, V2), R>) -> StreamBuilder<(K, (V, V2)), R>
    where
        V2: Record,
    {
        assert!(
            self.builder().same_graph(other.builder()),
            "joined streams belong to different graphs"
        );
        let output = StreamBuilder::new(self.builder().clone());
        let operator = Join::new(
            self.connect_reader(),
            other.connect_reader(),
            output.writer(),
            self.builder().frontier(),
        );
        self.builder().add_operator(operator);
        output
    }
}

/// Two-sided indexed delta-join.
///
/// Each side accumulates its full history in an [`Index`]. An incoming
/// delta on one side is joined against the other side's index, so only the
/// keys named by the delta are touched. Both indexes are compacted to the
/// output frontier whenever it advances; the output frontier is the meet
/// of the input frontiers, so a compacted tuple can no longer pair with
/// any future delta at a version that has not been emitted yet.
pub struct Join<K, V1, V2, R> {
    input_a: InputPort<(K, V1), R>,
    input_b: InputPort<(K, V2), R>,
    output: StreamWriter<(K, (V1, V2)), R>,
    output_frontier: Antichain<Version>,
    trace_a: Index<K, V1, R>,
    trace_b: Index<K, V2, R>,
}

impl<K, V1, V2, R> Join<K, V1, V2, R>
where
    K: Record,
    V1: Record,
    V2: Record,
    R: ZRingValue,
{
    pub fn new(
        input_a: StreamReader<(K, V1), R>,
        input_b: StreamReader<(K, V2), R>,
        output: StreamWriter<(K, (V1, V2)), R>,
        initial_frontier: Antichain<Version>,
    ) -> Self {
        Self {
            input_a: InputPort::new(input_a, initial_frontier.clone()),
            input_b: InputPort::new(input_b, initial_frontier.clone()),
            output,
            output_frontier: initial_frontier,
            trace_a: Index::new(),
            trace_b: Index::new(),
        }
    }
}

impl<K, V1, V2, R> Operator for Join<K, V1, V2, R>
where
    K: Record,
    V1: Record,
    V2: Record,
    R: ZRingValue,
{
    fn name(&self) -> Cow<'static, str> {
        Cow::from("Join")
    }

    fn pending_work(&self) -> bool {
        self.input_a.has_pending() || self.input_b.has_pending()
    }

    fn run(&mut self) {
        let mut delta_a = Index::new();
        let mut delta_b = Index::new();

        for message in self.input_a.drain() {
            match message {
                Message::Data(version, collection) => {
                    for ((key, value), multiplicity) in collection.entries() {
                        delta_a.add_value(
                            key.clone(),
                            version.clone(),
                            value.clone(),
                            multiplicity.clone(),
                        );
                    }
                }
                Message::Frontier(frontier) => self.input_a.update_frontier(frontier),
            }
        }
        for message in self.input_b.drain() {
            match message {
                Message::Data(version, collection) => {
                    for ((key, value), multiplicity) in collection.entries() {
                        delta_b.add_value(
                            key.clone(),
                            version.clone(),
                            value.clone(),
                            multiplicity.clone(),
                        );
                    }
                }
                Message::Frontier(frontier) => self.input_b.update_frontier(frontier),
            }
        }

        let mut results: BTreeMap<Version, Collection<(K, (V1, V2)), R>> = BTreeMap::new();

        // New deltas on side a against everything side b has seen so far.
        for (version, collection) in delta_a.join(&self.trace_b) {
            results.entry(version).or_default().extend(&collection);
        }
        self.trace_a.append(delta_a);

        // New deltas on side b against side a, including a's new deltas;
        // pairings of the two fresh deltas are produced exactly once.
        for (version, collection) in self.trace_a.join(&delta_b) {
            results.entry(version).or_default().extend(&collection);
        }

        for (version, collection) in results {
            self.output.send_data(version, collection);
        }
        self.trace_b.append(delta_b);

        let input_frontier = self.input_a.frontier().meet(self.input_b.frontier());
        assert!(self.output_frontier.less_equal(&input_frontier));
        if self.output_frontier.less_than(&input_frontier) {
            self.output_frontier = input_frontier;
            self.output.send_frontier(self.output_frontier.clone());
            self.trace_a.compact(&self.output_frontier);
            self.trace_b.compact(&self.output_frontier);
        }
    }
}
