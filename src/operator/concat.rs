//! Multiset addition of two streams.

use crate::{
    algebra::{Record, ZRingValue},
    circuit::{
        operator_traits::Operator,
        stream::{InputPort, Message, StreamReader, StreamWriter},
        StreamBuilder,
    },
    order::{Antichain, Version},
};
use std::borrow::Cow;

impl<D, R> StreamBuilder<D, R>
where
    D: Record,
    R: ZRingValue,
{
    /// Concatenates two streams, the pointwise sum of the collections they
    /// carry.
    pub fn concat(&self, other: &Self) -> Self {
        assert!(
            self.builder().same_graph(other.builder()),
            "concatenated streams belong to different graphs"
        );
        let output = StreamBuilder::new(self.builder().clone());
        let operator = Concat::new(
            self.connect_reader(),
            other.connect_reader(),
            output.writer(),
            self.builder().frontier(),
        );
        self.builder().add_operator(operator);
        output
    }
}

/// Operator forwarding the data of both inputs unchanged.
///
/// Its output frontier is the meet of the two input frontiers: a version
/// stays open as long as either input may still change it.
pub struct Concat<D, R> {
    input_a: InputPort<D, R>,
    input_b: InputPort<D, R>,
    output: StreamWriter<D, R>,
    output_frontier: Antichain<Version>,
}

impl<D, R> Concat<D, R>
where
    D: Record,
    R: ZRingValue,
{
    pub fn new(
        input_a: StreamReader<D, R>,
        input_b: StreamReader<D, R>,
        output: StreamWriter<D, R>,
        initial_frontier: Antichain<Version>,
    ) -> Self {
        Self {
            input_a: InputPort::new(input_a, initial_frontier.clone()),
            input_b: InputPort::new(input_b, initial_frontier.clone()),
            output,
            output_frontier: initial_frontier,
        }
    }
}

impl<D, R> Operator for Concat<D, R>
where
    D: Record,
    R: ZRingValue,
{
    fn name(&self) -> Cow<'static, str> {
        Cow::from("Concat")
    }

    fn pending_work(&self) -> bool {
        self.input_a.has_pending() || self.input_b.has_pending()
    }

    fn run(&mut self) {
        for message in self.input_a.drain() {
            match message {
                Message::Data(version, collection) => self.output.send_data(version, collection),
                Message::Frontier(frontier) => self.input_a.update_frontier(frontier),
            }
        }
        for message in self.input_b.drain() {
            match message {
                Message::Data(version, collection) => self.output.send_data(version, collection),
                Message::Frontier(frontier) => self.input_b.update_frontier(frontier),
            }
        }

        let input_frontier = self.input_a.frontier().meet(self.input_b.frontier());
        assert!(self.output_frontier.less_equal(&input_frontier));
        if self.output_frontier.less_than(&input_frontier) {
            self.output_frontier = input_frontier;
            self.output.send_frontier(self.output_frontier.clone());
        }
    }
}
