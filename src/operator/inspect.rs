//! A tee that reports everything flowing through an edge.

use crate::{
    algebra::{Record, ZRingValue},
    circuit::{
        operator_traits::Operator,
        stream::{InputPort, Message, StreamReader, StreamWriter},
        StreamBuilder,
    },
    order::{Antichain, Version},
};
use std::{borrow::Cow, fmt::Debug};
use tracing::info;

impl<D, R> StreamBuilder<D, R>
where
    D: Record,
    R: ZRingValue + Debug,
{
    /// Tees the stream through an operator that emits a `tracing` event for
    /// every data batch and frontier advance, tagged with `label`.
    pub fn debug(&self, label: &str) -> Self {
        let output = StreamBuilder::new(self.builder().clone());
        let operator = Inspect::new(
            label.to_owned(),
            self.connect_reader(),
            output.writer(),
            self.builder().frontier(),
        );
        self.builder().add_operator(operator);
        output
    }
}

/// Operator forwarding its input unchanged while reporting it.
pub struct Inspect<D, R> {
    label: String,
    input: InputPort<D, R>,
    output: StreamWriter<D, R>,
    output_frontier: Antichain<Version>,
}

impl<D, R> Inspect<D, R>
where
    D: Record,
    R: ZRingValue,
{
    pub fn new(
        label: String,
        input: StreamReader<D, R>,
        output: StreamWriter<D, R>,
        initial_frontier: Antichain<Version>,
    ) -> Self {
        Self {
            label,
            input: InputPort::new(input, initial_frontier.clone()),
            output,
            output_frontier: initial_frontier,
        }
    }
}

impl<D, R> Operator for Inspect<D, R>
where
    D: Record,
    R: ZRingValue + Debug,
{
    fn name(&self) -> Cow<'static, str> {
        Cow::from("Inspect")
    }

    fn pending_work(&self) -> bool {
        self.input.has_pending()
    }

    fn run(&mut self) {
        for message in self.input.drain() {
            match message {
                Message::Data(version, collection) => {
                    info!(
                        label = %self.label,
                        version = %version,
                        collection = ?collection,
                        "data"
                    );
                    self.output.send_data(version, collection);
                }
                Message::Frontier(frontier) => {
                    info!(label = %self.label, frontier = ?frontier, "frontier");
                    self.input.update_frontier(frontier);
                }
            }
        }

        let input_frontier = self.input.frontier().clone();
        assert!(self.output_frontier.less_equal(&input_frontier));
        if self.output_frontier.less_than(&input_frontier) {
            self.output_frontier = input_frontier;
            self.output.send_frontier(self.output_frontier.clone());
        }
    }
}
