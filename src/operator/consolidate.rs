//! Frontier-gated physical compaction.

use crate::{
    algebra::{Record, ZRingValue},
    circuit::{
        operator_traits::Operator,
        stream::{InputPort, Message, StreamReader, StreamWriter},
        StreamBuilder,
    },
    order::{Antichain, Version},
    trace::CollectionTrace,
};
use std::borrow::Cow;

impl<D, R> StreamBuilder<D, R>
where
    D: Record,
    R: ZRingValue,
{
    /// Defers every batch until its version is closed, then emits the one
    /// consolidated delta for that version.
    ///
    /// This is the only operator that guarantees downstream consumers see
    /// at most one batch per version, carrying the true net change. Every
    /// cycle built with [`iterate`](Self::iterate) needs a consolidate on
    /// the looped path, or non-canceling deltas can circulate forever.
    pub fn consolidate(&self) -> Self {
        let output = StreamBuilder::new(self.builder().clone());
        let operator = Consolidate::new(
            self.connect_reader(),
            output.writer(),
            self.builder().frontier(),
        );
        self.builder().add_operator(operator);
        output
    }
}

/// Operator holding back deltas until their version can no longer change.
pub struct Consolidate<D, R> {
    input: InputPort<D, R>,
    output: StreamWriter<D, R>,
    output_frontier: Antichain<Version>,
    pending: CollectionTrace<D, R>,
}

impl<D, R> Consolidate<D, R>
where
    D: Record,
    R: ZRingValue,
{
    pub fn new(
        input: StreamReader<D, R>,
        output: StreamWriter<D, R>,
        initial_frontier: Antichain<Version>,
    ) -> Self {
        Self {
            input: InputPort::new(input, initial_frontier.clone()),
            output,
            output_frontier: initial_frontier,
            pending: CollectionTrace::new(),
        }
    }
}

impl<D, R> Operator for Consolidate<D, R>
where
    D: Record,
    R: ZRingValue,
{
    fn name(&self) -> Cow<'static, str> {
        Cow::from("Consolidate")
    }

    fn pending_work(&self) -> bool {
        self.input.has_pending()
    }

    fn run(&mut self) {
        for message in self.input.drain() {
            match message {
                Message::Data(version, collection) => self.pending.append(version, collection),
                Message::Frontier(frontier) => self.input.update_frontier(frontier),
            }
        }

        for (version, delta) in self.pending.extract_closed(self.input.frontier()) {
            self.output.send_data(version, delta);
        }

        let input_frontier = self.input.frontier().clone();
        assert!(self.output_frontier.less_equal(&input_frontier));
        if self.output_frontier.less_than(&input_frontier) {
            self.output_frontier = input_frontier;
            self.output.send_frontier(self.output_frontier.clone());
        }
    }
}
