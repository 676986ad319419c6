//! The shared body of the stateless pointwise operators.

use crate::{
    algebra::{Collection, Record, ZRingValue},
    circuit::{
        operator_traits::Operator,
        stream::{InputPort, Message, StreamReader, StreamWriter},
    },
    order::{Antichain, Version},
};
use std::borrow::Cow;

/// A unary operator applying a linear collection-to-collection function to
/// every data batch and forwarding frontiers unchanged.
///
/// The function must commute with collection addition; map, filter and
/// negate qualify. Linearity is what lets the operator transform deltas
/// one batch at a time without any state.
pub(crate) struct LinearUnary<I, O, R, F> {
    name: Cow<'static, str>,
    input: InputPort<I, R>,
    output: StreamWriter<O, R>,
    output_frontier: Antichain<Version>,
    func: F,
}

impl<I, O, R, F> LinearUnary<I, O, R, F>
where
    I: Record,
    O: Record,
    R: ZRingValue,
    F: FnMut(&Collection<I, R>) -> Collection<O, R>,
{
    pub(crate) fn new(
        name: &'static str,
        input: StreamReader<I, R>,
        output: StreamWriter<O, R>,
        initial_frontier: Antichain<Version>,
        func: F,
    ) -> Self {
        Self {
            name: Cow::from(name),
            input: InputPort::new(input, initial_frontier.clone()),
            output,
            output_frontier: initial_frontier,
            func,
        }
    }
}

impl<I, O, R, F> Operator for LinearUnary<I, O, R, F>
where
    I: Record,
    O: Record,
    R: ZRingValue,
    F: FnMut(&Collection<I, R>) -> Collection<O, R> + 'static,
{
    fn name(&self) -> Cow<'static, str> {
        self.name.clone()
    }

    fn pending_work(&self) -> bool {
        self.input.has_pending()
    }

    fn run(&mut self) {
        for message in self.input.drain() {
            match message {
                Message::Data(version, collection) => {
                    self.output.send_data(version, (self.func)(&collection));
                }
                Message::Frontier(frontier) => self.input.update_frontier(frontier),
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
