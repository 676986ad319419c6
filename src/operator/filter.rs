//! Record filtering.

use crate::{
    algebra::{Collection, Record, ZRingValue},
    circuit::StreamBuilder,
    operator::LinearUnary,
};

impl<D, R> StreamBuilder<D, R>
where
    D: Record,
    R: ZRingValue,
{
    /// Keeps the records for which `f` returns true.
    pub fn filter<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&D) -> bool + 'static,
    {
        let output = StreamBuilder::new(self.builder().clone());
        let operator = LinearUnary::new(
            "Filter",
            self.connect_reader(),
            output.writer(),
            self.builder().frontier(),
            move |collection: &Collection<D, R>| collection.filter(&mut f),
        );
        self.builder().add_operator(operator);
        output
    }
}
