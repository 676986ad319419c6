//! Record-by-record transformation.

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
    /// Applies `f` to every record of the stream.
    pub fn map<D2, F>(&self, mut f: F) -> StreamBuilder<D2, R>
    where
        D2: Record,
        F: FnMut(&D) -> D2 + 'static,
    {
        let output = StreamBuilder::new(self.builder().clone());
        let operator = LinearUnary::new(
            "Map",
            self.connect_reader(),
            output.writer(),
            self.builder().frontier(),
            move |collection: &Collection<D, R>| collection.map(&mut f),
        );
        self.builder().add_operator(operator);
        output
    }
}
