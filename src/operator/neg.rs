//! Multiplicity negation.

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
    /// Flips the sign of every multiplicity in the stream.
    pub fn negate(&self) -> Self {
        let output = StreamBuilder::new(self.builder().clone());
        let operator = LinearUnary::new(
            "Negate",
            self.connect_reader(),
            output.writer(),
            self.builder().frontier(),
            |collection: &Collection<D, R>| collection.negate(),
        );
        self.builder().add_operator(operator);
        output
    }
}
