//! The step scheduler driving a finalized graph.

use crate::circuit::operator_traits::Operator;
use tracing::trace;

/// A finalized dataflow graph.
///
/// The graph owns every operator, and each operator owns its edges and
/// state. The host makes progress by calling [`step`](Self::step) until it
/// is satisfied; each call performs one bounded, fair sweep.
pub struct Graph {
    operators: Vec<Box<dyn Operator>>,
}

impl Graph {
    pub(crate) fn new(operators: Vec<Box<dyn Operator>>) -> Self {
        Self { operators }
    }

    /// Performs one unit of work: every operator is activated once, in a
    /// fixed order, and drains the messages that were pending when its
    /// activation began.
    ///
    /// Activating an operator with no pending input is cheap but not
    /// always a no-op: an operator may advance its output frontier the
    /// first time it runs, which is what primes the frontier circulating
    /// in a feedback loop. The scheduler therefore sweeps every operator
    /// rather than only those with queued messages, and never inspects the
    /// graph's topology.
    ///
    /// Returns true iff any operator had pending input when the sweep
    /// started or has pending input when it ends. A false return means the
    /// graph is quiescent and will stay so until an input writer sends
    /// again.
    pub fn step(&mut self) -> bool {
        let mut worked = false;
        for operator in &mut self.operators {
            if operator.pending_work() {
                worked = true;
            }
            trace!(operator = %operator.name(), "activating");
            operator.run();
        }
        worked || self.operators.iter().any(|operator| operator.pending_work())
    }

    /// The number of operators in the graph.
    pub fn operator_count(&self) -> usize {
        self.operators.len()
    }
}
