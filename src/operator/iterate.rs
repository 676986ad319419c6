//! Fixpoint loops: ingress, egress, and feedback.
//!
//! `iterate` wires a cycle
//!
//! ```text
//! input -> ingress -> concat -> body -> egress -> output
//!                       ^         |
//!                       +-feedback+
//! ```
//!
//! Ingress moves data into the loop by extending every version with a
//! trailing iteration coordinate. Feedback re-emits the body's output with
//! that coordinate incremented, so iteration `k` of the loop sees the body
//! applied `k` times. Egress truncates the coordinate on the way out.
//! Iteration stops producing traffic for an outer version once the body's
//! output deltas at that version cancel out, which requires a
//! `consolidate` somewhere on the looped path.

use crate::{
    algebra::{Record, ZRingValue},
    circuit::{
        operator_traits::Operator,
        stream::{InputPort, Message, StreamReader, StreamWriter},
        StreamBuilder,
    },
    order::{Antichain, PartialOrder, Version},
};
use std::{
    borrow::Cow,
    collections::{BTreeMap, BTreeSet},
};

impl<D, R> StreamBuilder<D, R>
where
    D: Record,
    R: ZRingValue,
{
    /// Runs `body` to fixpoint over every version of the input stream.
    ///
    /// The stream handed to `body` carries the input plus the fed-back
    /// output of the previous iteration; the returned stream is what gets
    /// fed back and, truncated, what leaves the loop.
    ///
    /// Termination is the caller's obligation: without a
    /// [`consolidate`](Self::consolidate) on the looped path, deltas that
    /// would cancel keep circulating and `step` keeps finding work even
    /// after the mathematical fixpoint is reached.
    pub fn iterate<F>(&self, body: F) -> Self
    where
        F: FnOnce(&Self) -> Self,
    {
        let builder = self.builder().clone();
        builder.push_frontier(builder.frontier().extend());

        let feedback_stream = StreamBuilder::new(builder.clone());
        let entered = self.ingress().concat(&feedback_stream);
        let result = body(&entered);
        let feedback = Feedback::new(
            result.connect_reader(),
            1,
            feedback_stream.writer(),
            builder.frontier(),
        );
        builder.add_operator(feedback);
        builder.pop_frontier();

        result.egress()
    }

    pub(crate) fn ingress(&self) -> Self {
        let output = StreamBuilder::new(self.builder().clone());
        let operator = Ingress::new(
            self.connect_reader(),
            output.writer(),
            self.builder().frontier(),
        );
        self.builder().add_operator(operator);
        output
    }

    pub(crate) fn egress(&self) -> Self {
        let output = StreamBuilder::new(self.builder().clone());
        let operator = Egress::new(
            self.connect_reader(),
            output.writer(),
            self.builder().frontier(),
        );
        self.builder().add_operator(operator);
        output
    }
}

/// Moves data into a loop by extending versions with an iteration
/// coordinate.
///
/// Each incoming delta is emitted at iteration zero and retracted at
/// iteration one. The retraction is what makes the concatenation of
/// ingress and feedback carry `body^k(input)` at iteration `k` rather
/// than an accumulation of every earlier iteration.
pub struct Ingress<D, R> {
    input: InputPort<D, R>,
    output: StreamWriter<D, R>,
    output_frontier: Antichain<Version>,
}

impl<D, R> Ingress<D, R>
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
        }
    }
}

impl<D, R> Operator for Ingress<D, R>
where
    D: Record,
    R: ZRingValue,
{
    fn name(&self) -> Cow<'static, str> {
        Cow::from("Ingress")
    }

    fn pending_work(&self) -> bool {
        self.input.has_pending()
    }

    fn run(&mut self) {
        for message in self.input.drain() {
            match message {
                Message::Data(version, collection) => {
                    let entered = version.extend();
                    self.output.send_data(entered.clone(), collection.clone());
                    self.output
                        .send_data(entered.apply_step(1), collection.negate());
                }
                Message::Frontier(frontier) => self.input.update_frontier(frontier.extend()),
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

/// Moves data out of a loop by truncating the iteration coordinate.
pub struct Egress<D, R> {
    input: InputPort<D, R>,
    output: StreamWriter<D, R>,
    output_frontier: Antichain<Version>,
}

impl<D, R> Egress<D, R>
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
        }
    }
}

impl<D, R> Operator for Egress<D, R>
where
    D: Record,
    R: ZRingValue,
{
    fn name(&self) -> Cow<'static, str> {
        Cow::from("Egress")
    }

    fn pending_work(&self) -> bool {
        self.input.has_pending()
    }

    fn run(&mut self) {
        for message in self.input.drain() {
            match message {
                Message::Data(version, collection) => {
                    self.output.send_data(version.truncate(), collection);
                }
                Message::Frontier(frontier) => self.input.update_frontier(frontier.truncate()),
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

/// Closes a loop: re-emits the body's output one iteration later and
/// shrinks the circulating frontier once an outer version stops making
/// progress.
///
/// Without the shrinking, reaching fixpoint for an outer version would
/// still leave its frontier element circulating with an ever growing
/// iteration coordinate. The rule used here: keep an incremented frontier
/// element while its outer version has circulated at most twice, or while
/// dropping it would close out data the loop sent at earlier iterations;
/// otherwise drop it and forget the outer version.
pub struct Feedback<D, R> {
    input: InputPort<D, R>,
    step: u64,
    output: StreamWriter<D, R>,
    output_frontier: Antichain<Version>,
    /// Versions at which data went around the loop and whose closure has
    /// not yet been observed.
    pending_data_versions: BTreeSet<Version>,
    /// For each outer version, the inner frontier elements that have
    /// circulated for it.
    inner_versions_per_outer: BTreeMap<Version, BTreeSet<Version>>,
}

impl<D, R> Feedback<D, R>
where
    D: Record,
    R: ZRingValue,
{
    pub fn new(
        input: StreamReader<D, R>,
        step: u64,
        output: StreamWriter<D, R>,
        initial_frontier: Antichain<Version>,
    ) -> Self {
        Self {
            input: InputPort::new(input, initial_frontier.clone()),
            step,
            output,
            output_frontier: initial_frontier,
            pending_data_versions: BTreeSet::new(),
            inner_versions_per_outer: BTreeMap::new(),
        }
    }
}

impl<D, R> Operator for Feedback<D, R>
where
    D: Record,
    R: ZRingValue,
{
    fn name(&self) -> Cow<'static, str> {
        Cow::from("Feedback")
    }

    fn pending_work(&self) -> bool {
        self.input.has_pending()
    }

    fn run(&mut self) {
        for message in self.input.drain() {
            match message {
                Message::Data(version, collection) => {
                    let stepped = version.apply_step(self.step);
                    self.output.send_data(stepped.clone(), collection);
                    self.pending_data_versions.insert(stepped);
                }
                Message::Frontier(frontier) => self.input.update_frontier(frontier),
            }
        }

        // Candidate output frontier: the input frontier pushed one
        // iteration forward, minus the elements whose outer version has
        // demonstrably reached fixpoint.
        let incremented = self.input.frontier().apply_step(self.step);
        let mut candidate = Antichain::new();
        for element in incremented.elements() {
            let outer = element.truncate();
            let seen = self.inner_versions_per_outer.entry(outer.clone()).or_default();
            seen.insert(element.clone());

            if seen.len() <= 2 {
                candidate.insert(element.clone());
                continue;
            }
            let closed: Vec<Version> = self
                .pending_data_versions
                .iter()
                .filter(|version| version.less_than(element))
                .cloned()
                .collect();
            if !closed.is_empty() {
                // Advancing to this element closes out data the loop sent
                // earlier, so it still carries progress.
                candidate.insert(element.clone());
                for version in closed {
                    self.pending_data_versions.remove(&version);
                }
            } else {
                self.inner_versions_per_outer.remove(&outer);
            }
        }

        assert!(self.output_frontier.less_equal(&candidate));
        if self.output_frontier.less_than(&candidate) {
            self.output_frontier = candidate;
            self.output.send_frontier(self.output_frontier.clone());
        }
    }
}
